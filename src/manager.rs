//! The serialized owner of all session state.
//!
//! `SessionManager` runs as an actor: every engine event, transmit request,
//! and timer tick arrives through its mailbox (see
//! [`crate::manager_actor`]), giving total ordering of mutations without
//! fine-grained locking. Only the transmitting set and the presence table
//! carry their own locks, because UI refresh reads them concurrently.
//!
//! A malformed engine-event payload is logged and dropped here; it never
//! propagates and never destabilizes the manager.

use std::sync::Arc;
use std::time::Instant;

use kameo::Actor;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::active::ActiveConfiguration;
use crate::engine::{Engine, EngineEvent};
use crate::error::{ConfigError, TxError};
use crate::health::HealthMonitor;
use crate::license::{
    LicenseActivationScheduler, LicenseActivator, ScheduledRetry, TimerDecision,
};
use crate::listeners::{
    GroupListener, LicenseListener, Listeners, NetworkListener, PresenceListener, TxListener,
};
use crate::mission::{GroupConfig, MissionConfig};
use crate::session::GroupSession;
use crate::settings::SessionSettings;
use crate::tx::TxArbiter;

/// One listener handle, tagged by concern.
pub enum ListenerRegistration {
    Group(Arc<dyn GroupListener>),
    Presence(Arc<dyn PresenceListener>),
    Tx(Arc<dyn TxListener>),
    License(Arc<dyn LicenseListener>),
    Network(Arc<dyn NetworkListener>),
}

#[derive(Actor)]
pub struct SessionManager {
    engine: Arc<dyn Engine>,
    activator: Arc<dyn LicenseActivator>,
    active: ActiveConfiguration,
    settings: SessionSettings,
    listeners: Listeners,
    tx: TxArbiter,
    health: HealthMonitor,
    license: LicenseActivationScheduler,
    cancel: CancellationToken,
    last_audio_activity: Option<Instant>,
}

impl SessionManager {
    pub fn new(
        engine: Arc<dyn Engine>,
        activator: Arc<dyn LicenseActivator>,
        mission: &MissionConfig,
        settings: SessionSettings,
    ) -> Self {
        SessionManager {
            engine,
            activator,
            active: ActiveConfiguration::load(mission),
            settings,
            listeners: Listeners::new(),
            tx: TxArbiter::new(),
            health: HealthMonitor::new(),
            license: LicenseActivationScheduler::new(),
            cancel: CancellationToken::new(),
            last_audio_activity: None,
        }
    }

    /// Token cancelled on shutdown; background tickers watch it.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn active(&self) -> &ActiveConfiguration {
        &self.active
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Last time audio moved in either direction, for idle displays.
    pub fn last_audio_activity(&self) -> Option<Instant> {
        self.last_audio_activity
    }

    pub fn update_settings(&mut self, settings: SessionSettings) {
        self.settings = settings;
    }

    pub fn register_listener(&mut self, registration: ListenerRegistration) {
        match registration {
            ListenerRegistration::Group(l) => self.listeners.group.register(l),
            ListenerRegistration::Presence(l) => self.listeners.presence.register(l),
            ListenerRegistration::Tx(l) => self.listeners.tx.register(l),
            ListenerRegistration::License(l) => self.listeners.license.register(l),
            ListenerRegistration::Network(l) => self.listeners.network.register(l),
        }
    }

    pub fn unregister_listener(&mut self, registration: ListenerRegistration) {
        match registration {
            ListenerRegistration::Group(l) => self.listeners.group.unregister(&l),
            ListenerRegistration::Presence(l) => self.listeners.presence.unregister(&l),
            ListenerRegistration::Tx(l) => self.listeners.tx.unregister(&l),
            ListenerRegistration::License(l) => self.listeners.license.unregister(&l),
            ListenerRegistration::Network(l) => self.listeners.network.unregister(&l),
        }
    }

    /// Asks the engine to create and join every group of the active mission.
    /// Outcomes arrive later as events.
    pub fn start(&mut self) {
        info!(
            "[start] bringing up {} groups for mission {}",
            self.active.sessions().len(),
            self.active.mission().id
        );
        let configs: Vec<GroupConfig> = self
            .active
            .sessions()
            .iter()
            .map(|s| s.config.clone())
            .collect();
        for config in configs {
            self.create_and_join(&config);
        }
    }

    fn create_and_join(&self, config: &GroupConfig) {
        let config_json = match serde_json::to_string(config) {
            Ok(json) => json,
            Err(e) => {
                error!("[create_and_join] cannot serialize {}: {e}", config.id);
                return;
            }
        };
        if let Err(e) = self.engine.create_group(&config_json) {
            warn!("[create_and_join] create {} rejected: {e}", config.id);
            return;
        }
        if let Err(e) = self.engine.join_group(&config.id) {
            warn!("[create_and_join] join {} rejected: {e}", config.id);
        }
    }

    /// Best-effort teardown: cancel tickers and retry timers, forget
    /// everything in flight.
    pub fn shutdown(&mut self) {
        info!("[shutdown] tearing down session");
        self.cancel.cancel();
        self.license.cancel();
        self.tx.clear();
        for session in self.active.sessions_mut() {
            session.reset_lifecycle();
        }
    }

    pub fn session_snapshot(&self, id: &str) -> Option<GroupSession> {
        self.active.session(id).cloned()
    }

    pub fn set_single_view_selection(&mut self, id: &str) {
        for session in self.active.sessions_mut() {
            session.selected_for_single_view = session.id() == id;
        }
    }

    pub fn set_multi_view_selection(&mut self, id: &str, selected: bool) {
        if let Some(session) = self.active.session_mut(id) {
            session.selected_for_multi_view = selected;
        }
    }

    pub fn begin_tx(&mut self, priority: i32, flags: u32) -> Result<Vec<String>, TxError> {
        let result = self.tx.begin(
            &mut self.active,
            &self.settings,
            self.engine.as_ref(),
            &self.listeners.tx,
            priority,
            flags,
        );
        let started = match result {
            Ok(started) => started,
            Err(e) => {
                self.listeners.tx.notify(|l| l.on_tx_error(&e));
                return Err(e);
            }
        };
        self.last_audio_activity = Some(Instant::now());
        for id in &started {
            self.notify_group_updated(id);
        }
        Ok(started)
    }

    pub fn end_tx(&mut self) {
        self.tx.end(self.engine.as_ref(), &self.listeners.tx);
    }

    pub fn add_dynamic_group(&mut self, config: GroupConfig) -> Result<bool, ConfigError> {
        let added = self.active.add_dynamic_group(config.clone())?;
        if added {
            self.create_and_join(&config);
        }
        Ok(added)
    }

    pub fn remove_dynamic_group(&mut self, id: &str) -> Result<(), ConfigError> {
        let removed = self.active.remove_dynamic_group(id)?;
        if let Err(e) = self.engine.leave_group(&removed.id) {
            warn!("[remove_dynamic_group] leave {} rejected: {e}", removed.id);
        }
        Ok(())
    }

    /// Publishes our own descriptor on every presence group. `force` pushes
    /// it out immediately instead of waiting for the engine's next beacon.
    pub fn update_self_presence(&self, descriptor_json: &str, force: bool) {
        for id in self.active.presence_group_ids() {
            if let Err(e) = self.engine.update_presence(&id, descriptor_json, force) {
                warn!("[update_self_presence] update on {id} rejected: {e}");
            }
        }
    }

    /// Forwards an opaque blob (e.g. a biometrics report) to every presence
    /// group of the active mission.
    pub fn send_presence_blob(&self, blob: &[u8], meta_json: &str) {
        for id in self.active.presence_group_ids() {
            if let Err(e) = self.engine.send_blob(&id, blob, meta_json) {
                warn!("[send_presence_blob] send on {id} rejected: {e}");
            }
        }
    }

    pub fn on_health_tick(&mut self) {
        if let Some(id) = self.health.check(&self.active, &self.settings) {
            self.listeners.network.notify(|l| l.on_network_degraded(&id));
        }
    }

    /// A retry timer fired. May hand back a new timer to arm.
    pub fn on_license_timer_fired(&mut self, generation: u64) -> Option<ScheduledRetry> {
        match self.license.on_timer_fired(generation) {
            TimerDecision::Stale => None,
            TimerDecision::Reschedule(retry) => Some(retry),
            TimerDecision::Activate => self.activate_license(),
        }
    }

    fn activate_license(&mut self) -> Option<ScheduledRetry> {
        let result = self
            .activator
            .obtain_activation_code(&self.settings.license_entitlement, &self.settings.license_key);
        match result {
            Ok(code) if !code.is_empty() => {
                info!("[activate_license] obtained activation code");
                self.settings.license_activation_code = code.clone();
                if let Err(e) = self.engine.update_license(
                    &self.settings.license_entitlement,
                    &self.settings.license_key,
                    &code,
                ) {
                    warn!("[activate_license] engine rejected new code: {e}");
                }
                self.license.on_activation_succeeded();
                self.listeners
                    .license
                    .notify(|l| l.on_activation_code_obtained(&code));
                None
            }
            Ok(_) => {
                warn!("[activate_license] empty activation code, will retry");
                Some(self.license.on_activation_failed())
            }
            Err(e) => {
                warn!("[activate_license] activation failed: {e}, will retry");
                Some(self.license.on_activation_failed())
            }
        }
    }

    pub fn pause_license_activation(&mut self) {
        self.license.pause();
    }

    pub fn resume_license_activation(&mut self) {
        self.license.resume();
    }

    fn notify_group_updated(&self, id: &str) {
        self.listeners.group.notify(|l| l.on_group_updated(id));
    }

    fn notify_all_tx_ended_if_drained(&self, id: &str) {
        if self.tx.on_tx_terminated(id) {
            info!("[process_engine_event] all tx ended");
            self.listeners.tx.notify(|l| l.on_all_tx_ended());
        }
    }

    /// Routes one engine event into the session state. May hand back a
    /// license retry timer to arm.
    pub fn process_engine_event(&mut self, event: EngineEvent) -> Option<ScheduledRetry> {
        match event {
            EngineEvent::Started => {
                info!("[process_engine_event] engine started");
            }
            EngineEvent::Stopped => {
                // Engine-side shutdown: timers and tx state die immediately
                info!("[process_engine_event] engine stopped");
                self.license.cancel();
                self.tx.clear();
                for session in self.active.sessions_mut() {
                    session.reset_activity();
                }
            }

            EngineEvent::GroupCreated { id } => {
                self.with_session(&id, |s| s.on_created());
            }
            EngineEvent::GroupCreateFailed { id } => {
                warn!("[process_engine_event] create failed for {id}");
                self.with_session(&id, |s| s.on_create_failed());
            }
            EngineEvent::GroupJoined { id } => {
                self.with_session(&id, |s| s.on_joined());
            }
            EngineEvent::GroupJoinFailed { id } => {
                warn!("[process_engine_event] join failed for {id}");
                self.with_session(&id, |s| s.on_join_failed());
            }
            EngineEvent::GroupLeft { id } => {
                self.with_session(&id, |s| s.on_left());
            }
            EngineEvent::GroupConnected { id } => {
                self.with_session(&id, |s| s.on_connected());
            }
            EngineEvent::GroupDisconnected { id } => {
                self.with_session(&id, |s| s.on_disconnected());
            }

            EngineEvent::GroupRxStarted { id } => {
                self.last_audio_activity = Some(Instant::now());
                self.with_session(&id, |s| s.on_rx_started());
            }
            EngineEvent::GroupRxEnded { id } => {
                self.with_session(&id, |s| s.on_rx_ended());
            }
            EngineEvent::GroupTalkersChanged { id, talkers } => {
                self.with_session(&id, |s| s.update_talkers(talkers));
            }

            EngineEvent::GroupTxStarted { id } => {
                self.last_audio_activity = Some(Instant::now());
                self.with_session(&id, |s| s.on_tx_started());
            }
            EngineEvent::GroupTxEnded { id } => {
                self.with_session(&id, |s| s.on_tx_ended());
                self.notify_all_tx_ended_if_drained(&id);
            }
            EngineEvent::GroupTxFailed { id } => {
                warn!("[process_engine_event] tx failed on {id}");
                self.with_session(&id, |s| s.on_tx_failed());
                self.listeners.tx.notify(|l| l.on_tx_interrupted(&id));
                self.notify_all_tx_ended_if_drained(&id);
            }
            EngineEvent::GroupTxUsurped { id } => {
                self.with_session(&id, |s| s.on_tx_usurped());
                self.listeners.tx.notify(|l| l.on_tx_interrupted(&id));
                self.notify_all_tx_ended_if_drained(&id);
            }
            EngineEvent::GroupMaxTxTimeExceeded { id } => {
                self.with_session(&id, |s| s.on_max_tx_time_exceeded());
                self.listeners.tx.notify(|l| l.on_tx_interrupted(&id));
                self.notify_all_tx_ended_if_drained(&id);
            }

            EngineEvent::GroupRxMuted { id } => {
                self.with_session(&id, |s| s.set_rx_muted(true));
            }
            EngineEvent::GroupRxUnmuted { id } => {
                self.with_session(&id, |s| s.set_rx_muted(false));
            }
            EngineEvent::GroupTxMuted { id } => {
                self.with_session(&id, |s| s.set_tx_muted(true));
            }
            EngineEvent::GroupTxUnmuted { id } => {
                self.with_session(&id, |s| s.set_tx_muted(false));
            }

            EngineEvent::NodeDiscovered { group_id, json } => {
                match self.active.process_node_discovered(&json) {
                    Ok(descriptor) => {
                        if self.settings.notify_node_join {
                            self.listeners
                                .presence
                                .notify(|l| l.on_node_discovered(&descriptor));
                        }
                    }
                    Err(e) => {
                        warn!("[process_engine_event] bad descriptor on {group_id}: {e}");
                    }
                }
            }
            EngineEvent::NodeRediscovered { group_id, json } => {
                match self.active.process_node_discovered(&json) {
                    Ok(descriptor) => {
                        self.listeners
                            .presence
                            .notify(|l| l.on_node_rediscovered(&descriptor));
                    }
                    Err(e) => {
                        warn!("[process_engine_event] bad descriptor on {group_id}: {e}");
                    }
                }
            }
            EngineEvent::NodeUndiscovered { group_id, json } => {
                match self.active.process_node_undiscovered(&json) {
                    Ok(Some(descriptor)) => {
                        if self.settings.notify_node_leave {
                            self.listeners
                                .presence
                                .notify(|l| l.on_node_undiscovered(&descriptor));
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("[process_engine_event] bad descriptor on {group_id}: {e}");
                    }
                }
            }

            EngineEvent::GroupAssetDiscovered { id, json } => {
                match serde_json::from_str::<GroupConfig>(&json) {
                    Ok(config) => match self.add_dynamic_group(config) {
                        Ok(true) => {
                            self.listeners
                                .group
                                .notify(|l| l.on_group_asset_discovered(&id, &json));
                        }
                        Ok(false) => {}
                        Err(e) => {
                            warn!("[process_engine_event] asset {id} rejected: {e}");
                        }
                    },
                    Err(e) => {
                        warn!("[process_engine_event] bad asset config for {id}: {e}");
                    }
                }
            }
            EngineEvent::GroupAssetUndiscovered { id } => {
                match self.remove_dynamic_group(&id) {
                    Ok(()) => {
                        self.listeners
                            .group
                            .notify(|l| l.on_group_asset_undiscovered(&id));
                    }
                    Err(e) => {
                        warn!("[process_engine_event] asset {id} not removed: {e}");
                    }
                }
            }

            EngineEvent::LicenseChanged => {
                self.listeners.license.notify(|l| l.on_license_changed());
            }
            EngineEvent::LicenseExpiring { seconds_left } => {
                self.listeners
                    .license
                    .notify(|l| l.on_license_expiring(seconds_left));
                return Some(self.license.schedule_from_expiring(seconds_left));
            }
            EngineEvent::LicenseExpired => {
                self.listeners.license.notify(|l| l.on_license_expired());
                return Some(self.license.schedule_from_expired());
            }
        }
        None
    }

    /// Applies `f` to the session for `id` and raises the group-updated
    /// notification. An unknown id is logged and dropped.
    fn with_session(&mut self, id: &str, f: impl FnOnce(&mut GroupSession)) {
        match self.active.session_mut(id) {
            Some(session) => {
                f(session);
                self.notify_group_updated(id);
            }
            None => {
                warn!("[with_session] event for unknown group {id}");
            }
        }
    }
}
