//! Push-to-talk transmit arbitration.
//!
//! At most one transmission is in flight at any time, across however many
//! groups the view mode selects. The transmitting set is one collection
//! behind one lock; begin, end, and event-driven removal each hold that lock
//! for their entire read-modify-write sequence, so a racing press can never
//! observe a half-built set.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Instant;

use log::{info, warn};

use crate::active::ActiveConfiguration;
use crate::engine::Engine;
use crate::error::TxError;
use crate::listeners::{SubscriberList, TxCue, TxListener};
use crate::mission::GroupKind;
use crate::settings::{SessionSettings, ViewMode};

struct TxState {
    transmitting: HashSet<String>,
    last_activity: Option<Instant>,
}

pub struct TxArbiter {
    state: Mutex<TxState>,
}

impl Default for TxArbiter {
    fn default() -> Self {
        TxArbiter {
            state: Mutex::new(TxState {
                transmitting: HashSet::new(),
                last_activity: None,
            }),
        }
    }
}

impl TxArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a transmission on the currently selected groups.
    ///
    /// Targets are the selected sessions that are audio groups and already
    /// created on the engine; multi view additionally drops tx-muted groups
    /// (single view ignores mute). The chosen pre-transmit cue is the
    /// advisory tone when the user asked for it every time or the session
    /// has been idle past the configured threshold, else the vibration cue.
    pub fn begin(
        &self,
        active: &mut ActiveConfiguration,
        settings: &SessionSettings,
        engine: &dyn Engine,
        listeners: &SubscriberList<dyn TxListener>,
        priority: i32,
        flags: u32,
    ) -> Result<Vec<String>, TxError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.transmitting.is_empty() {
            return Err(TxError::ConcurrentTx);
        }

        let selected: Vec<String> = active
            .selected_groups(settings.view_mode)
            .iter()
            .filter(|s| s.config.kind == GroupKind::Audio && s.created)
            .filter(|s| settings.view_mode == ViewMode::Single || !s.tx_muted)
            .map(|s| s.id().to_string())
            .collect();
        if selected.is_empty() {
            return Err(TxError::NoTarget);
        }

        let tone = settings.notify_ptt_every_tx
            || state
                .last_activity
                .map_or(true, |at| at.elapsed() >= settings.tx_idle_notification_after);
        state.last_activity = Some(Instant::now());

        for id in &selected {
            if let Some(session) = active.session_mut(id) {
                session.tx_pending = true;
            }
            state.transmitting.insert(id.clone());
        }

        info!("[begin] tx pending on {selected:?}");
        listeners.notify(|l| l.on_tx_pending(&selected));
        if tone {
            listeners.notify(|l| l.on_tx_cue(TxCue::AdvisoryTone));
        } else if settings.enable_vibrations {
            listeners.notify(|l| l.on_tx_cue(TxCue::Vibration));
        }

        let mut started = Vec::with_capacity(selected.len());
        for id in selected {
            match engine.begin_tx(&id, priority, flags) {
                Ok(()) => started.push(id),
                Err(e) => {
                    warn!("[begin] engine refused tx on {id}: {e}");
                    state.transmitting.remove(&id);
                    if let Some(session) = active.session_mut(&id) {
                        session.on_tx_failed();
                    }
                }
            }
        }
        Ok(started)
    }

    /// Ends the transmission: issues transmit-end for every group in the
    /// set. The set itself drains as the engine confirms with tx-ended
    /// events, which is when "all tx ended" fires.
    pub fn end(&self, engine: &dyn Engine, listeners: &SubscriberList<dyn TxListener>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.transmitting.is_empty() {
            return;
        }

        for id in &state.transmitting {
            if let Err(e) = engine.end_tx(id) {
                warn!("[end] engine refused tx end on {id}: {e}");
            }
        }
        state.last_activity = Some(Instant::now());

        info!("[end] tx ending on {:?}", state.transmitting);
        listeners.notify(|l| l.on_tx_ending());
    }

    /// Removes a group whose transmit attempt terminated (ended, failed,
    /// usurped, or timed out). Returns true when this removal emptied a
    /// previously non-empty set, i.e. when "all tx ended" is due.
    pub fn on_tx_terminated(&self, id: &str) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.transmitting.remove(id) && state.transmitting.is_empty()
    }

    pub fn is_transmitting(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        !state.transmitting.is_empty()
    }

    pub fn transmitting_ids(&self) -> Vec<String> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.transmitting.iter().cloned().collect()
    }

    /// Best-effort teardown on shutdown: forget everything in flight.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.transmitting.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineCall, MockEngine};
    use crate::mission::{GroupConfig, MissionConfig};

    fn active_two_audio() -> ActiveConfiguration {
        let mut mission = MissionConfig::new("m1", "Test");
        mission
            .groups
            .push(GroupConfig::new("ga", "Alpha", GroupKind::Audio));
        mission
            .groups
            .push(GroupConfig::new("gb", "Bravo", GroupKind::Audio));
        let mut active = ActiveConfiguration::load(&mission);
        for s in active.sessions_mut() {
            s.on_created();
            s.on_joined();
        }
        active
    }

    fn listeners() -> SubscriberList<dyn TxListener> {
        SubscriberList::new()
    }

    #[test]
    fn second_begin_is_concurrent_tx() {
        let arbiter = TxArbiter::new();
        let engine = MockEngine::new();
        let mut active = active_two_audio();
        active
            .session_mut("ga")
            .expect("missing ga")
            .selected_for_single_view = true;

        let started = arbiter
            .begin(
                &mut active,
                &SessionSettings::default(),
                &engine,
                &listeners(),
                0,
                0,
            )
            .expect("first begin failed");
        assert_eq!(started, vec!["ga".to_string()]);
        assert!(active.session("ga").expect("missing ga").tx_pending);

        let err = arbiter
            .begin(
                &mut active,
                &SessionSettings::default(),
                &engine,
                &listeners(),
                0,
                0,
            )
            .expect_err("second begin must fail");
        assert!(matches!(err, TxError::ConcurrentTx));
        assert_eq!(arbiter.transmitting_ids(), vec!["ga".to_string()]);
    }

    #[test]
    fn no_selection_is_no_target() {
        let arbiter = TxArbiter::new();
        let engine = MockEngine::new();
        let mut active = active_two_audio();

        let err = arbiter
            .begin(
                &mut active,
                &SessionSettings::default(),
                &engine,
                &listeners(),
                0,
                0,
            )
            .expect_err("nothing selected");
        assert!(matches!(err, TxError::NoTarget));
        assert!(!arbiter.is_transmitting());
    }

    #[test]
    fn multi_view_filters_muted_groups() {
        let arbiter = TxArbiter::new();
        let engine = MockEngine::new();
        let mut active = active_two_audio();
        for id in ["ga", "gb"] {
            active
                .session_mut(id)
                .expect("missing session")
                .selected_for_multi_view = true;
        }
        active.session_mut("ga").expect("missing ga").set_tx_muted(true);

        let settings = SessionSettings {
            view_mode: ViewMode::Multi,
            ..SessionSettings::default()
        };
        let started = arbiter
            .begin(&mut active, &settings, &engine, &listeners(), 0, 0)
            .expect("begin failed");
        assert_eq!(started, vec!["gb".to_string()]);
        assert!(!active.session("ga").expect("missing ga").tx_pending);
        assert!(engine
            .calls()
            .iter()
            .all(|c| *c != EngineCall::BeginTx("ga".to_string())));
    }

    #[test]
    fn all_muted_in_multi_view_is_no_target() {
        let arbiter = TxArbiter::new();
        let engine = MockEngine::new();
        let mut active = active_two_audio();
        for id in ["ga", "gb"] {
            let s = active.session_mut(id).expect("missing session");
            s.selected_for_multi_view = true;
            s.set_tx_muted(true);
        }

        let settings = SessionSettings {
            view_mode: ViewMode::Multi,
            ..SessionSettings::default()
        };
        let err = arbiter
            .begin(&mut active, &settings, &engine, &listeners(), 0, 0)
            .expect_err("all muted");
        assert!(matches!(err, TxError::NoTarget));
        assert!(engine.calls().is_empty());
        assert!(!arbiter.is_transmitting());
    }

    #[test]
    fn single_view_ignores_mute() {
        let arbiter = TxArbiter::new();
        let engine = MockEngine::new();
        let mut active = active_two_audio();
        {
            let s = active.session_mut("ga").expect("missing ga");
            s.selected_for_single_view = true;
            s.set_tx_muted(true);
        }

        let started = arbiter
            .begin(
                &mut active,
                &SessionSettings::default(),
                &engine,
                &listeners(),
                0,
                0,
            )
            .expect("begin failed");
        assert_eq!(started, vec!["ga".to_string()]);
    }

    #[test]
    fn uncreated_groups_are_not_targets() {
        let arbiter = TxArbiter::new();
        let engine = MockEngine::new();
        let mut active = active_two_audio();
        {
            let s = active.session_mut("ga").expect("missing ga");
            s.selected_for_single_view = true;
            s.reset_lifecycle();
        }

        let err = arbiter
            .begin(
                &mut active,
                &SessionSettings::default(),
                &engine,
                &listeners(),
                0,
                0,
            )
            .expect_err("group not created on the engine");
        assert!(matches!(err, TxError::NoTarget));
    }

    #[test]
    fn terminated_events_drain_the_set() {
        let arbiter = TxArbiter::new();
        let engine = MockEngine::new();
        let mut active = active_two_audio();
        for id in ["ga", "gb"] {
            active
                .session_mut(id)
                .expect("missing session")
                .selected_for_multi_view = true;
        }
        let settings = SessionSettings {
            view_mode: ViewMode::Multi,
            ..SessionSettings::default()
        };
        arbiter
            .begin(&mut active, &settings, &engine, &listeners(), 0, 0)
            .expect("begin failed");

        arbiter.end(&engine, &listeners());
        assert!(arbiter.is_transmitting(), "set drains on events, not end()");

        assert!(!arbiter.on_tx_terminated("ga"));
        assert!(arbiter.on_tx_terminated("gb"), "last removal signals all-ended");
        assert!(!arbiter.on_tx_terminated("gb"), "duplicate event is a no-op");
    }
}
