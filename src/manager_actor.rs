//! Message surface of the session manager actor.
//!
//! The actor mailbox is the single serialized task queue: engine events,
//! transmit requests, listener (un)registration, and timer ticks all land
//! here in order. Background tickers run on their own tasks and marshal
//! back by telling the actor; they never touch state directly.

use kameo::actor::ActorRef;
use kameo::message::{Context, Message};
use log::warn;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::engine::EngineEvent;
use crate::error::{ConfigError, TxError};
use crate::health::HEALTH_CHECK_INTERVAL;
use crate::license::ScheduledRetry;
use crate::manager::{ListenerRegistration, SessionManager};
use crate::mission::GroupConfig;
use crate::session::GroupSession;
use crate::settings::SessionSettings;

/// Starts engine bring-up for the mission and the health ticker.
pub struct StartSession;

impl Message<StartSession> for SessionManager {
    type Reply = ();

    async fn handle(
        &mut self,
        _msg: StartSession,
        ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.start();
        spawn_health_ticker(ctx.actor_ref(), self.cancel_token());
    }
}

/// One event from the engine.
pub struct EngineEventMessage(pub EngineEvent);

impl Message<EngineEventMessage> for SessionManager {
    type Reply = ();

    async fn handle(
        &mut self,
        msg: EngineEventMessage,
        ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        if let Some(retry) = self.process_engine_event(msg.0) {
            spawn_license_timer(ctx.actor_ref(), retry, self.cancel_token());
        }
    }
}

pub struct BeginTxRequest {
    pub priority: i32,
    pub flags: u32,
}

impl Message<BeginTxRequest> for SessionManager {
    type Reply = Result<Vec<String>, TxError>;

    async fn handle(
        &mut self,
        msg: BeginTxRequest,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.begin_tx(msg.priority, msg.flags)
    }
}

pub struct EndTxRequest;

impl Message<EndTxRequest> for SessionManager {
    type Reply = ();

    async fn handle(
        &mut self,
        _msg: EndTxRequest,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.end_tx();
    }
}

pub struct HealthTick;

impl Message<HealthTick> for SessionManager {
    type Reply = ();

    async fn handle(
        &mut self,
        _msg: HealthTick,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.on_health_tick();
    }
}

pub struct LicenseTimerFired {
    pub generation: u64,
}

impl Message<LicenseTimerFired> for SessionManager {
    type Reply = ();

    async fn handle(
        &mut self,
        msg: LicenseTimerFired,
        ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        if let Some(retry) = self.on_license_timer_fired(msg.generation) {
            spawn_license_timer(ctx.actor_ref(), retry, self.cancel_token());
        }
    }
}

pub struct PauseLicenseActivation;

impl Message<PauseLicenseActivation> for SessionManager {
    type Reply = ();

    async fn handle(
        &mut self,
        _msg: PauseLicenseActivation,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.pause_license_activation();
    }
}

pub struct ResumeLicenseActivation;

impl Message<ResumeLicenseActivation> for SessionManager {
    type Reply = ();

    async fn handle(
        &mut self,
        _msg: ResumeLicenseActivation,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.resume_license_activation();
    }
}

pub struct RegisterListener(pub ListenerRegistration);

impl Message<RegisterListener> for SessionManager {
    type Reply = ();

    async fn handle(
        &mut self,
        msg: RegisterListener,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.register_listener(msg.0);
    }
}

pub struct UnregisterListener(pub ListenerRegistration);

impl Message<UnregisterListener> for SessionManager {
    type Reply = ();

    async fn handle(
        &mut self,
        msg: UnregisterListener,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.unregister_listener(msg.0);
    }
}

pub struct AddDynamicGroup(pub GroupConfig);

impl Message<AddDynamicGroup> for SessionManager {
    type Reply = Result<bool, ConfigError>;

    async fn handle(
        &mut self,
        msg: AddDynamicGroup,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.add_dynamic_group(msg.0)
    }
}

pub struct RemoveDynamicGroup(pub String);

impl Message<RemoveDynamicGroup> for SessionManager {
    type Reply = Result<(), ConfigError>;

    async fn handle(
        &mut self,
        msg: RemoveDynamicGroup,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.remove_dynamic_group(&msg.0)
    }
}

pub struct UpdateSelfPresence {
    pub descriptor_json: String,
    pub force: bool,
}

impl Message<UpdateSelfPresence> for SessionManager {
    type Reply = ();

    async fn handle(
        &mut self,
        msg: UpdateSelfPresence,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.update_self_presence(&msg.descriptor_json, msg.force);
    }
}

pub struct SendPresenceBlob {
    pub blob: Vec<u8>,
    pub meta_json: String,
}

impl Message<SendPresenceBlob> for SessionManager {
    type Reply = ();

    async fn handle(
        &mut self,
        msg: SendPresenceBlob,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.send_presence_blob(&msg.blob, &msg.meta_json);
    }
}

/// Query: a copy of one group's session state.
pub struct SessionSnapshot(pub String);

impl Message<SessionSnapshot> for SessionManager {
    type Reply = Option<GroupSession>;

    async fn handle(
        &mut self,
        msg: SessionSnapshot,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.session_snapshot(&msg.0)
    }
}

pub struct SetSingleViewSelection(pub String);

impl Message<SetSingleViewSelection> for SessionManager {
    type Reply = ();

    async fn handle(
        &mut self,
        msg: SetSingleViewSelection,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.set_single_view_selection(&msg.0);
    }
}

pub struct SetMultiViewSelection {
    pub id: String,
    pub selected: bool,
}

impl Message<SetMultiViewSelection> for SessionManager {
    type Reply = ();

    async fn handle(
        &mut self,
        msg: SetMultiViewSelection,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.set_multi_view_selection(&msg.id, msg.selected);
    }
}

pub struct UpdateSettings(pub SessionSettings);

impl Message<UpdateSettings> for SessionManager {
    type Reply = ();

    async fn handle(
        &mut self,
        msg: UpdateSettings,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.update_settings(msg.0);
    }
}

pub struct Shutdown;

impl Message<Shutdown> for SessionManager {
    type Reply = ();

    async fn handle(
        &mut self,
        _msg: Shutdown,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.shutdown();
    }
}

/// Fixed-rate health tick, marshalled onto the mailbox. The first tick
/// lands one full interval after start.
pub fn spawn_health_ticker(manager: ActorRef<SessionManager>, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // interval() fires immediately; swallow that one
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if manager.tell(HealthTick).await.is_err() {
                        warn!("[spawn_health_ticker] manager gone, stopping");
                        break;
                    }
                }
            }
        }
    });
}

/// One-shot license retry timer, marshalled onto the mailbox.
pub fn spawn_license_timer(
    manager: ActorRef<SessionManager>,
    retry: ScheduledRetry,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(retry.delay) => {
                if manager
                    .tell(LicenseTimerFired {
                        generation: retry.generation,
                    })
                    .await
                    .is_err()
                {
                    warn!("[spawn_license_timer] manager gone, dropping fire");
                }
            }
        }
    });
}
