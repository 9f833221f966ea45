//! Session and configuration core for a group push-to-talk client.
//!
//! The crate sits between a UI and an external communications engine. It
//! owns the shareable mission-token codec, the persisted mission store, the
//! active mission's per-group session state and presence table, transmit
//! arbitration, and the health and license-activation control loops. All
//! mutation flows through the [`manager::SessionManager`] actor mailbox;
//! the engine stays an opaque collaborator behind [`engine::Engine`].

pub mod active;
pub mod base91;
pub mod codec;
pub mod engine;
pub mod error;
pub mod health;
pub mod license;
pub mod listeners;
pub mod manager;
pub mod manager_actor;
pub mod mission;
pub mod presence;
pub mod session;
pub mod settings;
pub mod store;
pub mod tx;

pub use active::ActiveConfiguration;
pub use engine::{Engine, EngineEvent, MockEngine};
pub use error::{CodecError, ConfigError, StoreError, TxError};
pub use manager::{ListenerRegistration, SessionManager};
pub use mission::{GroupConfig, GroupKind, GroupOrigin, MissionConfig, RelayHost};
pub use presence::PresenceDescriptor;
pub use session::{GroupSession, Talker};
pub use settings::{SessionSettings, ViewMode};
pub use store::{MemoryStorage, MissionStore, Storage, MISSION_STORE_KEY};
