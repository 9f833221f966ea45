//! User-facing session settings.
//!
//! The embedder (UI / preference screen) owns these values; the core only
//! reads them. They gate notifications and pick the transmit view mode.

use std::time::Duration;

/// Selection mode for transmit and receive eligibility.
///
/// Single view talks to at most one audio group; multi view talks to every
/// group flagged for it at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Single,
    Multi,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub view_mode: ViewMode,

    /// Raise a degraded-network notification when a joined group loses its
    /// connection.
    pub notify_on_network_error: bool,
    /// Play the advisory tone on every transmit, not just after idle spells.
    pub notify_ptt_every_tx: bool,
    /// Allow the short vibration cue when the tone is skipped.
    pub enable_vibrations: bool,
    /// Idle spell after which the next transmit gets the advisory tone even
    /// when `notify_ptt_every_tx` is off.
    pub tx_idle_notification_after: Duration,

    pub notify_node_join: bool,
    pub notify_node_leave: bool,

    pub license_entitlement: String,
    pub license_key: String,
    pub license_activation_code: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            view_mode: ViewMode::Single,
            notify_on_network_error: true,
            notify_ptt_every_tx: false,
            enable_vibrations: true,
            tx_idle_notification_after: Duration::from_secs(30),
            notify_node_join: true,
            notify_node_leave: true,
            license_entitlement: String::new(),
            license_key: String::new(),
            license_activation_code: String::new(),
        }
    }
}
