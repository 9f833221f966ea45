//! Periodic group-health scan.
//!
//! Every tick walks the sessions looking for a group that was created and
//! joined but has lost its connection. One degraded group is enough to tell
//! the user the network is unhappy, so the scan short-circuits on the first
//! match and the notification is rate-limited.

use std::time::{Duration, Instant};

use log::info;

use crate::active::ActiveConfiguration;
use crate::settings::SessionSettings;

/// Fixed tick rate of the scan (also the initial delay).
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(2);
/// Minimum spacing between two degraded-network notifications.
pub const NETWORK_ERROR_MIN_NOTIFY_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Default)]
pub struct HealthMonitor {
    last_notified: Option<Instant>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// One tick of the scan. Returns the id of a degraded group when a
    /// notification is due; rate limiting and the user setting both gate it.
    pub fn check(
        &mut self,
        active: &ActiveConfiguration,
        settings: &SessionSettings,
    ) -> Option<String> {
        let degraded = active
            .sessions()
            .iter()
            .find(|s| s.created && s.joined && !s.connected)?;

        if !settings.notify_on_network_error {
            return None;
        }
        if let Some(at) = self.last_notified {
            if at.elapsed() < NETWORK_ERROR_MIN_NOTIFY_INTERVAL {
                return None;
            }
        }

        self.last_notified = Some(Instant::now());
        info!("[check] group {} is degraded", degraded.id());
        Some(degraded.id().to_string())
    }
}
