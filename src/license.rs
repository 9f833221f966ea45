//! License activation retry scheduling.
//!
//! The engine reports the license expiring or expired; this scheduler
//! decides when to retry obtaining an activation code from the external
//! licensing service. At most one retry timer is ever outstanding: every
//! schedule call supersedes the previous timer by bumping a generation
//! counter, and a fire carrying a stale generation is ignored. A paused
//! scheduler (a user-facing license flow is on screen) reschedules instead
//! of activating.

use std::time::Duration;

use log::info;

/// Floor for every retry delay. Process-lifetime state: a restart may retry
/// sooner.
pub const MIN_RETRY_DELAY: Duration = Duration::from_secs(60);

/// External licensing call. Synchronous; returns the activation code.
pub trait LicenseActivator: Send + Sync {
    fn obtain_activation_code(&self, entitlement: &str, key: &str) -> anyhow::Result<String>;
}

/// A retry timer the caller must arm: sleep `delay`, then report a fire
/// carrying `generation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledRetry {
    pub generation: u64,
    pub delay: Duration,
}

/// What to do when a retry timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerDecision {
    /// A newer schedule superseded this timer.
    Stale,
    /// Paused; arm the returned timer instead of activating.
    Reschedule(ScheduledRetry),
    /// Invoke the activator now.
    Activate,
}

#[derive(Default)]
pub struct LicenseActivationScheduler {
    paused: bool,
    generation: u64,
    last_delay: Duration,
}

impl LicenseActivationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The license is expiring in `seconds_left`; retry halfway there, but
    /// never sooner than the minimum delay.
    pub fn schedule_from_expiring(&mut self, seconds_left: u64) -> ScheduledRetry {
        self.schedule(MIN_RETRY_DELAY.max(Duration::from_secs(seconds_left / 2)))
    }

    /// The license already expired; retry at the minimum delay.
    pub fn schedule_from_expired(&mut self) -> ScheduledRetry {
        self.schedule(MIN_RETRY_DELAY)
    }

    fn schedule(&mut self, delay: Duration) -> ScheduledRetry {
        self.generation += 1;
        self.last_delay = delay;
        info!(
            "[schedule] activation retry in {}s (generation {})",
            delay.as_secs(),
            self.generation
        );
        ScheduledRetry {
            generation: self.generation,
            delay,
        }
    }

    pub fn on_timer_fired(&mut self, generation: u64) -> TimerDecision {
        if generation != self.generation {
            return TimerDecision::Stale;
        }
        if self.paused {
            info!("[on_timer_fired] paused, rescheduling");
            return TimerDecision::Reschedule(self.schedule(self.last_delay));
        }
        TimerDecision::Activate
    }

    /// Invalidates any timer still in flight.
    pub fn cancel(&mut self) {
        self.generation += 1;
    }

    /// Activation produced a code; no further retries until the engine
    /// reports trouble again.
    pub fn on_activation_succeeded(&mut self) {
        self.cancel();
    }

    /// Activation failed or returned an empty code; retry with the same
    /// delay.
    pub fn on_activation_failed(&mut self) -> ScheduledRetry {
        let delay = if self.last_delay.is_zero() {
            MIN_RETRY_DELAY
        } else {
            self.last_delay
        };
        self.schedule(delay)
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}
