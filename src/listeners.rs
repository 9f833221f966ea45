//! Per-concern listener registries.
//!
//! Each concern exposes exactly one listener trait; every trait is dispatched
//! through the same [`SubscriberList`] utility. Registration and removal go
//! through the session manager's mailbox, so they are serialized with the
//! mutations they observe; the list itself is still lock-guarded because
//! notification may fan out from timer tasks.

use std::sync::{Arc, Mutex};

use crate::error::TxError;
use crate::presence::PresenceDescriptor;

/// Owned subscriber list for one listener trait.
pub struct SubscriberList<T: ?Sized> {
    subscribers: Mutex<Vec<Arc<T>>>,
}

impl<T: ?Sized> Default for SubscriberList<T> {
    fn default() -> Self {
        SubscriberList {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<T: ?Sized> SubscriberList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber. Registering the same `Arc` twice is a no-op.
    pub fn register(&self, subscriber: Arc<T>) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        if !subscribers.iter().any(|s| Arc::ptr_eq(s, &subscriber)) {
            subscribers.push(subscriber);
        }
    }

    pub fn unregister(&self, subscriber: &Arc<T>) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|s| !Arc::ptr_eq(s, subscriber));
    }

    pub fn len(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls `f` for every subscriber. The snapshot is taken under the lock;
    /// the callbacks run outside it so a listener may re-register.
    pub fn notify(&self, f: impl Fn(&T)) {
        let snapshot: Vec<Arc<T>> = self
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for subscriber in snapshot {
            f(&subscriber);
        }
    }
}

/// Pre-transmit user cue chosen by the arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxCue {
    /// Short advisory tone played before the transmit-begin calls go out.
    AdvisoryTone,
    /// Haptic-only cue; transmit-begin goes out immediately.
    Vibration,
}

/// Group lifecycle and activity changes. All methods default to no-ops so a
/// listener only implements what it shows.
pub trait GroupListener: Send + Sync {
    fn on_group_updated(&self, _id: &str) {}
    fn on_group_asset_discovered(&self, _id: &str, _json: &str) {}
    fn on_group_asset_undiscovered(&self, _id: &str) {}
}

pub trait PresenceListener: Send + Sync {
    fn on_node_discovered(&self, _descriptor: &PresenceDescriptor) {}
    fn on_node_rediscovered(&self, _descriptor: &PresenceDescriptor) {}
    fn on_node_undiscovered(&self, _descriptor: &PresenceDescriptor) {}
}

pub trait TxListener: Send + Sync {
    fn on_tx_pending(&self, _group_ids: &[String]) {}
    fn on_tx_cue(&self, _cue: TxCue) {}
    fn on_tx_ending(&self) {}
    fn on_all_tx_ended(&self) {}
    /// Audible-error cue for a rejected begin call.
    fn on_tx_error(&self, _error: &TxError) {}
    /// Raised exactly once when a transmit attempt is cut short by the
    /// engine (failed, usurped, or max-time-exceeded).
    fn on_tx_interrupted(&self, _group_id: &str) {}
}

pub trait LicenseListener: Send + Sync {
    fn on_license_changed(&self) {}
    fn on_license_expiring(&self, _seconds_left: u64) {}
    fn on_license_expired(&self) {}
    fn on_activation_code_obtained(&self, _code: &str) {}
}

pub trait NetworkListener: Send + Sync {
    fn on_network_degraded(&self, _group_id: &str) {}
}

/// All registries the session manager fans out to.
#[derive(Default)]
pub struct Listeners {
    pub group: SubscriberList<dyn GroupListener>,
    pub presence: SubscriberList<dyn PresenceListener>,
    pub tx: SubscriberList<dyn TxListener>,
    pub license: SubscriberList<dyn LicenseListener>,
    pub network: SubscriberList<dyn NetworkListener>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    impl GroupListener for Counter {
        fn on_group_updated(&self, _id: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn register_is_idempotent_and_unregister_removes() {
        let list: SubscriberList<dyn GroupListener> = SubscriberList::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));

        let as_listener: Arc<dyn GroupListener> = counter.clone();
        list.register(as_listener.clone());
        list.register(as_listener.clone());
        assert_eq!(list.len(), 1);

        list.notify(|l| l.on_group_updated("g1"));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        list.unregister(&as_listener);
        assert!(list.is_empty());
        list.notify(|l| l.on_group_updated("g1"));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}
