//! Per-group session state machine.
//!
//! Every [`GroupConfig`](crate::mission::GroupConfig) in the active mission
//! owns exactly one `GroupSession`, created and destroyed with it. The
//! session tracks the group's lifecycle plus three orthogonal activity axes.
//!
//! # Lifecycle
//!
//! ```text
//! Idle -- on_created() ------> Created     on_create_failed() -> CreateFailed
//! Created -- on_joined() ----> Joined      on_join_failed() ---> JoinFailed
//! Joined -- on_left() -------> Idle (full reset)
//! ```
//!
//! # Orthogonal axes
//!
//! - connectivity: connected / disconnected
//! - rx: idle / active / muted
//! - tx: idle / pending / active / failed / usurped
//!
//! Connectivity flaps call [`GroupSession::reset_activity`], which clears
//! the activity axes and the talker list but leaves created/joined intact.
//! Leaving or deleting the group calls [`GroupSession::reset_lifecycle`],
//! which clears everything. This is the one consistent reset policy used at
//! every call site.

use serde::{Deserialize, Serialize};

use crate::mission::GroupConfig;

/// One entry of a group's ordered talker list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Talker {
    pub alias: String,
    pub node_id: String,
}

/// Live state of one group in the active mission.
#[derive(Debug, Clone)]
pub struct GroupSession {
    pub config: GroupConfig,

    pub selected_for_single_view: bool,
    pub selected_for_multi_view: bool,

    pub created: bool,
    pub create_error: bool,
    pub joined: bool,
    pub join_error: bool,
    pub connected: bool,

    pub rx: bool,
    pub tx: bool,
    pub tx_pending: bool,
    pub tx_error: bool,
    pub tx_usurped: bool,
    pub rx_muted: bool,
    pub tx_muted: bool,

    talkers: Vec<Talker>,
}

impl GroupSession {
    pub fn new(config: GroupConfig) -> Self {
        GroupSession {
            config,
            selected_for_single_view: false,
            selected_for_multi_view: false,
            created: false,
            create_error: false,
            joined: false,
            join_error: false,
            connected: false,
            rx: false,
            tx: false,
            tx_pending: false,
            tx_error: false,
            tx_usurped: false,
            rx_muted: false,
            tx_muted: false,
            talkers: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Clears the activity axes and the talker list. Used on connectivity
    /// flaps; lifecycle flags (created/joined) survive.
    pub fn reset_activity(&mut self) {
        self.rx = false;
        self.tx = false;
        self.tx_pending = false;
        self.tx_error = false;
        self.tx_usurped = false;
        self.rx_muted = false;
        self.tx_muted = false;
        self.connected = false;
        self.talkers.clear();
    }

    /// Full teardown: activity plus lifecycle. Used on leave and delete.
    pub fn reset_lifecycle(&mut self) {
        self.reset_activity();
        self.created = false;
        self.create_error = false;
        self.joined = false;
        self.join_error = false;
    }

    pub fn on_created(&mut self) {
        self.created = true;
        self.create_error = false;
    }

    pub fn on_create_failed(&mut self) {
        self.created = false;
        self.create_error = true;
    }

    pub fn on_joined(&mut self) {
        self.joined = true;
        self.join_error = false;
    }

    pub fn on_join_failed(&mut self) {
        self.joined = false;
        self.join_error = true;
    }

    pub fn on_left(&mut self) {
        self.reset_lifecycle();
    }

    pub fn on_connected(&mut self) {
        self.connected = true;
    }

    pub fn on_disconnected(&mut self) {
        self.reset_activity();
    }

    pub fn on_rx_started(&mut self) {
        self.rx = true;
    }

    pub fn on_rx_ended(&mut self) {
        self.rx = false;
        self.talkers.clear();
    }

    pub fn on_tx_started(&mut self) {
        self.tx = true;
        self.tx_pending = false;
        self.tx_error = false;
        self.tx_usurped = false;
    }

    pub fn on_tx_ended(&mut self) {
        self.tx = false;
        self.tx_pending = false;
        self.tx_error = false;
    }

    pub fn on_tx_failed(&mut self) {
        self.tx = false;
        self.tx_pending = false;
        self.tx_error = true;
        self.tx_usurped = false;
    }

    /// Terminal for this transmit attempt: another party took the channel.
    pub fn on_tx_usurped(&mut self) {
        self.tx = false;
        self.tx_pending = false;
        self.tx_error = false;
        self.tx_usurped = true;
    }

    /// Terminal for this transmit attempt: the engine cut us off.
    pub fn on_max_tx_time_exceeded(&mut self) {
        self.on_tx_usurped();
    }

    pub fn set_rx_muted(&mut self, muted: bool) {
        self.rx_muted = muted;
    }

    pub fn set_tx_muted(&mut self, muted: bool) {
        self.tx_muted = muted;
    }

    pub fn update_talkers(&mut self, talkers: Vec<Talker>) {
        self.talkers = talkers;
    }

    pub fn talkers(&self) -> &[Talker] {
        &self.talkers
    }

    /// Comma-separated talker aliases, for display.
    pub fn talker_line(&self) -> String {
        self.talkers
            .iter()
            .map(|t| t.alias.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::GroupKind;

    fn session() -> GroupSession {
        GroupSession::new(GroupConfig::new("g1", "Alpha", GroupKind::Audio))
    }

    #[test]
    fn lifecycle_transitions() {
        let mut s = session();
        assert!(!s.created && !s.joined);

        s.on_created();
        assert!(s.created && !s.create_error);

        s.on_joined();
        assert!(s.joined && !s.join_error);

        s.on_left();
        assert!(!s.created && !s.joined);
    }

    #[test]
    fn create_failure_sets_error_flag() {
        let mut s = session();
        s.on_create_failed();
        assert!(!s.created && s.create_error);

        // A later successful create clears the error
        s.on_created();
        assert!(s.created && !s.create_error);
    }

    #[test]
    fn connectivity_flap_keeps_lifecycle() {
        let mut s = session();
        s.on_created();
        s.on_joined();
        s.on_connected();
        s.on_rx_started();
        s.update_talkers(vec![Talker {
            alias: "unit-7".into(),
            node_id: "n7".into(),
        }]);

        s.on_disconnected();
        assert!(s.created && s.joined, "lifecycle must survive a flap");
        assert!(!s.connected && !s.rx);
        assert!(s.talkers().is_empty());
    }

    #[test]
    fn usurped_clears_tx_and_marks_attempt() {
        let mut s = session();
        s.tx_pending = true;
        s.on_tx_started();
        assert!(s.tx && !s.tx_pending);

        s.on_tx_usurped();
        assert!(!s.tx && !s.tx_pending && s.tx_usurped && !s.tx_error);
    }

    #[test]
    fn talker_line_joins_aliases_in_order() {
        let mut s = session();
        s.update_talkers(vec![
            Talker {
                alias: "alpha".into(),
                node_id: "n1".into(),
            },
            Talker {
                alias: "bravo".into(),
                node_id: "n2".into(),
            },
        ]);
        assert_eq!(s.talker_line(), "alpha, bravo");
    }
}
