//! The active mission.
//!
//! `ActiveConfiguration` is the in-memory form of the mission currently in
//! use: the group configurations, one [`GroupSession`] per group, and the
//! merged [`PresenceTable`]. Every group id is unique and every group owns
//! exactly one session, created and destroyed with it.

use log::info;

use crate::error::ConfigError;
use crate::mission::{GroupConfig, GroupKind, GroupOrigin, MissionConfig, PRESENCE_GROUP_PREFIX};
use crate::presence::{PresenceDescriptor, PresenceTable};
use crate::session::GroupSession;
use crate::settings::ViewMode;

pub struct ActiveConfiguration {
    mission: MissionConfig,
    sessions: Vec<GroupSession>,
    presence: PresenceTable,
}

impl ActiveConfiguration {
    /// Builds the active form of a stored mission. A mission without a
    /// presence group gets one synthesized under the mission-control prefix
    /// so participant discovery always has a channel.
    pub fn load(mission: &MissionConfig) -> Self {
        let mut mission = mission.clone();
        if !mission.has_presence_group() {
            let id = format!("{PRESENCE_GROUP_PREFIX}{}", mission.id);
            info!("[load] synthesizing presence group {id}");
            let mut group = GroupConfig::new(id, "Mission control", GroupKind::Presence);
            // Runtime artifact: must never serialize back into a token
            group.origin = GroupOrigin::Dynamic;
            mission.groups.push(group);
        }

        let sessions = mission
            .groups
            .iter()
            .cloned()
            .map(GroupSession::new)
            .collect();

        ActiveConfiguration {
            mission,
            sessions,
            presence: PresenceTable::new(),
        }
    }

    pub fn mission(&self) -> &MissionConfig {
        &self.mission
    }

    pub fn sessions(&self) -> &[GroupSession] {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut [GroupSession] {
        &mut self.sessions
    }

    pub fn session(&self, id: &str) -> Option<&GroupSession> {
        self.sessions.iter().find(|s| s.id() == id)
    }

    pub fn session_mut(&mut self, id: &str) -> Option<&mut GroupSession> {
        self.sessions.iter_mut().find(|s| s.id() == id)
    }

    pub fn presence(&self) -> &PresenceTable {
        &self.presence
    }

    /// Ids of all presence-kind groups, the fan-out set for presence blobs.
    pub fn presence_group_ids(&self) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|s| s.config.kind == GroupKind::Presence)
            .map(|s| s.id().to_string())
            .collect()
    }

    /// Inserts a runtime-discovered group. A collision with a statically
    /// configured group is an error; a collision with an existing dynamic
    /// group is a rediscovery and returns `Ok(false)`.
    pub fn add_dynamic_group(&mut self, config: GroupConfig) -> Result<bool, ConfigError> {
        if let Some(existing) = self.mission.group(&config.id) {
            if existing.origin.is_dynamic() {
                return Ok(false);
            }
            return Err(ConfigError::AlreadyExists(config.id));
        }

        let mut config = config;
        config.origin = GroupOrigin::Dynamic;
        info!("[add_dynamic_group] adding {}", config.id);
        self.mission.groups.push(config.clone());
        self.sessions.push(GroupSession::new(config));
        Ok(true)
    }

    /// Removes a runtime-discovered group and its session. Statically
    /// configured groups cannot be removed this way.
    pub fn remove_dynamic_group(&mut self, id: &str) -> Result<GroupConfig, ConfigError> {
        let at = self
            .mission
            .groups
            .iter()
            .position(|g| g.id == id)
            .ok_or_else(|| ConfigError::NotFound(id.to_string()))?;
        if !self.mission.groups[at].origin.is_dynamic() {
            return Err(ConfigError::AlreadyExists(id.to_string()));
        }

        info!("[remove_dynamic_group] removing {id}");
        self.sessions.retain(|s| s.id() != id);
        Ok(self.mission.groups.remove(at))
    }

    /// Groups eligible for transmit/receive under the given view mode:
    /// single view yields at most the one session flagged for it, multi view
    /// yields every session flagged for multi view.
    pub fn selected_groups(&self, mode: ViewMode) -> Vec<&GroupSession> {
        match mode {
            ViewMode::Single => self
                .sessions
                .iter()
                .find(|s| s.selected_for_single_view)
                .into_iter()
                .collect(),
            ViewMode::Multi => self
                .sessions
                .iter()
                .filter(|s| s.selected_for_multi_view)
                .collect(),
        }
    }

    pub fn process_node_discovered(&self, json: &str) -> Result<PresenceDescriptor, ConfigError> {
        self.presence.merge_discovered(json)
    }

    pub fn process_node_undiscovered(
        &self,
        json: &str,
    ) -> Result<Option<PresenceDescriptor>, ConfigError> {
        self.presence.remove_undiscovered(json)
    }

    /// The shareable/persistable form of the active mission: statically
    /// configured groups only.
    pub fn make_template(&self) -> MissionConfig {
        self.mission.static_template()
    }
}
