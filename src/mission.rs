//! Mission configuration data model.
//!
//! A mission is a named bundle of group configurations plus optional
//! relay/rendezvous info, shared between participants as a compact token
//! (see [`crate::codec`]) and persisted in the [`crate::store`].

use serde::{Deserialize, Serialize};

/// Name prefix for the presence group synthesized per mission.
pub const PRESENCE_GROUP_PREFIX: &str = "$MISSIONCONTROL$.";

/// The logical channel type a group carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    Audio,
    Presence,
    Raw,
}

/// Where a group configuration came from.
///
/// Statically configured groups are part of the mission definition and are
/// protected from being overwritten by runtime discovery; dynamic groups
/// appear and disappear with discovered assets and never serialize into a
/// shareable token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GroupOrigin {
    #[default]
    Static,
    Dynamic,
}

impl GroupOrigin {
    pub fn is_dynamic(self) -> bool {
        matches!(self, GroupOrigin::Dynamic)
    }
}

/// Configuration of a single group within a mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupConfig {
    pub id: String,
    pub name: String,
    pub kind: GroupKind,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub full_duplex: bool,
    /// Opaque engine-specific configuration, handed to the engine verbatim.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Never serialized: tokens and stored missions carry static groups only.
    #[serde(skip)]
    pub origin: GroupOrigin,
}

impl GroupConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: GroupKind) -> Self {
        GroupConfig {
            id: id.into(),
            name: name.into(),
            kind,
            encrypted: false,
            full_duplex: false,
            payload: serde_json::Value::Null,
            origin: GroupOrigin::Static,
        }
    }
}

/// Relay/rendezvous host used when direct multicast is unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayHost {
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub in_use: bool,
}

impl RelayHost {
    pub fn is_usable(&self) -> bool {
        !self.address.is_empty() && self.port > 0
    }
}

/// A complete mission definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mod_pin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay: Option<RelayHost>,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

impl MissionConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        MissionConfig {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            mod_pin: String::new(),
            relay: None,
            groups: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn group(&self, id: &str) -> Option<&GroupConfig> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn has_presence_group(&self) -> bool {
        self.groups.iter().any(|g| g.kind == GroupKind::Presence)
    }

    /// The shareable form of this mission: identity, relay, and statically
    /// configured groups. Dynamic groups are a runtime artifact and are
    /// dropped here.
    pub fn static_template(&self) -> MissionConfig {
        MissionConfig {
            groups: self
                .groups
                .iter()
                .filter(|g| !g.origin.is_dynamic())
                .cloned()
                .collect(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_template_drops_dynamic_groups() {
        let mut mission = MissionConfig::new("m1", "Test Mission");
        mission
            .groups
            .push(GroupConfig::new("g1", "Alpha", GroupKind::Audio));
        let mut dynamic = GroupConfig::new("g2", "Discovered", GroupKind::Audio);
        dynamic.origin = GroupOrigin::Dynamic;
        mission.groups.push(dynamic);

        let template = mission.static_template();
        assert_eq!(template.groups.len(), 1);
        assert_eq!(template.groups[0].id, "g1");
    }

    #[test]
    fn origin_survives_serde_as_static() {
        let mut group = GroupConfig::new("g1", "Alpha", GroupKind::Audio);
        group.origin = GroupOrigin::Dynamic;
        let json = serde_json::to_string(&group).expect("serialize failed");
        let back: GroupConfig = serde_json::from_str(&json).expect("deserialize failed");
        assert_eq!(back.origin, GroupOrigin::Static);
    }
}
