//! Participant presence descriptors and the merged presence table.
//!
//! Participants announce themselves on presence groups as JSON descriptors.
//! The table keys them by participant id: first discovery inserts, every
//! rediscovery overwrites fields in place, explicit undiscovery removes.
//! A malformed payload never touches the table.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

/// Self-reported biometric snapshot; every element is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Biometrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skin_temp: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_temp: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hydration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_oxygenation: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatigue_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_effectiveness: Option<u32>,
}

/// Alias a participant uses on a specific group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupAlias {
    pub group_id: String,
    pub alias: String,
}

/// One discovered participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceDescriptor {
    pub node_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, rename = "self")]
    pub is_self: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biometrics: Option<Biometrics>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_aliases: Vec<GroupAlias>,
    #[serde(skip)]
    pub last_update: Option<DateTime<Utc>>,
}

impl PresenceDescriptor {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let descriptor: PresenceDescriptor = serde_json::from_str(json)?;
        if descriptor.node_id.is_empty() {
            return Err(ConfigError::MalformedDescriptor(
                serde_json::Error::custom("participant id is empty"),
            ));
        }
        Ok(descriptor)
    }

    /// Field-level overwrite from a rediscovered descriptor. Identity and
    /// name fields always follow the newer announcement; optional snapshots
    /// only overwrite when the newer announcement carries them.
    pub fn update_from(&mut self, other: PresenceDescriptor) {
        self.user_id = other.user_id;
        self.display_name = other.display_name;
        self.is_self = other.is_self;
        if other.location.is_some() {
            self.location = other.location;
        }
        if other.biometrics.is_some() {
            self.biometrics = other.biometrics;
        }
        if !other.group_aliases.is_empty() {
            self.group_aliases = other.group_aliases;
        }
        self.last_update = Some(Utc::now());
    }
}

/// Merged view of all discovered participants, keyed by participant id.
///
/// Mutex-guarded because UI refresh reads it off the serialized event queue.
#[derive(Default)]
pub struct PresenceTable {
    nodes: Mutex<HashMap<String, PresenceDescriptor>>,
}

impl PresenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge a discovered participant; returns the merged entry.
    pub fn merge_discovered(&self, json: &str) -> Result<PresenceDescriptor, ConfigError> {
        let mut incoming = PresenceDescriptor::from_json(json)?;
        incoming.last_update = Some(Utc::now());

        let mut nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        let merged = match nodes.get_mut(&incoming.node_id) {
            Some(existing) => {
                existing.update_from(incoming);
                existing.clone()
            }
            None => {
                nodes.insert(incoming.node_id.clone(), incoming.clone());
                incoming
            }
        };
        Ok(merged)
    }

    /// Remove an undiscovered participant. Unknown ids are a no-op; the
    /// removed entry is returned when there was one.
    pub fn remove_undiscovered(
        &self,
        json: &str,
    ) -> Result<Option<PresenceDescriptor>, ConfigError> {
        let incoming = PresenceDescriptor::from_json(json)?;
        let mut nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        Ok(nodes.remove(&incoming.node_id))
    }

    pub fn get(&self, node_id: &str) -> Option<PresenceDescriptor> {
        let nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        nodes.get(node_id).cloned()
    }

    pub fn len(&self) -> usize {
        let nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<PresenceDescriptor> {
        let nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        nodes.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor_json(node_id: &str, display_name: &str) -> String {
        serde_json::json!({
            "nodeId": node_id,
            "userId": format!("{node_id}@example.net"),
            "displayName": display_name,
        })
        .to_string()
    }

    #[test]
    fn rediscovery_merges_in_place() {
        let table = PresenceTable::new();
        table
            .merge_discovered(&descriptor_json("n1", "Smith"))
            .expect("merge failed");
        table
            .merge_discovered(&descriptor_json("n1", "Smith (ops)"))
            .expect("merge failed");

        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get("n1").expect("missing n1").display_name,
            "Smith (ops)"
        );
    }

    #[test]
    fn rediscovery_keeps_absent_optional_fields() {
        let table = PresenceTable::new();
        let with_location = serde_json::json!({
            "nodeId": "n1",
            "displayName": "Smith",
            "location": {"latitude": 51.5, "longitude": -0.1},
        })
        .to_string();
        table.merge_discovered(&with_location).expect("merge failed");

        // Rediscovery without a location must not clear the stored one
        table
            .merge_discovered(&descriptor_json("n1", "Smith"))
            .expect("merge failed");
        assert!(table.get("n1").expect("missing n1").location.is_some());
    }

    #[test]
    fn undiscovery_removes_and_unknown_is_noop() {
        let table = PresenceTable::new();
        table
            .merge_discovered(&descriptor_json("n1", "Smith"))
            .expect("merge failed");

        let removed = table
            .remove_undiscovered(&descriptor_json("n1", "Smith"))
            .expect("remove failed");
        assert!(removed.is_some());
        assert!(table.is_empty());

        let removed = table
            .remove_undiscovered(&descriptor_json("n1", "Smith"))
            .expect("remove failed");
        assert!(removed.is_none());
    }

    #[test]
    fn malformed_payload_leaves_table_untouched() {
        let table = PresenceTable::new();
        table
            .merge_discovered(&descriptor_json("n1", "Smith"))
            .expect("merge failed");

        assert!(table.merge_discovered("{ not json").is_err());
        assert!(table.merge_discovered("{\"nodeId\": \"\"}").is_err());
        assert!(table.remove_undiscovered("{ not json").is_err());
        assert_eq!(table.len(), 1);
    }
}
