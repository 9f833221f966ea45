//! Persisted mission collection.
//!
//! Missions live in one keyed collection serialized as a single JSON blob
//! under a single storage key. The storage mechanics stay behind the
//! [`Storage`] trait: the embedder may back it with preferences, a file, or
//! anything else that can hold a string per key.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::engine::Engine;
use crate::error::StoreError;
use crate::mission::MissionConfig;

/// Default storage key for the mission collection.
pub const MISSION_STORE_KEY: &str = "mission-store";

/// Simple keyed load/save contract. Both calls are synchronous and local.
pub trait Storage {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn save(&self, key: &str, blob: &str) -> Result<(), StoreError>;
}

/// In-memory [`Storage`] used by tests and the demo binary.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), blob.to_string());
        Ok(())
    }
}

/// The keyed mission collection.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MissionStore {
    missions: Vec<MissionConfig>,
}

impl MissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the collection from storage; a missing blob yields an empty
    /// store rather than an error.
    pub fn load(storage: &dyn Storage, key: &str) -> Result<Self, StoreError> {
        match storage.load(key)? {
            Some(blob) => Ok(serde_json::from_str(&blob)?),
            None => Ok(MissionStore::new()),
        }
    }

    pub fn save(&self, storage: &dyn Storage, key: &str) -> Result<(), StoreError> {
        storage.save(key, &serde_json::to_string(self)?)
    }

    pub fn len(&self) -> usize {
        self.missions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&MissionConfig> {
        self.missions.iter().find(|m| m.id == id)
    }

    pub fn missions(&self) -> &[MissionConfig] {
        &self.missions
    }

    /// Inserts the mission, replacing any existing mission with the same id.
    pub fn add_or_update(&mut self, mission: MissionConfig) {
        match self.missions.iter_mut().find(|m| m.id == mission.id) {
            Some(existing) => *existing = mission,
            None => self.missions.push(mission),
        }
    }

    pub fn delete(&mut self, id: &str) -> Result<MissionConfig, StoreError> {
        match self.missions.iter().position(|m| m.id == id) {
            Some(at) => Ok(self.missions.remove(at)),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    /// Decodes a shareable token and installs the mission. Unless
    /// `allow_overwrite` is set, only a mission already present may be
    /// replaced.
    pub fn install_token(
        &mut self,
        token: &str,
        password: Option<&str>,
        engine: &dyn Engine,
        allow_overwrite: bool,
    ) -> Result<MissionConfig, StoreError> {
        let mission = codec::decode(token, password, engine)?;
        if !allow_overwrite && self.get(&mission.id).is_none() {
            return Err(StoreError::NotFound(mission.id));
        }
        self.add_or_update(mission.clone());
        Ok(mission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockEngine;
    use crate::mission::{GroupConfig, GroupKind};

    fn mission(id: &str) -> MissionConfig {
        let mut m = MissionConfig::new(id, format!("Mission {id}"));
        m.groups
            .push(GroupConfig::new("g1", "Alpha", GroupKind::Audio));
        m
    }

    #[test]
    fn add_update_delete() {
        let mut store = MissionStore::new();
        store.add_or_update(mission("m1"));
        store.add_or_update(mission("m2"));
        assert_eq!(store.len(), 2);

        let mut updated = mission("m1");
        updated.name = "Renamed".to_string();
        store.add_or_update(updated);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("m1").expect("missing m1").name, "Renamed");

        store.delete("m1").expect("delete failed");
        assert!(store.get("m1").is_none());
        assert!(matches!(store.delete("m1"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn round_trips_through_storage() {
        let storage = MemoryStorage::new();
        let mut store = MissionStore::new();
        store.add_or_update(mission("m1"));
        store.save(&storage, MISSION_STORE_KEY).expect("save failed");

        let reloaded = MissionStore::load(&storage, MISSION_STORE_KEY).expect("load failed");
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get("m1").expect("missing m1").name, "Mission m1");
    }

    #[test]
    fn load_of_missing_key_yields_empty_store() {
        let storage = MemoryStorage::new();
        let store = MissionStore::load(&storage, "nothing-here").expect("load failed");
        assert!(store.is_empty());
    }

    #[test]
    fn install_token_respects_overwrite_guard() {
        let engine = MockEngine::new();
        let mut store = MissionStore::new();
        let token = codec::encode(&mission("m9"), None, &engine).expect("encode failed");

        // Unknown mission, overwrite not allowed
        assert!(store
            .install_token(&token, None, &engine, false)
            .is_err());

        let installed = store
            .install_token(&token, None, &engine, true)
            .expect("install failed");
        assert_eq!(installed.id, "m9");

        // Present now, so re-install without overwrite succeeds
        store
            .install_token(&token, None, &engine, false)
            .expect("reinstall failed");
        assert_eq!(store.len(), 1);
    }
}
