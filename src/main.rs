//! Scripted end-to-end run of the session core against the mock engine:
//! share a mission as a token, bring the mission up, talk on a group,
//! watch presence, and exercise the license retry path.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::info;

use talkgroup::codec;
use talkgroup::engine::{EngineEvent, MockEngine};
use talkgroup::license::LicenseActivator;
use talkgroup::manager::SessionManager;
use talkgroup::manager_actor::{
    BeginTxRequest, EndTxRequest, EngineEventMessage, SendPresenceBlob, SessionSnapshot,
    SetSingleViewSelection, Shutdown, StartSession, UpdateSelfPresence,
};
use talkgroup::mission::{GroupConfig, GroupKind, MissionConfig, RelayHost};
use talkgroup::session::Talker;
use talkgroup::settings::SessionSettings;
use talkgroup::store::{MemoryStorage, MissionStore, MISSION_STORE_KEY};

struct DemoActivator;

impl LicenseActivator for DemoActivator {
    fn obtain_activation_code(&self, _entitlement: &str, _key: &str) -> Result<String> {
        Ok("DEMO-ACTIVATION".to_string())
    }
}

fn build_mission() -> MissionConfig {
    let mut mission = MissionConfig::new(uuid::Uuid::new_v4().to_string(), "Harbor Patrol");
    mission.description = "Night shift on the east docks".to_string();
    mission.relay = Some(RelayHost {
        address: "relay.example.net".to_string(),
        port: 7443,
        in_use: true,
    });

    let mut red = GroupConfig::new("g-red", "Red", GroupKind::Audio);
    red.encrypted = true;
    red.payload = serde_json::json!({"rx": {"address": "234.5.6.7", "port": 29000}});
    mission.groups.push(red);
    mission
        .groups
        .push(GroupConfig::new("g-pres", "Presence", GroupKind::Presence));
    mission
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let engine = Arc::new(MockEngine::new());
    let mission = build_mission();

    //// Share the mission as a password-protected token and take it back
    println!("Encoding mission {} as a token", mission.name);
    let token = codec::encode(&mission, Some("hunter2"), engine.as_ref())?;
    println!("Token is {} chars", token.len());
    let decoded = codec::decode(&token, Some("hunter2"), engine.as_ref())?;
    assert_eq!(decoded, mission);

    //// Persist it the way a device would
    let storage = MemoryStorage::new();
    let mut store = MissionStore::new();
    store.add_or_update(decoded.clone());
    store.save(&storage, MISSION_STORE_KEY)?;
    println!("Mission stored under key {MISSION_STORE_KEY}");

    //// Bring the mission up
    let manager = kameo::spawn(SessionManager::new(
        engine.clone(),
        Arc::new(DemoActivator),
        &mission,
        SessionSettings::default(),
    ));
    manager
        .ask(StartSession)
        .await
        .map_err(|e| anyhow!("start session: {e}"))?;

    // The mock engine never answers on its own; feed the confirmations
    for id in ["g-red", "g-pres"] {
        for event in [
            EngineEvent::GroupCreated { id: id.to_string() },
            EngineEvent::GroupJoined { id: id.to_string() },
            EngineEvent::GroupConnected { id: id.to_string() },
        ] {
            manager
                .ask(EngineEventMessage(event))
                .await
                .map_err(|e| anyhow!("engine event: {e}"))?;
        }
    }

    //// Talk on Red
    manager
        .ask(SetSingleViewSelection("g-red".to_string()))
        .await
        .map_err(|e| anyhow!("select group: {e}"))?;
    let started = manager
        .ask(BeginTxRequest {
            priority: 0,
            flags: 0,
        })
        .await
        .map_err(|e| anyhow!("begin tx: {e}"))?;
    println!("Transmit pending on {started:?}");

    manager
        .ask(EngineEventMessage(EngineEvent::GroupTxStarted {
            id: "g-red".to_string(),
        }))
        .await
        .map_err(|e| anyhow!("engine event: {e}"))?;
    let red = manager
        .ask(SessionSnapshot("g-red".to_string()))
        .await
        .map_err(|e| anyhow!("snapshot: {e}"))?
        .ok_or_else(|| anyhow!("g-red session missing"))?;
    assert!(red.tx && !red.tx_pending);
    println!("Transmitting on Red");

    manager
        .ask(EndTxRequest)
        .await
        .map_err(|e| anyhow!("end tx: {e}"))?;
    manager
        .ask(EngineEventMessage(EngineEvent::GroupTxEnded {
            id: "g-red".to_string(),
        }))
        .await
        .map_err(|e| anyhow!("engine event: {e}"))?;
    println!("Transmission over");

    //// Announce ourselves, then someone shows up on the presence group
    manager
        .ask(UpdateSelfPresence {
            descriptor_json: serde_json::json!({
                "nodeId": "n-self",
                "displayName": "Patrol 1",
                "self": true,
            })
            .to_string(),
            force: true,
        })
        .await
        .map_err(|e| anyhow!("self presence: {e}"))?;

    let descriptor = serde_json::json!({
        "nodeId": "n-42",
        "displayName": "Dockmaster",
        "location": {"latitude": 51.95, "longitude": 4.14},
    })
    .to_string();
    manager
        .ask(EngineEventMessage(EngineEvent::NodeDiscovered {
            group_id: "g-pres".to_string(),
            json: descriptor,
        }))
        .await
        .map_err(|e| anyhow!("engine event: {e}"))?;
    manager
        .ask(EngineEventMessage(EngineEvent::GroupTalkersChanged {
            id: "g-red".to_string(),
            talkers: vec![Talker {
                alias: "Dockmaster".to_string(),
                node_id: "n-42".to_string(),
            }],
        }))
        .await
        .map_err(|e| anyhow!("engine event: {e}"))?;

    //// Report our own biometrics to every presence group
    manager
        .ask(SendPresenceBlob {
            blob: vec![0x01, 0x48, 0x52, 0x42],
            meta_json: serde_json::json!({"type": "biometrics"}).to_string(),
        })
        .await
        .map_err(|e| anyhow!("send blob: {e}"))?;

    //// License starts expiring; a retry timer gets armed
    manager
        .ask(EngineEventMessage(EngineEvent::LicenseExpiring {
            seconds_left: 600,
        }))
        .await
        .map_err(|e| anyhow!("engine event: {e}"))?;
    info!("license retry armed, not waiting for it here");

    manager
        .ask(Shutdown)
        .await
        .map_err(|e| anyhow!("shutdown: {e}"))?;
    println!("Session closed, {} engine calls recorded", engine.calls().len());
    Ok(())
}
