//! The external communications engine contract.
//!
//! The engine owns audio, RTP, crypto, and relay internals. This core only
//! issues requests and consumes the asynchronous [`EngineEvent`]s the engine
//! delivers in response. Requests return immediately; outcomes always arrive
//! as events, mirroring the request/event pairing of the native engine API.

use std::sync::Mutex;

use crate::session::Talker;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine rejected the request: {0}")]
    Rejected(String),
    #[error("Crypto operation failed")]
    Crypto,
}

/// Synchronous request surface of the engine collaborator.
pub trait Engine: Send + Sync {
    fn create_group(&self, config_json: &str) -> Result<(), EngineError>;
    fn join_group(&self, id: &str) -> Result<(), EngineError>;
    fn leave_group(&self, id: &str) -> Result<(), EngineError>;
    fn begin_tx(&self, id: &str, priority: i32, flags: u32) -> Result<(), EngineError>;
    fn end_tx(&self, id: &str) -> Result<(), EngineError>;
    fn update_presence(
        &self,
        group_id: &str,
        descriptor_json: &str,
        force: bool,
    ) -> Result<(), EngineError>;
    fn send_blob(
        &self,
        group_id: &str,
        blob: &[u8],
        meta_json: &str,
    ) -> Result<(), EngineError>;
    /// Symmetric encryption delegated to the engine; assumed fast, only
    /// ever called with token-sized payloads.
    fn encrypt(&self, data: &[u8], password: &str) -> Result<Vec<u8>, EngineError>;
    fn decrypt(&self, data: &[u8], password: &str) -> Result<Vec<u8>, EngineError>;
    fn update_license(
        &self,
        entitlement: &str,
        key: &str,
        activation_code: &str,
    ) -> Result<(), EngineError>;
}

/// Asynchronous events delivered by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Started,
    Stopped,
    GroupCreated { id: String },
    GroupCreateFailed { id: String },
    GroupJoined { id: String },
    GroupJoinFailed { id: String },
    GroupLeft { id: String },
    GroupConnected { id: String },
    GroupDisconnected { id: String },
    GroupRxStarted { id: String },
    GroupRxEnded { id: String },
    GroupTalkersChanged { id: String, talkers: Vec<Talker> },
    GroupTxStarted { id: String },
    GroupTxEnded { id: String },
    GroupTxFailed { id: String },
    GroupTxUsurped { id: String },
    GroupMaxTxTimeExceeded { id: String },
    GroupRxMuted { id: String },
    GroupRxUnmuted { id: String },
    GroupTxMuted { id: String },
    GroupTxUnmuted { id: String },
    NodeDiscovered { group_id: String, json: String },
    NodeRediscovered { group_id: String, json: String },
    NodeUndiscovered { group_id: String, json: String },
    GroupAssetDiscovered { id: String, json: String },
    GroupAssetUndiscovered { id: String },
    LicenseChanged,
    LicenseExpiring { seconds_left: u64 },
    LicenseExpired,
}

/// A recorded engine request, for assertions in tests and the demo binary.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    CreateGroup(String),
    JoinGroup(String),
    LeaveGroup(String),
    BeginTx(String),
    EndTx(String),
    UpdatePresence(String),
    SendBlob(String),
    UpdateLicense { key: String, activation_code: String },
}

/// In-process engine stand-in: records every request and exposes a
/// reversible keyed transform as its crypto so codec round-trips work
/// without the native engine.
#[derive(Default)]
pub struct MockEngine {
    calls: Mutex<Vec<EngineCall>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }

    fn keystream_apply(data: &[u8], password: &str) -> Vec<u8> {
        let key = password.as_bytes();
        data.iter()
            .enumerate()
            .map(|(i, &byte)| {
                byte ^ key[i % key.len()] ^ (i as u8).wrapping_mul(31)
            })
            .collect()
    }
}

impl Engine for MockEngine {
    fn create_group(&self, config_json: &str) -> Result<(), EngineError> {
        let id = serde_json::from_str::<serde_json::Value>(config_json)
            .ok()
            .and_then(|v| v.get("id").and_then(|id| id.as_str().map(String::from)))
            .unwrap_or_default();
        self.record(EngineCall::CreateGroup(id));
        Ok(())
    }

    fn join_group(&self, id: &str) -> Result<(), EngineError> {
        self.record(EngineCall::JoinGroup(id.to_string()));
        Ok(())
    }

    fn leave_group(&self, id: &str) -> Result<(), EngineError> {
        self.record(EngineCall::LeaveGroup(id.to_string()));
        Ok(())
    }

    fn begin_tx(&self, id: &str, _priority: i32, _flags: u32) -> Result<(), EngineError> {
        self.record(EngineCall::BeginTx(id.to_string()));
        Ok(())
    }

    fn end_tx(&self, id: &str) -> Result<(), EngineError> {
        self.record(EngineCall::EndTx(id.to_string()));
        Ok(())
    }

    fn update_presence(
        &self,
        group_id: &str,
        _descriptor_json: &str,
        _force: bool,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::UpdatePresence(group_id.to_string()));
        Ok(())
    }

    fn send_blob(&self, group_id: &str, _blob: &[u8], _meta_json: &str) -> Result<(), EngineError> {
        self.record(EngineCall::SendBlob(group_id.to_string()));
        Ok(())
    }

    fn encrypt(&self, data: &[u8], password: &str) -> Result<Vec<u8>, EngineError> {
        if password.is_empty() {
            return Err(EngineError::Crypto);
        }
        Ok(Self::keystream_apply(data, password))
    }

    fn decrypt(&self, data: &[u8], password: &str) -> Result<Vec<u8>, EngineError> {
        if password.is_empty() {
            return Err(EngineError::Crypto);
        }
        Ok(Self::keystream_apply(data, password))
    }

    fn update_license(
        &self,
        _entitlement: &str,
        key: &str,
        activation_code: &str,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::UpdateLicense {
            key: key.to_string(),
            activation_code: activation_code.to_string(),
        });
        Ok(())
    }
}
