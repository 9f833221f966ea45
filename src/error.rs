//! Error taxonomies for the session core.
//!
//! Each concern keeps its own enum so callers can match on the exact
//! failure instead of a collapsed "something went wrong". Codec and store
//! errors always surface to the caller; transmit arbitration failures are
//! additionally mirrored to the tx listeners as an audible-error cue.

/// Errors produced while encoding or decoding a shareable mission token.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Token header is missing or malformed")]
    Format,
    #[error("Token version mismatch: expected {expected}, found {found}")]
    Version { expected: String, found: String },
    #[error("Dense decoding failed: {0}")]
    Decode(String),
    #[error("Decryption failed")]
    Decrypt,
    #[error("Decompression failed: {0}")]
    Decompress(#[from] std::io::Error),
    #[error("Mission document processing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from mutating the active configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Group already exists and is statically configured: {0}")]
    AlreadyExists(String),
    #[error("Group not found: {0}")]
    NotFound(String),
    #[error("Malformed presence descriptor: {0}")]
    MalformedDescriptor(#[from] serde_json::Error),
}

/// Errors from the persisted mission store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Mission not found: {0}")]
    NotFound(String),
    #[error("Storage backend error: {0}")]
    Storage(String),
    #[error("Mission blob processing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Errors from transmit arbitration.
#[derive(Debug, thiserror::Error)]
pub enum TxError {
    #[error("A transmission is already pending or active")]
    ConcurrentTx,
    #[error("No transmit-eligible group is selected")]
    NoTarget,
}
