//! Shareable mission token codec.
//!
//! A mission configuration travels between devices as a compact printable
//! token (QR code, URL fragment). The pipeline is, in encode order:
//!
//! ```text
//! mission document (JSON, static groups only)
//!   -> 8-char magic header + 3-digit version prepended
//!   -> deflate
//!   -> optional engine-delegated symmetric encryption
//!   -> basE91
//! ```
//!
//! Decoding reverses the pipeline exactly and may first strip a deflection
//! URL prefix terminated by `/??`, so a token can double as a clickable
//! link. Every stage fails with its own [`CodecError`] kind so a tampered
//! or mismatched token can never decode into a silently-wrong mission.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::base91;
use crate::engine::Engine;
use crate::error::CodecError;
use crate::mission::MissionConfig;

/// Magic prefix of every decompressed token document.
pub const TOKEN_HEADER: &str = "&*3$e1@E";
/// Token format version, always exactly three digits.
pub const TOKEN_VERSION: &str = "001";
/// Separator ending an optional deflection-URL prefix.
pub const DEFLECTION_URL_SEP: &str = "/??";

/// Encode a mission into a shareable token. Dynamic groups are dropped;
/// a non-empty `password` encrypts the token via the engine.
pub fn encode(
    mission: &MissionConfig,
    password: Option<&str>,
    engine: &dyn Engine,
) -> Result<String, CodecError> {
    let document = serde_json::to_string(&mission.static_template())?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(TOKEN_HEADER.as_bytes())?;
    encoder.write_all(TOKEN_VERSION.as_bytes())?;
    encoder.write_all(document.as_bytes())?;
    let mut bytes = encoder.finish()?;

    if let Some(password) = password.filter(|p| !p.is_empty()) {
        bytes = engine
            .encrypt(&bytes, password)
            .map_err(|_| CodecError::Decrypt)?;
    }

    Ok(base91::encode(&bytes))
}

/// Decode a token back into a mission configuration.
pub fn decode(
    token: &str,
    password: Option<&str>,
    engine: &dyn Engine,
) -> Result<MissionConfig, CodecError> {
    let token = strip_deflection_url(token);

    let mut bytes = base91::decode(token).map_err(|e| CodecError::Decode(e.to_string()))?;

    if let Some(password) = password.filter(|p| !p.is_empty()) {
        bytes = engine
            .decrypt(&bytes, password)
            .map_err(|_| CodecError::Decrypt)?;
    }

    let mut document = String::new();
    ZlibDecoder::new(bytes.as_slice()).read_to_string(&mut document)?;

    let payload = document
        .strip_prefix(TOKEN_HEADER)
        .ok_or(CodecError::Format)?;
    if payload.len() < TOKEN_VERSION.len() {
        return Err(CodecError::Format);
    }
    let (version, body) = payload.split_at(TOKEN_VERSION.len());
    if version != TOKEN_VERSION {
        return Err(CodecError::Version {
            expected: TOKEN_VERSION.to_string(),
            found: version.to_string(),
        });
    }

    Ok(serde_json::from_str(body)?)
}

fn strip_deflection_url(token: &str) -> &str {
    match token.find(DEFLECTION_URL_SEP) {
        Some(at) if at > 0 => &token[at + DEFLECTION_URL_SEP.len()..],
        _ => token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockEngine;
    use crate::mission::{GroupConfig, GroupKind, RelayHost};

    fn sample_mission() -> MissionConfig {
        let mut mission = MissionConfig::new("m-100", "Harbor Patrol");
        mission.description = "Night shift".to_string();
        mission.mod_pin = "4271".to_string();
        mission.relay = Some(RelayHost {
            address: "relay.example.net".to_string(),
            port: 7443,
            in_use: true,
        });
        let mut audio = GroupConfig::new("g-red", "Red", GroupKind::Audio);
        audio.encrypted = true;
        audio.payload = serde_json::json!({"rx": {"address": "234.5.6.7", "port": 29000}});
        mission.groups.push(audio);
        mission
            .groups
            .push(GroupConfig::new("g-pres", "Presence", GroupKind::Presence));
        mission
    }

    #[test]
    fn round_trip_without_password() {
        let engine = MockEngine::new();
        let mission = sample_mission();
        let token = encode(&mission, None, &engine).expect("encode failed");
        let decoded = decode(&token, None, &engine).expect("decode failed");
        assert_eq!(decoded, mission);
    }

    #[test]
    fn round_trip_with_password() {
        let engine = MockEngine::new();
        let mission = sample_mission();
        let token = encode(&mission, Some("hunter2"), &engine).expect("encode failed");
        let decoded = decode(&token, Some("hunter2"), &engine).expect("decode failed");
        assert_eq!(decoded, mission);
    }

    #[test]
    fn wrong_password_is_a_typed_error() {
        let engine = MockEngine::new();
        let token = encode(&sample_mission(), Some("hunter2"), &engine).expect("encode failed");
        let err = decode(&token, Some("wrong"), &engine).expect_err("must not decode");
        // Garbage plaintext dies in inflate or header validation, never in
        // a silently-wrong mission.
        assert!(matches!(
            err,
            CodecError::Decompress(_) | CodecError::Format
        ));
    }

    #[test]
    fn deflection_url_prefix_is_stripped() {
        let engine = MockEngine::new();
        let mission = sample_mission();
        let token = encode(&mission, None, &engine).expect("encode failed");
        let url = format!("https://missions.example.net/m/??{token}");
        let decoded = decode(&url, None, &engine).expect("decode failed");
        assert_eq!(decoded, mission);
    }

    #[test]
    fn tampered_token_never_decodes() {
        let engine = MockEngine::new();
        let token = encode(&sample_mission(), None, &engine).expect("encode failed");

        // Swap a character in the middle for a different alphabet member
        let mid = token.len() / 2;
        let mut bytes = token.into_bytes();
        bytes[mid] = if bytes[mid] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).expect("still ascii");

        assert!(decode(&tampered, None, &engine).is_err());
    }

    #[test]
    fn future_version_is_rejected() {
        let engine = MockEngine::new();
        let document = serde_json::to_string(&sample_mission()).expect("serialize failed");

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder
            .write_all(format!("{TOKEN_HEADER}002{document}").as_bytes())
            .expect("compress failed");
        let token = base91::encode(&encoder.finish().expect("compress failed"));

        let err = decode(&token, None, &engine).expect_err("must reject version 002");
        assert!(matches!(
            err,
            CodecError::Version { ref expected, ref found }
                if expected == "001" && found == "002"
        ));
    }

    #[test]
    fn missing_header_is_a_format_error() {
        let engine = MockEngine::new();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder
            .write_all(b"not a mission token at all")
            .expect("compress failed");
        let token = base91::encode(&encoder.finish().expect("compress failed"));

        assert!(matches!(
            decode(&token, None, &engine),
            Err(CodecError::Format)
        ));
    }
}
