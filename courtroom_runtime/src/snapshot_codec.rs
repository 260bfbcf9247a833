//! Snapshot Codec: full EngineState encoder/decoder.
//!
//! Pure codec layer. No side-effects, no timestamps, no envelope.
//!
//! - `encode_snapshot`:  EngineState → JSON string
//! - `decode_snapshot`:  JSON string → EngineState (strict on runtime fields)
//! - `restore_snapshot`: decode + invariant validation
//! - `export_snapshot_to_file` / `import_snapshot_from_file`: file I/O
//! - `snapshot_hash`:    SHA-256 of the encoded JSON (lowercase hex)

use std::fs;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};
use thiserror::Error;

use courtroom_engine::invariants::try_validate_invariants;
use courtroom_engine::EngineState;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// All possible snapshot codec failures.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// JSON serialization failed.
    #[error("SerializationError: {0}")]
    SerializationError(String),
    /// JSON deserialization failed (malformed, missing fields, unknown fields).
    #[error("DeserializationError: {0}")]
    DeserializationError(String),
    /// Loaded state violates engine invariants.
    #[error("InvariantViolation: {0}")]
    InvariantViolation(String),
    /// File I/O error.
    #[error("IoError: {0}")]
    IoError(String),
}

impl From<io::Error> for SnapshotError {
    fn from(err: io::Error) -> Self {
        SnapshotError::IoError(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Encode an EngineState to a JSON string.
///
/// Struct fields serialize in declaration order; delayed entries and
/// retired identities are BTree-ordered. Identical states encode identically.
pub fn encode_snapshot(state: &EngineState) -> Result<String, SnapshotError> {
    serde_json::to_string(state).map_err(|e| SnapshotError::SerializationError(e.to_string()))
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Decode a JSON string into an EngineState.
///
/// Runtime entities use `deny_unknown_fields`; missing required fields fail.
/// The embedded scenario keeps its lenient authoring defaults. No invariant
/// validation; use `restore_snapshot` for validated loading.
pub fn decode_snapshot(json: &str) -> Result<EngineState, SnapshotError> {
    serde_json::from_str::<EngineState>(json)
        .map_err(|e| SnapshotError::DeserializationError(e.to_string()))
}

// ---------------------------------------------------------------------------
// Restore (decode + validate)
// ---------------------------------------------------------------------------

/// Decode a JSON string and validate invariants immediately.
///
/// This is the safe entry point for loading state from untrusted sources.
pub fn restore_snapshot(json: &str) -> Result<EngineState, SnapshotError> {
    let state = decode_snapshot(json)?;
    try_validate_invariants(&state).map_err(SnapshotError::InvariantViolation)?;
    Ok(state)
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

/// Export an EngineState to a file as JSON. Creates parent directories.
pub fn export_snapshot_to_file(state: &EngineState, path: &Path) -> Result<(), SnapshotError> {
    let json = encode_snapshot(state)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, json.as_bytes())?;
    Ok(())
}

/// Import an EngineState from a JSON file, validating invariants.
pub fn import_snapshot_from_file(path: &Path) -> Result<EngineState, SnapshotError> {
    let content = fs::read_to_string(path)?;
    restore_snapshot(&content)
}

// ---------------------------------------------------------------------------
// Hash
// ---------------------------------------------------------------------------

/// SHA-256 of the JSON encoding. Lowercase hex string.
///
/// NOTE: This hashes the serde-derived JSON, NOT `canonical_hash` (which
/// prefixes the engine version and hashes pools by identity). It is for
/// file integrity only.
pub fn snapshot_hash(state: &EngineState) -> Result<String, SnapshotError> {
    let json = encode_snapshot(state)?;
    let digest = Sha256::digest(json.as_bytes());
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use courtroom_engine::domain::{Message, MessageCategory, Severity};
    use courtroom_engine::{Action, ActionEnvelope, CourtroomEngine, EngineConstants, Scenario};

    /// A mid-run state: one critical in the dock, one task left.
    fn make_test_state() -> EngineState {
        let scenario = Scenario {
            messages: vec![
                Message {
                    id: None,
                    category: MessageCategory::Task,
                    severity: None,
                    text: "File the report".to_string(),
                    answer: Some("filed".to_string()),
                    court_outcome: None,
                },
                Message {
                    id: Some("c1".to_string()),
                    category: MessageCategory::Critical,
                    severity: Some(Severity::Major),
                    text: "Lock the cabinet".to_string(),
                    answer: Some("locked".to_string()),
                    court_outcome: None,
                },
            ],
            ..Scenario::empty()
        };
        let mut engine = CourtroomEngine::new(&scenario, &EngineConstants::default(), 0);
        engine.apply(&ActionEnvelope::new(1, 0, Action::Start)).unwrap();
        engine.apply(&ActionEnvelope::new(2, 30_000, Action::Advance)).unwrap();
        engine.state().clone()
    }

    // ── Roundtrip encode → decode → encode ──────────────────────────

    #[test]
    fn roundtrip_produces_identical_json() {
        let state = make_test_state();
        let json1 = encode_snapshot(&state).unwrap();
        let decoded = decode_snapshot(&json1).unwrap();
        assert_eq!(decoded, state);
        let json2 = encode_snapshot(&decoded).unwrap();
        assert_eq!(json1, json2, "Roundtrip must produce identical JSON");
    }

    // ── Retired identity back in the dock → InvariantViolation ──────

    #[test]
    fn resurrected_identity_returns_invariant_violation() {
        let mut state = make_test_state();
        let id = state.dock[0].id.clone();
        state.retired.insert(id);
        let json = encode_snapshot(&state).unwrap();
        match restore_snapshot(&json) {
            Err(SnapshotError::InvariantViolation(msg)) => {
                assert!(msg.contains("retired"), "Expected retired violation, got: {}", msg);
            }
            other => panic!("Expected InvariantViolation, got: {:?}", other),
        }
    }

    // ── File roundtrip ──────────────────────────────────────────────

    #[test]
    fn file_roundtrip_matches() {
        let state = make_test_state();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        export_snapshot_to_file(&state, &path).unwrap();
        let imported = import_snapshot_from_file(&path).unwrap();
        assert_eq!(imported, state);

        let file_bytes = std::fs::read(&path).unwrap();
        let file_hash: String = Sha256::digest(&file_bytes)
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        assert_eq!(snapshot_hash(&state).unwrap(), file_hash);
    }

    // ── Corrupted file → DeserializationError ───────────────────────

    #[test]
    fn corrupted_file_returns_deserialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, b"{ not valid json !!!}").unwrap();

        match import_snapshot_from_file(&path) {
            Err(SnapshotError::DeserializationError(_)) => {}
            other => panic!("Expected DeserializationError, got: {:?}", other),
        }
    }

    // ── Unknown runtime field → DeserializationError ────────────────

    #[test]
    fn unknown_runtime_field_is_rejected() {
        let state = make_test_state();
        let mut v: serde_json::Value =
            serde_json::from_str(&encode_snapshot(&state).unwrap()).unwrap();
        v["countdown"]["paused"] = serde_json::Value::Bool(true);
        match decode_snapshot(&v.to_string()) {
            Err(SnapshotError::DeserializationError(msg)) => assert!(msg.contains("paused")),
            other => panic!("Expected DeserializationError, got: {:?}", other),
        }
    }

    #[test]
    fn hash_is_deterministic() {
        let state = make_test_state();
        let h1 = snapshot_hash(&state).unwrap();
        let h2 = snapshot_hash(&state).unwrap();
        assert_eq!(h1, h2, "Same state must produce same hash");
        assert_eq!(h1.len(), 64, "SHA-256 hex string must be 64 chars");
    }
}
