//! Snapshot layer: periodic snapshots of a recorded session.
//!
//! Snapshots contain canonical JSON + hash for verification, plus the full
//! engine state so a reader can inspect a run without replaying it.
//! No wall-clock timestamps in snapshot content.
//!
//! If a snapshot hash doesn't match replay, the recording is not trustworthy.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use courtroom_engine::hashing::{canonical_hash, canonical_serialize};
use courtroom_engine::{EngineState, ENGINE_VERSION};

use crate::error::{Result, RuntimeError};
use crate::snapshot_codec::{encode_snapshot, restore_snapshot};

/// Snapshot on-disk format.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Sequence number of the last action applied before the snapshot.
    pub sequence: u64,
    /// Engine time of that action.
    pub at: u64,
    /// Canonical JSON of the state (UTF-8).
    pub canonical_json: String,
    /// SHA-256 of the canonical JSON.
    pub hash: String,
    /// Full state as encoded by the snapshot codec.
    pub state_json: String,
    /// Engine version at snapshot time.
    pub engine_version: u32,
}

impl Snapshot {
    /// Decode and validate the embedded state.
    pub fn restore_state(&self) -> Result<EngineState> {
        Ok(restore_snapshot(&self.state_json)?)
    }
}

fn snapshot_path(dir: &Path, sequence: u64) -> PathBuf {
    dir.join(format!("snapshot_{:06}.json", sequence))
}

/// Save a deterministic snapshot of the current state.
pub fn save_snapshot(dir: &Path, sequence: u64, at: u64, state: &EngineState) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let canonical_bytes = canonical_serialize(state)?;
    let canonical_json = String::from_utf8(canonical_bytes)
        .map_err(|e| RuntimeError::CorruptLog(format!("canonical JSON is not UTF-8: {}", e)))?;
    let hash = canonical_hash(state)?;

    let snap = Snapshot {
        sequence,
        at,
        canonical_json,
        hash,
        state_json: encode_snapshot(state)?,
        engine_version: ENGINE_VERSION,
    };

    let path = snapshot_path(dir, sequence);
    let content = serde_json::to_string(&snap)?;

    let mut file = File::create(&path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;

    Ok(path)
}

/// Load a snapshot at a specific sequence number.
/// Returns None if no snapshot exists at that sequence.
pub fn load_snapshot(dir: &Path, sequence: u64) -> Result<Option<Snapshot>> {
    let path = snapshot_path(dir, sequence);
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)?;
    let snap: Snapshot = serde_json::from_str(&content)?;
    Ok(Some(snap))
}

/// Load the latest snapshot in a directory.
/// Scans for snapshot_NNNNNN.json files and returns the highest sequence.
pub fn load_latest_snapshot(dir: &Path) -> Result<Option<Snapshot>> {
    if !dir.exists() {
        return Ok(None);
    }

    let mut best_seq: Option<u64> = None;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if let Some(seq) = name_str
            .strip_prefix("snapshot_")
            .and_then(|s| s.strip_suffix(".json"))
            .and_then(|s| s.parse::<u64>().ok())
        {
            if best_seq.map_or(true, |best| seq > best) {
                best_seq = Some(seq);
            }
        }
    }

    match best_seq {
        Some(seq) => load_snapshot(dir, seq),
        None => Ok(None),
    }
}

/// Verify a snapshot's internal hash consistency.
/// Returns true if the hash matches the canonical JSON content.
pub fn verify_snapshot_hash(snap: &Snapshot) -> bool {
    let digest = Sha256::digest(snap.canonical_json.as_bytes());
    let computed: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    computed == snap.hash
}
