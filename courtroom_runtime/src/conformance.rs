//! Determinism and conformance checks.
//!
//! - Replaying a recording twice must give the same canonical hash, and
//!   must agree with every snapshot taken while it was recorded.
//! - A trace captured by the exported page's script must match the Rust
//!   engine frame by frame when its actions are replayed here.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use courtroom_engine::{
    Action, ActionEnvelope, CourtroomEngine, EngineConstants, EngineState, Scenario, TraceFrame,
};

use crate::error::{Result, RuntimeError};
use crate::recording::{Recording, SNAPSHOT_DIR};
use crate::replay;
use crate::snapshot::{self, verify_snapshot_hash};

// ---------------------------------------------------------------------------
// Recorded sessions
// ---------------------------------------------------------------------------

/// Replay the recording twice and require identical hashes. Returns the hash.
pub fn verify_determinism(recording: &Recording) -> Result<String> {
    let hash1 = replay::rebuild_hash(&recording.header, &recording.actions)?;
    let hash2 = replay::rebuild_hash(&recording.header, &recording.actions)?;

    if hash1 != hash2 {
        return Err(RuntimeError::Nondeterministic { first: hash1, second: hash2 });
    }
    Ok(hash1)
}

/// Check every snapshot of the recording against a replay up to its sequence.
/// Returns how many snapshots were checked.
pub fn verify_snapshots(recording: &Recording) -> Result<usize> {
    let dir = recording.dir.join(SNAPSHOT_DIR);
    let mut checked = 0;

    for sequence in snapshot_sequences(&dir)? {
        let Some(snap) = snapshot::load_snapshot(&dir, sequence)? else {
            continue;
        };
        if !verify_snapshot_hash(&snap) {
            return Err(RuntimeError::SnapshotMismatch {
                sequence,
                recorded: snap.hash,
                replayed: "hash does not match its own canonical JSON".to_string(),
            });
        }
        let replayed = replay::hash_at(&recording.header, &recording.actions, sequence)?;
        if replayed != snap.hash {
            return Err(RuntimeError::SnapshotMismatch {
                sequence,
                recorded: snap.hash,
                replayed,
            });
        }
        checked += 1;
    }

    Ok(checked)
}

fn snapshot_sequences(dir: &Path) -> Result<BTreeSet<u64>> {
    let mut seqs = BTreeSet::new();
    if !dir.exists() {
        return Ok(seqs);
    }
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name();
        if let Some(seq) = name
            .to_string_lossy()
            .strip_prefix("snapshot_")
            .and_then(|s| s.strip_suffix(".json"))
            .and_then(|s| s.parse::<u64>().ok())
        {
            seqs.insert(seq);
        }
    }
    Ok(seqs)
}

// ---------------------------------------------------------------------------
// State comparison
// ---------------------------------------------------------------------------

/// Structured comparison of two engine states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDiff {
    pub dock_len_a: usize,
    pub dock_len_b: usize,
    pub added_to_dock: Vec<String>,
    pub removed_from_dock: Vec<String>,
    pub escalated: Vec<String>,
    pub newly_retired: Vec<String>,
    pub delayed_added: Vec<String>,
    pub delayed_removed: Vec<String>,
    pub seconds_left_delta: i64,
    pub critical_failed_delta: i64,
    pub critical_completed_delta: i64,
    pub overlay_a: String,
    pub overlay_b: String,
}

impl StateDiff {
    pub fn is_empty(&self) -> bool {
        self.added_to_dock.is_empty()
            && self.removed_from_dock.is_empty()
            && self.escalated.is_empty()
            && self.newly_retired.is_empty()
            && self.delayed_added.is_empty()
            && self.delayed_removed.is_empty()
            && self.seconds_left_delta == 0
            && self.critical_failed_delta == 0
            && self.critical_completed_delta == 0
            && self.overlay_a == self.overlay_b
    }
}

/// Compare two states of the same run.
pub fn compare_states(a: &EngineState, b: &EngineState) -> StateDiff {
    let dock_a: BTreeSet<&str> = a.dock.iter().map(|d| d.id.as_str()).collect();
    let dock_b: BTreeSet<&str> = b.dock.iter().map(|d| d.id.as_str()).collect();
    let delayed_a: BTreeSet<&str> = a.delayed.keys().map(String::as_str).collect();
    let delayed_b: BTreeSet<&str> = b.delayed.keys().map(String::as_str).collect();

    let escalated = b
        .dock
        .iter()
        .filter(|d| {
            a.dock
                .iter()
                .any(|p| p.id == d.id && p.stage != d.stage)
        })
        .map(|d| d.id.clone())
        .collect();

    StateDiff {
        dock_len_a: a.dock.len(),
        dock_len_b: b.dock.len(),
        added_to_dock: dock_b.difference(&dock_a).map(|s| s.to_string()).collect(),
        removed_from_dock: dock_a.difference(&dock_b).map(|s| s.to_string()).collect(),
        escalated,
        newly_retired: b.retired.difference(&a.retired).cloned().collect(),
        delayed_added: delayed_b.difference(&delayed_a).map(|s| s.to_string()).collect(),
        delayed_removed: delayed_a.difference(&delayed_b).map(|s| s.to_string()).collect(),
        seconds_left_delta: i64::from(b.countdown.seconds_left) - i64::from(a.countdown.seconds_left),
        critical_failed_delta: i64::from(b.stats.critical_failed) - i64::from(a.stats.critical_failed),
        critical_completed_delta: i64::from(b.stats.critical_completed)
            - i64::from(a.stats.critical_completed),
        overlay_a: a.overlay.name().to_string(),
        overlay_b: b.overlay.name().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Script traces
// ---------------------------------------------------------------------------

/// Trace captured by the exported page (`window.__courtroomTrace`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptTrace {
    pub started_at: u64,
    /// Constants the page was exported with. Traces from older pages lack it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constants: Option<EngineConstants>,
    pub entries: Vec<ScriptTraceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptTraceEntry {
    pub seq: u64,
    pub at: u64,
    pub action: Action,
    pub frame: TraceFrame,
}

/// First point where the script and the engine disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct Divergence {
    pub seq: u64,
    pub action: String,
    pub field: String,
    pub script: Value,
    pub engine: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConformanceReport {
    pub frames_compared: usize,
    pub divergence: Option<Divergence>,
}

impl ConformanceReport {
    pub fn conforms(&self) -> bool {
        self.divergence.is_none()
    }
}

/// First field (in frame field order) on which two frames differ.
pub fn frame_divergence(script: &TraceFrame, engine: &TraceFrame) -> Result<Option<(String, Value, Value)>> {
    let s = serde_json::to_value(script)?;
    let e = serde_json::to_value(engine)?;
    let (Value::Object(s), Value::Object(e)) = (s, e) else {
        return Ok(None);
    };

    for (field, sv) in &s {
        let ev = e.get(field).cloned().unwrap_or(Value::Null);
        if *sv != ev {
            return Ok(Some((field.clone(), sv.clone(), ev)));
        }
    }
    Ok(None)
}

/// Replay a script trace through the Rust engine and compare every frame.
/// The trace's own constants win over `fallback`.
pub fn conform(scenario: &Scenario, fallback: &EngineConstants, trace: &ScriptTrace) -> Result<ConformanceReport> {
    let constants = match trace.constants.as_ref() {
        Some(embedded) => embedded,
        None => {
            debug!("trace carries no constants, using the configured ones");
            fallback
        }
    };
    let mut engine = CourtroomEngine::new(scenario, constants, trace.started_at);
    let mut compared = 0;

    for entry in &trace.entries {
        let envelope = ActionEnvelope::new(entry.seq, entry.at, entry.action.clone());
        engine.apply(&envelope)?;
        let frame = TraceFrame::capture(engine.state(), entry.seq);
        compared += 1;

        if let Some((field, script, engine_value)) = frame_divergence(&entry.frame, &frame)? {
            warn!(seq = entry.seq, field = %field, "script trace diverges from engine");
            return Ok(ConformanceReport {
                frames_compared: compared,
                divergence: Some(Divergence {
                    seq: entry.seq,
                    action: entry.action.name().to_string(),
                    field,
                    script,
                    engine: engine_value,
                }),
            });
        }
    }

    info!(frames = compared, "script trace conforms");
    Ok(ConformanceReport {
        frames_compared: compared,
        divergence: None,
    })
}
