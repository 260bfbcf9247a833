/// Courtroom Engine: Observable Trace Frames
///
/// A frame is the player-visible projection of the state after one action:
/// what a conformance check compares between the terminal engine and the
/// exported page's script. Drafts and message bodies are left out.

use serde::{Deserialize, Serialize};

use crate::domain::{EngineState, SessionStats};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockFrame {
    pub id: String,
    pub key: String,
    pub stage: String,
    pub deadline: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayedFrame {
    pub key: String,
    pub due_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceFrame {
    pub seq: u64,
    pub seconds_left: u32,
    pub running: bool,
    pub tasks: Vec<String>,
    pub dock: Vec<DockFrame>,
    pub delayed: Vec<DelayedFrame>,
    pub pool_normals: usize,
    pub pool_criticals: usize,
    pub overlay: String,
    pub stats: SessionStats,
}

impl TraceFrame {
    /// Project `state` as it stands after action `seq`.
    pub fn capture(state: &EngineState, seq: u64) -> Self {
        Self {
            seq,
            seconds_left: state.countdown.seconds_left,
            running: state.countdown.running,
            tasks: state.tasks.iter().map(|t| t.id.clone()).collect(),
            dock: state
                .dock
                .iter()
                .map(|d| DockFrame {
                    id: d.id.clone(),
                    key: d.key.clone(),
                    stage: d.stage.as_str().to_string(),
                    deadline: d.stage_deadline_at,
                })
                .collect(),
            delayed: state
                .delayed
                .values()
                .map(|e| DelayedFrame {
                    key: e.key.clone(),
                    due_at: e.due_at,
                })
                .collect(),
            pool_normals: state.pool_normals.len(),
            pool_criticals: state.pool_criticals.len(),
            overlay: state.overlay.name().to_string(),
            stats: state.stats.clone(),
        }
    }
}
