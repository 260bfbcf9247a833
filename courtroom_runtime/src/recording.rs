//! Recorded sessions on disk.
//!
//! Directory structure:
//!   <base_dir>/<session_id>/header.json
//!   <base_dir>/<session_id>/actions.log
//!   <base_dir>/<session_id>/snapshots/
//!
//! Persist-after-apply: an action is appended only once the engine has
//! accepted it without error, so the log always replays cleanly.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use courtroom_engine::hashing::scenario_digest;
use courtroom_engine::{ActionEnvelope, EngineConstants, EngineState, Scenario, ENGINE_VERSION};

use crate::action_store::ActionStore;
use crate::error::{Result, RuntimeError};
use crate::proto_bridge::{action_to_proto, proto_to_action};
use crate::snapshot;

pub const HEADER_FILE: &str = "header.json";
pub const ACTIONS_FILE: &str = "actions.log";
pub const SNAPSHOT_DIR: &str = "snapshots";

/// Everything needed to rebuild the initial state of a recorded run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHeader {
    pub session_id: String,
    pub engine_version: u32,
    pub scenario_digest: String,
    pub started_at: u64,
    pub constants: EngineConstants,
    pub scenario: Scenario,
}

impl SessionHeader {
    pub fn new(
        session_id: &str,
        scenario: &Scenario,
        constants: &EngineConstants,
        started_at: u64,
    ) -> Result<Self> {
        Ok(Self {
            session_id: session_id.to_string(),
            engine_version: ENGINE_VERSION,
            scenario_digest: scenario_digest(scenario)?,
            started_at,
            constants: constants.clone(),
            scenario: scenario.clone(),
        })
    }
}

/// Writer side of a recorded session.
pub struct Recorder {
    dir: PathBuf,
    store: ActionStore,
    snapshot_interval: u64,
}

impl Recorder {
    /// Create `<base_dir>/<session_id>` and write its header.
    /// Refuses to reuse a directory that already holds a log.
    pub fn create(base_dir: &Path, header: &SessionHeader, snapshot_interval: u64) -> Result<Self> {
        let dir = base_dir.join(&header.session_id);
        let log_path = dir.join(ACTIONS_FILE);
        if log_path.exists() {
            return Err(RuntimeError::CorruptLog(format!(
                "session directory {} already holds a recording",
                dir.display()
            )));
        }
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(HEADER_FILE), serde_json::to_vec_pretty(header)?)?;

        let store = ActionStore::open(&log_path)?;
        info!(session = %header.session_id, dir = %dir.display(), "recording session");
        Ok(Self {
            dir,
            store,
            snapshot_interval,
        })
    }

    /// Persist one applied action and snapshot at the configured interval.
    pub fn record(&mut self, envelope: &ActionEnvelope, state: &EngineState) -> Result<()> {
        self.store.append(&action_to_proto(envelope))?;

        if self.snapshot_interval > 0 && envelope.sequence % self.snapshot_interval == 0 {
            let path = snapshot::save_snapshot(
                &self.dir.join(SNAPSHOT_DIR),
                envelope.sequence,
                envelope.at,
                state,
            )?;
            debug!(seq = envelope.sequence, path = %path.display(), "snapshot saved");
        }
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn last_sequence(&self) -> u64 {
        self.store.last_sequence()
    }
}

/// A recording read back from disk.
#[derive(Debug, Clone)]
pub struct Recording {
    pub dir: PathBuf,
    pub header: SessionHeader,
    pub actions: Vec<ActionEnvelope>,
}

/// Load the header and every action of a recorded session directory.
pub fn load_recording(dir: &Path) -> Result<Recording> {
    let header: SessionHeader = serde_json::from_slice(&fs::read(dir.join(HEADER_FILE))?)?;

    if header.engine_version != ENGINE_VERSION {
        return Err(RuntimeError::CorruptLog(format!(
            "recorded with engine v{}, this is v{}",
            header.engine_version, ENGINE_VERSION
        )));
    }
    if header.scenario_digest != scenario_digest(&header.scenario)? {
        return Err(RuntimeError::CorruptLog(
            "header scenario does not match its digest".to_string(),
        ));
    }

    let store = ActionStore::open(&dir.join(ACTIONS_FILE))?;
    let actions = store
        .load_all()?
        .iter()
        .map(proto_to_action)
        .collect::<Result<Vec<_>>>()?;

    Ok(Recording {
        dir: dir.to_path_buf(),
        header,
        actions,
    })
}
