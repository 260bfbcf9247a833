//! Runtime errors

use thiserror::Error;

use courtroom_engine::EngineError;

use crate::config::ConfigError;
use crate::snapshot_codec::SnapshotError;

/// Runtime result type
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Runtime errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("corrupt action log: {0}")]
    CorruptLog(String),

    #[error("malformed action frame at sequence {sequence}: {message}")]
    MalformedFrame { sequence: u64, message: String },

    #[error("configuration error: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    Config(Vec<ConfigError>),

    #[error("snapshot mismatch at sequence {sequence}: recorded {recorded}, replayed {replayed}")]
    SnapshotMismatch {
        sequence: u64,
        recorded: String,
        replayed: String,
    },

    #[error("replay is not deterministic: {first} vs {second}")]
    Nondeterministic { first: String, second: String },

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}
