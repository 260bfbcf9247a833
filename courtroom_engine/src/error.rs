use thiserror::Error;

/// Failures of the engine wrapper. Transition rejections are not errors;
/// they come back as a `TransitionReport` with `accepted = false`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("sequence violation: expected {expected}, got {got}")]
    SequenceViolation { expected: u64, got: u64 },

    #[error("time went backwards: last action at {last}ms, got {got}ms")]
    TimeWentBackwards { last: u64, got: u64 },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}
