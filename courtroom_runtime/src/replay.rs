//! Replay orchestrator: rebuild state from a recorded action stream.
//!
//! Delegates all domain logic to the engine.
//! No shortcuts, no cached state logic.

use courtroom_engine::hashing::canonical_hash;
use courtroom_engine::{ActionEnvelope, CourtroomEngine, EngineState};

use crate::error::Result;
use crate::recording::SessionHeader;

/// Rebuild the engine state from a header and its action stream.
///
/// 1. Create a fresh engine from the header's scenario and constants
/// 2. Pass each action sequentially to the engine
/// 3. Return (final_state, canonical_hash)
pub fn rebuild_state(header: &SessionHeader, actions: &[ActionEnvelope]) -> Result<(EngineState, String)> {
    let engine = CourtroomEngine::replay(&header.scenario, &header.constants, header.started_at, actions)?;
    let state = engine.state().clone();
    let hash = canonical_hash(&state)?;
    Ok((state, hash))
}

/// Rebuild state and return only the canonical hash.
pub fn rebuild_hash(header: &SessionHeader, actions: &[ActionEnvelope]) -> Result<String> {
    let (_, hash) = rebuild_state(header, actions)?;
    Ok(hash)
}

/// Canonical hash after the first `upto` actions.
pub fn hash_at(header: &SessionHeader, actions: &[ActionEnvelope], upto: u64) -> Result<String> {
    let prefix: Vec<ActionEnvelope> = actions
        .iter()
        .take_while(|a| a.sequence <= upto)
        .cloned()
        .collect();
    rebuild_hash(header, &prefix)
}
