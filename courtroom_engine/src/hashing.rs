/// Courtroom Engine: Canonical Hashing
///
/// Deterministic canonical serialization + SHA-256 hashing of engine state.
/// Two runs fed the same scenario and actions hash identically.
///
/// Rules:
///   - engine_version first, then a digest of the scenario
///   - State sections in fixed order, struct fields in declaration order
///   - Delayed entries and retired identities in key order
///   - UTF-8 JSON, no whitespace, integers only

use std::collections::VecDeque;

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::domain::{DockItem, EngineState, Scenario};
use crate::error::EngineError;
use crate::ENGINE_VERSION;

/// Canonical serialization of EngineState to UTF-8 JSON bytes.
pub fn canonical_serialize(state: &EngineState) -> Result<Vec<u8>, EngineError> {
    let obj = build_canonical_value(state)?;
    Ok(serde_json::to_vec(&obj)?)
}

/// SHA-256 of canonical serialization. Lowercase hex string.
pub fn canonical_hash(state: &EngineState) -> Result<String, EngineError> {
    let bytes = canonical_serialize(state)?;
    Ok(hex(&Sha256::digest(&bytes)))
}

/// SHA-256 of the scenario JSON. Binds a state or a recording to its scenario.
pub fn scenario_digest(scenario: &Scenario) -> Result<String, EngineError> {
    let bytes = serde_json::to_vec(scenario)?;
    Ok(hex(&Sha256::digest(&bytes)))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn section<T: Serialize>(value: &T) -> Result<Value, EngineError> {
    Ok(serde_json::to_value(value)?)
}

/// Field order: engine_version, scenario_digest, constants, countdown, tasks,
///              pool_normals, pool_criticals, dock, delayed, scheduler,
///              overlay, stats, retired, next_uid
fn build_canonical_value(state: &EngineState) -> Result<Value, EngineError> {
    // Pools hash by identity; their payloads are fixed by the scenario digest.
    let pool_ids = |pool: &VecDeque<DockItem>| {
        Value::Array(pool.iter().map(|d| Value::String(d.id.clone())).collect())
    };

    // engine_version MUST be first; it is part of the engine identity.
    let mut root = Map::new();
    root.insert(
        "engine_version".to_string(),
        Value::Number(ENGINE_VERSION.into()),
    );
    root.insert(
        "scenario_digest".to_string(),
        Value::String(scenario_digest(&state.scenario)?),
    );
    root.insert("constants".to_string(), section(&state.constants)?);
    root.insert("countdown".to_string(), section(&state.countdown)?);
    root.insert("tasks".to_string(), section(&state.tasks)?);
    root.insert("pool_normals".to_string(), pool_ids(&state.pool_normals));
    root.insert("pool_criticals".to_string(), pool_ids(&state.pool_criticals));
    root.insert("dock".to_string(), section(&state.dock)?);
    root.insert("delayed".to_string(), section(&state.delayed)?);
    root.insert("scheduler".to_string(), section(&state.scheduler)?);
    root.insert("overlay".to_string(), section(&state.overlay)?);
    root.insert("stats".to_string(), section(&state.stats)?);
    root.insert("retired".to_string(), section(&state.retired)?);
    root.insert(
        "next_uid".to_string(),
        Value::Number(state.next_uid.into()),
    );

    Ok(Value::Object(root))
}
