//! Runtime configuration from `COURTROOM_*` environment variables.
//!
//! Every key is optional; unset keys keep the engine defaults. Parsing
//! collects one diagnostic per bad key instead of stopping at the first.

use std::env;
use std::fmt;
use std::path::PathBuf;

use courtroom_engine::EngineConstants;

pub const ENV_STAGE_MS: &str = "COURTROOM_STAGE_MS";
pub const ENV_SLOT_INTERVAL_MS: &str = "COURTROOM_SLOT_INTERVAL_MS";
pub const ENV_ENGINE_TICK_MS: &str = "COURTROOM_ENGINE_TICK_MS";
pub const ENV_CRIT_MIN_GAP: &str = "COURTROOM_CRIT_MIN_GAP";
pub const ENV_CRIT_MIN_TIME_GAP_MS: &str = "COURTROOM_CRIT_MIN_TIME_GAP_MS";
pub const ENV_ENFORCE_FAIL_LIMITS: &str = "COURTROOM_ENFORCE_FAIL_LIMITS";
pub const ENV_SNAPSHOT_INTERVAL: &str = "COURTROOM_SNAPSHOT_INTERVAL";
pub const ENV_SESSION_DIR: &str = "COURTROOM_SESSION_DIR";

/// Actions between two automatic snapshots of a recorded session.
pub const DEFAULT_SNAPSHOT_INTERVAL: u64 = 50;

/// Runtime settings: engine constants plus recording layout.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub constants: EngineConstants,
    /// `0` disables automatic snapshots.
    pub snapshot_interval: u64,
    pub session_dir: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            constants: EngineConstants::default(),
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            session_dir: PathBuf::from("sessions"),
        }
    }
}

/// Configuration parse diagnostics.
#[derive(Debug, Clone)]
pub struct RuntimeConfigParse {
    pub config: RuntimeConfig,
    pub errors: Vec<ConfigError>,
}

/// Configuration error with field context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub field: &'static str,
    pub value: String,
    pub message: String,
}

impl ConfigError {
    fn new(field: &'static str, value: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({})", self.field, self.value, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl RuntimeConfig {
    /// Parse config from environment variables and return diagnostics.
    #[must_use]
    pub fn from_env_with_diagnostics() -> RuntimeConfigParse {
        from_env_with(|key| env::var(key).ok())
    }

    /// Validate cross-field constraints and return all violations.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let c = &self.constants;
        let mut errors = Vec::new();
        validate_positive("stage_ms", c.stage_ms, &mut errors);
        validate_positive("slot_interval_ms", c.next_item_interval_ms, &mut errors);
        validate_positive("engine_tick_ms", c.engine_tick_ms, &mut errors);
        if c.engine_tick_ms > c.next_item_interval_ms {
            errors.push(ConfigError::new(
                "engine_tick_ms",
                c.engine_tick_ms.to_string(),
                "must not exceed slot_interval_ms",
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

pub(crate) fn from_env_with<F>(mut get: F) -> RuntimeConfigParse
where
    F: FnMut(&str) -> Option<String>,
{
    let mut config = RuntimeConfig::default();
    let mut errors = Vec::new();

    let mut millis = |key: &str, field: &'static str, slot: &mut u64, errors: &mut Vec<ConfigError>| {
        if let Some(value) = get(key) {
            match parse_u64(&value) {
                Some(parsed) => *slot = parsed,
                None => errors.push(ConfigError::new(field, value, "expected milliseconds")),
            }
        }
    };
    millis(ENV_STAGE_MS, "stage_ms", &mut config.constants.stage_ms, &mut errors);
    millis(
        ENV_SLOT_INTERVAL_MS,
        "slot_interval_ms",
        &mut config.constants.next_item_interval_ms,
        &mut errors,
    );
    millis(
        ENV_ENGINE_TICK_MS,
        "engine_tick_ms",
        &mut config.constants.engine_tick_ms,
        &mut errors,
    );
    millis(
        ENV_CRIT_MIN_TIME_GAP_MS,
        "crit_min_time_gap_ms",
        &mut config.constants.crit_min_time_gap_ms,
        &mut errors,
    );

    if let Some(value) = get(ENV_CRIT_MIN_GAP) {
        match value.trim().parse::<u32>() {
            Ok(parsed) => config.constants.crit_min_noncrit_gap = parsed,
            Err(_) => errors.push(ConfigError::new(
                "crit_min_gap",
                value,
                "expected a non-negative integer",
            )),
        }
    }

    if let Some(value) = get(ENV_ENFORCE_FAIL_LIMITS) {
        match parse_bool(&value) {
            Some(parsed) => config.constants.enforce_fail_limits = parsed,
            None => errors.push(ConfigError::new(
                "enforce_fail_limits",
                value,
                "expected bool (1/0/true/false)",
            )),
        }
    }

    if let Some(value) = get(ENV_SNAPSHOT_INTERVAL) {
        match parse_u64(&value) {
            Some(parsed) => config.snapshot_interval = parsed,
            None => errors.push(ConfigError::new(
                "snapshot_interval",
                value,
                "expected a non-negative integer",
            )),
        }
    }

    if let Some(value) = get(ENV_SESSION_DIR) {
        if value.trim().is_empty() {
            errors.push(ConfigError::new("session_dir", value, "must not be empty"));
        } else {
            config.session_dir = PathBuf::from(value);
        }
    }

    if let Err(mut invalid) = config.validate() {
        errors.append(&mut invalid);
    }

    RuntimeConfigParse { config, errors }
}

fn validate_positive(field: &'static str, value: u64, errors: &mut Vec<ConfigError>) {
    if value == 0 {
        errors.push(ConfigError::new(field, "0", "must be > 0"));
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[inline]
fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(pairs: &[(&str, &str)]) -> RuntimeConfigParse {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        from_env_with(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_env_keeps_defaults() {
        let parsed = parse(&[]);
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.config, RuntimeConfig::default());
    }

    #[test]
    fn overrides_apply() {
        let parsed = parse(&[
            (ENV_STAGE_MS, "5000"),
            (ENV_SLOT_INTERVAL_MS, " 2000 "),
            (ENV_CRIT_MIN_GAP, "1"),
            (ENV_ENFORCE_FAIL_LIMITS, "yes"),
            (ENV_SNAPSHOT_INTERVAL, "0"),
            (ENV_SESSION_DIR, "/tmp/court"),
        ]);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        let c = &parsed.config.constants;
        assert_eq!(c.stage_ms, 5_000);
        assert_eq!(c.next_item_interval_ms, 2_000);
        assert_eq!(c.crit_min_noncrit_gap, 1);
        assert!(c.enforce_fail_limits);
        assert_eq!(parsed.config.snapshot_interval, 0);
        assert_eq!(parsed.config.session_dir, PathBuf::from("/tmp/court"));
    }

    #[test]
    fn bad_values_are_all_reported() {
        let parsed = parse(&[
            (ENV_STAGE_MS, "soon"),
            (ENV_ENFORCE_FAIL_LIMITS, "maybe"),
            (ENV_ENGINE_TICK_MS, "0"),
        ]);
        let fields: Vec<&str> = parsed.errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, ["stage_ms", "enforce_fail_limits", "engine_tick_ms"]);
        assert_eq!(parsed.config.constants.stage_ms, 120_000);
    }

    #[test]
    fn tick_longer_than_slot_is_rejected() {
        let parsed = parse(&[(ENV_ENGINE_TICK_MS, "60000")]);
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].to_string(), "engine_tick_ms=60000 (must not exceed slot_interval_ms)");
    }
}
