/// Courtroom Engine: Core Domain Types
///
/// Pure data. No behaviour beyond small accessors, no transition logic.
/// Scenario types use the authoring tool's camelCase JSON names and default
/// missing fields instead of rejecting them.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::timing;

/// Workspace backdrop used when a scenario is created from scratch.
pub const DEFAULT_BACKGROUND_URL: &str = "/backgrounds/workdesk-bg.png";

/// Generic punishment used when neither the message nor the scenario names one.
pub const DEFAULT_PUNISHMENT: &str = "Case lost in court.";

/// Court backdrop used when a critical carries no background of its own.
pub const DEFAULT_COURT_BACKGROUND_URL: &str = "/backgrounds/courtroom-bg.png";

// ── Lenient field readers ──────────────────────────────────────────

/// Any value of the wrong shape falls back to the field's default.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Whole minutes from a number or a numeric string. Anything else is 0,
/// which the countdown treats as the default length.
fn lenient_minutes<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let minutes = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(match minutes {
        Some(m) if m.is_finite() && m > 0.0 => m.floor().min(f64::from(u32::MAX)) as u32,
        _ => 0,
    })
}

// ── Scenario Model ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageCategory {
    Interruption,
    Task,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Major,
    Minor,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Major => "major",
            Severity::Minor => "minor",
        }
    }
}

/// Penalty attached to one critical message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourtOutcome {
    #[serde(deserialize_with = "or_default")]
    pub punishment: String,
    #[serde(deserialize_with = "or_default")]
    pub reason: String,
    /// `None` unless the author set an actual boolean; resolves to `true`.
    #[serde(deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub can_return: Option<bool>,
    #[serde(deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub background_url: Option<String>,
    /// Pre-embedded copy of `background_url`, filled by the image embedder.
    #[serde(deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub background_data_uri: Option<String>,
}

/// A single scripted item: a task, an interruption or a critical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub category: MessageCategory,
    /// Unknown severities read as `None`.
    #[serde(default, deserialize_with = "or_default")]
    pub severity: Option<Severity>,
    #[serde(default, deserialize_with = "or_default")]
    pub text: String,
    #[serde(default, deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub court_outcome: Option<CourtOutcome>,
}

impl Message {
    /// Stable identity used for delayed re-insertion: `(id or text)|severity`.
    pub fn key(&self) -> String {
        let base = match self.id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => self.text.as_str(),
        };
        let severity = self.severity.map(Severity::as_str).unwrap_or("");
        format!("{}|{}", base, severity)
    }

    pub fn is_critical(&self) -> bool {
        self.category == MessageCategory::Critical
    }

    pub fn is_major(&self) -> bool {
        self.severity == Some(Severity::Major)
    }
}

/// Builder-configurable rules.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rules {
    pub major_limit: u32,
    pub minor_limit: u32,
    pub allow_skip_normals: bool,
    pub allow_exit_criticals: bool,
}

/// Field by field: a missing or malformed rule keeps its own default.
impl<'de> Deserialize<'de> for Rules {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let defaults = Rules::default();
        let limit = |key: &str, default: u32| {
            raw.get(key)
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(default)
        };
        let flag = |key: &str, default: bool| raw.get(key).and_then(Value::as_bool).unwrap_or(default);
        Ok(Rules {
            major_limit: limit("majorLimit", defaults.major_limit),
            minor_limit: limit("minorLimit", defaults.minor_limit),
            allow_skip_normals: flag("allowSkipNormals", defaults.allow_skip_normals),
            allow_exit_criticals: flag("allowExitCriticals", defaults.allow_exit_criticals),
        })
    }
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            major_limit: 2,
            minor_limit: 3,
            allow_skip_normals: true,
            allow_exit_criticals: true,
        }
    }
}

/// Complete scenario configuration. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(default, deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_minutes")]
    pub timer_minutes: u32,
    #[serde(default, deserialize_with = "or_default")]
    pub background_url: String,
    #[serde(default, deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub background_url_data_uri: Option<String>,
    #[serde(default, deserialize_with = "or_default")]
    pub punishment_text: String,
    #[serde(default)]
    pub rules: Rules,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Scenario {
    /// Defaults the authoring form starts from.
    pub fn empty() -> Self {
        Self {
            id: None,
            timer_minutes: timing::DEFAULT_TIMER_MINUTES,
            background_url: DEFAULT_BACKGROUND_URL.to_string(),
            background_url_data_uri: None,
            punishment_text: DEFAULT_PUNISHMENT.to_string(),
            rules: Rules::default(),
            messages: Vec::new(),
        }
    }

    /// Background to paint behind the workspace, preferring an embedded copy.
    pub fn effective_background(&self) -> &str {
        match self.background_url_data_uri.as_deref() {
            Some(uri) if !uri.is_empty() => uri,
            _ if !self.background_url.is_empty() => &self.background_url,
            _ => DEFAULT_BACKGROUND_URL,
        }
    }
}

/// Timing and gating parameters. Both render surfaces read them from here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EngineConstants {
    pub engine_tick_ms: u64,
    pub countdown_tick_ms: u64,
    pub next_item_interval_ms: u64,
    pub stage_ms: u64,
    pub crit_min_noncrit_gap: u32,
    pub crit_min_time_gap_ms: u64,
    /// Opt-in: a verdict that reaches `majorLimit`/`minorLimit` cannot be returned from.
    pub enforce_fail_limits: bool,
}

impl Default for EngineConstants {
    fn default() -> Self {
        Self {
            engine_tick_ms: timing::ENGINE_TICK_MS,
            countdown_tick_ms: timing::COUNTDOWN_TICK_MS,
            next_item_interval_ms: timing::NEXT_ITEM_INTERVAL_MS,
            stage_ms: timing::STAGE_MS,
            crit_min_noncrit_gap: timing::CRIT_MIN_NONCRIT_GAP,
            crit_min_time_gap_ms: timing::CRIT_MIN_TIME_GAP_MS,
            enforce_fail_limits: false,
        }
    }
}

// ── Runtime Entities ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Initial,
    Urgent,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Initial => "initial",
            Stage::Urgent => "urgent",
        }
    }
}

/// An always-visible work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskItem {
    pub id: String,
    pub message: Message,
    pub draft: String,
}

/// A notification, either pooled or presented in the dock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DockItem {
    pub id: String,
    pub key: String,
    pub message: Message,
    pub is_open: bool,
    pub stage: Stage,
    pub stage_deadline_at: Option<u64>,
}

impl DockItem {
    pub fn is_critical(&self) -> bool {
        self.message.is_critical()
    }
}

/// A critical dismissed at `initial`, waiting to re-enter the dock at `urgent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DelayedEntry {
    pub key: String,
    pub due_at: u64,
    pub message: Message,
}

/// The critical answer dialog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CriticalDialog {
    pub item_id: String,
    pub key: String,
    pub message: Message,
    pub draft: String,
}

/// Effective court outcome after field-by-field fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Verdict {
    pub item_key: String,
    pub severity: Option<Severity>,
    pub punishment: String,
    pub reason: String,
    pub can_return: bool,
    pub background_url: String,
}

/// The modal surface currently covering the workspace. At most one at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Overlay {
    None,
    CriticalAnswer(CriticalDialog),
    Verdict(Verdict),
    Summary,
}

impl Overlay {
    pub fn is_open(&self) -> bool {
        !matches!(self, Overlay::None)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Overlay::None => "none",
            Overlay::CriticalAnswer(_) => "criticalAnswer",
            Overlay::Verdict(_) => "verdict",
            Overlay::Summary => "summary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Countdown {
    pub total_seconds: u32,
    pub seconds_left: u32,
    pub running: bool,
}

/// Slot admission bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SlotScheduler {
    pub last_slot_at: u64,
    /// `None` until the first critical of the run; counts as "time gap elapsed".
    pub last_critical_at: Option<u64>,
    pub non_critical_gap: u32,
}

/// Passive counters, updated only by terminal events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SessionStats {
    pub task_attempted: u32,
    pub task_completed: u32,
    pub critical_notified: u32,
    pub critical_completed: u32,
    pub critical_failed: u32,
    pub minor_fails: u32,
    pub major_fails: u32,
}

/// Summary line templates. `{field}` placeholders name `SessionStats` fields
/// in their camelCase wire form.
pub const SUMMARY_TEMPLATES: [&str; 3] = [
    "Tasks — Attempted: {taskAttempted}, Completed: {taskCompleted}",
    "Criticals — Notified: {criticalNotified}, Completed: {criticalCompleted}, Failed: {criticalFailed}",
    "Fails — Minor: {minorFails}, Major: {majorFails}",
];

impl SessionStats {
    fn fields(&self) -> [(&'static str, u32); 7] {
        [
            ("taskAttempted", self.task_attempted),
            ("taskCompleted", self.task_completed),
            ("criticalNotified", self.critical_notified),
            ("criticalCompleted", self.critical_completed),
            ("criticalFailed", self.critical_failed),
            ("minorFails", self.minor_fails),
            ("majorFails", self.major_fails),
        ]
    }

    /// The three summary lines, with their fixed labels.
    pub fn summary_lines(&self) -> [String; 3] {
        SUMMARY_TEMPLATES.map(|template| {
            self.fields()
                .iter()
                .fold(template.to_string(), |line, (name, value)| {
                    line.replace(&format!("{{{}}}", name), &value.to_string())
                })
        })
    }
}

/// Complete engine state for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EngineState {
    pub scenario: Scenario,
    pub constants: EngineConstants,
    pub countdown: Countdown,
    pub tasks: Vec<TaskItem>,
    pub pool_normals: VecDeque<DockItem>,
    pub pool_criticals: VecDeque<DockItem>,
    pub dock: Vec<DockItem>,
    /// Keyed by message key, so re-dismissing cannot create duplicates.
    pub delayed: BTreeMap<String, DelayedEntry>,
    pub scheduler: SlotScheduler,
    pub overlay: Overlay,
    pub stats: SessionStats,
    /// Identities terminally removed during this run.
    pub retired: BTreeSet<String>,
    pub next_uid: u64,
}

impl EngineState {
    /// Next deterministic identity (`i1`, `i2`, ...).
    pub fn fresh_uid(&mut self) -> String {
        self.next_uid += 1;
        format!("i{}", self.next_uid)
    }

    pub fn critical_in_dock(&self) -> bool {
        self.dock.iter().any(DockItem::is_critical)
    }

    pub fn dock_index(&self, item_id: &str) -> Option<usize> {
        self.dock.iter().position(|d| d.id == item_id)
    }

    pub fn task_index(&self, task_id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == task_id)
    }
}

/// Structured, immutable outcome of one applied action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionReport {
    pub action: String,
    pub accepted: bool,
    pub reason: String,
    /// Identities delivered to the dock by slot scheduling.
    pub delivered: Vec<String>,
    /// Identities escalated from `initial` to `urgent`.
    pub escalated: Vec<String>,
    /// Identities inserted by delayed release.
    pub released: Vec<String>,
    /// Delayed keys dropped because the key was already urgent.
    pub suppressed: Vec<String>,
    /// Keys scheduled for delayed re-entry.
    pub delayed: Vec<String>,
    /// Key sent to court by this action.
    pub verdict: Option<String>,
    pub answer_correct: Option<bool>,
}

impl Default for TransitionReport {
    fn default() -> Self {
        Self {
            action: String::new(),
            accepted: true,
            reason: String::new(),
            delivered: Vec::new(),
            escalated: Vec::new(),
            released: Vec::new(),
            suppressed: Vec::new(),
            delayed: Vec::new(),
            verdict: None,
            answer_correct: None,
        }
    }
}

impl TransitionReport {
    pub fn rejected(action: &str, reason: impl Into<String>) -> Self {
        Self {
            action: action.to_string(),
            accepted: false,
            reason: reason.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_key_prefers_id_then_text() {
        let mut m = Message {
            id: Some("m-7".to_string()),
            category: MessageCategory::Critical,
            severity: Some(Severity::Major),
            text: "Fix alt text".to_string(),
            answer: None,
            court_outcome: None,
        };
        assert_eq!(m.key(), "m-7|major");
        m.id = None;
        assert_eq!(m.key(), "Fix alt text|major");
        m.severity = None;
        assert_eq!(m.key(), "Fix alt text|");
    }

    #[test]
    fn scenario_parses_authoring_json_with_missing_fields() {
        let json = r#"{
            "timerMinutes": 5,
            "backgroundUrl": "/bg.png",
            "punishmentText": "X",
            "messages": [
                { "category": "critical", "severity": "major", "text": "c",
                  "courtOutcome": { "punishment": "", "reason": "r" } },
                { "category": "interruption", "text": "hi", "severity": null }
            ],
            "createdAt": "2024-01-01"
        }"#;
        let s: Scenario = serde_json::from_str(json).unwrap();
        assert_eq!(s.rules, Rules::default());
        assert_eq!(s.messages.len(), 2);
        let co = s.messages[0].court_outcome.as_ref().unwrap();
        assert_eq!(co.can_return, None);
        assert_eq!(s.messages[1].severity, None);
    }

    #[test]
    fn malformed_fields_fall_back_to_defaults() {
        let json = r#"{
            "timerMinutes": "7",
            "punishmentText": null,
            "rules": { "majorLimit": "four", "minorLimit": 1, "allowSkipNormals": "no" },
            "messages": [
                { "category": "critical", "severity": "catastrophic", "text": "c",
                  "courtOutcome": { "punishment": 3, "canReturn": "false" } }
            ]
        }"#;
        let s: Scenario = serde_json::from_str(json).unwrap();
        assert_eq!(s.timer_minutes, 7);
        assert_eq!(s.punishment_text, "");
        assert_eq!(s.rules.major_limit, 2);
        assert_eq!(s.rules.minor_limit, 1);
        assert!(s.rules.allow_skip_normals);
        assert_eq!(s.messages[0].severity, None);
        assert_eq!(s.messages[0].key(), "c|");
        let co = s.messages[0].court_outcome.as_ref().unwrap();
        assert_eq!(co.punishment, "");
        assert_eq!(co.can_return, None);
    }

    #[test]
    fn timer_minutes_accepts_numbers_and_numeric_strings() {
        let minutes = |v: &str| {
            let s: Scenario = serde_json::from_str(&format!(r#"{{"timerMinutes": {}}}"#, v)).unwrap();
            s.timer_minutes
        };
        assert_eq!(minutes("5"), 5);
        assert_eq!(minutes("2.9"), 2);
        assert_eq!(minutes(r#"" 3 ""#), 3);
        assert_eq!(minutes("-1"), 0);
        assert_eq!(minutes(r#""soon""#), 0);
        assert_eq!(minutes("null"), 0);
    }

    #[test]
    fn summary_lines_use_fixed_labels() {
        let stats = SessionStats {
            task_attempted: 2,
            task_completed: 1,
            critical_notified: 3,
            critical_completed: 1,
            critical_failed: 2,
            minor_fails: 1,
            major_fails: 1,
        };
        let lines = stats.summary_lines();
        assert_eq!(lines[0], "Tasks — Attempted: 2, Completed: 1");
        assert_eq!(lines[1], "Criticals — Notified: 3, Completed: 1, Failed: 2");
        assert_eq!(lines[2], "Fails — Minor: 1, Major: 1");
    }

    #[test]
    fn effective_background_prefers_data_uri() {
        let mut s = Scenario::empty();
        assert_eq!(s.effective_background(), DEFAULT_BACKGROUND_URL);
        s.background_url_data_uri = Some("data:image/png;base64,AAAA".to_string());
        assert_eq!(s.effective_background(), "data:image/png;base64,AAAA");
    }
}
