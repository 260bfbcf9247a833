/// Courtroom Engine: Action Definitions
///
/// Actions are pure data: player intents and timer firings. They carry no
/// transition logic. Both render surfaces emit this exact vocabulary, so a
/// trace recorded in one can be replayed in the other.

use serde::{Deserialize, Serialize};

/// Every input the engine accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Action {
    Start,
    Stop,
    Reset,
    /// One-second countdown firing.
    CountdownTick,
    /// Engine tick: stage advancement, delayed release, slot scheduling.
    Advance,
    ToggleOpen { item_id: String },
    DraftTask { task_id: String, text: String },
    SubmitTask { task_id: String },
    SkipTask { task_id: String },
    Dismiss { item_id: String },
    Resolve { item_id: String },
    DraftCritical { text: String },
    SubmitCritical,
    ExitCritical,
    DismissVerdict,
}

impl Action {
    /// Wire name, identical to the serde tag.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Reset => "reset",
            Action::CountdownTick => "countdown_tick",
            Action::Advance => "advance",
            Action::ToggleOpen { .. } => "toggle_open",
            Action::DraftTask { .. } => "draft_task",
            Action::SubmitTask { .. } => "submit_task",
            Action::SkipTask { .. } => "skip_task",
            Action::Dismiss { .. } => "dismiss",
            Action::Resolve { .. } => "resolve",
            Action::DraftCritical { .. } => "draft_critical",
            Action::SubmitCritical => "submit_critical",
            Action::ExitCritical => "exit_critical",
            Action::DismissVerdict => "dismiss_verdict",
        }
    }

    /// Timer firings, as opposed to player input.
    pub fn is_timer(&self) -> bool {
        matches!(self, Action::CountdownTick | Action::Advance)
    }
}

/// An action stamped with its position in the run and the instant it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEnvelope {
    pub sequence: u64,
    pub at: u64,
    pub action: Action,
}

impl ActionEnvelope {
    pub fn new(sequence: u64, at: u64, action: Action) -> Self {
        Self {
            sequence,
            at,
            action,
        }
    }
}
