//! Live text surface.
//!
//! `LiveView` is a pure projection of the engine state at one instant. The
//! session compares successive projections and only re-renders on change.

use std::fmt::Write as _;

use courtroom_engine::domain::{EngineState, Overlay, Stage};
use courtroom_engine::timing::{format_mm_ss, seconds_until};

use crate::icons::IconKind;

pub const VERDICT_TITLE: &str = "Courtroom Verdict";
pub const PUNISHMENT_LABEL: &str = "Punishment:";
pub const REASON_LABEL: &str = "Reason:";
pub const RETURN_LABEL: &str = "Return to game";
pub const END_LABEL: &str = "End";
pub const SUMMARY_TITLE: &str = "Session Summary";
pub const INTERRUPTION_TITLE: &str = "Interruption";
pub const CRITICAL_TITLE: &str = "Critical";
pub const CRITICAL_TASK_TITLE: &str = "Critical Task";
pub const TO_URGENT: &str = "to urgent";
pub const TO_COURT: &str = "to court";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCard {
    pub id: String,
    pub text: String,
    pub draft: String,
    pub can_skip: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockBubble {
    pub id: String,
    pub icon: IconKind,
    pub title: String,
    pub text: String,
    pub is_open: bool,
    /// `T-<s>s to urgent|to court`; absent for interruptions and for the
    /// critical being answered.
    pub countdown: Option<String>,
}

/// The modal pane covering the workspace, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pane {
    Workspace,
    Dialog {
        title: String,
        text: String,
        draft: String,
        can_exit: bool,
    },
    Verdict {
        punishment: String,
        reason: String,
        can_return: bool,
        background: String,
    },
    Summary {
        lines: [String; 3],
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveView {
    pub timer: String,
    pub running: bool,
    pub background: String,
    pub tasks: Vec<TaskCard>,
    pub dock: Vec<DockBubble>,
    pub pane: Pane,
    /// Command words accepted in the current state.
    pub available: Vec<&'static str>,
}

impl LiveView {
    pub fn project(state: &EngineState, now: u64) -> Self {
        let rules = &state.scenario.rules;
        let dialog_item = match &state.overlay {
            Overlay::CriticalAnswer(d) => Some(d.item_id.as_str()),
            _ => None,
        };

        let tasks = state
            .tasks
            .iter()
            .map(|t| TaskCard {
                id: t.id.clone(),
                text: t.message.text.clone(),
                draft: t.draft.clone(),
                can_skip: rules.allow_skip_normals,
            })
            .collect();

        let dock = state
            .dock
            .iter()
            .map(|d| {
                let title = if d.is_critical() {
                    format!(
                        "{} ({})",
                        CRITICAL_TITLE,
                        d.message.severity.map(|s| s.as_str()).unwrap_or("")
                    )
                } else {
                    INTERRUPTION_TITLE.to_string()
                };
                let countdown = match d.stage_deadline_at {
                    Some(deadline) if d.is_critical() && dialog_item != Some(d.id.as_str()) => {
                        let target = match d.stage {
                            Stage::Initial => TO_URGENT,
                            Stage::Urgent => TO_COURT,
                        };
                        Some(format!("T-{}s {}", seconds_until(deadline, now), target))
                    }
                    _ => None,
                };
                DockBubble {
                    id: d.id.clone(),
                    icon: IconKind::for_item(d),
                    title,
                    text: d.message.text.clone(),
                    is_open: d.is_open,
                    countdown,
                }
            })
            .collect();

        let pane = match &state.overlay {
            Overlay::None => Pane::Workspace,
            Overlay::CriticalAnswer(d) => Pane::Dialog {
                title: match d.message.severity {
                    Some(s) => format!("{} ({})", CRITICAL_TASK_TITLE, s.as_str()),
                    None => CRITICAL_TASK_TITLE.to_string(),
                },
                text: d.message.text.clone(),
                draft: d.draft.clone(),
                can_exit: rules.allow_exit_criticals,
            },
            Overlay::Verdict(v) => Pane::Verdict {
                punishment: v.punishment.clone(),
                reason: v.reason.clone(),
                can_return: v.can_return,
                background: v.background_url.clone(),
            },
            Overlay::Summary => Pane::Summary {
                lines: state.stats.summary_lines(),
            },
        };

        Self {
            timer: format_mm_ss(state.countdown.seconds_left),
            running: state.countdown.running,
            background: state.scenario.effective_background().to_string(),
            tasks,
            dock,
            available: available_commands(state),
            pane,
        }
    }
}

fn available_commands(state: &EngineState) -> Vec<&'static str> {
    let rules = &state.scenario.rules;
    match &state.overlay {
        Overlay::Summary => vec!["reset", "quit"],
        Overlay::Verdict(_) => vec!["ok", "stop", "reset", "quit"],
        Overlay::CriticalAnswer(_) => {
            let mut v = vec!["submit"];
            if rules.allow_exit_criticals {
                v.push("exit");
            }
            v.extend(["stop", "reset", "quit"]);
            v
        }
        Overlay::None => {
            let mut v = vec![if state.countdown.running { "stop" } else { "start" }, "reset"];
            if !state.tasks.is_empty() {
                v.push("answer");
                if rules.allow_skip_normals {
                    v.push("skip");
                }
            }
            if !state.dock.is_empty() {
                v.extend(["open", "dismiss"]);
            }
            if state.critical_in_dock() {
                v.push("resolve");
            }
            v.push("quit");
            v
        }
    }
}

/// Plain-text rendering of a view, one block per region.
pub fn render_text(view: &LiveView) -> String {
    let mut out = String::new();
    let state = if view.running { "running" } else { "paused" };
    let _ = writeln!(out, "[{}] {}", view.timer, state);

    match &view.pane {
        Pane::Workspace => {}
        Pane::Dialog {
            title,
            text,
            draft,
            can_exit,
        } => {
            let _ = writeln!(out, "== {} ==", title);
            let _ = writeln!(out, "{}", text);
            let _ = writeln!(out, "> {}", draft);
            let exit = if *can_exit { " | exit" } else { "" };
            let _ = writeln!(out, "(submit <answer>{})", exit);
            return finish(out, view);
        }
        Pane::Verdict {
            punishment,
            reason,
            can_return,
            ..
        } => {
            let _ = writeln!(out, "== {} ==", VERDICT_TITLE);
            let _ = writeln!(out, "{} {}", PUNISHMENT_LABEL, punishment);
            if !reason.is_empty() {
                let _ = writeln!(out, "{} {}", REASON_LABEL, reason);
            }
            let button = if *can_return { RETURN_LABEL } else { END_LABEL };
            let _ = writeln!(out, "(ok: {})", button);
            return finish(out, view);
        }
        Pane::Summary { lines } => {
            let _ = writeln!(out, "== {} ==", SUMMARY_TITLE);
            for line in lines {
                let _ = writeln!(out, "{}", line);
            }
            return finish(out, view);
        }
    }

    let _ = writeln!(out, "Tasks:");
    if view.tasks.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for t in &view.tasks {
        let _ = writeln!(out, "  [{}] {}", t.id, t.text);
        if !t.draft.is_empty() {
            let _ = writeln!(out, "       > {}", t.draft);
        }
    }

    let _ = writeln!(out, "Dock:");
    if view.dock.is_empty() {
        let _ = writeln!(out, "  (empty)");
    }
    for d in &view.dock {
        let countdown = d.countdown.as_deref().map(|c| format!("  {}", c)).unwrap_or_default();
        let _ = writeln!(out, "  {} [{}] {}{}", d.icon.marker(), d.id, d.title, countdown);
        if d.is_open {
            let _ = writeln!(out, "       {}", d.text);
        }
    }

    finish(out, view)
}

fn finish(mut out: String, view: &LiveView) -> String {
    let _ = writeln!(out, "commands: {}", view.available.join(", "));
    out
}
