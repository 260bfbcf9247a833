/// Courtroom Engine: Centralized Transition Logic
///
/// ALL state-mutation logic lives here. Every handler works on a private
/// clone; the caller's state is never touched. Time comes only from the
/// action envelope.

use tracing::{debug, info};

use crate::actions::{Action, ActionEnvelope};
use crate::court::{limits_reached, record_failure, resolve_verdict};
use crate::domain::{
    CriticalDialog, DelayedEntry, DockItem, EngineState, Message, Overlay, Stage,
    TransitionReport,
};
use crate::judge::is_satisfied;
use crate::state::create_initial_state;
use crate::timing::{deadline_after, elapsed};

// ---------------------------------------------------------------------------
// Public dispatcher
// ---------------------------------------------------------------------------

/// Apply `envelope` to `state` and return `(new_state, report)`.
/// Rejected actions return an unchanged clone and `accepted = false`.
pub fn apply_action(
    state: &EngineState,
    envelope: &ActionEnvelope,
) -> (EngineState, TransitionReport) {
    let mut next = state.clone();
    let now = envelope.at;

    let mut report = if matches!(next.overlay, Overlay::Summary)
        && !matches!(envelope.action, Action::Reset)
    {
        TransitionReport::rejected(envelope.action.name(), "session ended")
    } else {
        match &envelope.action {
            Action::Start => apply_start(&mut next, now),
            Action::Stop => apply_stop(&mut next),
            Action::Reset => apply_reset(&mut next, now),
            Action::CountdownTick => apply_countdown_tick(&mut next),
            Action::Advance => advance(&mut next, now),
            Action::ToggleOpen { item_id } => apply_toggle_open(&mut next, item_id),
            Action::DraftTask { task_id, text } => apply_draft_task(&mut next, task_id, text),
            Action::SubmitTask { task_id } => apply_submit_task(&mut next, task_id),
            Action::SkipTask { task_id } => apply_skip_task(&mut next, task_id),
            Action::Dismiss { item_id } => apply_dismiss(&mut next, item_id, now),
            Action::Resolve { item_id } => apply_resolve(&mut next, item_id),
            Action::DraftCritical { text } => apply_draft_critical(&mut next, text),
            Action::SubmitCritical => apply_submit_critical(&mut next),
            Action::ExitCritical => apply_exit_critical(&mut next),
            Action::DismissVerdict => apply_dismiss_verdict(&mut next),
        }
    };
    report.action = envelope.action.name().to_string();

    if !report.accepted {
        // Rejections never mutate.
        return (state.clone(), report);
    }
    (next, report)
}

// ---------------------------------------------------------------------------
// Engine tick
// ---------------------------------------------------------------------------

/// One engine tick: stage advancement, delayed release, then slot scheduling.
///
/// Stage and delayed progression run on wall-clock time regardless of the
/// countdown. Slot scheduling needs a running countdown and no overlay.
pub fn advance(state: &mut EngineState, now: u64) -> TransitionReport {
    let mut report = TransitionReport::default();

    advance_stages(state, now, &mut report);
    release_delayed(state, now, &mut report);

    if state.countdown.running
        && !state.overlay.is_open()
        && elapsed(now, state.scheduler.last_slot_at) >= state.constants.next_item_interval_ms
    {
        schedule_next_slot(state, now, &mut report);
        state.scheduler.last_slot_at = now;
    }

    report
}

/// Escalate overdue `initial` criticals; send the first overdue `urgent`
/// critical to court. Verdicts wait while any overlay is open.
fn advance_stages(state: &mut EngineState, now: u64, report: &mut TransitionReport) {
    let stage_ms = state.constants.stage_ms;
    let dialog_item = match &state.overlay {
        Overlay::CriticalAnswer(d) => Some(d.item_id.clone()),
        _ => None,
    };

    let mut idx = 0;
    let mut overdue_urgent: Option<usize> = None;
    while idx < state.dock.len() {
        let item = &state.dock[idx];
        let due = item.is_critical() && item.stage_deadline_at.is_some_and(|d| now >= d);
        if !due {
            idx += 1;
            continue;
        }

        match item.stage {
            Stage::Initial => {
                let key = item.key.clone();
                let id = item.id.clone();
                let twin = state
                    .dock
                    .iter()
                    .position(|d| d.id != id && d.key == key && d.stage == Stage::Urgent);

                if let Some(twin) = twin {
                    // Same key already urgent: the two copies collapse into one.
                    let victim = if dialog_item.as_deref() == Some(id.as_str()) {
                        twin
                    } else {
                        idx
                    };
                    let removed = state.dock.remove(victim);
                    state.retired.insert(removed.id);
                    report.suppressed.push(key);
                    if victim == idx {
                        continue;
                    }
                    if victim < idx {
                        idx -= 1;
                    }
                    overdue_urgent = match overdue_urgent {
                        Some(o) if o == victim => None,
                        Some(o) if o > victim => Some(o - 1),
                        other => other,
                    };
                }

                let item = &mut state.dock[idx];
                item.stage = Stage::Urgent;
                item.stage_deadline_at = Some(deadline_after(now, stage_ms));
                report.escalated.push(item.id.clone());
            }
            Stage::Urgent => {
                if overdue_urgent.is_none() {
                    overdue_urgent = Some(idx);
                }
            }
        }
        idx += 1;
    }

    if let Some(idx) = overdue_urgent {
        if state.overlay.is_open() {
            debug!(item = %state.dock[idx].id, "court deferred while overlay is open");
            return;
        }
        let item = state.dock[idx].clone();
        open_court(state, &item.message, &item.key, report);
    }
}

/// Re-insert due delayed criticals at `urgent`, dropping duplicates.
fn release_delayed(state: &mut EngineState, now: u64, report: &mut TransitionReport) {
    let due: Vec<String> = state
        .delayed
        .iter()
        .filter(|(_, e)| now >= e.due_at)
        .map(|(k, _)| k.clone())
        .collect();

    for key in due {
        let Some(entry) = state.delayed.remove(&key) else {
            continue;
        };

        let already_urgent = state
            .dock
            .iter()
            .any(|d| d.key == key && d.stage == Stage::Urgent);
        if already_urgent {
            report.suppressed.push(key);
            continue;
        }

        let id = state.fresh_uid();
        state.dock.push(DockItem {
            id: id.clone(),
            key,
            message: entry.message,
            is_open: false,
            stage: Stage::Urgent,
            stage_deadline_at: Some(deadline_after(now, state.constants.stage_ms)),
        });
        state.stats.critical_notified += 1;
        report.released.push(id);
    }
}

/// Deliver one pooled item, preferring a critical when the admission gate is open.
fn schedule_next_slot(state: &mut EngineState, now: u64, report: &mut TransitionReport) {
    if critical_admissible(state, now) {
        if let Some(mut item) = state.pool_criticals.pop_front() {
            item.stage = Stage::Initial;
            item.stage_deadline_at = Some(deadline_after(now, state.constants.stage_ms));
            report.delivered.push(item.id.clone());
            state.dock.push(item);
            state.stats.critical_notified += 1;
            state.scheduler.last_critical_at = Some(now);
            state.scheduler.non_critical_gap = 0;
            return;
        }
    }

    if let Some(item) = state.pool_normals.pop_front() {
        report.delivered.push(item.id.clone());
        state.dock.push(item);
        state.scheduler.non_critical_gap += 1;
    }
}

/// The critical-admission gate: no critical in the dock, a non-empty pool, and
/// either enough non-critical slots or enough time since the last critical.
pub fn critical_admissible(state: &EngineState, now: u64) -> bool {
    let c = &state.constants;
    let gap_ok = state.scheduler.non_critical_gap >= c.crit_min_noncrit_gap;
    let time_gap_ok = state
        .scheduler
        .last_critical_at
        .map_or(true, |t| elapsed(now, t) >= c.crit_min_time_gap_ms);

    !state.critical_in_dock() && (gap_ok || time_gap_ok) && !state.pool_criticals.is_empty()
}

/// Court the item with `key`: pause, close the dialog, drop the key from the
/// dock, count the failure and show the verdict.
fn open_court(state: &mut EngineState, message: &Message, key: &str, report: &mut TransitionReport) {
    let mut verdict = resolve_verdict(message, &state.scenario);
    record_failure(&mut state.stats, message);
    if limits_reached(&state.stats, &state.scenario, &state.constants) {
        verdict.can_return = false;
    }

    state.countdown.running = false;

    let mut removed = Vec::new();
    state.dock.retain(|d| {
        if d.key == key {
            removed.push(d.id.clone());
            false
        } else {
            true
        }
    });
    state.retired.extend(removed);

    info!(
        key,
        punishment = %verdict.punishment,
        can_return = verdict.can_return,
        "verdict opened"
    );
    state.overlay = Overlay::Verdict(verdict);
    report.verdict = Some(key.to_string());
}

// ---------------------------------------------------------------------------
// Session controls
// ---------------------------------------------------------------------------

fn apply_start(state: &mut EngineState, now: u64) -> TransitionReport {
    if state.overlay.is_open() {
        return TransitionReport::rejected("start", "an overlay is open");
    }
    if state.countdown.running {
        return TransitionReport {
            reason: "already running".to_string(),
            ..Default::default()
        };
    }
    state.countdown.running = true;
    state.scheduler.last_slot_at = now;
    TransitionReport::default()
}

fn apply_stop(state: &mut EngineState) -> TransitionReport {
    state.countdown.running = false;
    TransitionReport::default()
}

fn apply_reset(state: &mut EngineState, now: u64) -> TransitionReport {
    *state = create_initial_state(&state.scenario, &state.constants, now);
    TransitionReport::default()
}

fn apply_countdown_tick(state: &mut EngineState) -> TransitionReport {
    if state.countdown.running && state.countdown.seconds_left > 0 {
        state.countdown.seconds_left -= 1;
    }
    TransitionReport::default()
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

fn apply_draft_task(state: &mut EngineState, task_id: &str, text: &str) -> TransitionReport {
    if state.overlay.is_open() {
        return TransitionReport::rejected("draft_task", "an overlay is open");
    }
    let Some(idx) = state.task_index(task_id) else {
        return TransitionReport::rejected("draft_task", format!("unknown task {}", task_id));
    };
    state.tasks[idx].draft = text.to_string();
    TransitionReport::default()
}

fn apply_submit_task(state: &mut EngineState, task_id: &str) -> TransitionReport {
    if state.overlay.is_open() {
        return TransitionReport::rejected("submit_task", "an overlay is open");
    }
    let Some(idx) = state.task_index(task_id) else {
        return TransitionReport::rejected("submit_task", format!("unknown task {}", task_id));
    };

    state.stats.task_attempted += 1;
    let task = &state.tasks[idx];
    let correct = is_satisfied(task.message.answer.as_deref(), &task.draft);
    if correct {
        let task = state.tasks.remove(idx);
        state.retired.insert(task.id);
        state.stats.task_completed += 1;
    }

    TransitionReport {
        answer_correct: Some(correct),
        ..Default::default()
    }
}

fn apply_skip_task(state: &mut EngineState, task_id: &str) -> TransitionReport {
    if !state.scenario.rules.allow_skip_normals {
        return TransitionReport::rejected("skip_task", "skipping is disabled by the rules");
    }
    if state.overlay.is_open() {
        return TransitionReport::rejected("skip_task", "an overlay is open");
    }
    let Some(idx) = state.task_index(task_id) else {
        return TransitionReport::rejected("skip_task", format!("unknown task {}", task_id));
    };
    let task = state.tasks.remove(idx);
    state.retired.insert(task.id);
    TransitionReport::default()
}

// ---------------------------------------------------------------------------
// Dock
// ---------------------------------------------------------------------------

fn apply_toggle_open(state: &mut EngineState, item_id: &str) -> TransitionReport {
    if state.overlay.is_open() {
        return TransitionReport::rejected("toggle_open", "an overlay is open");
    }
    let Some(idx) = state.dock_index(item_id) else {
        return TransitionReport::rejected("toggle_open", format!("unknown item {}", item_id));
    };
    state.dock[idx].is_open = !state.dock[idx].is_open;
    TransitionReport::default()
}

fn apply_dismiss(state: &mut EngineState, item_id: &str, now: u64) -> TransitionReport {
    if state.overlay.is_open() {
        return TransitionReport::rejected("dismiss", "an overlay is open");
    }
    let Some(idx) = state.dock_index(item_id) else {
        return TransitionReport::rejected("dismiss", format!("unknown item {}", item_id));
    };

    let mut report = TransitionReport::default();
    let item = state.dock[idx].clone();

    if !item.is_critical() {
        state.dock.remove(idx);
        state.retired.insert(item.id);
        return report;
    }

    match item.stage {
        Stage::Initial => {
            state.dock.remove(idx);
            state.retired.insert(item.id);
            if !state.delayed.contains_key(&item.key) {
                state.delayed.insert(
                    item.key.clone(),
                    DelayedEntry {
                        key: item.key.clone(),
                        due_at: deadline_after(now, state.constants.stage_ms),
                        message: item.message,
                    },
                );
                report.delayed.push(item.key);
            }
        }
        Stage::Urgent => open_court(state, &item.message, &item.key, &mut report),
    }

    report
}

fn apply_resolve(state: &mut EngineState, item_id: &str) -> TransitionReport {
    if state.overlay.is_open() {
        return TransitionReport::rejected("resolve", "an overlay is open");
    }
    let Some(idx) = state.dock_index(item_id) else {
        return TransitionReport::rejected("resolve", format!("unknown item {}", item_id));
    };
    let item = &state.dock[idx];
    if !item.is_critical() {
        return TransitionReport::rejected("resolve", "only criticals can be resolved");
    }

    state.overlay = Overlay::CriticalAnswer(CriticalDialog {
        item_id: item.id.clone(),
        key: item.key.clone(),
        message: item.message.clone(),
        draft: String::new(),
    });
    state.countdown.running = false;
    TransitionReport::default()
}

// ---------------------------------------------------------------------------
// Critical dialog and verdict
// ---------------------------------------------------------------------------

fn apply_draft_critical(state: &mut EngineState, text: &str) -> TransitionReport {
    match &mut state.overlay {
        Overlay::CriticalAnswer(dialog) => {
            dialog.draft = text.to_string();
            TransitionReport::default()
        }
        _ => TransitionReport::rejected("draft_critical", "no critical dialog is open"),
    }
}

fn apply_submit_critical(state: &mut EngineState) -> TransitionReport {
    let Overlay::CriticalAnswer(dialog) = &state.overlay else {
        return TransitionReport::rejected("submit_critical", "no critical dialog is open");
    };

    let correct = is_satisfied(dialog.message.answer.as_deref(), &dialog.draft);
    if correct {
        let key = dialog.key.clone();
        let mut removed = Vec::new();
        state.dock.retain(|d| {
            if d.key == key {
                removed.push(d.id.clone());
                false
            } else {
                true
            }
        });
        state.retired.extend(removed);
        state.delayed.remove(&key);
        state.stats.critical_completed += 1;
        state.overlay = Overlay::None;
    }

    TransitionReport {
        answer_correct: Some(correct),
        ..Default::default()
    }
}

fn apply_exit_critical(state: &mut EngineState) -> TransitionReport {
    if !state.scenario.rules.allow_exit_criticals {
        return TransitionReport::rejected("exit_critical", "exiting is disabled by the rules");
    }
    let Overlay::CriticalAnswer(dialog) = &state.overlay else {
        return TransitionReport::rejected("exit_critical", "no critical dialog is open");
    };
    let message = dialog.message.clone();
    let key = dialog.key.clone();

    let mut report = TransitionReport::default();
    open_court(state, &message, &key, &mut report);
    report
}

fn apply_dismiss_verdict(state: &mut EngineState) -> TransitionReport {
    let Overlay::Verdict(verdict) = &state.overlay else {
        return TransitionReport::rejected("dismiss_verdict", "no verdict is shown");
    };
    state.overlay = if verdict.can_return {
        Overlay::None
    } else {
        Overlay::Summary
    };
    TransitionReport::default()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EngineConstants, MessageCategory, Scenario, Severity};
    use crate::state::create_initial_state;

    fn message(category: MessageCategory, text: &str, answer: &str) -> Message {
        Message {
            id: None,
            category,
            severity: (category == MessageCategory::Critical).then_some(Severity::Major),
            text: text.to_string(),
            answer: Some(answer.to_string()),
            court_outcome: None,
        }
    }

    fn state_with(messages: Vec<Message>) -> EngineState {
        let scenario = Scenario {
            messages,
            ..Scenario::empty()
        };
        create_initial_state(&scenario, &EngineConstants::default(), 0)
    }

    fn apply(state: &EngineState, at: u64, action: Action) -> (EngineState, TransitionReport) {
        apply_action(state, &ActionEnvelope::new(1, at, action))
    }

    #[test]
    fn slot_waits_for_interval_and_running() {
        let s = state_with(vec![message(MessageCategory::Interruption, "n", "")]);
        let (s, _) = apply(&s, 0, Action::Start);
        let (s, r) = apply(&s, 29_999, Action::Advance);
        assert!(r.delivered.is_empty());
        let (s, r) = apply(&s, 30_000, Action::Advance);
        assert_eq!(r.delivered, vec!["i1".to_string()]);
        assert_eq!(s.dock.len(), 1);
        assert_eq!(s.scheduler.non_critical_gap, 1);

        let (stopped, _) = apply(&s, 30_000, Action::Stop);
        assert!(stopped.pool_normals.is_empty());
    }

    #[test]
    fn stopped_session_never_schedules() {
        let s = state_with(vec![message(MessageCategory::Interruption, "n", "")]);
        let (s, r) = apply(&s, 600_000, Action::Advance);
        assert!(r.delivered.is_empty());
        assert!(s.dock.is_empty());
    }

    #[test]
    fn first_critical_is_admitted_at_first_slot() {
        let s = state_with(vec![
            message(MessageCategory::Interruption, "n", ""),
            message(MessageCategory::Critical, "c", "yes"),
        ]);
        let (s, _) = apply(&s, 0, Action::Start);
        let (s, _) = apply(&s, 30_000, Action::Advance);
        assert_eq!(s.dock.len(), 1);
        assert!(s.dock[0].is_critical());
        assert_eq!(s.dock[0].stage_deadline_at, Some(150_000));
        assert_eq!(s.stats.critical_notified, 1);
    }

    #[test]
    fn rejected_action_leaves_state_untouched() {
        let s = state_with(vec![]);
        let (next, r) = apply(&s, 0, Action::Dismiss { item_id: "nope".to_string() });
        assert!(!r.accepted);
        assert_eq!(r.action, "dismiss");
        assert_eq!(next, s);
    }

    #[test]
    fn resolve_pauses_and_blocks_start() {
        let s = state_with(vec![message(MessageCategory::Critical, "c", "yes")]);
        let (s, _) = apply(&s, 0, Action::Start);
        let (s, _) = apply(&s, 30_000, Action::Advance);
        let id = s.dock[0].id.clone();
        let (s, _) = apply(&s, 31_000, Action::Resolve { item_id: id });
        assert!(!s.countdown.running);
        assert_eq!(s.overlay.name(), "criticalAnswer");
        let (_, r) = apply(&s, 32_000, Action::Start);
        assert!(!r.accepted);
    }

    #[test]
    fn wrong_critical_answer_keeps_dialog_open() {
        let s = state_with(vec![message(MessageCategory::Critical, "c", "yes")]);
        let (s, _) = apply(&s, 0, Action::Start);
        let (s, _) = apply(&s, 30_000, Action::Advance);
        let id = s.dock[0].id.clone();
        let (s, _) = apply(&s, 31_000, Action::Resolve { item_id: id });
        let (s, _) = apply(&s, 31_000, Action::DraftCritical { text: "no".to_string() });
        let (s, r) = apply(&s, 31_000, Action::SubmitCritical);
        assert_eq!(r.answer_correct, Some(false));
        assert_eq!(s.overlay.name(), "criticalAnswer");

        let (s, _) = apply(&s, 31_000, Action::DraftCritical { text: " YES ".to_string() });
        let (s, r) = apply(&s, 31_000, Action::SubmitCritical);
        assert_eq!(r.answer_correct, Some(true));
        assert_eq!(s.overlay, Overlay::None);
        assert!(s.dock.is_empty());
        assert_eq!(s.stats.critical_completed, 1);
    }

    #[test]
    fn exit_critical_respects_rules() {
        let mut s = state_with(vec![message(MessageCategory::Critical, "c", "yes")]);
        s.scenario.rules.allow_exit_criticals = false;
        let (s, _) = apply(&s, 0, Action::Start);
        let (s, _) = apply(&s, 30_000, Action::Advance);
        let id = s.dock[0].id.clone();
        let (s, _) = apply(&s, 31_000, Action::Resolve { item_id: id });
        let (_, r) = apply(&s, 31_000, Action::ExitCritical);
        assert!(!r.accepted);
    }

    #[test]
    fn skip_task_respects_rules() {
        let mut s = state_with(vec![message(MessageCategory::Task, "t", "ok")]);
        let (skipped, r) = apply(&s, 0, Action::SkipTask { task_id: "i1".to_string() });
        assert!(r.accepted);
        assert!(skipped.tasks.is_empty());
        assert_eq!(skipped.stats.task_attempted, 0);

        s.scenario.rules.allow_skip_normals = false;
        let (_, r) = apply(&s, 0, Action::SkipTask { task_id: "i1".to_string() });
        assert!(!r.accepted);
    }

    #[test]
    fn wrong_task_answer_counts_attempt_only() {
        let s = state_with(vec![message(MessageCategory::Task, "t", "ok")]);
        let (s, _) = apply(&s, 0, Action::DraftTask { task_id: "i1".to_string(), text: "nope".to_string() });
        let (s, r) = apply(&s, 0, Action::SubmitTask { task_id: "i1".to_string() });
        assert_eq!(r.answer_correct, Some(false));
        assert_eq!(s.stats.task_attempted, 1);
        assert_eq!(s.stats.task_completed, 0);
        assert_eq!(s.tasks.len(), 1);
    }

    #[test]
    fn verdict_without_return_routes_to_summary() {
        let mut m = message(MessageCategory::Critical, "c", "yes");
        m.court_outcome = Some(crate::domain::CourtOutcome {
            can_return: Some(false),
            ..Default::default()
        });
        let s = state_with(vec![m]);
        let (s, _) = apply(&s, 0, Action::Start);
        let (s, _) = apply(&s, 30_000, Action::Advance);
        let id = s.dock[0].id.clone();
        let (s, _) = apply(&s, 31_000, Action::Resolve { item_id: id });
        let (s, r) = apply(&s, 31_000, Action::ExitCritical);
        assert!(r.verdict.is_some());
        let (s, _) = apply(&s, 32_000, Action::DismissVerdict);
        assert_eq!(s.overlay, Overlay::Summary);

        let (_, r) = apply(&s, 33_000, Action::Start);
        assert!(!r.accepted);
        let (s, r) = apply(&s, 33_000, Action::Reset);
        assert!(r.accepted);
        assert_eq!(s.overlay, Overlay::None);
        assert_eq!(s.stats, Default::default());
        assert_eq!(s.pool_criticals.len(), 1);
    }

    #[test]
    fn enforced_limits_force_summary() {
        let s = state_with(vec![message(MessageCategory::Critical, "c", "yes")]);
        let mut s = s;
        s.constants.enforce_fail_limits = true;
        s.scenario.rules.major_limit = 1;
        let (s, _) = apply(&s, 0, Action::Start);
        let (s, _) = apply(&s, 30_000, Action::Advance);
        let id = s.dock[0].id.clone();
        let (s, _) = apply(&s, 31_000, Action::Resolve { item_id: id });
        let (s, _) = apply(&s, 31_000, Action::ExitCritical);
        match &s.overlay {
            Overlay::Verdict(v) => assert!(!v.can_return),
            other => panic!("expected verdict, got {:?}", other),
        }
    }

    #[test]
    fn countdown_only_ticks_while_running() {
        let s = state_with(vec![]);
        let (s, _) = apply(&s, 1_000, Action::CountdownTick);
        assert_eq!(s.countdown.seconds_left, 300);
        let (s, _) = apply(&s, 1_000, Action::Start);
        let (s, _) = apply(&s, 2_000, Action::CountdownTick);
        assert_eq!(s.countdown.seconds_left, 299);
    }
}
