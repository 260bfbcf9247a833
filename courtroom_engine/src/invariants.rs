/// Courtroom Engine: Invariant Checks
///
/// Structural checks run after every applied action. `try_validate_invariants`
/// returns the first failure.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{EngineState, MessageCategory, Overlay, Stage};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run every check.
/// Returns `Err(message)` on the first failure, `Ok(())` if all pass.
pub fn try_validate_invariants(state: &EngineState) -> Result<(), String> {
    check_disjoint_sets(state)?;
    check_retired(state)?;
    check_identity_format(state)?;
    check_pool_categories(state)?;
    check_stages(state)?;
    check_single_urgent_per_key(state)?;
    check_delayed_keys(state)?;
    check_dialog(state)?;
    check_overlay_pauses(state)?;
    check_countdown(state)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Individual checks
// ---------------------------------------------------------------------------

fn live_ids(state: &EngineState) -> impl Iterator<Item = (&'static str, &str)> {
    state
        .tasks
        .iter()
        .map(|t| ("tasks", t.id.as_str()))
        .chain(state.pool_normals.iter().map(|d| ("poolNormals", d.id.as_str())))
        .chain(state.pool_criticals.iter().map(|d| ("poolCriticals", d.id.as_str())))
        .chain(state.dock.iter().map(|d| ("dock", d.id.as_str())))
}

/// An identity lives in at most one of tasks, pools and dock.
fn check_disjoint_sets(state: &EngineState) -> Result<(), String> {
    let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
    for (set, id) in live_ids(state) {
        if let Some(prev) = seen.insert(id, set) {
            return Err(format!(
                "[INVARIANT:disjoint_sets] Identity {:?} present in both {} and {}",
                id, prev, set
            ));
        }
    }
    Ok(())
}

/// Terminally removed identities never come back.
fn check_retired(state: &EngineState) -> Result<(), String> {
    for (set, id) in live_ids(state) {
        if state.retired.contains(id) {
            return Err(format!(
                "[INVARIANT:retired] Retired identity {:?} reappeared in {}",
                id, set
            ));
        }
    }
    Ok(())
}

fn check_identity_format(state: &EngineState) -> Result<(), String> {
    let ids = live_ids(state)
        .map(|(_, id)| id)
        .chain(state.retired.iter().map(String::as_str));
    for id in ids {
        let n = id
            .strip_prefix('i')
            .and_then(|n| n.parse::<u64>().ok())
            .ok_or_else(|| format!("[INVARIANT:identity_format] Malformed identity {:?}", id))?;
        if n == 0 || n > state.next_uid {
            return Err(format!(
                "[INVARIANT:identity_format] Identity {:?} outside issued range 1..={}",
                id, state.next_uid
            ));
        }
    }
    Ok(())
}

fn check_pool_categories(state: &EngineState) -> Result<(), String> {
    if let Some(t) = state
        .tasks
        .iter()
        .find(|t| t.message.category != MessageCategory::Task)
    {
        return Err(format!("[INVARIANT:pool_category] Task {:?} is not a task message", t.id));
    }
    if let Some(d) = state
        .pool_normals
        .iter()
        .find(|d| d.message.category != MessageCategory::Interruption)
    {
        return Err(format!(
            "[INVARIANT:pool_category] Normal pool item {:?} is not an interruption",
            d.id
        ));
    }
    if let Some(d) = state.pool_criticals.iter().find(|d| !d.is_critical()) {
        return Err(format!(
            "[INVARIANT:pool_category] Critical pool item {:?} is not a critical",
            d.id
        ));
    }
    if let Some(d) = state
        .dock
        .iter()
        .find(|d| d.message.category == MessageCategory::Task)
    {
        return Err(format!("[INVARIANT:pool_category] Task message {:?} in the dock", d.id));
    }
    Ok(())
}

/// Dock criticals carry a deadline; everything else is an undated `initial`.
fn check_stages(state: &EngineState) -> Result<(), String> {
    for d in &state.dock {
        if d.is_critical() {
            if d.stage_deadline_at.is_none() {
                return Err(format!(
                    "[INVARIANT:stage] Critical {:?} in the dock has no deadline",
                    d.id
                ));
            }
        } else if d.stage != Stage::Initial || d.stage_deadline_at.is_some() {
            return Err(format!(
                "[INVARIANT:stage] Non-critical {:?} carries a stage timer",
                d.id
            ));
        }
    }
    for d in state.pool_normals.iter().chain(state.pool_criticals.iter()) {
        if d.stage != Stage::Initial || d.stage_deadline_at.is_some() {
            return Err(format!(
                "[INVARIANT:stage] Pooled item {:?} has already been staged",
                d.id
            ));
        }
    }
    Ok(())
}

fn check_single_urgent_per_key(state: &EngineState) -> Result<(), String> {
    let mut urgent: BTreeSet<&str> = BTreeSet::new();
    for d in state.dock.iter().filter(|d| d.stage == Stage::Urgent) {
        if !urgent.insert(d.key.as_str()) {
            return Err(format!(
                "[INVARIANT:urgent_key] Key {:?} is urgent more than once in the dock",
                d.key
            ));
        }
    }
    Ok(())
}

fn check_delayed_keys(state: &EngineState) -> Result<(), String> {
    for (key, entry) in &state.delayed {
        if key != &entry.key || entry.message.key() != entry.key {
            return Err(format!(
                "[INVARIANT:delayed] Delayed entry filed under {:?} carries key {:?}",
                key, entry.key
            ));
        }
        if !entry.message.is_critical() {
            return Err(format!(
                "[INVARIANT:delayed] Delayed entry {:?} is not a critical",
                key
            ));
        }
    }
    Ok(())
}

/// An open dialog points at a critical currently in the dock.
fn check_dialog(state: &EngineState) -> Result<(), String> {
    if let Overlay::CriticalAnswer(dialog) = &state.overlay {
        match state.dock.iter().find(|d| d.id == dialog.item_id) {
            Some(d) if d.is_critical() && d.key == dialog.key => {}
            _ => {
                return Err(format!(
                    "[INVARIANT:dialog] Dialog item {:?} is not a critical in the dock",
                    dialog.item_id
                ))
            }
        }
    }
    Ok(())
}

fn check_overlay_pauses(state: &EngineState) -> Result<(), String> {
    if state.overlay.is_open() && state.countdown.running {
        return Err(format!(
            "[INVARIANT:modal_pause] Countdown running under the {} overlay",
            state.overlay.name()
        ));
    }
    Ok(())
}

fn check_countdown(state: &EngineState) -> Result<(), String> {
    let c = &state.countdown;
    if c.total_seconds == 0 || c.seconds_left > c.total_seconds {
        return Err(format!(
            "[INVARIANT:countdown] {} seconds left of {}",
            c.seconds_left, c.total_seconds
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EngineConstants, Message, Scenario, Severity};
    use crate::state::create_initial_state;

    fn state() -> EngineState {
        let critical = Message {
            id: None,
            category: MessageCategory::Critical,
            severity: Some(Severity::Minor),
            text: "c".to_string(),
            answer: Some("a".to_string()),
            court_outcome: None,
        };
        let scenario = Scenario {
            messages: vec![critical.clone(), critical],
            ..Scenario::empty()
        };
        create_initial_state(&scenario, &EngineConstants::default(), 0)
    }

    #[test]
    fn fresh_state_passes() {
        assert_eq!(try_validate_invariants(&state()), Ok(()));
    }

    #[test]
    fn duplicated_identity_is_caught() {
        let mut s = state();
        let mut item = s.pool_criticals[0].clone();
        item.stage_deadline_at = Some(1);
        s.dock.push(item);
        let err = try_validate_invariants(&s).unwrap_err();
        assert!(err.contains("disjoint_sets"), "{}", err);
    }

    #[test]
    fn two_urgent_copies_of_one_key_are_caught() {
        let mut s = state();
        for _ in 0..2 {
            let mut item = s.pool_criticals.pop_front().unwrap();
            item.stage = Stage::Urgent;
            item.stage_deadline_at = Some(10);
            s.dock.push(item);
        }
        let err = try_validate_invariants(&s).unwrap_err();
        assert!(err.contains("urgent_key"), "{}", err);
    }

    #[test]
    fn retired_identity_is_caught() {
        let mut s = state();
        s.retired.insert("i1".to_string());
        let err = try_validate_invariants(&s).unwrap_err();
        assert!(err.contains("retired"), "{}", err);
    }

    #[test]
    fn running_under_summary_is_caught() {
        let mut s = state();
        s.countdown.running = true;
        s.overlay = Overlay::Summary;
        assert!(try_validate_invariants(&s).is_err());
    }
}
