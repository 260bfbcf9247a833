/// Courtroom Engine: Verdict Resolver
///
/// Field-by-field fallback from the failing message to scenario defaults.
/// Never rejects: malformed outcomes resolve to something presentable.

use crate::domain::{
    EngineConstants, Message, Scenario, SessionStats, Verdict, DEFAULT_COURT_BACKGROUND_URL,
    DEFAULT_PUNISHMENT,
};

/// Effective court outcome for `message` within `scenario`.
pub fn resolve_verdict(message: &Message, scenario: &Scenario) -> Verdict {
    let outcome = message.court_outcome.as_ref();

    let punishment = outcome
        .map(|o| o.punishment.as_str())
        .filter(|p| !p.is_empty())
        .or_else(|| Some(scenario.punishment_text.as_str()).filter(|p| !p.is_empty()))
        .unwrap_or(DEFAULT_PUNISHMENT)
        .to_string();

    let reason = outcome.map(|o| o.reason.clone()).unwrap_or_default();

    let can_return = outcome.and_then(|o| o.can_return).unwrap_or(true);

    let background_url = outcome
        .and_then(|o| {
            o.background_data_uri
                .as_deref()
                .filter(|u| !u.is_empty())
                .or(o.background_url.as_deref().filter(|u| !u.is_empty()))
        })
        .unwrap_or(DEFAULT_COURT_BACKGROUND_URL)
        .to_string();

    Verdict {
        item_key: message.key(),
        severity: message.severity,
        punishment,
        reason,
        can_return,
        background_url,
    }
}

/// Record one failed critical in `stats`. Anything not `major` counts as minor.
pub fn record_failure(stats: &mut SessionStats, message: &Message) {
    stats.critical_failed += 1;
    if message.is_major() {
        stats.major_fails += 1;
    } else {
        stats.minor_fails += 1;
    }
}

/// Whether the configured fail limits have been reached. Only consulted when
/// `enforce_fail_limits` is on.
pub fn limits_reached(stats: &SessionStats, scenario: &Scenario, constants: &EngineConstants) -> bool {
    constants.enforce_fail_limits
        && (stats.major_fails >= scenario.rules.major_limit
            || stats.minor_fails >= scenario.rules.minor_limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CourtOutcome, MessageCategory, Severity};

    fn critical(outcome: Option<CourtOutcome>) -> Message {
        Message {
            id: None,
            category: MessageCategory::Critical,
            severity: Some(Severity::Major),
            text: "Patch the server".to_string(),
            answer: Some("done".to_string()),
            court_outcome: outcome,
        }
    }

    #[test]
    fn punishment_falls_back_to_scenario_text() {
        let mut scenario = Scenario::empty();
        scenario.punishment_text = "X".to_string();
        let v = resolve_verdict(&critical(None), &scenario);
        assert_eq!(v.punishment, "X");
        assert!(v.can_return);
        assert_eq!(v.background_url, DEFAULT_COURT_BACKGROUND_URL);
        assert_eq!(v.reason, "");
    }

    #[test]
    fn punishment_falls_back_to_generic_string() {
        let mut scenario = Scenario::empty();
        scenario.punishment_text.clear();
        let outcome = CourtOutcome {
            reason: "Breach".to_string(),
            ..Default::default()
        };
        let v = resolve_verdict(&critical(Some(outcome)), &scenario);
        assert_eq!(v.punishment, DEFAULT_PUNISHMENT);
        assert_eq!(v.reason, "Breach");
    }

    #[test]
    fn message_outcome_wins_field_by_field() {
        let scenario = Scenario::empty();
        let outcome = CourtOutcome {
            punishment: "3 months suspension".to_string(),
            reason: "Breach of Privacy Act".to_string(),
            can_return: Some(false),
            background_url: Some("/court/a.png".to_string()),
            background_data_uri: None,
        };
        let v = resolve_verdict(&critical(Some(outcome)), &scenario);
        assert_eq!(v.punishment, "3 months suspension");
        assert!(!v.can_return);
        assert_eq!(v.background_url, "/court/a.png");
        assert_eq!(v.item_key, "Patch the server|major");
    }

    #[test]
    fn embedded_background_preferred() {
        let outcome = CourtOutcome {
            background_url: Some("/court/a.png".to_string()),
            background_data_uri: Some("data:image/png;base64,AA".to_string()),
            ..Default::default()
        };
        let v = resolve_verdict(&critical(Some(outcome)), &Scenario::empty());
        assert_eq!(v.background_url, "data:image/png;base64,AA");
    }

    #[test]
    fn failures_split_by_severity() {
        let mut stats = SessionStats::default();
        let mut m = critical(None);
        record_failure(&mut stats, &m);
        m.severity = Some(Severity::Minor);
        record_failure(&mut stats, &m);
        m.severity = None;
        record_failure(&mut stats, &m);
        assert_eq!(stats.critical_failed, 3);
        assert_eq!(stats.major_fails, 1);
        assert_eq!(stats.minor_fails, 2);
    }

    #[test]
    fn limits_only_checked_when_enforced() {
        let scenario = Scenario::empty();
        let stats = SessionStats {
            major_fails: 2,
            ..Default::default()
        };
        let mut constants = EngineConstants::default();
        assert!(!limits_reached(&stats, &scenario, &constants));
        constants.enforce_fail_limits = true;
        assert!(limits_reached(&stats, &scenario, &constants));
    }
}
