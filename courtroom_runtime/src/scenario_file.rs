//! Scenario files in the authoring tool's JSON format.
//!
//! Loading checks JSON shape only. Incomplete content (a critical without a
//! severity, an item nobody can answer) is reported as lint, never rejected.

use std::fs;
use std::path::Path;

use tracing::warn;

use courtroom_engine::domain::MessageCategory;
use courtroom_engine::Scenario;

use crate::error::Result;

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let content = fs::read_to_string(path)?;
    let scenario: Scenario = serde_json::from_str(&content)?;
    for finding in lint(&scenario) {
        warn!(file = %path.display(), "{}", finding);
    }
    Ok(scenario)
}

/// Completeness problems worth telling the author about.
pub fn lint(scenario: &Scenario) -> Vec<String> {
    let mut findings = Vec::new();

    for (i, m) in scenario.messages.iter().enumerate() {
        let n = i + 1;
        let answerable = m.answer.as_deref().is_some_and(|a| !a.trim().is_empty());
        match m.category {
            MessageCategory::Task if !answerable => {
                findings.push(format!("message {}: task has no answer and can never be completed", n));
            }
            MessageCategory::Critical => {
                if m.severity.is_none() {
                    findings.push(format!("message {}: critical has no severity, failures count as minor", n));
                }
                if !answerable {
                    findings.push(format!("message {}: critical has no answer and can only end in court", n));
                }
            }
            _ => {}
        }
        if m.text.trim().is_empty() {
            findings.push(format!("message {}: empty text", n));
        }
    }

    if scenario.timer_minutes == 0 {
        findings.push("timerMinutes is 0, the default of 5 minutes applies".to_string());
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use courtroom_engine::domain::{Message, Severity};

    #[test]
    fn lint_flags_unanswerable_and_unrated_items() {
        let scenario = Scenario {
            messages: vec![
                Message {
                    id: None,
                    category: MessageCategory::Task,
                    severity: None,
                    text: "Write it".to_string(),
                    answer: Some("  ".to_string()),
                    court_outcome: None,
                },
                Message {
                    id: None,
                    category: MessageCategory::Critical,
                    severity: None,
                    text: "Fix it".to_string(),
                    answer: Some("ok".to_string()),
                    court_outcome: None,
                },
                Message {
                    id: None,
                    category: MessageCategory::Critical,
                    severity: Some(Severity::Major),
                    text: "Fine".to_string(),
                    answer: Some("ok".to_string()),
                    court_outcome: None,
                },
            ],
            ..Scenario::empty()
        };
        let findings = lint(&scenario);
        assert_eq!(findings.len(), 2);
        assert!(findings[0].starts_with("message 1: task has no answer"));
        assert!(findings[1].starts_with("message 2: critical has no severity"));
    }
}
