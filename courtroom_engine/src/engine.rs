/// Courtroom Engine: Engine
///
/// Top-level orchestrator. Delegates mutation to transitions,
/// validates via invariants.
///
/// Strict sequence enforcement, monotonic action time.

use tracing::{debug, warn};

use crate::actions::ActionEnvelope;
use crate::domain::{EngineConstants, EngineState, Scenario, TransitionReport};
use crate::error::EngineError;
use crate::hashing::canonical_hash;
use crate::invariants::try_validate_invariants;
use crate::state::create_initial_state;
use crate::transitions::apply_action;

/// Stateful engine wrapping the pure functional transition layer.
#[derive(Debug, Clone)]
pub struct CourtroomEngine {
    state: EngineState,
    started_at: u64,
    last_sequence: u64,
    last_at: u64,
}

impl CourtroomEngine {
    /// Fresh, paused engine for `scenario` whose clock starts at `now`.
    pub fn new(scenario: &Scenario, constants: &EngineConstants, now: u64) -> Self {
        Self {
            state: create_initial_state(scenario, constants, now),
            started_at: now,
            last_sequence: 0,
            last_at: now,
        }
    }

    /// Resume from a previously captured state.
    pub fn from_state(state: EngineState, last_sequence: u64, last_at: u64) -> Result<Self, EngineError> {
        try_validate_invariants(&state).map_err(EngineError::InvariantViolation)?;
        Ok(Self {
            state,
            started_at: last_at,
            last_sequence,
            last_at,
        })
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn last_at(&self) -> u64 {
        self.last_at
    }

    pub fn started_at(&self) -> u64 {
        self.started_at
    }

    pub fn hash(&self) -> Result<String, EngineError> {
        canonical_hash(&self.state)
    }

    /// Apply a single action:
    ///   1. Validate sequence (strictly increasing, no gaps)
    ///   2. Validate time (never earlier than the previous action)
    ///   3. Delegate to transitions::apply_action
    ///   4. Validate invariants on the new state
    ///   5. Store and report
    pub fn apply(&mut self, envelope: &ActionEnvelope) -> Result<TransitionReport, EngineError> {
        let expected = self.last_sequence + 1;
        if envelope.sequence != expected {
            return Err(EngineError::SequenceViolation {
                expected,
                got: envelope.sequence,
            });
        }
        if envelope.at < self.last_at {
            return Err(EngineError::TimeWentBackwards {
                last: self.last_at,
                got: envelope.at,
            });
        }

        let (new_state, report) = apply_action(&self.state, envelope);
        try_validate_invariants(&new_state).map_err(EngineError::InvariantViolation)?;

        if report.accepted {
            if !envelope.action.is_timer() || report.verdict.is_some() {
                debug!(
                    seq = envelope.sequence,
                    at = envelope.at,
                    action = %report.action,
                    "action applied"
                );
            }
        } else if !envelope.action.is_timer() {
            warn!(
                seq = envelope.sequence,
                action = %report.action,
                reason = %report.reason,
                "action rejected"
            );
        }

        self.state = new_state;
        self.last_sequence = envelope.sequence;
        self.last_at = envelope.at;
        Ok(report)
    }

    /// Apply an ordered sequence of actions.
    pub fn apply_sequence(&mut self, envelopes: &[ActionEnvelope]) -> Result<&EngineState, EngineError> {
        for envelope in envelopes {
            self.apply(envelope)?;
        }
        Ok(&self.state)
    }

    /// Action-sourced reconstruction: fresh engine, then every action in order.
    pub fn replay(
        scenario: &Scenario,
        constants: &EngineConstants,
        started_at: u64,
        envelopes: &[ActionEnvelope],
    ) -> Result<Self, EngineError> {
        let mut engine = Self::new(scenario, constants, started_at);
        engine.apply_sequence(envelopes)?;
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Action;

    #[test]
    fn sequence_gap_is_an_error() {
        let mut e = CourtroomEngine::new(&Scenario::empty(), &EngineConstants::default(), 0);
        let err = e.apply(&ActionEnvelope::new(2, 0, Action::Start)).unwrap_err();
        assert_eq!(err, EngineError::SequenceViolation { expected: 1, got: 2 });
        assert_eq!(e.last_sequence(), 0);
    }

    #[test]
    fn time_may_not_go_backwards() {
        let mut e = CourtroomEngine::new(&Scenario::empty(), &EngineConstants::default(), 1_000);
        e.apply(&ActionEnvelope::new(1, 2_000, Action::Start)).unwrap();
        let err = e.apply(&ActionEnvelope::new(2, 1_500, Action::Advance)).unwrap_err();
        assert_eq!(err, EngineError::TimeWentBackwards { last: 2_000, got: 1_500 });
    }

    #[test]
    fn rejected_action_still_consumes_sequence() {
        let mut e = CourtroomEngine::new(&Scenario::empty(), &EngineConstants::default(), 0);
        let report = e.apply(&ActionEnvelope::new(1, 0, Action::SubmitCritical)).unwrap();
        assert!(!report.accepted);
        assert_eq!(e.last_sequence(), 1);
    }
}
