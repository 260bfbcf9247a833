//! Live session: the engine driven by two timers over an injected clock.
//!
//! Timers:
//!   countdown   every `countdown_tick_ms`, armed only while running;
//!               the first decrement comes one period after start
//!   engine tick every `engine_tick_ms`, armed for the whole run
//!
//! `pump()` fires every due timer in scheduled-time order (countdown first
//! on ties), each stamped with its scheduled instant, so a late pump
//! replays exactly what an on-time one would have. Player actions pump
//! first and are stamped with the current time.
//!
//! Persist-after-apply: with a recorder attached, an action is logged only
//! after the engine accepted the envelope.

use std::path::Path;

use tracing::{debug, info};

use courtroom_engine::domain::Overlay;
use courtroom_engine::{
    Action, ActionEnvelope, Clock, CourtroomEngine, EngineConstants, EngineState, Scenario,
    TransitionReport,
};

use crate::error::Result;
use crate::live::LiveView;
use crate::recording::{Recorder, SessionHeader};

pub struct Session<C: Clock> {
    clock: C,
    engine: CourtroomEngine,
    recorder: Option<Recorder>,
    next_tick_at: Option<u64>,
    next_countdown_at: Option<u64>,
    last_view: Option<LiveView>,
}

impl<C: Clock> Session<C> {
    /// Paused session starting at the clock's current time.
    pub fn new(scenario: &Scenario, constants: &EngineConstants, clock: C) -> Self {
        let now = clock.now_ms();
        let engine = CourtroomEngine::new(scenario, constants, now);
        info!(
            messages = scenario.messages.len(),
            seconds = engine.state().countdown.total_seconds,
            "session created"
        );
        Self {
            clock,
            engine,
            recorder: None,
            next_tick_at: Some(now + constants.engine_tick_ms),
            next_countdown_at: None,
            last_view: None,
        }
    }

    /// Like `new`, but every applied action is recorded under
    /// `<base_dir>/<session_id>`.
    pub fn recorded(
        scenario: &Scenario,
        constants: &EngineConstants,
        clock: C,
        base_dir: &Path,
        session_id: &str,
        snapshot_interval: u64,
    ) -> Result<Self> {
        let mut session = Self::new(scenario, constants, clock);
        let header = SessionHeader::new(session_id, scenario, constants, session.engine.started_at())?;
        session.recorder = Some(Recorder::create(base_dir, &header, snapshot_interval)?);
        Ok(session)
    }

    /// Fire every timer due at the current time. Returns how many fired.
    pub fn pump(&mut self) -> Result<usize> {
        let now = self.clock.now_ms();
        let constants = self.engine.state().constants.clone();
        let mut fired = 0;

        loop {
            let countdown = self.next_countdown_at.filter(|t| *t <= now);
            let tick = self.next_tick_at.filter(|t| *t <= now);

            let (action, at) = match (countdown, tick) {
                (None, None) => break,
                (Some(c), Some(t)) if t < c => (Action::Advance, t),
                (Some(c), _) => (Action::CountdownTick, c),
                (None, Some(t)) => (Action::Advance, t),
            };
            match action {
                Action::CountdownTick => {
                    self.next_countdown_at = Some(at + constants.countdown_tick_ms)
                }
                _ => self.next_tick_at = Some(at + constants.engine_tick_ms),
            }
            self.apply(action, at)?;
            fired += 1;
        }

        if fired > 1 {
            debug!(fired, now, "timers caught up");
        }
        Ok(fired)
    }

    /// Apply a player action at the current time, after catching timers up.
    pub fn dispatch(&mut self, action: Action) -> Result<TransitionReport> {
        self.pump()?;
        let now = self.clock.now_ms();
        self.apply(action, now)
    }

    fn apply(&mut self, action: Action, at: u64) -> Result<TransitionReport> {
        let envelope = ActionEnvelope::new(self.engine.last_sequence() + 1, at, action);
        let report = self.engine.apply(&envelope)?;

        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record(&envelope, self.engine.state())?;
        }

        if matches!(envelope.action, Action::Reset) {
            info!(at, "session reset");
            self.next_tick_at = Some(at + self.engine.state().constants.engine_tick_ms);
            self.next_countdown_at = None;
        }
        self.rearm(at);
        Ok(report)
    }

    fn rearm(&mut self, at: u64) {
        let state = self.engine.state();
        if matches!(state.overlay, Overlay::Summary) {
            self.next_tick_at = None;
            self.next_countdown_at = None;
            return;
        }
        if self.next_tick_at.is_none() {
            self.next_tick_at = Some(at + state.constants.engine_tick_ms);
        }
        if state.countdown.running {
            if self.next_countdown_at.is_none() {
                self.next_countdown_at = Some(at + state.constants.countdown_tick_ms);
            }
        } else {
            self.next_countdown_at = None;
        }
    }

    /// Projection at the current time.
    pub fn view(&self) -> LiveView {
        LiveView::project(self.engine.state(), self.clock.now_ms())
    }

    /// The current projection if it differs from the last one returned.
    pub fn changed_view(&mut self) -> Option<LiveView> {
        let view = self.view();
        if self.last_view.as_ref() == Some(&view) {
            return None;
        }
        self.last_view = Some(view.clone());
        Some(view)
    }

    pub fn state(&self) -> &EngineState {
        self.engine.state()
    }

    pub fn engine(&self) -> &CourtroomEngine {
        &self.engine
    }

    pub fn hash(&self) -> Result<String> {
        Ok(self.engine.hash()?)
    }

    pub fn sequence(&self) -> u64 {
        self.engine.last_sequence()
    }

    pub fn ended(&self) -> bool {
        matches!(self.engine.state().overlay, Overlay::Summary)
    }

    pub fn recording_dir(&self) -> Option<&Path> {
        self.recorder.as_ref().map(Recorder::dir)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Next instant a timer is due, for drivers that sleep between pumps.
    pub fn next_due(&self) -> Option<u64> {
        match (self.next_tick_at, self.next_countdown_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}
