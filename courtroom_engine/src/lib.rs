#![forbid(unsafe_code)]

/// Engine v1. Behavioral changes that alter replay results bump this.
pub const ENGINE_VERSION: u32 = 1;

pub mod timing;
pub mod domain;
pub mod actions;
pub mod error;
pub mod clock;
pub mod state;
pub mod judge;
pub mod court;
pub mod transitions;
pub mod invariants;
pub mod hashing;
pub mod trace;
pub mod engine;

pub use actions::{Action, ActionEnvelope};
pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{EngineConstants, EngineState, Scenario, TransitionReport};
pub use engine::CourtroomEngine;
pub use error::EngineError;
pub use trace::TraceFrame;
