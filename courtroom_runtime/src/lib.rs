#![forbid(unsafe_code)]

//! Courtroom Runtime
//!
//! Drives the courtroom engine live over a clock, renders it as text or as a
//! self-contained HTML document, and records, replays and verifies sessions.
//!
//! No domain logic lives here. All transitions and invariants are
//! delegated to the engine.

use tracing_subscriber::{fmt, EnvFilter};

pub mod error;
pub mod config;
pub mod scenario_file;
pub mod proto_types;
pub mod proto_bridge;
pub mod action_store;
pub mod snapshot_codec;
pub mod snapshot;
pub mod recording;
pub mod replay;
pub mod conformance;
pub mod icons;
pub mod live;
pub mod export;
pub mod session;

pub use error::{Result, RuntimeError};
pub use session::Session;

/// Initialize logging with a default filter.
///
/// Use `RUST_LOG` environment variable to override the default filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,courtroom_runtime=debug,courtroom_engine=info")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
