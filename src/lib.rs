//! Weekly reflection tracker.
//!
//! A signed-in user keeps three development goals, confirms (locks) them,
//! records weekly reflection entries against a confirmed goal and follows a
//! per-goal progress trend. Records live in a hosted store; the `Tracker`
//! orchestrates everything for one session and reports through a
//! `TrackerRuntime`.

pub mod backend;
#[cfg(feature = "cli")]
pub mod cli;
pub mod entries;
pub mod error;
pub mod form;
pub mod goals;
pub mod runtime;
pub mod session;
pub mod settings;
pub mod state;
pub mod trend;


pub use error::{Result, TrackerError};
pub use state::Tracker;
