// Runtime abstraction between the tracker core and its front end.
//
// The core never prints or prompts. It emits `RuntimeEvent`s and asks the
// runtime for yes/no confirmations; the front end decides how to show them.

use std::any::Any;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::entries::ReflectionEntry;
use crate::form::{Draft, GoalOption};
use crate::goals::{GoalPosition, GoalSlots};
use crate::session::Identity;
use crate::trend::Trend;

/// Runtime-specific errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to emit event: {0}")]
    EmitFailed(String),

    #[error("Event receiver closed")]
    ReceiverClosed,

    #[error("Not running in interactive mode (no TTY)")]
    NotInteractive,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Events emitted to the front end
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    /// Signed in, signed out, or asked who is signed in
    SessionChanged { identity: Option<Identity> },

    /// Goal slots (re)loaded or requested
    GoalsLoaded {
        slots: GoalSlots,
        options: Vec<GoalOption>,
    },

    GoalConfirmed { position: GoalPosition, title: String },

    GoalUnlocked { position: GoalPosition },

    /// Entry history (re)loaded or requested
    EntriesLoaded { entries: Vec<ReflectionEntry> },

    EntrySaved { entry: ReflectionEntry },

    /// The store rejected an entry; the draft is still there
    SaveFailed { message: String },

    DraftChanged { draft: Draft, selected: GoalPosition },

    TrendUpdated { trend: Trend },

    /// Short user-facing message
    Notice { message: String },
}

impl RuntimeEvent {
    pub fn notice(message: impl Into<String>) -> Self {
        RuntimeEvent::Notice {
            message: message.into(),
        }
    }
}

/// Answer to a yes/no confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmResult {
    Confirmed,
    Declined,
}

/// Runtime abstraction for the CLI and tests
///
/// # Object Safety
/// This trait is object-safe and intended to be used as `Arc<dyn TrackerRuntime>`.
#[async_trait]
pub trait TrackerRuntime: Send + Sync + 'static {
    /// Emit an event to the front end
    ///
    /// # Errors
    /// Returns `RuntimeError::ReceiverClosed` if nobody is listening.
    fn emit(&self, event: RuntimeEvent) -> Result<(), RuntimeError>;

    /// Ask the user a yes/no question (blocks until answered)
    ///
    /// # Returns
    /// - `Ok(ConfirmResult)` with the user's answer
    /// - `Err(RuntimeError::NotInteractive)` if there is nobody to ask
    ///
    /// Takes owned `String` to avoid lifetime issues with `#[async_trait]`.
    async fn request_confirmation(&self, prompt: String) -> Result<ConfirmResult, RuntimeError>;

    /// Check if running in interactive mode (has a TTY)
    fn is_interactive(&self) -> bool;

    /// Check if confirmations are answered automatically
    fn auto_confirm(&self) -> bool;

    /// Graceful shutdown - flush events, close channels, etc.
    async fn shutdown(&self) -> Result<(), RuntimeError>;

    /// Get as Any for downcasting to concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// Emit an event, logging instead of failing when nobody listens.
pub(crate) fn emit_or_log(runtime: &dyn TrackerRuntime, event: RuntimeEvent) {
    if let Err(e) = runtime.emit(event) {
        tracing::debug!("Dropped runtime event: {}", e);
    }
}

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(test)]
pub mod testing;

#[cfg(feature = "cli")]
pub use cli::CliRuntime;
