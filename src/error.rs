use serde::Serialize;
use thiserror::Error;

use crate::backend::{AuthError, StoreError};
use crate::runtime::RuntimeError;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Goal {0} is locked; unlock it before editing")]
    GoalLocked(u8),

    #[error("Invalid goal position: {0}")]
    InvalidPosition(String),

    #[error("Progress score must be between 1 and 10, got {0}")]
    InvalidScore(i32),

    #[error("Error saving entry: {0}")]
    Save(#[source] StoreError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

// Rendered as a plain message in JSON output
impl Serialize for TrackerError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
