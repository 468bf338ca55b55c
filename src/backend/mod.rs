//! Seams to the hosted backend.
//!
//! The tracker talks to two opaque services: a record store holding the
//! `goals` and `entries` tables, and an identity provider issuing sessions.
//! Both are traits so the core can run against the hosted implementation or
//! an in-memory one in tests.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::entries::{NewEntry, ReflectionEntry};
use crate::goals::{GoalRow, GoalWrite};
use crate::session::{AuthEvent, SessionContext};

pub mod hosted;
#[cfg(test)]
pub mod memory;

pub use hosted::{HostedIdentity, HostedStore};

/// Record store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Backend(#[from] hosted_backend::BackendError),

    #[error("Rejected by store: {0}")]
    Rejected(String),
}

/// Identity provider failures
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Backend(#[from] hosted_backend::BackendError),

    #[error("Session file error: {0}")]
    SessionFile(String),

    #[error("Rejected by identity provider: {0}")]
    Rejected(String),
}

impl From<std::io::Error> for AuthError {
    fn from(err: std::io::Error) -> Self {
        AuthError::SessionFile(err.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::SessionFile(err.to_string())
    }
}

/// Per-table operations over the record store.
///
/// Every call runs as the user in `session`; rows of other users are never
/// visible.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// All goal rows of the user, ordered by position.
    async fn select_goals(&self, session: &SessionContext) -> Result<Vec<GoalRow>, StoreError>;

    /// Insert or overwrite the goal row keyed on `(user_id, position)`.
    /// Returns the stored row.
    async fn upsert_goal(
        &self,
        session: &SessionContext,
        row: &GoalWrite,
    ) -> Result<GoalRow, StoreError>;

    /// All entries of the user, ordered by date ascending.
    async fn select_entries(
        &self,
        session: &SessionContext,
    ) -> Result<Vec<ReflectionEntry>, StoreError>;

    /// Insert an entry and return the stored row with server-assigned fields.
    async fn insert_entry(
        &self,
        session: &SessionContext,
        row: &NewEntry,
    ) -> Result<ReflectionEntry, StoreError>;
}

/// Email-based identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// The session the provider currently holds, if any.
    async fn current_session(&self) -> Result<Option<SessionContext>, AuthError>;

    /// Receive every auth-state change from now on.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<AuthEvent>;

    /// Email a one-time sign-in link (and code) to `email`.
    async fn send_sign_in_link(&self, email: &str) -> Result<(), AuthError>;

    /// Complete sign-in with the emailed one-time code.
    async fn verify_code(&self, email: &str, code: &str) -> Result<SessionContext, AuthError>;

    /// End the current session.
    async fn sign_out(&self) -> Result<(), AuthError>;
}
