//! Session state holder.
//!
//! The signed-in identity is never read from ambient state. Whoever needs it
//! receives a `SessionContext` from the `SessionHolder`, which is filled at
//! startup, replaced on every auth notification and cleared on sign-out.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Who is signed in. Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Everything a component needs to act on behalf of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub identity: Identity,
    /// Bearer token for the record store
    pub access_token: String,
}

impl SessionContext {
    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }

    pub fn email(&self) -> Option<&str> {
        self.identity.email.as_deref()
    }
}

/// Auth-state notification from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(SessionContext),
    TokenRefreshed(SessionContext),
    SignedOut,
}

/// Effect of an auth notification on the held session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    /// A user is now signed in where nobody (or somebody else) was
    Acquired,
    /// Same user, new credentials
    Refreshed,
    /// Nothing changed
    Unchanged,
    /// The session ended
    Cleared,
}

/// Holds the current session, if any.
#[derive(Default)]
pub struct SessionHolder {
    current: RwLock<Option<SessionContext>>,
}

impl SessionHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an auth notification.
    pub fn apply(&self, event: AuthEvent) -> SessionTransition {
        let mut current = self.current.write();

        match event {
            AuthEvent::SignedIn(next) | AuthEvent::TokenRefreshed(next) => {
                let transition = match current.as_ref() {
                    Some(held) if *held == next => SessionTransition::Unchanged,
                    Some(held) if held.identity.user_id == next.identity.user_id => {
                        SessionTransition::Refreshed
                    }
                    _ => SessionTransition::Acquired,
                };
                if transition != SessionTransition::Unchanged {
                    tracing::info!(user_id = %next.identity.user_id, ?transition, "session updated");
                    *current = Some(next);
                }
                transition
            }
            AuthEvent::SignedOut => {
                if current.take().is_some() {
                    tracing::info!("session cleared");
                    SessionTransition::Cleared
                } else {
                    SessionTransition::Unchanged
                }
            }
        }
    }

    /// The current session, if signed in.
    pub fn current(&self) -> Option<SessionContext> {
        self.current.read().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.current.read().as_ref().map(|s| s.identity.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(user: &str, token: &str) -> SessionContext {
        SessionContext {
            identity: Identity {
                user_id: user.to_string(),
                email: Some(format!("{}@example.com", user)),
            },
            access_token: token.to_string(),
        }
    }

    #[test]
    fn test_starts_signed_out() {
        let holder = SessionHolder::new();
        assert!(!holder.is_signed_in());
        assert!(holder.current().is_none());
    }

    #[test]
    fn test_sign_in_acquires() {
        let holder = SessionHolder::new();
        let transition = holder.apply(AuthEvent::SignedIn(ctx("u-1", "t-1")));

        assert_eq!(transition, SessionTransition::Acquired);
        assert_eq!(holder.current().unwrap().user_id(), "u-1");
    }

    #[test]
    fn test_repeated_notification_is_unchanged() {
        let holder = SessionHolder::new();
        holder.apply(AuthEvent::SignedIn(ctx("u-1", "t-1")));

        let transition = holder.apply(AuthEvent::SignedIn(ctx("u-1", "t-1")));
        assert_eq!(transition, SessionTransition::Unchanged);
    }

    #[test]
    fn test_token_refresh_keeps_user() {
        let holder = SessionHolder::new();
        holder.apply(AuthEvent::SignedIn(ctx("u-1", "t-1")));

        let transition = holder.apply(AuthEvent::TokenRefreshed(ctx("u-1", "t-2")));
        assert_eq!(transition, SessionTransition::Refreshed);
        assert_eq!(holder.current().unwrap().access_token, "t-2");
    }

    #[test]
    fn test_different_user_reacquires() {
        let holder = SessionHolder::new();
        holder.apply(AuthEvent::SignedIn(ctx("u-1", "t-1")));

        let transition = holder.apply(AuthEvent::SignedIn(ctx("u-2", "t-9")));
        assert_eq!(transition, SessionTransition::Acquired);
        assert_eq!(holder.identity().unwrap().user_id, "u-2");
    }

    #[test]
    fn test_sign_out_clears_once() {
        let holder = SessionHolder::new();
        holder.apply(AuthEvent::SignedIn(ctx("u-1", "t-1")));

        assert_eq!(holder.apply(AuthEvent::SignedOut), SessionTransition::Cleared);
        assert_eq!(holder.apply(AuthEvent::SignedOut), SessionTransition::Unchanged);
        assert!(holder.current().is_none());
    }
}
