//! Hosted backend implementations of `RecordStore` and `IdentityProvider`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hosted_backend::{BackendError, Client, Session};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use super::{AuthError, IdentityProvider, RecordStore, StoreError};
use crate::entries::{NewEntry, ReflectionEntry};
use crate::goals::{GoalRow, GoalWrite};
use crate::session::{AuthEvent, Identity, SessionContext};

const GOALS_TABLE: &str = "goals";
const ENTRIES_TABLE: &str = "entries";

/// Record store backed by the hosted `goals` and `entries` tables.
pub struct HostedStore {
    client: Client,
}

impl HostedStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RecordStore for HostedStore {
    async fn select_goals(&self, session: &SessionContext) -> Result<Vec<GoalRow>, StoreError> {
        let rows = self
            .client
            .from(GOALS_TABLE)
            .auth(&session.access_token)
            .select("*")
            .eq("user_id", session.user_id())
            .order("position", true)
            .execute()
            .await?;
        Ok(rows)
    }

    async fn upsert_goal(
        &self,
        session: &SessionContext,
        row: &GoalWrite,
    ) -> Result<GoalRow, StoreError> {
        let stored = self
            .client
            .from(GOALS_TABLE)
            .auth(&session.access_token)
            .upsert(row, GoalWrite::CONFLICT_KEY)
            .await?;
        Ok(stored)
    }

    async fn select_entries(
        &self,
        session: &SessionContext,
    ) -> Result<Vec<ReflectionEntry>, StoreError> {
        let rows = self
            .client
            .from(ENTRIES_TABLE)
            .auth(&session.access_token)
            .select("*")
            .eq("user_id", session.user_id())
            .order("date", true)
            .execute()
            .await?;
        Ok(rows)
    }

    async fn insert_entry(
        &self,
        session: &SessionContext,
        row: &NewEntry,
    ) -> Result<ReflectionEntry, StoreError> {
        let stored = self
            .client
            .from(ENTRIES_TABLE)
            .auth(&session.access_token)
            .select("*")
            .insert(row)
            .await?;
        Ok(stored)
    }
}

/// Identity provider backed by the hosted email one-time-code flow.
///
/// The issued session is kept in memory and, when a session file is
/// configured, on disk so the next run starts signed in.
pub struct HostedIdentity {
    client: Client,
    redirect_to: Option<String>,
    session_file: Option<PathBuf>,
    session: RwLock<Option<Session>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<AuthEvent>>>,
}

impl HostedIdentity {
    pub fn new(client: Client, redirect_to: Option<String>, session_file: Option<PathBuf>) -> Self {
        Self {
            client,
            redirect_to,
            session_file,
            session: RwLock::new(None),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn notify(&self, event: AuthEvent) {
        // Drop subscribers whose receiver is gone
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Hold `session` and persist it.
    async fn remember(&self, mut session: Session) -> Result<SessionContext, AuthError> {
        if session.expires_at.is_none() && session.expires_in > 0 {
            session.expires_at = Some(chrono::Utc::now().timestamp() + session.expires_in);
        }

        if let Some(ref path) = self.session_file {
            write_session_file(path, &session).await?;
        }

        let ctx = to_context(&session);
        *self.session.write() = Some(session);
        Ok(ctx)
    }

    /// Drop the held session and its file.
    async fn forget(&self) -> Result<Option<Session>, AuthError> {
        let previous = self.session.write().take();

        if let Some(ref path) = self.session_file {
            match tokio::fs::remove_file(path).await {
                Ok(()) => tracing::debug!("Removed session file {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(previous)
    }

    async fn load_session_file(&self) -> Result<Option<Session>, AuthError> {
        let Some(ref path) = self.session_file else {
            return Ok(None);
        };

        if !path.exists() {
            return Ok(None);
        }

        let contents = tokio::fs::read_to_string(path).await?;
        match serde_json::from_str::<Session>(&contents) {
            Ok(session) => {
                tracing::debug!("Loaded session from {:?}", path);
                Ok(Some(session))
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable session file {:?}: {}", path, e);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for HostedIdentity {
    async fn current_session(&self) -> Result<Option<SessionContext>, AuthError> {
        let held = self.session.read().clone();
        let session = match held {
            Some(session) => Some(session),
            None => self.load_session_file().await?,
        };

        let Some(session) = session else {
            return Ok(None);
        };

        if !session.is_expired_at(chrono::Utc::now().timestamp()) {
            let ctx = to_context(&session);
            *self.session.write() = Some(session);
            return Ok(Some(ctx));
        }

        tracing::debug!("Access token expired, refreshing");
        match self.client.auth().refresh(&session.refresh_token).await {
            Ok(fresh) => {
                let ctx = self.remember(fresh).await?;
                self.notify(AuthEvent::TokenRefreshed(ctx.clone()));
                Ok(Some(ctx))
            }
            Err(e @ BackendError::ApiError { .. }) => {
                // The provider refused the refresh token; the session is over
                tracing::warn!("Session refresh rejected: {}", e);
                self.forget().await?;
                self.notify(AuthEvent::SignedOut);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<AuthEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    async fn send_sign_in_link(&self, email: &str) -> Result<(), AuthError> {
        self.client
            .auth()
            .send_otp(email, self.redirect_to.as_deref())
            .await?;
        tracing::info!("Sign-in link sent");
        Ok(())
    }

    async fn verify_code(&self, email: &str, code: &str) -> Result<SessionContext, AuthError> {
        let session = self.client.auth().verify_otp(email, code).await?;
        let ctx = self.remember(session).await?;
        tracing::info!(user_id = %ctx.user_id(), "Signed in");
        self.notify(AuthEvent::SignedIn(ctx.clone()));
        Ok(ctx)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let previous = self.forget().await?;
        self.notify(AuthEvent::SignedOut);

        // Local state is already cleared; a failed revoke is still reported
        if let Some(session) = previous {
            self.client.auth().sign_out(&session.access_token).await?;
        }
        tracing::info!("Signed out");
        Ok(())
    }
}

fn to_context(session: &Session) -> SessionContext {
    SessionContext {
        identity: Identity {
            user_id: session.user.id.clone(),
            email: session.user.email.clone(),
        },
        access_token: session.access_token.clone(),
    }
}

/// Atomic write: write to temp file, then rename
async fn write_session_file(path: &Path, session: &Session) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(session)?;
    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, json).await?;
    tokio::fs::rename(&temp_path, path).await?;

    tracing::debug!("Saved session to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hosted_backend::{BackendConfig, User};
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> Client {
        Client::new(BackendConfig {
            url: server.uri(),
            anon_key: "anon".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn session_json(access: &str, refresh: &str, expires_at: i64) -> serde_json::Value {
        json!({
            "access_token": access,
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": expires_at,
            "refresh_token": refresh,
            "user": { "id": "u-1", "email": "me@example.com" }
        })
    }

    #[tokio::test]
    async fn test_verify_code_persists_and_notifies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_json(
                "at",
                "rt",
                i64::MAX / 2,
            )))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("nested").join("session.json");
        let identity = HostedIdentity::new(client_for(&server), None, Some(file.clone()));
        let mut events = identity.subscribe();

        let ctx = identity.verify_code("me@example.com", "123456").await.unwrap();
        assert_eq!(ctx.user_id(), "u-1");
        assert_eq!(ctx.email(), Some("me@example.com"));
        assert!(file.exists());
        assert_eq!(events.recv().await, Some(AuthEvent::SignedIn(ctx.clone())));

        // A second provider on the same file starts signed in
        let restarted = HostedIdentity::new(client_for(&server), None, Some(file));
        assert_eq!(restarted.current_session().await.unwrap(), Some(ctx));
    }

    #[tokio::test]
    async fn test_expired_session_is_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_json(
                "at-2",
                "rt-2",
                i64::MAX / 2,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("session.json");
        let stale: Session = serde_json::from_value(session_json("at-1", "rt-1", 1)).unwrap();
        write_session_file(&file, &stale).await.unwrap();

        let identity = HostedIdentity::new(client_for(&server), None, Some(file.clone()));
        let mut events = identity.subscribe();

        let ctx = identity.current_session().await.unwrap().unwrap();
        assert_eq!(ctx.access_token, "at-2");
        assert!(matches!(events.recv().await, Some(AuthEvent::TokenRefreshed(_))));

        let on_disk: Session =
            serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
        assert_eq!(on_disk.refresh_token, "rt-2");
    }

    #[tokio::test]
    async fn test_rejected_refresh_signs_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid Refresh Token"
            })))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("session.json");
        let stale: Session = serde_json::from_value(session_json("at-1", "rt-1", 1)).unwrap();
        write_session_file(&file, &stale).await.unwrap();

        let identity = HostedIdentity::new(client_for(&server), None, Some(file.clone()));
        assert_eq!(identity.current_session().await.unwrap(), None);
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_sign_out_clears_locally_and_revokes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let identity = HostedIdentity::new(client_for(&server), None, None);
        identity
            .remember(Session {
                access_token: "at".into(),
                token_type: "bearer".into(),
                expires_in: 3600,
                expires_at: None,
                refresh_token: "rt".into(),
                user: User {
                    id: "u-1".into(),
                    email: None,
                },
            })
            .await
            .unwrap();
        let mut events = identity.subscribe();

        identity.sign_out().await.unwrap();
        assert_eq!(events.recv().await, Some(AuthEvent::SignedOut));
        assert_eq!(identity.current_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_scopes_selects_to_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/entries"))
            .and(query_param("user_id", "eq.u-1"))
            .and(query_param("order", "date.asc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": "e-1", "user_id": "u-1", "user_email": null, "goal_ref": 1,
                "date": "2024-01-03", "progress_score": 4, "q1": null, "q3": null,
                "highlights": null, "challenges": null, "experiment": null
            }])))
            .mount(&server)
            .await;

        let store = HostedStore::new(client_for(&server));
        let ctx = SessionContext {
            identity: Identity {
                user_id: "u-1".into(),
                email: None,
            },
            access_token: "at".into(),
        };

        let entries = store.select_entries(&ctx).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].progress_score, Some(4));
    }
}
