//! In-memory backend for tests.
//!
//! Behaves like the hosted tables: goal writes upsert on
//! `(user_id, position)`, entry inserts get a store-assigned id, and reads
//! only see the calling user's rows.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{AuthError, IdentityProvider, RecordStore, StoreError};
use crate::entries::{NewEntry, ReflectionEntry};
use crate::goals::{GoalRow, GoalWrite};
use crate::session::{AuthEvent, Identity, SessionContext};

#[derive(Default)]
pub struct MemoryBackend {
    goals: Mutex<BTreeMap<(String, u8), GoalRow>>,
    entries: Mutex<Vec<ReflectionEntry>>,
    next_id: AtomicUsize,
    goal_writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    read_delay: Mutex<Option<Duration>>,
    session: Mutex<Option<SessionContext>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<AuthEvent>>>,
    sent_links: Mutex<Vec<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session context for a test user.
    pub fn context(user_id: &str) -> SessionContext {
        SessionContext {
            identity: Identity {
                user_id: user_id.to_string(),
                email: Some(format!("{}@example.com", user_id)),
            },
            access_token: format!("token-{}", user_id),
        }
    }

    /// Start signed in as `user_id`.
    pub fn with_session(self, user_id: &str) -> Self {
        *self.session.lock() = Some(Self::context(user_id));
        self
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Hold every goal read for `delay`, like a slow network.
    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock() = Some(delay);
    }

    /// Seed a stored entry directly.
    pub fn seed_entry(&self, entry: ReflectionEntry) {
        self.entries.lock().push(entry);
    }

    /// Seed a stored goal row directly.
    pub fn seed_goal(&self, row: GoalRow) {
        let position = u8::try_from(row.position).unwrap_or(0);
        self.goals.lock().insert((row.user_id.clone(), position), row);
    }

    pub fn goal_rows(&self) -> Vec<GoalRow> {
        self.goals.lock().values().cloned().collect()
    }

    pub fn goal_write_count(&self) -> usize {
        self.goal_writes.load(Ordering::SeqCst)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn sent_links(&self) -> Vec<String> {
        self.sent_links.lock().clone()
    }

    /// Push an auth notification to subscribers, as the provider would.
    pub fn push_auth_event(&self, event: AuthEvent) {
        match &event {
            AuthEvent::SignedIn(ctx) | AuthEvent::TokenRefreshed(ctx) => {
                *self.session.lock() = Some(ctx.clone())
            }
            AuthEvent::SignedOut => *self.session.lock() = None,
        }
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryBackend {
    async fn select_goals(&self, session: &SessionContext) -> Result<Vec<GoalRow>, StoreError> {
        let delay = *self.read_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_read()?;
        Ok(self
            .goals
            .lock()
            .values()
            .filter(|row| row.user_id == session.user_id())
            .cloned()
            .collect())
    }

    async fn upsert_goal(
        &self,
        session: &SessionContext,
        row: &GoalWrite,
    ) -> Result<GoalRow, StoreError> {
        self.check_write()?;
        self.goal_writes.fetch_add(1, Ordering::SeqCst);

        let key = (session.user_id().to_string(), row.position.get());
        let mut goals = self.goals.lock();
        let id = goals
            .get(&key)
            .and_then(|existing| existing.id.clone())
            .unwrap_or_else(|| format!("g-{}", self.next_id.fetch_add(1, Ordering::SeqCst)));

        let stored = GoalRow {
            id: Some(id),
            user_id: row.user_id.clone(),
            position: i64::from(row.position.get()),
            title: row.title.clone(),
            locked: row.locked,
        };
        goals.insert(key, stored.clone());
        Ok(stored)
    }

    async fn select_entries(
        &self,
        session: &SessionContext,
    ) -> Result<Vec<ReflectionEntry>, StoreError> {
        self.check_read()?;
        let mut rows: Vec<ReflectionEntry> = self
            .entries
            .lock()
            .iter()
            .filter(|e| e.user_id == session.user_id())
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.date);
        Ok(rows)
    }

    async fn insert_entry(
        &self,
        _session: &SessionContext,
        row: &NewEntry,
    ) -> Result<ReflectionEntry, StoreError> {
        self.check_write()?;

        // Stand-in for server-side normalization: trims the stored email
        let stored = ReflectionEntry {
            id: format!("e-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            user_id: row.user_id.clone(),
            user_email: row.user_email.as_ref().map(|e| e.trim().to_lowercase()),
            goal_ref: i64::from(row.goal_ref.get()),
            date: row.date,
            progress_score: row.progress_score,
            q1: row.q1.clone(),
            q3: row.q3.clone(),
            highlights: row.highlights.clone(),
            challenges: row.challenges.clone(),
            experiment: row.experiment.clone(),
        };
        self.entries.lock().push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl IdentityProvider for MemoryBackend {
    async fn current_session(&self) -> Result<Option<SessionContext>, AuthError> {
        Ok(self.session.lock().clone())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<AuthEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    async fn send_sign_in_link(&self, email: &str) -> Result<(), AuthError> {
        self.sent_links.lock().push(email.to_string());
        Ok(())
    }

    async fn verify_code(&self, email: &str, code: &str) -> Result<SessionContext, AuthError> {
        if code != "123456" {
            return Err(AuthError::Rejected("Token has expired or is invalid".to_string()));
        }
        let user_id = email.split('@').next().unwrap_or(email);
        let ctx = Self::context(user_id);
        self.push_auth_event(AuthEvent::SignedIn(ctx.clone()));
        Ok(ctx)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.push_auth_event(AuthEvent::SignedOut);
        Ok(())
    }
}
