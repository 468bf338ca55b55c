//! The tracker: session, goal slots, entries, form and trend for one user.
//!
//! Front ends drive a `Tracker` with discrete actions. Auth notifications
//! from the identity provider arrive on a background listener and go through
//! the same `handle_auth_event` path as direct sign-ins.

use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::backend::{IdentityProvider, RecordStore};
use crate::entries::{ReflectionEntry, ReflectionEntryStore};
use crate::error::Result;
use crate::form::{self, confirmed_goal_options, Draft, DraftField, FormController, GoalOption};
use crate::goals::{GoalPosition, GoalSlotManager, GoalSlots};
use crate::runtime::{emit_or_log, RuntimeEvent, TrackerRuntime};
use crate::session::{AuthEvent, Identity, SessionContext, SessionHolder, SessionTransition};
use crate::trend::{Trend, TrendProjector};

pub const SIGN_IN_FIRST: &str = "Please sign in first.";
pub const SENDING_LINK: &str = "Sending magic link...";
pub const LINK_SENT: &str = "Magic link sent. Check your email.";
pub const NO_CONFIRMED_GOALS: &str = "Confirm a goal above first";

pub struct Tracker {
    identity: Arc<dyn IdentityProvider>,
    session: SessionHolder,
    goals: GoalSlotManager,
    entries: ReflectionEntryStore,
    form: Mutex<FormController>,
    trend: TrendProjector,
    /// Held while an auth event is applied and its data loaded
    auth_lock: tokio::sync::Mutex<()>,
    runtime: Arc<dyn TrackerRuntime>,
}

impl Tracker {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn RecordStore>,
        runtime: Arc<dyn TrackerRuntime>,
    ) -> Self {
        Self {
            identity,
            session: SessionHolder::new(),
            goals: GoalSlotManager::new(store.clone(), runtime.clone()),
            entries: ReflectionEntryStore::new(store, runtime.clone()),
            form: Mutex::new(FormController::default()),
            trend: TrendProjector::new(),
            auth_lock: tokio::sync::Mutex::new(()),
            runtime,
        }
    }

    pub fn runtime(&self) -> &Arc<dyn TrackerRuntime> {
        &self.runtime
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Pick up the provider's existing session, if any, and load its data.
    ///
    /// Provider failures are logged and leave the tracker signed out.
    pub async fn start(&self) -> Option<Identity> {
        match self.identity.current_session().await {
            Ok(Some(ctx)) => {
                self.handle_auth_event(AuthEvent::SignedIn(ctx)).await;
            }
            Ok(None) => tracing::debug!("No stored session"),
            Err(e) => tracing::warn!("Failed to restore session: {}", e),
        }
        self.session.identity()
    }

    /// Apply an auth notification; loads or clears user data as needed.
    ///
    /// Events are applied one at a time. The direct sign-in path and the
    /// listener both see the provider's notification, and whichever comes
    /// second returns only after the first has finished loading.
    pub async fn handle_auth_event(&self, event: AuthEvent) -> SessionTransition {
        let _guard = self.auth_lock.lock().await;

        let previous = self.session.identity();
        let transition = self.session.apply(event);
        match transition {
            SessionTransition::Acquired => {
                if let Some(ctx) = self.session.current() {
                    if previous.is_some_and(|p| p.user_id != ctx.identity.user_id) {
                        // Another user's draft and selection must not carry over
                        self.clear_user_data();
                    }
                    self.emit(RuntimeEvent::SessionChanged {
                        identity: Some(ctx.identity.clone()),
                    });
                    self.load_user_data(&ctx).await;
                }
            }
            SessionTransition::Cleared => {
                self.clear_user_data();
                self.emit(RuntimeEvent::SessionChanged { identity: None });
            }
            SessionTransition::Refreshed | SessionTransition::Unchanged => {}
        }
        transition
    }

    /// Forward provider notifications into `handle_auth_event` until the
    /// provider drops its sender.
    pub fn spawn_auth_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.identity.subscribe();
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                tracing::debug!(?event, "Auth notification");
                tracker.handle_auth_event(event).await;
            }
            tracing::debug!("Auth listener stopped");
        })
    }

    pub fn identity(&self) -> Option<Identity> {
        self.session.identity()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_signed_in()
    }

    /// Email a sign-in link. An empty address is ignored and returns
    /// `Ok(false)`.
    pub async fn send_sign_in_link(&self, email: &str) -> Result<bool> {
        let email = email.trim();
        if email.is_empty() {
            return Ok(false);
        }

        self.emit(RuntimeEvent::notice(SENDING_LINK));
        self.identity.send_sign_in_link(email).await?;
        tracing::info!("Sign-in link requested");
        self.emit(RuntimeEvent::notice(LINK_SENT));
        Ok(true)
    }

    /// Finish sign-in with the emailed code.
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<Identity> {
        let ctx = self.identity.verify_code(email.trim(), code).await?;
        let identity = ctx.identity.clone();
        self.handle_auth_event(AuthEvent::SignedIn(ctx)).await;
        Ok(identity)
    }

    /// Sign out. Local state is cleared even when the provider call fails.
    pub async fn sign_out(&self) -> Result<()> {
        let result = self.identity.sign_out().await;
        if let Err(e) = &result {
            tracing::warn!("Provider sign-out failed: {}", e);
        }
        self.handle_auth_event(AuthEvent::SignedOut).await;
        result.map_err(Into::into)
    }

    /// Emit the current identity (or none).
    pub fn show_session(&self) -> Option<Identity> {
        let identity = self.session.identity();
        self.emit(RuntimeEvent::SessionChanged {
            identity: identity.clone(),
        });
        identity
    }

    // =========================================================================
    // Goals
    // =========================================================================

    pub fn goal_slots(&self) -> GoalSlots {
        self.goals.slots()
    }

    /// Edit an unlocked goal's title in memory.
    pub fn set_goal_title(&self, position: GoalPosition, title: &str) -> Result<()> {
        self.goals.set_title(position, title)
    }

    /// Confirm (lock) a goal under its current title. `Ok(false)` when
    /// signed out or the title is blank.
    pub async fn confirm_goal(&self, position: GoalPosition) -> Result<bool> {
        let Some(ctx) = self.active_session().await else {
            tracing::debug!(%position, "Confirm ignored while signed out");
            return Ok(false);
        };
        self.goals.confirm_current(&ctx, position).await
    }

    /// Reopen a locked goal after asking the user. `Ok(false)` when signed
    /// out or declined.
    pub async fn unlock_goal(&self, position: GoalPosition) -> Result<bool> {
        let Some(ctx) = self.active_session().await else {
            tracing::debug!(%position, "Unlock ignored while signed out");
            return Ok(false);
        };
        self.goals.unlock(&ctx, position).await
    }

    /// Selector options for the locked goals.
    pub fn goal_options(&self) -> Vec<GoalOption> {
        confirmed_goal_options(&self.goals.slots())
    }

    /// Emit the slots and selector options. With nothing confirmed yet the
    /// user is told to confirm a goal first.
    pub fn show_goals(&self) -> Vec<GoalOption> {
        let slots = self.goals.slots();
        let options = confirmed_goal_options(&slots);
        if options.is_empty() {
            self.emit(RuntimeEvent::notice(NO_CONFIRMED_GOALS));
        }
        self.emit(RuntimeEvent::GoalsLoaded {
            slots,
            options: options.clone(),
        });
        options
    }

    // =========================================================================
    // Form
    // =========================================================================

    pub fn draft(&self) -> Draft {
        self.form.lock().draft().clone()
    }

    pub fn selected_goal(&self) -> GoalPosition {
        self.form.lock().selected()
    }

    /// Select the goal for new entries and for the trend.
    ///
    /// Only confirmed goals can be selected. For any other goal the user is
    /// told to confirm one first, the selection stays as it was and `None`
    /// is returned.
    pub fn select_goal(&self, token: &str) -> Option<GoalPosition> {
        let position = form::parse_goal_ref(token);
        if !self.goals.slots().get(position).locked {
            tracing::debug!(%position, "Selection of unconfirmed goal refused");
            self.emit(RuntimeEvent::notice(NO_CONFIRMED_GOALS));
            return None;
        }

        self.form.lock().select_goal(token);
        tracing::debug!(%position, "Goal selected");
        self.emit_trend();
        Some(position)
    }

    pub fn set_date(&self, date: NaiveDate) {
        self.form.lock().set_date(date);
    }

    pub fn set_score(&self, score: Option<i32>) -> Result<()> {
        self.form.lock().set_score(score)
    }

    pub fn set_text(&self, field: DraftField, text: &str) {
        self.form.lock().set_text(field, text);
    }

    /// Emit the draft under composition.
    pub fn show_draft(&self) -> Draft {
        let (draft, selected) = {
            let form = self.form.lock();
            (form.draft().clone(), form.selected())
        };
        self.emit(RuntimeEvent::DraftChanged {
            draft: draft.clone(),
            selected,
        });
        draft
    }

    // =========================================================================
    // Entries and trend
    // =========================================================================

    /// Save the draft.
    ///
    /// Signed out: a notice and `Ok(None)`. Empty draft: `Ok(None)` and
    /// nothing else. Draft for a goal that is not confirmed: a notice and
    /// `Ok(None)`. On success the form starts over for today under the
    /// selected goal; on failure the draft is kept.
    pub async fn save_entry(&self) -> Result<Option<ReflectionEntry>> {
        let Some(ctx) = self.active_session().await else {
            self.emit(RuntimeEvent::notice(SIGN_IN_FIRST));
            return Ok(None);
        };

        let draft = self.draft();
        if !draft.is_empty_content() && !self.goals.slots().get(draft.goal_ref).locked {
            tracing::debug!(goal = %draft.goal_ref, "Save refused, goal not confirmed");
            self.emit(RuntimeEvent::notice(NO_CONFIRMED_GOALS));
            return Ok(None);
        }
        let Some(saved) = self.entries.add(&ctx, &draft).await? else {
            return Ok(None);
        };

        self.form.lock().reset_after_save(form::today());
        self.emit_trend();
        Ok(Some(saved))
    }

    pub fn entries(&self) -> Vec<ReflectionEntry> {
        self.entries.entries()
    }

    /// Emit the entry history.
    pub fn show_entries(&self) -> Vec<ReflectionEntry> {
        let entries = self.entries.entries();
        self.emit(RuntimeEvent::EntriesLoaded {
            entries: entries.clone(),
        });
        entries
    }

    /// Trend of the selected goal.
    pub fn trend(&self) -> Trend {
        let goal = self.selected_goal();
        let revision = self.entries.revision();
        self.entries
            .with_entries(|entries| self.trend.trend(revision, goal, entries))
    }

    /// Emit the trend of the selected goal.
    pub fn show_trend(&self) -> Trend {
        self.emit_trend()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// The held session, re-checked with the provider so an expired token
    /// is refreshed (or the session dropped) before it is used.
    async fn active_session(&self) -> Option<SessionContext> {
        if !self.session.is_signed_in() {
            return None;
        }
        match self.identity.current_session().await {
            Ok(Some(ctx)) => {
                self.handle_auth_event(AuthEvent::TokenRefreshed(ctx)).await;
            }
            Ok(None) => {
                self.handle_auth_event(AuthEvent::SignedOut).await;
            }
            Err(e) => tracing::warn!("Session check failed, using held session: {}", e),
        }
        self.session.current()
    }

    async fn load_user_data(&self, ctx: &SessionContext) {
        let (slots, _) = tokio::join!(self.goals.load(ctx), self.entries.load(ctx));

        let options = confirmed_goal_options(&slots);
        self.emit(RuntimeEvent::GoalsLoaded { slots, options });
        self.emit(RuntimeEvent::EntriesLoaded {
            entries: self.entries.entries(),
        });
        self.emit_trend();
    }

    fn clear_user_data(&self) {
        self.goals.reset();
        self.entries.reset();
        self.trend.invalidate();
        self.form.lock().reset(form::today());
    }

    fn emit_trend(&self) -> Trend {
        let trend = self.trend();
        self.emit(RuntimeEvent::TrendUpdated {
            trend: trend.clone(),
        });
        trend
    }

    fn emit(&self, event: RuntimeEvent) {
        emit_or_log(self.runtime.as_ref(), event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::runtime::testing::RecordingRuntime;

    fn tracker(backend: MemoryBackend) -> (Arc<MemoryBackend>, Arc<RecordingRuntime>, Tracker) {
        let backend = Arc::new(backend);
        let runtime = Arc::new(RecordingRuntime::new());
        let tracker = Tracker::new(backend.clone(), backend.clone(), runtime.clone());
        (backend, runtime, tracker)
    }

    #[tokio::test]
    async fn test_start_without_session() {
        let (_backend, _runtime, tracker) = tracker(MemoryBackend::new());
        assert_eq!(tracker.start().await, None);
        assert!(!tracker.is_signed_in());
    }

    #[tokio::test]
    async fn test_start_restores_session() {
        let (_backend, runtime, tracker) = tracker(MemoryBackend::new().with_session("u-1"));
        let identity = tracker.start().await.unwrap();
        assert_eq!(identity.user_id, "u-1");
        assert!(runtime
            .events()
            .iter()
            .any(|e| matches!(e, RuntimeEvent::GoalsLoaded { .. })));
    }

    #[tokio::test]
    async fn test_empty_email_is_ignored() {
        let (backend, runtime, tracker) = tracker(MemoryBackend::new());
        assert!(!tracker.send_sign_in_link("   ").await.unwrap());
        assert!(backend.sent_links().is_empty());
        assert!(runtime.notices().is_empty());

        assert!(tracker.send_sign_in_link("me@example.com").await.unwrap());
        assert_eq!(backend.sent_links(), vec!["me@example.com"]);
        assert_eq!(runtime.notices(), vec![SENDING_LINK, LINK_SENT]);
    }

    #[tokio::test]
    async fn test_save_signed_out_asks_to_sign_in() {
        let (backend, runtime, tracker) = tracker(MemoryBackend::new());
        tracker.set_score(Some(5)).unwrap();

        assert_eq!(tracker.save_entry().await.unwrap(), None);
        assert_eq!(backend.entry_count(), 0);
        assert_eq!(runtime.notices(), vec![SIGN_IN_FIRST]);
        assert_eq!(tracker.draft().progress_score, Some(5));
    }

    #[tokio::test]
    async fn test_goal_actions_ignored_while_signed_out() {
        let (backend, _runtime, tracker) = tracker(MemoryBackend::new());
        tracker.set_goal_title(GoalPosition::FIRST, "Write").unwrap();
        assert!(!tracker.confirm_goal(GoalPosition::FIRST).await.unwrap());
        assert!(!tracker.unlock_goal(GoalPosition::FIRST).await.unwrap());
        assert_eq!(backend.goal_write_count(), 0);
    }

    #[tokio::test]
    async fn test_show_goals_without_confirmed_goal() {
        let (_backend, runtime, tracker) = tracker(MemoryBackend::new());
        assert!(tracker.show_goals().is_empty());
        assert_eq!(runtime.notices(), vec![NO_CONFIRMED_GOALS]);
    }

    #[tokio::test]
    async fn test_sign_out_clears_state() {
        let (_backend, runtime, tracker) = tracker(MemoryBackend::new());
        tracker.verify_code("u-1@example.com", "123456").await.unwrap();
        tracker.set_goal_title(GoalPosition::FIRST, "Write").unwrap();
        tracker.confirm_goal(GoalPosition::FIRST).await.unwrap();
        tracker.set_goal_title(GoalPosition::ALL[1], "Run").unwrap();
        tracker.confirm_goal(GoalPosition::ALL[1]).await.unwrap();
        assert_eq!(tracker.select_goal("Goal 2"), Some(GoalPosition::ALL[1]));

        tracker.sign_out().await.unwrap();

        assert!(!tracker.is_signed_in());
        assert_eq!(tracker.goal_slots(), GoalSlots::empty());
        assert_eq!(tracker.selected_goal(), GoalPosition::FIRST);
        assert!(matches!(
            runtime.events().last(),
            Some(RuntimeEvent::SessionChanged { identity: None })
        ));
    }
}
