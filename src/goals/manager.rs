//! Goal slot manager: load, edit, confirm (lock) and unlock the three slots.

use std::sync::Arc;

use parking_lot::RwLock;

use super::slots::{GoalPosition, GoalSlots, GoalWrite};
use crate::backend::RecordStore;
use crate::error::{Result, TrackerError};
use crate::runtime::{emit_or_log, ConfirmResult, RuntimeEvent, TrackerRuntime};
use crate::session::SessionContext;

/// Question asked before a locked goal is reopened.
pub const UNLOCK_PROMPT: &str = "Edit this goal?";

pub struct GoalSlotManager {
    slots: RwLock<GoalSlots>,
    store: Arc<dyn RecordStore>,
    runtime: Arc<dyn TrackerRuntime>,
}

impl GoalSlotManager {
    pub fn new(store: Arc<dyn RecordStore>, runtime: Arc<dyn TrackerRuntime>) -> Self {
        Self {
            slots: RwLock::new(GoalSlots::empty()),
            store,
            runtime,
        }
    }

    /// Current slots.
    pub fn slots(&self) -> GoalSlots {
        self.slots.read().clone()
    }

    /// Load the user's slots. Any store failure leaves all three slots empty
    /// and unlocked; loading never blocks the rest of the session.
    pub async fn load(&self, session: &SessionContext) -> GoalSlots {
        let slots = match self.store.select_goals(session).await {
            Ok(rows) => GoalSlots::from_rows(&rows),
            Err(e) => {
                tracing::warn!("Failed to load goals, using empty slots: {}", e);
                GoalSlots::empty()
            }
        };

        tracing::info!(locked = slots.locked().count(), "Goal slots loaded");
        *self.slots.write() = slots.clone();
        slots
    }

    /// Forget all slots (on sign-out).
    pub fn reset(&self) {
        *self.slots.write() = GoalSlots::empty();
    }

    /// Edit the title of an unlocked slot. Nothing is persisted until the
    /// slot is confirmed.
    pub fn set_title(&self, position: GoalPosition, title: &str) -> Result<()> {
        let mut slots = self.slots.write();
        let slot = slots.get_mut(position);
        if slot.locked {
            return Err(TrackerError::GoalLocked(position.get()));
        }
        slot.title = title.to_string();
        Ok(())
    }

    /// Lock a slot under `title`.
    ///
    /// A blank title is a no-op and returns `Ok(false)`. Otherwise the slot is
    /// upserted on `(user_id, position)`, so repeating the call overwrites the
    /// same row. The stored row is applied to memory on success.
    pub async fn confirm(
        &self,
        session: &SessionContext,
        position: GoalPosition,
        title: &str,
    ) -> Result<bool> {
        if title.trim().is_empty() {
            tracing::debug!(%position, "Ignoring confirm of blank goal");
            return Ok(false);
        }

        let row = GoalWrite {
            user_id: session.user_id().to_string(),
            position,
            title: title.to_string(),
            locked: true,
        };
        let stored = self.store.upsert_goal(session, &row).await?;

        self.slots.write().apply_row(position, &stored);
        tracing::info!(%position, "Goal confirmed");
        emit_or_log(
            self.runtime.as_ref(),
            RuntimeEvent::GoalConfirmed {
                position,
                title: stored.title,
            },
        );
        Ok(true)
    }

    /// Confirm a slot under the title currently held in memory.
    pub async fn confirm_current(&self, session: &SessionContext, position: GoalPosition) -> Result<bool> {
        let title = self.slots.read().get(position).title.clone();
        self.confirm(session, position, &title).await
    }

    /// Reopen a locked slot for editing.
    ///
    /// Asks the user first; a declined confirmation is a no-op returning
    /// `Ok(false)`. The title is kept, only the lock is released. A slot
    /// that is not locked has no stored row to reopen and is left alone.
    pub async fn unlock(&self, session: &SessionContext, position: GoalPosition) -> Result<bool> {
        if !self.slots.read().get(position).locked {
            tracing::debug!(%position, "Unlock ignored, goal not confirmed");
            return Ok(false);
        }

        let answer = self
            .runtime
            .request_confirmation(UNLOCK_PROMPT.to_string())
            .await?;
        if answer != ConfirmResult::Confirmed {
            tracing::debug!(%position, "Unlock declined");
            return Ok(false);
        }

        let title = self.slots.read().get(position).title.clone();
        let row = GoalWrite {
            user_id: session.user_id().to_string(),
            position,
            title,
            locked: false,
        };
        let stored = self.store.upsert_goal(session, &row).await?;

        self.slots.write().apply_row(position, &stored);
        tracing::info!(%position, "Goal unlocked");
        emit_or_log(self.runtime.as_ref(), RuntimeEvent::GoalUnlocked { position });
        Ok(true)
    }
}
