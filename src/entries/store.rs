//! Reflection entry store: the user's entry history plus the save action.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::model::{NewEntry, ReflectionEntry};
use crate::backend::RecordStore;
use crate::error::{Result, TrackerError};
use crate::form::Draft;
use crate::runtime::{emit_or_log, RuntimeEvent, TrackerRuntime};
use crate::session::SessionContext;

pub struct ReflectionEntryStore {
    history: RwLock<Vec<ReflectionEntry>>,
    /// Bumped on every change to `history`
    revision: AtomicU64,
    store: Arc<dyn RecordStore>,
    runtime: Arc<dyn TrackerRuntime>,
}

impl ReflectionEntryStore {
    pub fn new(store: Arc<dyn RecordStore>, runtime: Arc<dyn TrackerRuntime>) -> Self {
        Self {
            history: RwLock::new(Vec::new()),
            revision: AtomicU64::new(0),
            store,
            runtime,
        }
    }

    /// Entry history, ascending by date.
    pub fn entries(&self) -> Vec<ReflectionEntry> {
        self.history.read().clone()
    }

    pub fn len(&self) -> usize {
        self.history.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.read().is_empty()
    }

    /// Changes whenever the history does.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// Run `f` over the history without cloning it.
    pub fn with_entries<R>(&self, f: impl FnOnce(&[ReflectionEntry]) -> R) -> R {
        f(&self.history.read())
    }

    /// Load the user's full history. Store failures leave an empty history.
    pub async fn load(&self, session: &SessionContext) -> usize {
        let mut entries = match self.store.select_entries(session).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to load entries, starting empty: {}", e);
                Vec::new()
            }
        };
        entries.retain(|e| {
            let valid = e.goal().is_some();
            if !valid {
                tracing::warn!(id = %e.id, goal_ref = e.goal_ref, "ignoring entry with invalid goal");
            }
            valid
        });
        // Stable: same-day entries keep store order
        entries.sort_by_key(|e| e.date);

        let count = entries.len();
        self.replace(entries);
        tracing::info!(count, "Entries loaded");
        count
    }

    /// Forget the history (on sign-out).
    pub fn reset(&self) {
        self.replace(Vec::new());
    }

    /// Save a draft as a new entry.
    ///
    /// - `Ok(None)`: the draft has no score and no prompt text; nothing is
    ///   sent and nothing changes.
    /// - `Err(TrackerError::Save)`: the store rejected the row; history is
    ///   unchanged.
    /// - `Ok(Some(entry))`: the stored row (not the draft) was appended to
    ///   history.
    pub async fn add(&self, session: &SessionContext, draft: &Draft) -> Result<Option<ReflectionEntry>> {
        if draft.is_empty_content() {
            tracing::debug!("Ignoring save of empty draft");
            return Ok(None);
        }

        let row = NewEntry::from_draft(draft, &session.identity);
        let stored = match self.store.insert_entry(session, &row).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Entry save rejected: {}", e);
                emit_or_log(
                    self.runtime.as_ref(),
                    RuntimeEvent::SaveFailed {
                        message: e.to_string(),
                    },
                );
                return Err(TrackerError::Save(e));
            }
        };

        self.history.write().push(stored.clone());
        self.revision.fetch_add(1, Ordering::SeqCst);

        tracing::info!(id = %stored.id, goal_ref = stored.goal_ref, "Entry saved");
        emit_or_log(
            self.runtime.as_ref(),
            RuntimeEvent::EntrySaved {
                entry: stored.clone(),
            },
        );
        Ok(Some(stored))
    }

    fn replace(&self, entries: Vec<ReflectionEntry>) {
        *self.history.write() = entries;
        self.revision.fetch_add(1, Ordering::SeqCst);
    }
}
