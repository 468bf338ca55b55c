//! Reflection entry rows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::form::Draft;
use crate::goals::GoalPosition;
use crate::session::Identity;

/// A saved reflection entry, exactly as the store returned it.
///
/// Entries are immutable once saved. Field names follow the `entries` table;
/// the form calls `highlights` "wins" and `challenges` "blockers".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionEntry {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_email: Option<String>,
    /// Raw position; rows outside 1..=3 are dropped on load
    pub goal_ref: i64,
    pub date: NaiveDate,
    #[serde(default)]
    pub progress_score: Option<i32>,
    #[serde(default)]
    pub q1: Option<String>,
    #[serde(default)]
    pub q3: Option<String>,
    #[serde(default)]
    pub highlights: Option<String>,
    #[serde(default)]
    pub challenges: Option<String>,
    #[serde(default)]
    pub experiment: Option<String>,
}

impl ReflectionEntry {
    /// The goal this entry belongs to, if `goal_ref` is a valid position.
    pub fn goal(&self) -> Option<GoalPosition> {
        GoalPosition::try_from(self.goal_ref).ok()
    }
}

/// Insert payload for the `entries` table. The store assigns `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewEntry {
    pub user_id: String,
    pub user_email: Option<String>,
    pub goal_ref: GoalPosition,
    pub date: NaiveDate,
    pub progress_score: Option<i32>,
    pub q1: Option<String>,
    pub q3: Option<String>,
    pub highlights: Option<String>,
    pub challenges: Option<String>,
    pub experiment: Option<String>,
}

impl NewEntry {
    /// Shape a draft into a row. Empty text is stored as null.
    pub fn from_draft(draft: &Draft, identity: &Identity) -> Self {
        Self {
            user_id: identity.user_id.clone(),
            user_email: identity.email.clone(),
            goal_ref: draft.goal_ref,
            date: draft.date,
            progress_score: draft.progress_score,
            q1: non_empty(&draft.prompt1),
            q3: non_empty(&draft.prompt3),
            highlights: non_empty(&draft.wins),
            challenges: non_empty(&draft.blockers),
            experiment: non_empty(&draft.experiment),
        }
    }
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}
