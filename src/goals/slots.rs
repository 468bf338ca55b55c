//! Goal slot types.
//!
//! Every user has exactly three slots keyed by `GoalPosition`. Positions are
//! validated on the way in, so nothing downstream does index arithmetic on
//! raw numbers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

/// Number of goal slots per user.
pub const GOAL_SLOT_COUNT: usize = 3;

/// A goal slot position, always in `1..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct GoalPosition(u8);

impl GoalPosition {
    pub const FIRST: GoalPosition = GoalPosition(1);
    pub const ALL: [GoalPosition; GOAL_SLOT_COUNT] =
        [GoalPosition(1), GoalPosition(2), GoalPosition(3)];

    /// `None` when `n` is not a valid position.
    pub fn new(n: u8) -> Option<Self> {
        (1..=GOAL_SLOT_COUNT as u8).contains(&n).then_some(GoalPosition(n))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl Default for GoalPosition {
    fn default() -> Self {
        GoalPosition::FIRST
    }
}

impl TryFrom<u8> for GoalPosition {
    type Error = TrackerError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        GoalPosition::new(n).ok_or_else(|| TrackerError::InvalidPosition(n.to_string()))
    }
}

impl TryFrom<i64> for GoalPosition {
    type Error = TrackerError;

    fn try_from(n: i64) -> Result<Self, Self::Error> {
        u8::try_from(n)
            .ok()
            .and_then(GoalPosition::new)
            .ok_or_else(|| TrackerError::InvalidPosition(n.to_string()))
    }
}

impl From<GoalPosition> for u8 {
    fn from(position: GoalPosition) -> Self {
        position.0
    }
}

impl fmt::Display for GoalPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One goal slot as held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalSlot {
    pub title: String,
    pub locked: bool,
}

/// The three slots of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalSlots {
    slots: [GoalSlot; GOAL_SLOT_COUNT],
}

impl GoalSlots {
    /// All titles empty, all unlocked.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build slots from stored rows. Rows with an invalid position are
    /// skipped; positions without a row stay empty.
    pub fn from_rows(rows: &[GoalRow]) -> Self {
        let mut slots = Self::empty();
        for row in rows {
            match GoalPosition::try_from(row.position) {
                Ok(position) => slots.apply_row(position, row),
                Err(_) => {
                    tracing::warn!(position = row.position, "ignoring goal row with invalid position")
                }
            }
        }
        slots
    }

    pub fn get(&self, position: GoalPosition) -> &GoalSlot {
        &self.slots[position.index()]
    }

    pub fn get_mut(&mut self, position: GoalPosition) -> &mut GoalSlot {
        &mut self.slots[position.index()]
    }

    /// Overwrite a slot with the canonical row returned by the store.
    pub fn apply_row(&mut self, position: GoalPosition, row: &GoalRow) {
        let slot = self.get_mut(position);
        slot.title = row.title.clone();
        slot.locked = row.locked;
    }

    pub fn iter(&self) -> impl Iterator<Item = (GoalPosition, &GoalSlot)> {
        GoalPosition::ALL.into_iter().zip(self.slots.iter())
    }

    pub fn locked(&self) -> impl Iterator<Item = (GoalPosition, &GoalSlot)> {
        self.iter().filter(|(_, slot)| slot.locked)
    }
}

/// A goal row as stored in the `goals` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    /// Raw position; validated when applied
    pub position: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub locked: bool,
}

/// Upsert payload for the `goals` table, keyed on `(user_id, position)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalWrite {
    pub user_id: String,
    pub position: GoalPosition,
    pub title: String,
    pub locked: bool,
}

impl GoalWrite {
    /// Column list of the conflict key.
    pub const CONFLICT_KEY: &'static str = "user_id,position";
}
