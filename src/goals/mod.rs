//! Goal slots: three per user, confirmed (locked) before they can carry
//! entries.

mod manager;
mod slots;

pub use manager::{GoalSlotManager, UNLOCK_PROMPT};
pub use slots::{GoalPosition, GoalRow, GoalSlot, GoalSlots, GoalWrite, GOAL_SLOT_COUNT};
