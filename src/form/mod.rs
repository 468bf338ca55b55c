//! Form and selection controller.
//!
//! Holds the draft under composition and the goal selected for new entries
//! and for the trend view. Only locked goals are offered for selection.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TrackerError};
use crate::goals::{GoalPosition, GoalSlots};

/// Characters of a goal title shown in a selector label.
pub const TITLE_PREVIEW_CHARS: usize = 20;

/// Lowest and highest accepted progress score.
pub const SCORE_RANGE: std::ops::RangeInclusive<i32> = 1..=10;

/// Token encoding a goal position, e.g. `"Goal 2"`.
pub fn goal_token(position: GoalPosition) -> String {
    format!("Goal {}", position.get())
}

/// Resolve a selection token to a position.
///
/// Accepts `"Goal N"` (any case) or a bare `"N"`. Anything malformed or out
/// of range resolves to position 1; this never fails.
pub fn parse_goal_ref(token: &str) -> GoalPosition {
    let trimmed = token.trim();
    let number = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) if word.eq_ignore_ascii_case("goal") => rest.trim(),
        Some(_) => return GoalPosition::FIRST,
        None => trimmed,
    };

    number
        .parse::<u8>()
        .ok()
        .and_then(GoalPosition::new)
        .unwrap_or(GoalPosition::FIRST)
}

/// Label preview of a goal title: the first 20 characters, with `…` when
/// the title is longer.
pub fn title_preview(title: &str) -> String {
    let mut preview: String = title.chars().take(TITLE_PREVIEW_CHARS).collect();
    if title.chars().count() > TITLE_PREVIEW_CHARS {
        preview.push('…');
    }
    preview
}

/// One selectable goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalOption {
    pub label: String,
    pub value: String,
}

/// Selector options: one per locked slot, in position order.
pub fn confirmed_goal_options(slots: &GoalSlots) -> Vec<GoalOption> {
    slots
        .locked()
        .map(|(position, slot)| {
            let value = goal_token(position);
            let label = if slot.title.is_empty() {
                value.clone()
            } else {
                format!("{} ({})", value, title_preview(&slot.title))
            };
            GoalOption { label, value }
        })
        .collect()
}

/// Today's date in local time.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// The unsaved entry under composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    /// Client-side identity of this draft; the store assigns the row id
    pub id: Uuid,
    pub date: NaiveDate,
    pub goal_ref: GoalPosition,
    pub progress_score: Option<i32>,
    pub prompt1: String,
    pub prompt3: String,
    pub wins: String,
    pub blockers: String,
    pub experiment: String,
}

impl Draft {
    /// A blank draft for `goal_ref` dated `date`.
    pub fn new(goal_ref: GoalPosition, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            goal_ref,
            progress_score: None,
            prompt1: String::new(),
            prompt3: String::new(),
            wins: String::new(),
            blockers: String::new(),
            experiment: String::new(),
        }
    }

    /// Below the minimum content for a save: no score and both prompts empty.
    pub fn is_empty_content(&self) -> bool {
        self.progress_score.is_none() && self.prompt1.is_empty() && self.prompt3.is_empty()
    }
}

/// Free-text draft fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Prompt1,
    Prompt3,
    Wins,
    Blockers,
    Experiment,
}

pub struct FormController {
    draft: Draft,
    selected: GoalPosition,
}

impl Default for FormController {
    fn default() -> Self {
        Self::new(today())
    }
}

impl FormController {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            draft: Draft::new(GoalPosition::FIRST, date),
            selected: GoalPosition::FIRST,
        }
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn selected(&self) -> GoalPosition {
        self.selected
    }

    /// Select a goal for charting and for the draft.
    pub fn select_goal(&mut self, token: &str) -> GoalPosition {
        let position = parse_goal_ref(token);
        self.selected = position;
        self.draft.goal_ref = position;
        position
    }

    pub fn set_date(&mut self, date: NaiveDate) {
        self.draft.date = date;
    }

    /// Set or clear the score. Scores outside 1–10 are refused.
    pub fn set_score(&mut self, score: Option<i32>) -> Result<()> {
        if let Some(value) = score {
            if !SCORE_RANGE.contains(&value) {
                return Err(TrackerError::InvalidScore(value));
            }
        }
        self.draft.progress_score = score;
        Ok(())
    }

    pub fn set_text(&mut self, field: DraftField, text: &str) {
        let target = match field {
            DraftField::Prompt1 => &mut self.draft.prompt1,
            DraftField::Prompt3 => &mut self.draft.prompt3,
            DraftField::Wins => &mut self.draft.wins,
            DraftField::Blockers => &mut self.draft.blockers,
            DraftField::Experiment => &mut self.draft.experiment,
        };
        *target = text.to_string();
    }

    /// Start a fresh draft after a successful save: dated `date`, carrying
    /// the selected goal, everything else blank, new id.
    pub fn reset_after_save(&mut self, date: NaiveDate) {
        self.draft = Draft::new(self.selected, date);
    }

    /// Back to the initial state (on sign-out).
    pub fn reset(&mut self, date: NaiveDate) {
        *self = Self::new(date);
    }
}
