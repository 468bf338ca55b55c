//! Progress trend: one goal's scores over time.
//!
//! Derived entirely from the entry history; nothing here is persisted.

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::Serialize;

use crate::entries::ReflectionEntry;
use crate::goals::GoalPosition;

/// Fixed vertical axis of the chart.
pub const Y_DOMAIN: (i32, i32) = (0, 10);

/// One chart point. A missing score is a gap, not a zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub score: Option<i32>,
}

/// The chart series for one goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trend {
    pub goal: GoalPosition,
    pub heading: String,
    pub y_domain: (i32, i32),
    pub points: Vec<TrendPoint>,
}

impl Trend {
    pub fn new(goal: GoalPosition, points: Vec<TrendPoint>) -> Self {
        Self {
            goal,
            heading: heading(goal),
            y_domain: Y_DOMAIN,
            points,
        }
    }

    /// Points that carry a score.
    pub fn scored(&self) -> impl Iterator<Item = (NaiveDate, i32)> + '_ {
        self.points
            .iter()
            .filter_map(|p| p.score.map(|score| (p.date, score)))
    }
}

/// Chart heading, e.g. `"Goal 2 Progress Trend"`.
pub fn heading(goal: GoalPosition) -> String {
    format!("Goal {} Progress Trend", goal.get())
}

/// Entries for `goal`, ascending by date. Same-day entries keep their
/// history order.
pub fn project(entries: &[ReflectionEntry], goal: GoalPosition) -> Vec<TrendPoint> {
    let mut points: Vec<TrendPoint> = entries
        .iter()
        .filter(|e| e.goal() == Some(goal))
        .map(|e| TrendPoint {
            date: e.date,
            score: e.progress_score,
        })
        .collect();
    points.sort_by_key(|p| p.date);
    points
}

/// Memoizes the last projection, keyed on history revision and goal.
#[derive(Default)]
pub struct TrendProjector {
    cached: Mutex<Option<(u64, GoalPosition, Trend)>>,
}

impl TrendProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trend for `goal` over `entries`, recomputed only when `revision` or
    /// `goal` changed since the last call.
    pub fn trend(&self, revision: u64, goal: GoalPosition, entries: &[ReflectionEntry]) -> Trend {
        let mut cached = self.cached.lock();
        if let Some((rev, g, trend)) = cached.as_ref() {
            if *rev == revision && *g == goal {
                return trend.clone();
            }
        }

        let trend = Trend::new(goal, project(entries, goal));
        tracing::trace!(revision, %goal, points = trend.points.len(), "Trend recomputed");
        *cached = Some((revision, goal, trend.clone()));
        trend
    }

    pub fn invalidate(&self) {
        *self.cached.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn entry(id: &str, goal_ref: i64, day: NaiveDate, score: Option<i32>) -> ReflectionEntry {
        ReflectionEntry {
            id: id.to_string(),
            user_id: "u-1".to_string(),
            user_email: None,
            goal_ref,
            date: day,
            progress_score: score,
            q1: None,
            q3: None,
            highlights: None,
            challenges: None,
            experiment: None,
        }
    }

    #[test]
    fn test_projection_filters_and_sorts() {
        let entries = vec![
            entry("a", 1, date("2024-01-10"), Some(7)),
            entry("b", 2, date("2024-01-05"), Some(3)),
            entry("c", 1, date("2024-01-03"), Some(4)),
        ];

        let points = project(&entries, GoalPosition::FIRST);
        assert_eq!(
            points,
            vec![
                TrendPoint {
                    date: date("2024-01-03"),
                    score: Some(4)
                },
                TrendPoint {
                    date: date("2024-01-10"),
                    score: Some(7)
                },
            ]
        );
    }

    #[test]
    fn test_missing_score_is_a_gap() {
        let entries = vec![
            entry("a", 2, date("2024-02-01"), None),
            entry("b", 2, date("2024-02-08"), Some(5)),
        ];
        let trend = Trend::new(GoalPosition::ALL[1], project(&entries, GoalPosition::ALL[1]));

        assert_eq!(trend.points.len(), 2);
        assert_eq!(trend.points[0].score, None);
        assert_eq!(trend.scored().collect::<Vec<_>>(), vec![(date("2024-02-08"), 5)]);
    }

    #[test]
    fn test_heading_and_domain() {
        let trend = Trend::new(GoalPosition::ALL[2], Vec::new());
        assert_eq!(trend.heading, "Goal 3 Progress Trend");
        assert_eq!(trend.y_domain, (0, 10));
    }

    #[test]
    fn test_projector_recomputes_on_revision_or_goal_change() {
        let projector = TrendProjector::new();
        let mut entries = vec![entry("a", 1, date("2024-01-10"), Some(7))];

        let first = projector.trend(1, GoalPosition::FIRST, &entries);
        assert_eq!(first.points.len(), 1);

        // Same key: cached result even though the slice changed
        entries.push(entry("b", 1, date("2024-01-17"), Some(8)));
        assert_eq!(projector.trend(1, GoalPosition::FIRST, &entries), first);

        assert_eq!(projector.trend(2, GoalPosition::FIRST, &entries).points.len(), 2);
        assert!(projector.trend(2, GoalPosition::ALL[1], &entries).points.is_empty());
    }

    fn arb_entries() -> impl Strategy<Value = Vec<ReflectionEntry>> {
        prop::collection::vec((1i64..=3, 0i64..400, prop::option::of(1i32..=10)), 0..40).prop_map(
            |rows| {
                let base = date("2024-01-01");
                rows.into_iter()
                    .enumerate()
                    .map(|(i, (goal, offset, score))| {
                        entry(&format!("e-{}", i), goal, base + chrono::Duration::days(offset), score)
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn prop_projection_is_sorted_and_complete(entries in arb_entries(), goal in 1u8..=3) {
            let goal = GoalPosition::new(goal).unwrap();
            let points = project(&entries, goal);

            prop_assert!(points.windows(2).all(|w| w[0].date <= w[1].date));
            let expected = entries.iter().filter(|e| e.goal_ref == i64::from(goal.get())).count();
            prop_assert_eq!(points.len(), expected);
        }

        #[test]
        fn prop_same_day_entries_keep_history_order(scores in prop::collection::vec(1i32..=10, 1..10)) {
            let day = date("2024-03-01");
            let entries: Vec<_> = scores
                .iter()
                .enumerate()
                .map(|(i, s)| entry(&i.to_string(), 1, day, Some(*s)))
                .collect();

            let projected: Vec<Option<i32>> =
                project(&entries, GoalPosition::FIRST).into_iter().map(|p| p.score).collect();
            let expected: Vec<Option<i32>> = scores.into_iter().map(Some).collect();
            prop_assert_eq!(projected, expected);
        }
    }
}
