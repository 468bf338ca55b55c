//! CLI output handling - Event receiver loop.
//!
//! Receives events from the tracker via the runtime channel and renders them
//! as terminal text, JSON lines, or (quiet) notices only.

use std::io::{self, Write};

use anyhow::Result;
use tokio::sync::mpsc;

use crate::entries::ReflectionEntry;
use crate::form::{Draft, GoalOption};
use crate::goals::{GoalPosition, GoalSlots};
use crate::runtime::RuntimeEvent;
use crate::trend::Trend;

/// Width of a full-score bar in the terminal trend chart.
const BAR_WIDTH: usize = 20;

/// Run the event loop until the sender side is closed.
///
/// * `event_rx` - Channel receiver for runtime events
/// * `json_mode` - If true, output events as JSON lines
/// * `quiet_mode` - If true, only output notices
pub async fn run_event_loop(
    mut event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
    json_mode: bool,
    quiet_mode: bool,
) -> Result<()> {
    while let Some(event) = event_rx.recv().await {
        if json_mode {
            println!("{}", serde_json::to_string(&event)?);
            io::stdout().flush()?;
        } else if quiet_mode {
            if let RuntimeEvent::Notice { message } = &event {
                println!("{}", message);
            }
        } else {
            for line in render(&event) {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

/// Terminal lines for an event.
fn render(event: &RuntimeEvent) -> Vec<String> {
    match event {
        RuntimeEvent::SessionChanged { identity } => vec![match identity {
            Some(identity) => format!(
                "Signed in as {}",
                identity.email.as_deref().unwrap_or(&identity.user_id)
            ),
            None => "Signed out".to_string(),
        }],
        RuntimeEvent::GoalsLoaded { slots, options } => render_goals(slots, options),
        RuntimeEvent::GoalConfirmed { position, title } => {
            vec![format!("Goal {} confirmed: {}", position, title)]
        }
        RuntimeEvent::GoalUnlocked { position } => vec![format!("Goal {} unlocked", position)],
        RuntimeEvent::EntriesLoaded { entries } => render_entries(entries),
        RuntimeEvent::EntrySaved { entry } => vec![format!(
            "Saved entry for Goal {} on {}",
            entry.goal_ref, entry.date
        )],
        // The failed command reports the error itself
        RuntimeEvent::SaveFailed { .. } => Vec::new(),
        RuntimeEvent::DraftChanged { draft, selected } => render_draft(draft, *selected),
        RuntimeEvent::TrendUpdated { trend } => render_trend(trend),
        RuntimeEvent::Notice { message } => vec![message.clone()],
    }
}

fn render_goals(slots: &GoalSlots, options: &[GoalOption]) -> Vec<String> {
    let mut lines: Vec<String> = slots
        .iter()
        .map(|(position, slot)| {
            let title = if slot.title.is_empty() {
                "(empty)"
            } else {
                slot.title.as_str()
            };
            let state = if slot.locked { "confirmed" } else { "editing" };
            format!("Goal {}: {} [{}]", position, title, state)
        })
        .collect();

    if !options.is_empty() {
        let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
        lines.push(format!("Selectable: {}", labels.join(", ")));
    }
    lines
}

fn render_entries(entries: &[ReflectionEntry]) -> Vec<String> {
    if entries.is_empty() {
        return vec!["No entries yet".to_string()];
    }

    entries
        .iter()
        .map(|e| {
            let score = e
                .progress_score
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            let mut line = format!("{}  Goal {}  score {:>2}", e.date, e.goal_ref, score);
            if let Some(q1) = e.q1.as_deref() {
                line.push_str("  ");
                line.push_str(&truncate(q1, 40));
            }
            line
        })
        .collect()
}

fn render_draft(draft: &Draft, selected: GoalPosition) -> Vec<String> {
    let score = draft
        .progress_score
        .map(|s| s.to_string())
        .unwrap_or_else(|| "none".to_string());

    vec![
        format!("Draft for Goal {} on {} (selected: Goal {})", draft.goal_ref, draft.date, selected),
        format!("  score:      {}", score),
        format!("  prompt1:    {}", draft.prompt1),
        format!("  prompt3:    {}", draft.prompt3),
        format!("  wins:       {}", draft.wins),
        format!("  blockers:   {}", draft.blockers),
        format!("  experiment: {}", draft.experiment),
    ]
}

fn render_trend(trend: &Trend) -> Vec<String> {
    let mut lines = vec![trend.heading.clone()];
    if trend.points.is_empty() {
        lines.push("  (no entries)".to_string());
        return lines;
    }

    let (_, max) = trend.y_domain;
    for point in &trend.points {
        match point.score {
            Some(score) => {
                let width = usize::try_from(score.clamp(0, max)).unwrap_or(0) * BAR_WIDTH
                    / usize::try_from(max.max(1)).unwrap_or(1);
                lines.push(format!("  {}  {:<w$} {}", point.date, "#".repeat(width), score, w = BAR_WIDTH));
            }
            None => lines.push(format!("  {}  {:<w$} -", point.date, "", w = BAR_WIDTH)),
        }
    }
    lines
}

/// Truncate a string to a maximum number of characters.
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
