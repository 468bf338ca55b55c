//! CLI execution runner.
//!
//! Dispatches parsed commands to the tracker. Each command gets a fresh
//! event channel drained by the output loop, so everything the command
//! emits is printed before the next prompt.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::runtime::{emit_or_log, CliRuntime, RuntimeEvent};
use crate::settings::SettingsManager;

use super::bootstrap::CliContext;
use super::output::run_event_loop;
use super::repl::{ReplCommand, HELP};

/// Whether to keep reading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Parse and execute a single command line.
pub async fn execute_once(ctx: &mut CliContext, input: &str) -> Result<Flow> {
    match ReplCommand::parse(input) {
        ReplCommand::Empty => Ok(Flow::Continue),
        ReplCommand::Help => {
            println!("{}", HELP);
            Ok(Flow::Continue)
        }
        ReplCommand::Unknown(cmd) => anyhow::bail!("Unknown command: {} (try /help)", cmd),
        ReplCommand::Usage(usage) => anyhow::bail!("Usage: {}", usage),
        command => execute_command(ctx, command).await,
    }
}

/// Execute a parsed command and wait until its output is printed.
pub async fn execute_command(ctx: &mut CliContext, command: ReplCommand) -> Result<Flow> {
    // Create a fresh channel for this execution
    let (event_tx, event_rx) = mpsc::unbounded_channel::<RuntimeEvent>();

    let cli_runtime = ctx.runtime.as_any().downcast_ref::<CliRuntime>();
    if let Some(cli_runtime) = cli_runtime {
        cli_runtime.replace_event_tx(event_tx);
    } else {
        tracing::warn!("Runtime is not CliRuntime, events may not be received");
    }

    let json_mode = ctx.args.json;
    let quiet_mode = ctx.args.quiet;
    let output_handle: JoinHandle<Result<()>> =
        tokio::spawn(async move { run_event_loop(event_rx, json_mode, quiet_mode).await });

    let result = dispatch(ctx, command).await;

    // Closing the sender ends the output loop once it has drained
    if let Some(cli_runtime) = cli_runtime {
        cli_runtime.close_event_tx();
    }
    match output_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("Output handler error: {}", e),
        Err(e) => tracing::warn!("Output handler panicked: {}", e),
    }

    result
}

async fn dispatch(ctx: &CliContext, command: ReplCommand) -> Result<Flow> {
    let tracker = &ctx.tracker;

    match command {
        ReplCommand::Quit => return Ok(Flow::Quit),
        ReplCommand::SignIn(email) => {
            tracker.send_sign_in_link(&email).await?;
        }
        ReplCommand::Verify { email, code } => {
            tracker.verify_code(&email, &code).await?;
        }
        ReplCommand::SignOut => tracker.sign_out().await?,
        ReplCommand::WhoAmI => {
            tracker.show_session();
        }
        ReplCommand::Goals => {
            tracker.show_goals();
        }
        ReplCommand::SetGoal { position, title } => {
            tracker.set_goal_title(position, &title)?;
        }
        ReplCommand::Confirm(position) => {
            if !tracker.confirm_goal(position).await? {
                tracing::debug!(%position, "Nothing to confirm");
            }
        }
        ReplCommand::Unlock(position) => {
            tracker.unlock_goal(position).await?;
        }
        ReplCommand::Select(token) => {
            tracker.select_goal(&token);
        }
        ReplCommand::Date(date) => tracker.set_date(date),
        ReplCommand::Score(score) => tracker.set_score(score)?,
        ReplCommand::Text(field, text) => tracker.set_text(field, &text),
        ReplCommand::Draft => {
            tracker.show_draft();
        }
        ReplCommand::Save => {
            tracker.save_entry().await?;
        }
        ReplCommand::Entries => {
            tracker.show_entries();
        }
        ReplCommand::Trend => {
            tracker.show_trend();
        }
        ReplCommand::Config { key, value } => {
            let message = config_command(&ctx.settings_manager, &key, value.as_deref()).await?;
            emit_or_log(ctx.runtime.as_ref(), RuntimeEvent::notice(message));
        }
        ReplCommand::Help
        | ReplCommand::Empty
        | ReplCommand::Usage(_)
        | ReplCommand::Unknown(_) => {}
    }

    Ok(Flow::Continue)
}

/// Show or set one setting by dotted key.
///
/// Values are read as JSON when they parse (`5`, `true`, `"x"`), otherwise
/// as a plain string. Changes are written to the settings file and take
/// effect on the next start.
async fn config_command(settings: &SettingsManager, key: &str, value: Option<&str>) -> Result<String> {
    let Some(raw) = value else {
        let current = settings.get_value(key).await?;
        return Ok(format!("{} = {}", key, current));
    };

    let value = serde_json::from_str(raw)
        .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
    settings.set_value(key, value).await?;
    Ok(format!("{} = {} (applies on next start)", key, settings.get_value(key).await?))
}

/// Execute commands from a file, one per line.
///
/// Lines starting with `#` are comments. Execution stops on the first error
/// or at `/quit`.
pub async fn execute_batch(ctx: &mut CliContext, file_path: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(file_path)
        .await
        .with_context(|| format!("Failed to read command file: {}", file_path.display()))?;

    let commands = batch_lines(&content);
    if commands.is_empty() {
        anyhow::bail!("No commands found in file: {}", file_path.display());
    }

    let total = commands.len();
    if !ctx.args.quiet && !ctx.args.json {
        eprintln!(
            "[batch] Executing {} command(s) from {}",
            total,
            file_path.display()
        );
    }

    for (i, command) in commands.iter().enumerate() {
        if !ctx.args.quiet && !ctx.args.json {
            eprintln!("[batch] [{}/{}] {}", i + 1, total, command);
        }

        let flow = execute_once(ctx, command)
            .await
            .with_context(|| format!("Command {} failed: {}", i + 1, command))?;
        if flow == Flow::Quit {
            break;
        }
    }

    Ok(())
}

fn batch_lines(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}
