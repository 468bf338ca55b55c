//! Lightweight REPL (Read-Eval-Print-Loop) for reflect-cli.
//!
//! Provides an interactive mode when no command is given via `-e` or `-f`.
//! Every line is a slash command; `/help` lists them.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use chrono::NaiveDate;

use crate::form::DraftField;
use crate::goals::GoalPosition;

use super::bootstrap::CliContext;
use super::runner::{execute_command, Flow};

pub const HELP: &str = "\
Session:
  /signin <email>          Email a sign-in link and code
  /verify <email> <code>   Sign in with the emailed code
  /signout                 Sign out
  /whoami                  Show who is signed in
Goals:
  /goals                   Show goal slots and selectable goals
  /goal <n> <title>        Set the title of goal n (1-3)
  /confirm <n>             Confirm (lock) goal n
  /unlock <n>              Reopen goal n for editing
Entry:
  /select <Goal N|n>       Select the goal for new entries and the trend
  /date <YYYY-MM-DD>       Set the entry date
  /score <1-10|none>       Set or clear the progress score
  /prompt1 <text>          Set the first prompt answer
  /prompt3 <text>          Set the second prompt answer
  /wins <text>             Set wins
  /blockers <text>         Set blockers
  /experiment <text>       Set next week's experiment
  /draft                   Show the draft
  /save                    Save the draft as an entry
History:
  /entries                 Show all entries
  /trend                   Show the selected goal's progress trend
Other:
  /config <key> [value]    Show or set a setting (e.g. backend.timeout_secs)
  /help                    Show this help
  /quit, /exit, /q         Exit";

/// REPL command variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    /// Exit the REPL
    Quit,
    Help,
    /// Empty input (skip)
    Empty,
    SignIn(String),
    Verify { email: String, code: String },
    SignOut,
    WhoAmI,
    Goals,
    SetGoal { position: GoalPosition, title: String },
    Confirm(GoalPosition),
    Unlock(GoalPosition),
    Select(String),
    Date(NaiveDate),
    Score(Option<i32>),
    Text(DraftField, String),
    Draft,
    Save,
    Entries,
    Trend,
    /// Show a setting, or set it when a value is given
    Config { key: String, value: Option<String> },
    /// Known command with unusable arguments
    Usage(&'static str),
    /// Unknown command (will show help)
    Unknown(String),
}

impl ReplCommand {
    /// Parse user input into a REPL command.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return ReplCommand::Empty;
        }

        let (name, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (trimmed, ""),
        };

        match name.to_lowercase().as_str() {
            "/quit" | "/exit" | "/q" => ReplCommand::Quit,
            "/help" | "/?" => ReplCommand::Help,
            "/signin" => match rest {
                "" => ReplCommand::Usage("/signin <email>"),
                email => ReplCommand::SignIn(email.to_string()),
            },
            "/verify" => match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
                [email, code] => ReplCommand::Verify {
                    email: email.to_string(),
                    code: code.to_string(),
                },
                _ => ReplCommand::Usage("/verify <email> <code>"),
            },
            "/signout" => ReplCommand::SignOut,
            "/whoami" => ReplCommand::WhoAmI,
            "/goals" => ReplCommand::Goals,
            "/goal" => {
                let (n, title) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                match parse_position(n) {
                    Some(position) => ReplCommand::SetGoal {
                        position,
                        title: title.trim().to_string(),
                    },
                    None => ReplCommand::Usage("/goal <1-3> <title>"),
                }
            }
            "/confirm" => parse_position(rest)
                .map(ReplCommand::Confirm)
                .unwrap_or(ReplCommand::Usage("/confirm <1-3>")),
            "/unlock" => parse_position(rest)
                .map(ReplCommand::Unlock)
                .unwrap_or(ReplCommand::Usage("/unlock <1-3>")),
            "/select" => ReplCommand::Select(rest.to_string()),
            "/date" => match NaiveDate::parse_from_str(rest, "%Y-%m-%d") {
                Ok(date) => ReplCommand::Date(date),
                Err(_) => ReplCommand::Usage("/date <YYYY-MM-DD>"),
            },
            "/score" => match rest.to_lowercase().as_str() {
                "" | "none" | "-" => ReplCommand::Score(None),
                n => match n.parse::<i32>() {
                    Ok(score) => ReplCommand::Score(Some(score)),
                    Err(_) => ReplCommand::Usage("/score <1-10|none>"),
                },
            },
            "/prompt1" => ReplCommand::Text(DraftField::Prompt1, rest.to_string()),
            "/prompt3" => ReplCommand::Text(DraftField::Prompt3, rest.to_string()),
            "/wins" => ReplCommand::Text(DraftField::Wins, rest.to_string()),
            "/blockers" => ReplCommand::Text(DraftField::Blockers, rest.to_string()),
            "/experiment" => ReplCommand::Text(DraftField::Experiment, rest.to_string()),
            "/draft" => ReplCommand::Draft,
            "/save" => ReplCommand::Save,
            "/entries" => ReplCommand::Entries,
            "/trend" => ReplCommand::Trend,
            "/config" => match rest.split_once(char::is_whitespace) {
                _ if rest.is_empty() => ReplCommand::Usage("/config <key> [value]"),
                Some((key, value)) => ReplCommand::Config {
                    key: key.to_string(),
                    value: Some(value.trim().to_string()),
                },
                None => ReplCommand::Config {
                    key: rest.to_string(),
                    value: None,
                },
            },
            _ => ReplCommand::Unknown(trimmed.to_string()),
        }
    }
}

/// Strict goal number for slot commands; `/select` is the lenient one.
fn parse_position(token: &str) -> Option<GoalPosition> {
    token.trim().parse::<u8>().ok().and_then(GoalPosition::new)
}

/// Run an interactive REPL session.
///
/// Returns when the user exits or on EOF (Ctrl+D).
pub async fn run_repl(ctx: &mut CliContext) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    eprintln!("reflect-cli interactive mode");
    match ctx.tracker.identity() {
        Some(identity) => eprintln!(
            "Signed in as {}",
            identity.email.as_deref().unwrap_or(&identity.user_id)
        ),
        None => eprintln!("Not signed in. Use /signin <email>, then /verify <email> <code>"),
    }
    eprintln!("Type /help for commands, /quit to exit\n");

    loop {
        print!("> ");
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            // EOF (Ctrl+D)
            eprintln!("\nGoodbye!");
            break;
        }

        match ReplCommand::parse(&input) {
            ReplCommand::Empty => continue,
            ReplCommand::Quit => {
                eprintln!("Goodbye!");
                break;
            }
            ReplCommand::Help => eprintln!("{}", HELP),
            ReplCommand::Unknown(cmd) => {
                eprintln!("Unknown command: {}", cmd);
                eprintln!("Type /help for commands");
            }
            ReplCommand::Usage(usage) => eprintln!("Usage: {}", usage),
            command => match execute_command(ctx, command).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(e) => eprintln!("Error: {}", e),
            },
        }
    }

    Ok(())
}
