//! CLI argument parsing using clap.
//!
//! Defines the command-line interface for reflect-cli.

use clap::Parser;
use std::path::PathBuf;

/// Weekly reflection tracker - set three goals, log weekly reflections,
/// chart progress
#[derive(Parser, Debug, Clone)]
#[command(name = "reflect-cli")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Execute a single command (e.g. "/trend") and exit
    #[arg(short = 'e', long, conflicts_with = "file")]
    pub execute: Option<String>,

    /// Execute commands from a file (one per line, `#` comments) and exit
    #[arg(short = 'f', long, conflicts_with = "execute")]
    pub file: Option<PathBuf>,

    /// Backend project URL (overrides settings and env vars)
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Backend anon key (overrides settings and env vars)
    #[arg(long, env = "REFLECT_ANON_KEY")]
    pub anon_key: Option<String>,

    /// Answer yes to confirmation prompts (e.g. unlocking a goal)
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Output events as JSON lines (for scripting/parsing)
    #[arg(long)]
    pub json: bool,

    /// Only print notices
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Show verbose output (debug information)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
