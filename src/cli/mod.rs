//! CLI module for the reflection tracker.
//!
//! # Architecture
//!
//! The tracker never prints. It emits `RuntimeEvent`s through the
//! `TrackerRuntime` abstraction; the CLI runtime sends them through a
//! channel consumed by the output handler.
//!
//! ```text
//! +-----------------+     +-------------+     +---------------+
//! | Tracker         | --> | CliRuntime  | --> | output.rs     |
//! | (shared logic)  |     | (emit())    |     | (print/JSON)  |
//! +-----------------+     +-------------+     +---------------+
//! ```
//!
//! # REPL Mode
//!
//! When no command is provided via `-e` or `-f`, the CLI enters
//! interactive REPL mode. See `repl.rs` for the command set.

mod args;
mod bootstrap;
mod output;
mod repl;
mod runner;

pub use args::Args;
pub use bootstrap::{initialize, CliContext};
pub use output::run_event_loop;
pub use repl::{run_repl, ReplCommand};
pub use runner::{execute_batch, execute_command, execute_once, Flow};
