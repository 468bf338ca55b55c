//! reflect-cli - weekly reflection tracker on the command line
//!
//! # Usage
//!
//! ```bash
//! # Sign in (a code arrives by email)
//! ./target/debug/reflect-cli -e "/signin me@example.com"
//! ./target/debug/reflect-cli -e "/verify me@example.com 123456"
//!
//! # Show the selected goal's trend as JSON
//! ./target/debug/reflect-cli -e "/trend" --json | jq .
//!
//! # Run a script of commands
//! ./target/debug/reflect-cli -f weekly.txt
//!
//! # Interactive REPL mode (when no -e or -f provided)
//! ./target/debug/reflect-cli
//! ```

use anyhow::Result;
use clap::Parser;

use reflect_lib::cli::{execute_batch, execute_once, initialize, run_repl, Args};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut ctx = initialize(&args).await?;

    let result = if let Some(ref command) = args.execute {
        execute_once(&mut ctx, command).await.map(|_| ())
    } else if let Some(ref file) = args.file {
        execute_batch(&mut ctx, file).await
    } else {
        run_repl(&mut ctx).await
    };

    ctx.shutdown().await?;

    result
}
