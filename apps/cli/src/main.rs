//! shoal demo interpreter.
//!
//! Runs an interactive session over stdio against one of the bundled demo
//! engines. End input (ctrl-d), interrupt (ctrl-c), or enter `quit` to
//! leave.

mod echo;
mod tictactoe;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use shoal_core::{EngineHandle, Registry, Session};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shoal", version, about = "Line-oriented interpreter demos")]
struct Cli {
    /// Prompt written before each input line.
    #[arg(long, default_value = "> ")]
    prefix: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Echo each line back.
    Echo,
    /// Echo engine that also plays tic-tac-toe on the line `tictactoe`.
    Tictactoe,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = run().await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let engine = match cli.command {
        Command::Echo => EngineHandle::new(echo::Echo),
        Command::Tictactoe => EngineHandle::new(tictactoe::Tictactoe),
    };
    tracing::info!("starting session against {:?}", engine.id());

    let registry = Arc::new(Registry::new());
    let mut session = Session::new(registry).engine(engine).prefix(cli.prefix);
    session.run().await?;
    Ok(())
}
