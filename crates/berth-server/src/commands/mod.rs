//! CLI command definitions and dispatch.

pub mod audit;
pub mod serve;

use clap::{Parser, Subcommand};

/// Berth: container host control plane.
#[derive(Parser, Debug)]
#[command(name = "berthd", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "BERTH_LOG_JSON")]
    pub log_json: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API and notification stream.
    Serve(serve::ServeArgs),
    /// Print the local audit trail.
    Audit(audit::AuditArgs),
}

/// Dispatches the parsed command to its handler.
///
/// # Errors
///
/// Returns an error if the command fails.
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => serve::execute(args).await,
        Command::Audit(args) => audit::execute(args).await,
    }
}
