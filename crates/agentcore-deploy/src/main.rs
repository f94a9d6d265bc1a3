//! agentcore-deploy: deploy, clean up or inspect the AgentCore multi-agent system

use anyhow::Result;
use agentcore_deploy::cli::{self, CleanupArgs, DeployArgs, StatusArgs};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "agentcore-deploy")]
#[command(about = "Resource lifecycle for the AgentCore multi-agent system")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create every resource, reusing what already exists
    Deploy(DeployArgs),

    /// Delete every resource and its registry entries
    Cleanup(CleanupArgs),

    /// Show which resources are currently deployed
    Status(StatusArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        cli::print_error(&e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    cli::init_logging();

    match args.command {
        Command::Deploy(deploy) => cli::run_deploy(deploy).await,
        Command::Cleanup(cleanup) => cli::run_cleanup(cleanup).await,
        Command::Status(status) => cli::run_status(status).await,
    }
}
