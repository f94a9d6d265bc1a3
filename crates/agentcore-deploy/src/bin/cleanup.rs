//! Tear down the AgentCore multi-agent system

use agentcore_deploy::cli::{self, CleanupArgs};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "cleanup")]
#[command(about = "Delete every resource and its registry entries")]
#[command(version)]
struct Args {
    #[command(flatten)]
    cleanup: CleanupArgs,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    cli::init_logging();

    if let Err(e) = cli::run_cleanup(args.cleanup).await {
        cli::print_error(&e);
        std::process::exit(1);
    }
}
