//! Deploy the AgentCore multi-agent system

use agentcore_deploy::cli::{self, DeployArgs};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "deploy")]
#[command(about = "Create every resource, reusing what already exists")]
#[command(version)]
struct Args {
    #[command(flatten)]
    deploy: DeployArgs,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    cli::init_logging();

    if let Err(e) = cli::run_deploy(args.deploy).await {
        cli::print_error(&e);
        std::process::exit(1);
    }
}
