//! Command handlers shared by the `agentcore-deploy`, `deploy` and
//! `cleanup` binaries

use crate::aws::{AwsContext, FromAwsContext, SsmParameterStore, get_current_account_id};
use crate::config::{DeployConfig, vars};
use crate::handler::{Catalog, build_catalog};
use crate::orchestrator::{
    Plan, Report, StatusEntry, TeardownOptions, deploy, preview, status, status_table, teardown,
};
use crate::registry::Registry;
use agentcore_deploy_common::EnvFile;
use agentcore_deploy_common::defaults::{CONFIRMATION_PHRASE, DEFAULT_ENV_FILE};
use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// SDK targets that only log at `warn` and above
const QUIET_TARGETS: [&str; 4] = ["aws_config", "aws_sdk", "aws_smithy", "hyper"];

#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Flags every command accepts
#[derive(clap::Args, Debug, Clone)]
pub struct CommonArgs {
    /// Configuration file (KEY=value lines); the process environment wins
    #[arg(long, default_value = DEFAULT_ENV_FILE)]
    pub env_file: PathBuf,

    /// AWS region (overrides AWS_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// AWS profile to use (overrides AWS_PROFILE)
    #[arg(long)]
    pub profile: Option<String>,

    /// Output format for the summary
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct DeployArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Show what would be created or reused without changing anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CleanupArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Maximum concurrent deletes of one parent's children
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub parallel: u16,

    /// Show what would be deleted without changing anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Local files deploy uploads, checked before any AWS call
#[derive(Debug, Error)]
#[error("missing local artifacts: {}", .0.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
pub struct MissingArtifacts(pub Vec<PathBuf>);

/// Install the fmt subscriber: `RUST_LOG` plus an INFO default, with the SDK
/// crates quietened.
pub fn init_logging() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());
    for target in QUIET_TARGETS {
        if let Ok(directive) = format!("{target}=warn").parse() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Print error in a user-friendly way
pub fn print_error(e: &anyhow::Error) {
    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

/// Read the env file, then layer the process environment and CLI flags on
/// top of it.
pub fn load_env(args: &CommonArgs) -> Result<EnvFile> {
    let flags = [
        (vars::AWS_REGION, args.region.clone()),
        (vars::AWS_PROFILE, args.profile.clone()),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.map(|v| (key, v)));

    let env = EnvFile::load_optional(&args.env_file)?
        .with_overrides(std::env::vars())
        .with_overrides(flags);
    Ok(env)
}

/// Every file deploy reads from disk
pub fn check_artifacts(config: &DeployConfig) -> Result<(), MissingArtifacts> {
    let missing: Vec<PathBuf> = [&config.packages.tool, &config.packages.handler]
        .into_iter()
        .filter(|p| !p.is_file())
        .chain(Some(&config.knowledge_base.docs_dir).filter(|d| !d.is_dir()))
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(MissingArtifacts(missing))
    }
}

/// Ask before deleting anything. Only the literal [`CONFIRMATION_PHRASE`]
/// proceeds.
pub fn confirm_cleanup(
    config: &DeployConfig,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> std::io::Result<bool> {
    write!(
        output,
        "This deletes every resource of project '{}' in {}. Type '{}' to continue: ",
        config.project,
        config.region(),
        CONFIRMATION_PHRASE
    )?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim() == CONFIRMATION_PHRASE)
}

/// Cancelled on the first Ctrl-C
pub fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current step");
            cancel_clone.cancel();
        }
    });
    cancel
}

/// A verified AWS session with the registry and handler catalog built on it
struct Session {
    registry: Registry,
    catalog: Catalog,
}

impl Session {
    async fn connect(config: Arc<DeployConfig>) -> Result<Self> {
        if let Some(profile) = config.profile() {
            info!(profile = %profile, "Using AWS profile");
        }
        let aws = AwsContext::with_profile(config.region(), config.profile()).await;
        let account = get_current_account_id(&aws).await?;
        info!(
            project = %config.project,
            region = %config.region(),
            "Connected"
        );

        Ok(Self {
            registry: Registry::new(Arc::new(SsmParameterStore::from_context(&aws))),
            catalog: build_catalog(&aws, config, &account),
        })
    }
}

pub async fn run_deploy(args: DeployArgs) -> Result<()> {
    let env = load_env(&args.common)?;
    let config = Arc::new(DeployConfig::for_deploy(&env)?);
    check_artifacts(&config)?;

    let session = Session::connect(config).await?;

    if args.dry_run {
        let entries = preview(&session.catalog, &session.registry, &Plan::deploy(&session.catalog)).await;
        return emit_entries(&entries, args.common.format);
    }

    match deploy(&session.catalog, &session.registry, shutdown_token()).await {
        Ok(report) => {
            emit_report(&report, args.common.format)?;
            info!("Deploy complete");
            Ok(())
        }
        Err(failure) => {
            emit_report(&failure.report, args.common.format)?;
            Err(anyhow::Error::new(*failure))
        }
    }
}

pub async fn run_cleanup(args: CleanupArgs) -> Result<()> {
    let stdin = std::io::stdin();
    run_cleanup_with(args, &mut stdin.lock(), &mut std::io::stdout()).await
}

/// Cleanup reading its confirmation from `input`
pub async fn run_cleanup_with(
    args: CleanupArgs,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<()> {
    let env = load_env(&args.common)?;
    let config = Arc::new(DeployConfig::from_env(&env)?);

    if !args.yes && !args.dry_run {
        let proceed = confirm_cleanup(&config, input, output)
            .context("Failed to read confirmation")?;
        if !proceed {
            writeln!(output, "Cleanup cancelled.")?;
            return Ok(());
        }
    }

    let session = Session::connect(config).await?;

    if args.dry_run {
        let entries = status(&session.catalog, &session.registry).await;
        return emit_entries(&entries, args.common.format);
    }

    let options = TeardownOptions {
        parallel: usize::from(args.parallel),
    };
    let report = teardown(&session.catalog, &session.registry, &options).await;
    emit_report(&report, args.common.format)?;

    let warnings = report.warning_count();
    if warnings > 0 {
        warn!(steps = warnings, "Cleanup finished with warnings; some resources may remain");
    } else {
        info!("Cleanup complete");
    }
    Ok(())
}

pub async fn run_status(args: StatusArgs) -> Result<()> {
    let env = load_env(&args.common)?;
    let config = Arc::new(DeployConfig::from_env(&env)?);
    let session = Session::connect(config).await?;

    let entries = status(&session.catalog, &session.registry).await;
    emit_entries(&entries, args.common.format)
}

fn emit_report(report: &Report, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => report.print(),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

fn emit_entries(entries: &[StatusEntry], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", status_table(entries)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entries)?),
    }
    Ok(())
}
