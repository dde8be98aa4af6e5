use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

mod cli;
mod config;

use artsweep::repository::{ArtifactoryClient, ArtifactoryConfig};
use artsweep::{SweepRequest, Sweeper};
use cli::Cli;
use config::Config;

/// Exit status when setup fails and no summary is produced
const EXIT_SETUP_FAILURE: u8 = 2;

fn setup_logging() -> Result<PathBuf> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("artsweep")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // One file per run
    let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let log_file = log_dir.join(format!("artsweep_{}.log", stamp));

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(log_file)
}

/// Flip the shutdown flag on Ctrl-C; in-flight deletes still finish
fn spawn_shutdown_listener() -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight deletions");
            eprintln!("{}", "Interrupt received, finishing in-flight deletions...".yellow());
            let _ = shutdown_tx.send(true);
        }
    });
    shutdown_rx
}

async fn run_application(cli: &Cli, config: &Config) -> Result<u8> {
    let config = config.clone().with_overrides(cli.threads, cli.page_size);
    config.validate().context("Invalid input")?;

    let timeout = Duration::from_millis(config.http.timeout_ms);
    let client = ArtifactoryClient::new(
        ArtifactoryConfig::new(&cli.artifactory_url).with_timeout(timeout),
        cli.access_token.clone(),
    )?;

    let request = SweepRequest::new(&cli.older_than, &cli.exclusions_file, &cli.aql_spec)
        .with_dry_run(cli.dry_run)
        .with_workers(config.workers)
        .with_page_size(config.query.page_size)
        .with_retry(config.query.retry.policy());

    if cli.is_verbose() {
        println!("{} {:?}", "Request:".cyan(), request);
    }
    if request.dry_run {
        println!("{}", "Dry run: no artifacts will be deleted".yellow());
    }

    let sweeper = Sweeper::new(Arc::new(client)).with_shutdown(spawn_shutdown_listener());
    let report = sweeper.run(&request).await.map_err(|e| {
        let stage = if e.is_setup_error() { "Invalid input" } else { "Candidate query failed" };
        eyre::Report::new(e).wrap_err(stage)
    })?;

    println!("{}", report.summary.render(cli.format));

    if report.summary.has_failures() {
        eprintln!(
            "{} {} deletion(s) failed; see the log for details",
            "Warning:".red(),
            report.summary.failed
        );
    }

    Ok(report.summary.exit_code() as u8)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    let outcome = async {
        let log_file = setup_logging().context("Failed to setup logging")?;
        if cli.is_verbose() {
            println!("{} {}", "Logging to:".cyan(), log_file.display());
        }

        // Load configuration
        let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
        if std::env::var_os("RUST_LOG").is_none() && !cli.is_verbose() {
            if let Some(level) = config.level_filter() {
                log::set_max_level(level);
            }
        }

        info!("Starting with config from: {:?}", cli.config);

        run_application(&cli, &config).await.context("Application failed")
    }
    .await;

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red(), e);
            ExitCode::from(EXIT_SETUP_FAILURE)
        }
    }
}
