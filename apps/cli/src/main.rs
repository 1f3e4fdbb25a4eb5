use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use dropstep_dropbox::DropboxConnector;
use dropstep_step::{Direction, StepEvent, StepRunner};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod config;
mod rows;

use config::CliConfig;
use rows::Outputs;

#[derive(Parser)]
#[command(name = "dropstep")]
#[command(version, about = "Move files between local disk and Dropbox, one row at a time")]
#[command(after_help = "EXAMPLES:
    # Upload the files named by each row, routing rows by outcome
    dropstep upload --config step.toml --rows rows.jsonl --success ok.jsonl --failure failed.jsonl

    # Download, reading rows from stdin and writing them to stdout
    cat rows.jsonl | dropstep download --config step.toml --rows -

Set RUST_LOG (e.g. RUST_LOG=debug) to change log verbosity.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload local files to Dropbox
    Upload(StepArgs),
    /// Download Dropbox files to local disk
    Download(StepArgs),
}

#[derive(Args)]
struct StepArgs {
    /// Step configuration (TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// Input rows as JSON Lines; `-` reads stdin
    #[arg(short, long)]
    rows: PathBuf,

    /// Main output when no target steps are configured; stdout by default
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output for rows routed to `successful_step`
    #[arg(long)]
    success: Option<PathBuf>,

    /// Output for rows routed to `failed_step`
    #[arg(long)]
    failure: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let (direction, args) = match cli.command {
        Commands::Upload(args) => (Direction::Upload, args),
        Commands::Download(args) => (Direction::Download, args),
    };
    run_step(direction, args).await
}

async fn run_step(direction: Direction, args: StepArgs) -> Result<ExitCode> {
    let config = CliConfig::load(&args.config)?;
    let outputs = Outputs::new(&config.step, args.output, args.success, args.failure)?;
    let rows = rows::read_rows_from(&args.rows)?;

    let connector = Arc::new(DropboxConnector::new(&config.dropbox)?);
    let (events_tx, events_rx) = mpsc::channel(64);
    let runner = StepRunner::new(config.step, direction, connector)?.with_events(events_tx);

    let cancel = runner.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping step");
            cancel.cancel();
        }
    });
    let events = tokio::spawn(log_events(events_rx));

    let report = runner.run(rows).await;
    drop(runner);
    let _ = events.await;

    outputs.write(&report.outcomes)?;

    if let Some(err) = &report.stopped {
        tracing::error!(error = %err, "step did not complete");
    }
    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Logs progress until the runner drops its sender.
async fn log_events(mut events_rx: mpsc::Receiver<StepEvent>) {
    while let Some(event) = events_rx.recv().await {
        match event {
            StepEvent::RowStarted { index, source } => {
                tracing::debug!(row = index, %source, "row started");
            }
            StepEvent::Progress { index, progress } => {
                tracing::trace!(
                    row = index,
                    path = %progress.path,
                    percent = progress.percentage(),
                    "transfer progress"
                );
            }
            StepEvent::RowFinished { index, route, error } => match error {
                Some(error) => tracing::warn!(row = index, ?route, %error, "row failed"),
                None => tracing::debug!(row = index, ?route, "row done"),
            },
        }
    }
}
