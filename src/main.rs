//! sgfdb - Batch processor for SGF game-record databases
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use sgfdb::config::{CliArgs, RunConfig};
use sgfdb::error::SgfDbError;
use sgfdb::pipeline::{JobBuilder, RunStatus};
use sgfdb::progress::{print_header, print_summary, ProgressReporter};
use sgfdb::storage::LocalStorage;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(status) => ExitCode::from(status.code()),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<RunStatus> {
    let args = CliArgs::parse();

    setup_logging(args.verbose)?;

    let config = RunConfig::from_args(args)
        .map_err(SgfDbError::from)
        .context("Invalid configuration")?;

    if config.show_progress {
        let output = config.output_root.as_ref().map(|p| p.display().to_string());
        print_header(
            config.action.name(),
            &config.index_root.display().to_string(),
            config.max_concurrent,
            output.as_deref(),
        );
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;

    runtime.block_on(run_database(config))
}

async fn run_database(config: RunConfig) -> Result<RunStatus> {
    let show_progress = config.show_progress;
    let builder = JobBuilder::new(config, Arc::new(LocalStorage::new()));

    // Setup signal handler for graceful shutdown
    let shutdown_flag = builder.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, finishing dispatched directories...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let progress = if show_progress {
        let reporter = Arc::new(ProgressReporter::new());
        reporter.set_status("Enumerating index root...");

        let counters = builder.counters();
        let ticker_reporter = Arc::clone(&reporter);
        let started = Instant::now();
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(250));
            loop {
                interval.tick().await;
                ticker_reporter.update(&counters.snapshot(started.elapsed()));
            }
        });
        Some((reporter, ticker))
    } else {
        None
    };

    let summary = builder.run().await.context("Database run failed")?;

    if let Some((reporter, ticker)) = progress {
        ticker.abort();
        match summary.status {
            RunStatus::Interrupted => reporter.finish("Run interrupted"),
            RunStatus::RootUnreadable => reporter.finish("Index root unreadable"),
            _ => reporter.finish("Run completed"),
        }
        print_summary(&summary);
    }

    if summary.status == RunStatus::Interrupted {
        info!("Run was interrupted before every directory was processed");
    }
    if summary.status == RunStatus::CompletedWithErrors {
        info!(
            errors = summary.totals.stats.errors,
            failed_directories = summary.totals.failed_directories,
            "Run completed with errors"
        );
    }

    Ok(summary.status)
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("sgfdb=debug,warn")
    } else {
        EnvFilter::new("sgfdb=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
