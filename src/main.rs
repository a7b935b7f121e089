mod cli;
mod config;
mod pipelines;
mod utils;

use std::env;
use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{Level, debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::parse;
use crate::config::defs::{
    EXTRACT_TAG, MERGE_TAG, PipelineError, RECEIPT_TAG, RunConfig, SCRNA_TAG,
};
use crate::pipelines::{extract, merge, receipt, scrna};
use crate::utils::command::check_tools;
use crate::utils::system::thread_advisory;

#[tokio::main]
async fn main() -> Result<()> {
    let run_start = Instant::now();

    let args = parse();
    let cwd = env::current_dir()?;

    let cfg = match RunConfig::from_args(args, cwd) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let log_guard = match init_logging(&cfg) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    println!("\n-------------\n Barseq\n-------------\n");
    debug!(
        "command line:\n  {}",
        env::args().collect::<Vec<_>>().join(" ")
    );
    info!("barseq {}", cfg.args.module);
    thread_advisory(cfg.args.threads);

    if let Err(e) = check_tools(&cfg.args.module) {
        error!("{}", e);
        drop(log_guard);
        std::process::exit(1);
    }

    let module = cfg.args.module.clone();
    let cfg = Arc::new(cfg);
    if let Err(e) = match module.as_str() {
        EXTRACT_TAG => extract::run(cfg.clone()).await,
        MERGE_TAG => merge::run(cfg.clone()).await,
        SCRNA_TAG => scrna::run(cfg.clone()).await,
        RECEIPT_TAG => receipt::run(&cfg),
        _ => Err(PipelineError::InvalidConfig(format!(
            "Invalid module: {}",
            module
        ))),
    } {
        error!(
            "Pipeline failed: {} at {} milliseconds.",
            e,
            run_start.elapsed().as_millis()
        );
        drop(log_guard);
        std::process::exit(1);
    }

    println!("Run complete: {} milliseconds.", run_start.elapsed().as_millis());
    Ok(())
}

/// Builds the dual-sink subscriber: terminal output at info (debug with
/// --verbose) and a persistent log file that always captures debug, so
/// failures in non-interactive deployments stay diagnosable.
fn init_logging(cfg: &RunConfig) -> Result<WorkerGuard, PipelineError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cfg.log_file)
        .map_err(|e| match e.kind() {
            io::ErrorKind::PermissionDenied => {
                PipelineError::Permission(format!("cannot write to {}", cfg.log_file.display()))
            }
            _ => PipelineError::IOError(e),
        })?;
    let (file_writer, guard) = tracing_appender::non_blocking(file);

    let console_level = if cfg.args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(true)
                .without_time()
                .with_writer(std::io::stderr)
                .with_filter(LevelFilter::from_level(console_level)),
        )
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(file_writer)
                .with_filter(LevelFilter::DEBUG),
        )
        .init();

    Ok(guard)
}
