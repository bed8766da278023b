// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! edgebridge - phase-aware edge integration daemon
//!
//! Single entry point, no subcommands. Exit codes: 0 on normal shutdown,
//! 1 on startup configuration errors, 2 on unrecoverable runtime errors.

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use edgebridge::runner::{shutdown_channel, WorkflowRunner};
use edgebridge::{Config, VERSION};

/// edgebridge - phase-aware edge integration daemon
#[derive(Parser, Debug)]
#[command(name = "edgebridge")]
#[command(version = VERSION)]
#[command(about = "Bridges edge inference producers to monitoring and action systems")]
struct Args {
    /// Pipeline schedule file (overrides PIPELINE_SCHEDULE_PATH)
    #[arg(short, long)]
    schedule: Option<PathBuf>,

    /// Log the resolved configuration at startup
    #[arg(long)]
    summary: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,
}

fn main() {
    let args = Args::parse();

    let env_level = std::env::var("LOG_LEVEL").unwrap_or_default();
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug || env_level.eq_ignore_ascii_case("debug") {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_ansi(true)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to initialize logging");
        std::process::exit(2);
    }

    info!("edgebridge v{VERSION} starting");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to start runtime: {e}");
            std::process::exit(2);
        }
    };
    std::process::exit(runtime.block_on(run(args)));
}

async fn run(args: Args) -> i32 {
    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return e.exit_code();
        }
    };
    if let Some(schedule) = args.schedule {
        config.pipeline_schedule_path = schedule;
    }
    if args.summary {
        log_summary(&config);
    }

    let shutdown = shutdown_channel();
    let mut runner = match WorkflowRunner::bootstrap(config, shutdown).await {
        Ok(runner) => runner,
        Err(e) => {
            error!("startup failed: {e}");
            return e.exit_code();
        }
    };
    match runner.run().await {
        Ok(()) => 0,
        Err(e) => {
            error!("runtime failure: {e}");
            e.exit_code()
        }
    }
}

fn log_summary(config: &Config) {
    info!(
        backend = ?config.edge_event_backend,
        publish = ?config.phase_publish_backend,
        schedule = %config.pipeline_schedule_path.display(),
        timezone = %config.timezone,
        "config summary"
    );
    info!(
        phase_engine = config.plugins.phase_engine.as_deref().unwrap_or("edgebridge.phase:TimeBasedPhaseEngine"),
        scheduler = config.plugins.scheduler_engine.as_deref().unwrap_or("edgebridge.phase:SinglePhaseScheduler"),
        selector = config.plugins.pipeline_selector.as_deref().unwrap_or("edgebridge.selector:WorkingHoursSelector"),
        "engine summary"
    );
}
