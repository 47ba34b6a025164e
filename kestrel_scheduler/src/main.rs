//! # Kestrel
//!
//! Runs the robot command scheduler against simulated hardware. Operator
//! input comes from the `[[script]]` timeline in the config file; the
//! conveyor sensor comes from a simple plant model.
//!
//! `--fast` runs cycles back to back and, unless `--cycles` is given, stops
//! shortly after the last script step. Otherwise the loop is paced at the
//! configured period until Ctrl-C.

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kestrel_common::config::LogLevel;
use kestrel_common::consts::{DEFAULT_CONFIG_PATH, DEFAULT_SERVICE_NAME};
use kestrel_scheduler::config::{load_config, KestrelConfig};
use kestrel_scheduler::cycle::{rt_setup, CycleRunner, Pacing};

/// Kestrel robot command scheduler
#[derive(Parser, Debug)]
#[command(name = "kestrel")]
#[command(version)]
#[command(about = "Cooperative command scheduler with simulated robot hardware")]
struct Args {
    /// Path to the TOML configuration.
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Stop after N cycles.
    #[arg(long, value_name = "N")]
    cycles: Option<u64>,

    /// Run without sleeping between cycles.
    #[arg(long)]
    fast: bool,

    /// CPU core to pin the control thread to (rt feature only).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (rt feature only).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let config = load_config(&args.config);
    let level = config
        .as_ref()
        .map_or(LogLevel::Info, |c| c.shared.log_level);
    setup_tracing(&args, level);

    info!("{DEFAULT_SERVICE_NAME} v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = config
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        .and_then(|config| run(&args, &config));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("{DEFAULT_SERVICE_NAME} shutdown complete");
}

fn run(args: &Args, config: &KestrelConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Config OK: service={}, cycle_time={}µs, {} script steps",
        config.shared.service_name,
        config.cycle_time_us,
        config.script.len()
    );

    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(
        "RT setup complete (cpu_core={}, priority={})",
        args.cpu_core, args.rt_priority
    );

    let mut runner = CycleRunner::new(config)?;

    let (pacing, max_cycles) = if args.fast {
        (Pacing::Fast, Some(args.cycles.unwrap_or_else(|| runner.script_cycles())))
    } else {
        (Pacing::RealTime, args.cycles)
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    info!("entering control loop ({pacing:?}, max_cycles={max_cycles:?})");
    let summary = runner.run(&running, max_cycles, pacing)?;
    info!("summary: {}", serde_json::to_string(&summary)?);
    info!("cycle stats: {}", serde_json::to_string(runner.stats())?);
    Ok(())
}

/// Setup tracing subscriber. `RUST_LOG` wins over `--verbose`, which wins
/// over `[shared] log_level`.
fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        level.as_directive()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
