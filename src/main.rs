//! # Rover Mux
//!
//! Multiplex rover serial peripherals onto the radio uplink.
//!
//! ## Control Flow
//!
//! 1. **Initialization**
//!    - Parse CLI, set up logging, load configuration
//!    - Resolve the rover identity
//!    - Discover serial devices and classify the radio / correction sink
//!
//! 2. **Run**
//!    - One reader task per peripheral, one heartbeat, one uplink dispatcher
//!
//! 3. **Graceful Shutdown** (Ctrl+C)
//!    - Signal every task, flush frames already queued, log totals

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use rover_mux::config::Config;
use rover_mux::identity::{resolve_identity, IdentityOutcome};
use rover_mux::mux::{start, Multiplexer, ReaderExit, Started, TaskExit};
use rover_mux::serial::discovery::discover_devices;
use rover_mux::serial::open_port;

/// Time allowed for tasks to finish after Ctrl+C
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "rover-mux")]
#[command(about = "Multiplex rover serial peripherals onto a single radio uplink")]
#[command(version)]
struct Cli {
    /// Configuration file path (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Radio uplink device path (overrides the configured path)
    #[arg(short, long)]
    uplink: Option<String>,

    /// Verbose logging (debug level unless RUST_LOG is set)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Rover Mux v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Config::load(path)?
        }
        None => Config::default(),
    };
    if let Some(uplink) = cli.uplink {
        config.discovery.uplink_path = Some(uplink);
    }

    let identity = match resolve_identity(&config.identity.source) {
        IdentityOutcome::Resolved(identity) => identity,
        IdentityOutcome::Sentinel { identity, reason } => {
            warn!("{}; using sentinel identity", reason);
            identity
        }
    };
    info!("Rover identity: {}", identity);

    let discovered = discover_devices(&config.discovery, config.mux.max_channels)?;
    let mut mux = Multiplexer::new(identity, &config.mux);
    let Started { mut tasks, .. } = start(&mut mux, &discovered, &config, |path: &Path| {
        open_port(&path.to_string_lossy(), &config.serial)
    });

    info!("Press Ctrl+C to exit");

    // Run until Ctrl+C, reporting tasks that end early
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
            Some(joined) = tasks.join_next() => report(joined),
        }
    }

    mux.shutdown();
    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while let Some(joined) = tasks.join_next().await {
            report(joined);
        }
    })
    .await;
    if drained.is_err() {
        warn!("Tasks did not stop within {:?}, aborting", SHUTDOWN_GRACE);
        tasks.abort_all();
    }

    let stats = mux.stats();
    info!(
        "Frames sent: {}, lost: {}, status: {} ({} dropped), queue full: {}",
        stats.frames_sent,
        stats.frames_lost,
        stats.status_frames,
        stats.status_dropped,
        stats.queue_full_events
    );

    Ok(())
}

fn report(joined: std::result::Result<TaskExit, tokio::task::JoinError>) {
    match joined {
        Ok(TaskExit::Reader(channel, ReaderExit::DeviceError(e))) => {
            warn!("Channel {} is down: {}", channel, e);
        }
        Ok(TaskExit::Reader(channel, ReaderExit::Shutdown)) => {
            info!("Channel {} reader stopped", channel);
        }
        Ok(TaskExit::Heartbeat) => info!("Heartbeat stopped"),
        Ok(TaskExit::Uplink(Ok(()))) => info!("Uplink stopped"),
        Ok(TaskExit::Uplink(Err(e))) => error!("Uplink lost: {}", e),
        Err(e) => error!("Task failed: {}", e),
    }
}
