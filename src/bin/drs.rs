//! `drs` binary entry point
//!
//! Tails the live-timing cache and relays leader and flag changes with a
//! publish delay.
//!
//! # Usage
//!
//! ```bash
//! # Race with the default 30 s delay
//! drs race
//!
//! # Sprint qualifying, 45 s delay, replaying the feed file from the top
//! drs "sprint qualifying" --delay 45 --from-start
//!
//! # Force a team as leader before any timing data arrives
//! drs fp --force-lead Ferrari
//! ```
//!
//! Control commands (`CALIBRATE_START`, `ADJUST:<seconds>`) are read from
//! stdin, one per line.

use anyhow::Context;
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use drs::{
    ControlSender, LogBus, ReferenceData, Service, ServiceConfig, SessionType, Topic,
    control_channel,
};

/// Delayed race-state relay
///
/// Publishes the session leader and flag status in sync with a delayed
/// broadcast.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Session type: p, fp, practice, free practice, q, sq, qualifying,
    /// sprint qualifying, r, sr, race, sprint race
    #[arg(value_parser = parse_session_type)]
    session_type: SessionType,

    /// Publish this team as leader immediately at startup
    #[arg(long, value_name = "TEAM")]
    force_lead: Option<String>,

    /// YAML configuration file
    #[arg(short, long, env = "DRS_CONFIG")]
    config: Option<PathBuf>,

    /// Live-timing cache file (overrides the configuration)
    #[arg(long, env = "DRS_FEED")]
    feed: Option<PathBuf>,

    /// Driver and team reference data (overrides the configuration)
    #[arg(long, env = "DRS_REFERENCE")]
    reference: Option<PathBuf>,

    /// Publish delay in seconds (overrides the configuration)
    #[arg(short, long, env = "DRS_DELAY")]
    delay: Option<f64>,

    /// Replay the feed file from the beginning instead of its end
    #[arg(long)]
    from_start: bool,
}

fn parse_session_type(value: &str) -> Result<SessionType, String> {
    value.parse().map_err(|e: drs::DrsError| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            ServiceConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => ServiceConfig::default(),
    };
    if let Some(feed) = args.feed {
        config.feed_path = feed;
    }
    if let Some(reference) = args.reference {
        config.reference_path = reference;
    }
    if let Some(delay) = args.delay {
        config.publish_delay_secs = delay;
    }
    config.from_start |= args.from_start;
    config.validate()?;

    let reference = ReferenceData::load(&config.reference_path).with_context(|| {
        format!("reference data is required: {}", config.reference_path.display())
    })?;
    info!(
        drivers = reference.drivers.len(),
        teams = reference.teams.len(),
        "Session type {}, publish delay {}s",
        args.session_type,
        config.publish_delay_secs
    );

    let cancel = CancellationToken::new();
    let (control_tx, control_rx) = control_channel(config.control_capacity);
    std::thread::spawn(move || read_control_from_stdin(control_tx));

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => warn!("Failed to listen for shutdown signals: {}", e),
        }
        shutdown.cancel();
    });

    let mut service = Service::new(config, args.session_type, Arc::new(reference), LogBus);
    if let Some(team) = args.force_lead {
        service = service.with_force_lead(team);
    }
    service.run(control_rx, cancel).await?;
    Ok(())
}

/// Stand-in for the bus subscription: one control command per stdin line.
///
/// Runs on a plain thread since a blocking stdin read cannot be cancelled and
/// would otherwise hold up runtime shutdown.
fn read_control_from_stdin(control: ControlSender) {
    info!(topic = %Topic::Control, "Reading control commands from stdin");
    for line in std::io::stdin().lock().lines() {
        match line {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => {
                control.submit(&line);
            }
            Err(e) => {
                warn!("Failed to read control input: {}", e);
                return;
            }
        }
    }
    debug!("stdin closed, no more control commands");
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
