//! Modbus TCP slave daemon entry point.
//!
//! Binds the TCP transport, wires an in-memory register bank into the
//! frame processor and polls it until a shutdown signal arrives.

mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use mbtcp_common::config::SlaveConfig;
use mbtcp_slave::{FrameProcessor, PollStats, RegisterBank, SharedBank, TcpTransport};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::signals::SignalHandler;

/// Polls between two periodic status lines.
const STATUS_INTERVAL: u64 = 60_000;

/// Modbus TCP slave daemon command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "mbtcp-daemon",
    about = "Modbus TCP slave serving an in-memory register bank",
    version,
    long_about = None
)]
struct Args {
    /// Path to a slave configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Unit identifier (overrides config file).
    #[arg(long, short = 'u')]
    unit_id: Option<u8>,

    /// TCP port to listen on (overrides config file).
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Reject frames with a bad protocol id or MBAP length.
    #[arg(long)]
    strict_mbap: bool,

    /// Maximum polls to run (0 = infinite).
    #[arg(long, default_value = "0")]
    max_polls: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Modbus TCP slave");

    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid slave configuration")?;

    info!(
        unit_id = config.unit_id,
        listen = %config.listen.socket_addr(),
        strict_mbap = config.strict_mbap,
        "Configuration loaded"
    );

    let signal_handler = SignalHandler::new().context("Failed to set up signal handlers")?;

    run_slave(&config, &signal_handler, args.max_polls)
}

/// Initialize logging with the specified log level.
fn init_logging(level: &str) {
    let filter = format!("mbtcp_daemon={level},mbtcp_slave={level},mbtcp_common={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `MBTCP_CONFIG_PATH` environment variable
/// 3. `/etc/mbtcp/slave.toml` (system path)
/// 4. `config/slave.toml` (local development)
/// 5. Built-in defaults
fn load_config(cli_path: Option<&Path>) -> Result<SlaveConfig> {
    if let Some(config_path) = cli_path {
        info!(?config_path, "Loading config from command-line argument");
        return SlaveConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"));
    }

    if let Ok(env_path) = std::env::var("MBTCP_CONFIG_PATH") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from MBTCP_CONFIG_PATH");
            return SlaveConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from MBTCP_CONFIG_PATH={env_path:?}")
            });
        }
        warn!(
            path = %env_path,
            "MBTCP_CONFIG_PATH set but file does not exist, checking other locations"
        );
    }

    for candidate in ["/etc/mbtcp/slave.toml", "config/slave.toml"] {
        let config_path = Path::new(candidate);
        if config_path.exists() {
            info!(?config_path, "Loading config file");
            return SlaveConfig::from_file(config_path)
                .with_context(|| format!("Failed to load config from {config_path:?}"));
        }
    }

    info!("No config file found, using built-in defaults");
    Ok(SlaveConfig::default())
}

/// Apply command-line overrides on top of the loaded configuration.
fn apply_overrides(config: &mut SlaveConfig, args: &Args) {
    if let Some(unit_id) = args.unit_id {
        config.unit_id = unit_id;
    }
    if let Some(port) = args.port {
        config.listen.port = port;
    }
    if args.strict_mbap {
        config.strict_mbap = true;
    }
}

/// Main poll loop.
fn run_slave(config: &SlaveConfig, signal_handler: &SignalHandler, max_polls: u64) -> Result<()> {
    let transport = TcpTransport::bind(config.listen.socket_addr(), config.write_timeout)
        .context("Failed to bind Modbus TCP listener")?;

    let mut processor: FrameProcessor<TcpTransport> =
        FrameProcessor::new(config.unit_id, transport).with_strict_mbap(config.strict_mbap);

    let bank = SharedBank::new(RegisterBank::new(&config.bank));
    bank.attach(&mut processor);
    info!(bank = ?config.bank, "Register bank attached");

    let mut polls_run = 0u64;
    while !signal_handler.shutdown_requested() {
        if processor.poll() == 0 {
            std::thread::sleep(config.poll_interval);
        }

        if signal_handler.take_status_request() {
            log_status(processor.stats(), "Status requested");
        }

        polls_run += 1;
        if max_polls > 0 && polls_run >= max_polls {
            info!(polls = polls_run, "Maximum poll count reached");
            signal_handler.request_shutdown();
            break;
        }

        if polls_run % STATUS_INTERVAL == 0 {
            log_status(processor.stats(), "Periodic status");
        }
    }

    info!("Shutting down...");
    processor.disconnect();

    let stats = processor.stats();
    match serde_json::to_string(stats) {
        Ok(json) => info!(stats = %json, "Final poll statistics"),
        Err(e) => warn!(error = %e, "Failed to serialize poll statistics"),
    }
    info!(
        responses = stats.responses_sent,
        dropped = stats.dropped.total(),
        signals = signal_handler.state().signal_count(),
        "Daemon shutdown complete"
    );

    Ok(())
}

fn log_status(stats: &PollStats, message: &str) {
    info!(
        polls = stats.polls,
        responses = stats.responses_sent,
        dropped = stats.dropped.total(),
        send_failures = stats.send_failures,
        accepted = stats.connections_accepted,
        rejected = stats.connections_rejected,
        "{message}"
    );
}
