//! # MSP Link
//!
//! Keeps an MSP link to a flight controller alive and logs its sensor reports.
//!
//! ```bash
//! msp-link config/default.toml
//! ```
//!
//! Expected output:
//! ```text
//! INFO msp_link: MSP Link v0.1.0 starting...
//! INFO msp_link::serial: Opened flight controller link at /dev/ttyUSB0 (115200 baud)
//! INFO msp_link::link: MSP link started
//! INFO msp_link: {"reading":{"accelerometer":[...]},"stats":{"frames_sent":150,...}}
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;
use tokio::time::interval;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use msp_link::config::Config;
use msp_link::link::MspLink;
use msp_link::serial::SerialTransport;

/// Config file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Log file name inside the configured log directory
const LOG_FILE_NAME: &str = "msp-link.log";

/// Set the port to this to probe the default device list
const AUTO_PORT: &str = "auto";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let (config, loaded) = if Path::new(&config_path).exists() {
        let config = Config::load(&config_path)
            .with_context(|| format!("Failed to load {}", config_path))?;
        (config, true)
    } else {
        (Config::default(), false)
    };

    let _guard = init_logging(&config)?;

    info!("MSP Link v{} starting...", env!("CARGO_PKG_VERSION"));
    if loaded {
        info!("Loaded configuration from {}", config_path);
    } else {
        warn!("{} not found, using default configuration", config_path);
    }

    let rx = open_serial(&config)?;
    let tx = rx.try_clone()?;
    info!("Serial port opened at: {}", rx.device_path());

    let link = MspLink::start(&config, rx, tx);
    let mut report_interval = interval(config.telemetry.log_interval());

    info!("Press Ctrl+C to exit");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = report_interval.tick() => {
                let control = link.control();
                let report = json!({
                    "reading": control.telemetry().reading(),
                    "stats": control.stats(),
                });
                info!("{}", report);

                if !link.is_running() {
                    warn!("Link loop exited unexpectedly");
                    break;
                }
            }

            _ = &mut ctrl_c => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    let stats = link.control().stats();
    link.shutdown().await?;
    info!(
        "Total frames sent: {}, received: {}",
        stats.frames_sent, stats.frames_received
    );

    Ok(())
}

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides the configured level. The returned guard must live
/// until exit so buffered file output is flushed.
fn init_logging(config: &Config) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.logging.level)
            .with_context(|| format!("Invalid log level: {}", config.logging.level))?,
    };

    match &config.logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::never(directory, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            Ok(None)
        }
    }
}

fn open_serial(config: &Config) -> Result<SerialTransport> {
    let serial = &config.serial;

    let transport = if serial.port == AUTO_PORT {
        SerialTransport::open(serial.baud_rate, serial.timeout())?
    } else {
        SerialTransport::open_with_paths(&[serial.port.as_str()], serial.baud_rate, serial.timeout())?
    };

    Ok(transport)
}
