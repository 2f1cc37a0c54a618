//! RustRow - Concept2 PM5 Telemetry Logger
//!
//! Main entry point. Provides commands for:
//! - Recording live telemetry from a PM5 into raw and decoded CSV logs
//! - Translating an existing raw log into a decoded log
//! - Printing the effective configuration
//!
//! # Usage
//!
//! ```bash
//! rustrow record --device "PM5" --output-dir ./sessions
//! rustrow translate rowing_raw.csv rowing_decoded.csv
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rustrow::acquisition::AcquisitionLoop;
use rustrow::recording::sink::{generate_log_paths, CsvFrameSink};
use rustrow::recording::translator::translate_file;
use rustrow::sensors::locator::{find_device_or_cancel, DeviceLocator};
use rustrow::sensors::transport::{BleTransport, TransportTimeouts};
use rustrow::storage::config::{get_config_path, load_config, render_config, AppConfig};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "rustrow", version)]
#[command(about = "Log live Concept2 PM5 telemetry over Bluetooth LE", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults to config.toml in the data directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record live telemetry until Ctrl+C
    Record {
        /// Substring of the monitor's advertised name
        #[arg(long)]
        device: Option<String>,

        /// Pause between reads in milliseconds
        #[arg(long)]
        poll_interval_ms: Option<u64>,

        /// Consecutive failed connection attempts before giving up
        #[arg(long)]
        max_reconnect_attempts: Option<u32>,

        /// Directory for the raw and decoded logs
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Decode a raw log into a decoded log
    Translate {
        /// Raw log to read
        input: PathBuf,

        /// Decoded log to write
        output: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Record {
            device,
            poll_interval_ms,
            max_reconnect_attempts,
            output_dir,
        } => {
            if let Some(device) = device {
                config.acquisition.device_name = device;
            }
            if let Some(ms) = poll_interval_ms {
                config.acquisition.poll_interval_ms = ms;
            }
            if let Some(attempts) = max_reconnect_attempts {
                config.acquisition.max_reconnect_attempts = attempts;
            }
            if let Some(dir) = output_dir {
                config.recording.output_dir = dir;
            }
            record(config).await
        }
        Commands::Translate { input, output } => {
            let summary = translate_file(&input, &output)
                .with_context(|| format!("failed to translate {}", input.display()))?;
            println!(
                "Processed {} rows ({} decoded, {} skipped). Saved to {}.",
                summary.rows_read,
                summary.rows_decoded,
                summary.rows_skipped,
                output.display()
            );
            Ok(())
        }
        Commands::Config => {
            let path = cli.config.unwrap_or_else(get_config_path);
            println!("# {}", path.display());
            print!("{}", render_config(&config)?);
            Ok(())
        }
    }
}

async fn record(config: AppConfig) -> Result<()> {
    let acquisition = config.acquisition;
    acquisition
        .validate()
        .context("invalid acquisition settings")?;

    tracing::info!("Starting RustRow v{}", env!("CARGO_PKG_VERSION"));

    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Stop requested; finishing current frame");
                let _ = cancel_tx.send(true);
            }
            Err(e) => {
                tracing::warn!("Ctrl+C handler unavailable: {}", e);
                cancel_tx.closed().await;
            }
        }
    });

    let locator = DeviceLocator::initialize()
        .await
        .context("Bluetooth unavailable")?;

    let found = find_device_or_cancel(
        &locator,
        &acquisition.device_name,
        acquisition.discovery_timeout(),
        &mut cancel_rx,
    )
    .await
    .context("device discovery failed")?;
    let Some(device) = found else {
        return Ok(());
    };

    let paths = generate_log_paths(&config.recording.output_dir, &Utc::now());
    let mut sink =
        CsvFrameSink::create(&paths.raw, &paths.decoded).context("failed to create log files")?;

    let transport = BleTransport::new(
        locator.adapter().clone(),
        TransportTimeouts {
            connect: acquisition.connect_timeout(),
            read: acquisition.read_timeout(),
        },
    );

    println!("Collecting rowing data. Press Ctrl+C to stop.");

    let summary = AcquisitionLoop::new(transport, acquisition)
        .run(&device, &mut sink, &mut cancel_rx)
        .await
        .context("acquisition failed")?;

    println!(
        "Recorded {} frames ({} decoded, {} reconnects) to {} and {}",
        summary.frames_read,
        summary.frames_decoded,
        summary.reconnects,
        paths.raw.display(),
        paths.decoded.display()
    );

    Ok(())
}
