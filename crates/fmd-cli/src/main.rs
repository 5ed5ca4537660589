//! fmd - command-line client for FMD servers
//!
//! Locates, tracks and controls a device registered with an FMD server.
//! Location and photo payloads are decrypted locally.

use anyhow::Result;
use clap::{Parser, Subcommand};
use fmd_client::{ClientConfig, LocationSource};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod prompt;

use commands::device::{CameraArg, RingerArg, Toggle};

const DEFAULT_LOG_FILTER: &str = "fmd_cli=info,fmd_client=info";

/// fmd - locate and control your device through an FMD server
#[derive(Parser, Debug)]
#[command(name = "fmd")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the stored session artifacts
    #[arg(long, global = true)]
    artifacts: Option<PathBuf>,

    /// Log filter (e.g. warn, debug, fmd_client=trace); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    // === Session ===
    /// Log in and store session artifacts
    Login {
        /// Server base URL
        server: String,

        /// Device ID
        #[arg(long)]
        id: String,

        /// Do not store the login hash (the session cannot be renewed silently)
        #[arg(long)]
        no_renew: bool,
    },

    /// Delete stored session artifacts
    Logout,

    // === Location ===
    /// Print the latest location
    Locate {
        /// Ask the device for a fresh fix first
        #[arg(short, long)]
        refresh: bool,

        /// Fix source to request (all, gps, cell, last)
        #[arg(long, default_value = "all")]
        source: LocationSource,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Poll the location until interrupted
    Track {
        /// Ask the device for a fresh fix every cycle
        #[arg(long)]
        high_frequency: bool,

        /// Polling interval in minutes
        #[arg(short, long)]
        interval: Option<u32>,
    },

    /// Export recent locations as CSV
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of locations
        #[arg(short = 'n', long, default_value = "100")]
        count: usize,
    },

    // === Device commands ===
    /// Ring the device
    Ring,

    /// Lock the device, optionally showing a message
    Lock {
        /// Message for the lock screen
        message: Option<String>,
    },

    /// Take a photo
    Camera {
        #[arg(value_enum)]
        side: CameraArg,
    },

    /// Switch Bluetooth
    Bluetooth {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Switch Do Not Disturb
    Dnd {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Set the ringer mode
    Ringer {
        #[arg(value_enum)]
        mode: RingerArg,
    },

    /// Factory-reset the device (asks for confirmation and the wipe PIN)
    Wipe,

    // === Photos ===
    /// Download new photos
    Photos {
        /// Target directory
        #[arg(short, long, default_value = "fmd-photos")]
        dir: PathBuf,

        /// Number of most recent photos to consider
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let config = ClientConfig::from_env()?;
    let store = commands::artifact_store(cli.artifacts)?;

    match cli.command {
        Commands::Login {
            server,
            id,
            no_renew,
        } => commands::login::login(&store, config, &server, &id, no_renew).await,
        Commands::Logout => commands::login::logout(&store),
        Commands::Locate {
            refresh,
            source,
            json,
        } => commands::locate::locate(&store, config, refresh, source, json).await,
        Commands::Track {
            high_frequency,
            interval,
        } => commands::locate::track(&store, config, high_frequency, interval).await,
        Commands::Export { output, count } => {
            commands::export::export(&store, config, output.as_deref(), count).await
        }
        Commands::Ring => commands::device::ring(&store, config).await,
        Commands::Lock { message } => {
            commands::device::lock(&store, config, message.as_deref()).await
        }
        Commands::Camera { side } => commands::device::camera(&store, config, side).await,
        Commands::Bluetooth { state } => commands::device::bluetooth(&store, config, state).await,
        Commands::Dnd { state } => commands::device::do_not_disturb(&store, config, state).await,
        Commands::Ringer { mode } => commands::device::ringer(&store, config, mode).await,
        Commands::Wipe => commands::wipe::wipe(&store, config).await,
        Commands::Photos { dir, count } => {
            commands::photos::download(&store, config, &dir, count).await
        }
    }
}
