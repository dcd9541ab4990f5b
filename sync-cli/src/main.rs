//! # peersync
//!
//! Keep one directory identical on two machines over mutual TLS.
//!
//! ## Commands
//!
//! - `init`: Write a settings file with defaults
//! - `config`: Show or edit the settings file
//! - `scan`: Print the local inventory
//! - `sync`: Run one sync pass against the peer
//! - `serve`: Answer the peer's sync passes
//! - `watch`: Run a pass whenever the directory settles after a change
//!
//! ## Example
//!
//! ```bash
//! # On both machines
//! peersync init --dir ~/sync_folder
//! peersync config set-certs ~/certs/local.crt ~/certs/local.key ~/certs/peer.crt
//!
//! # Machine B
//! peersync serve
//!
//! # Machine A
//! peersync config set-peer 192.168.1.101 5555
//! peersync sync --dry-run
//! peersync watch
//! ```

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;
mod config;

use commands::{config as config_cmd, init, scan, serve, sync, watch};

/// Two-peer directory synchronization over mutual TLS.
#[derive(Parser, Debug)]
#[command(name = "peersync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG wins otherwise
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a settings file with defaults
    Init {
        /// Directory to synchronize (defaults to ~/sync_folder)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },

    /// Show or edit the settings file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Print the local inventory
    Scan {
        /// Include the SHA-256 of every file
        #[arg(long)]
        hash: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run one sync pass against the peer
    Sync {
        /// Print what would be transferred and stop
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer the peer's sync passes until Ctrl-C
    Serve,

    /// Sync whenever the directory settles after a change, until Ctrl-C
    Watch,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the current settings
    Show,

    /// Set the directory to synchronize
    SetDir {
        /// New sync root
        path: PathBuf,
    },

    /// Set the peer endpoint
    SetPeer {
        /// Peer host name or IP address
        host: String,
        /// Peer port
        port: u16,
    },

    /// Set the certificate files
    SetCerts {
        /// This node's PEM certificate
        cert: PathBuf,
        /// This node's PEM private key
        key: PathBuf,
        /// The peer's PEM certificate
        peer_cert: PathBuf,
    },

    /// Restore every setting to its default
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info,rustls=warn".into()),
        1 => tracing_subscriber::EnvFilter::new("debug"),
        _ => tracing_subscriber::EnvFilter::new("trace"),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = match cli.config {
        Some(path) => path,
        None => config::default_config_path()?,
    };

    match cli.command {
        Commands::Init { dir, force } => {
            init::run(&config_path, dir.as_deref(), force)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => config_cmd::show(&config_path)?,
            ConfigAction::SetDir { path } => config_cmd::set_dir(&config_path, &path)?,
            ConfigAction::SetPeer { host, port } => {
                config_cmd::set_peer(&config_path, &host, port)?
            }
            ConfigAction::SetCerts {
                cert,
                key,
                peer_cert,
            } => config_cmd::set_certs(&config_path, &cert, &key, &peer_cert)?,
            ConfigAction::Reset => config_cmd::reset(&config_path)?,
        },
        Commands::Scan { hash, json } => {
            let settings = config::load(&config_path)?;
            scan::run(&settings, hash, json).await?;
        }
        Commands::Sync { dry_run } => {
            let settings = config::load(&config_path)?;
            sync::run(&settings, dry_run).await?;
        }
        Commands::Serve => {
            let settings = config::load(&config_path)?;
            serve::run(&settings).await?;
        }
        Commands::Watch => {
            let settings = config::load(&config_path)?;
            watch::run(&settings).await?;
        }
    }

    Ok(())
}
