//! Write a settings file with defaults.

use anyhow::Result;
use std::path::Path;

use crate::config::{absolute, default_local_dir, default_settings};

/// Run the init command.
pub fn run(config_path: &Path, dir: Option<&Path>, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Settings already exist at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let local_dir = match dir {
        Some(dir) => absolute(dir)?,
        None => default_local_dir()?,
    };
    let settings = default_settings(config_path, local_dir);
    settings.save(config_path)?;

    println!("Settings written to {}", config_path.display());
    println!();
    println!("  Sync dir:  {}", settings.local_dir.display());
    println!("  Peer:      {}", settings.peer_address());
    println!("  Listen:    {}", settings.server_address());
    println!();
    println!("Next steps:");
    println!("  1. Point at the peer: peersync config set-peer <host> <port>");
    println!("  2. Add certificates:  peersync config set-certs <cert> <key> <peer_cert>");

    Ok(())
}
