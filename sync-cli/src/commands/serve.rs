//! Serve command - answer the peer's sync passes until Ctrl-C.

use anyhow::{Context, Result};
use sync_core::Settings;
use sync_server::SyncServer;

use super::{ctrl_c_flag, stopped};

/// Run the serve command.
pub async fn run(settings: &Settings) -> Result<()> {
    let server = SyncServer::from_settings(settings).context("Failed to load certificates")?;
    let listener = SyncServer::bind(settings)
        .await
        .with_context(|| format!("Failed to listen on {}", settings.server_address()))?;

    println!("Serving {}", settings.local_dir.display());
    println!("  Listening on {}", listener.local_addr()?);
    println!("  Press Ctrl-C to stop");

    server.serve(listener, stopped(ctrl_c_flag())).await?;

    let stats = server.context().metrics().snapshot();
    println!();
    println!(
        "Served {} connection(s): {} list, {} push, {} pull, {} error(s)",
        stats.connections_total,
        stats.lists_total,
        stats.pushes_total,
        stats.pulls_total,
        stats.errors_total
    );
    println!(
        "  {} bytes received, {} bytes sent",
        stats.bytes_received, stats.bytes_sent
    );
    Ok(())
}
