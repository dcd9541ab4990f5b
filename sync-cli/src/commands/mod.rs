//! CLI command implementations.

pub mod config;
pub mod init;
pub mod scan;
pub mod serve;
pub mod sync;
pub mod watch;

use tokio::sync::watch as signal;

/// Flag that flips to `true` on the first Ctrl-C.
pub fn ctrl_c_flag() -> signal::Receiver<bool> {
    let (tx, rx) = signal::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping");
            let _ = tx.send(true);
        }
    });
    rx
}

/// Resolves once `flag` reads `true` or its sender is gone.
pub async fn stopped(mut flag: signal::Receiver<bool>) {
    let _ = flag.wait_for(|stop| *stop).await;
}
