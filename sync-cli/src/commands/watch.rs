//! Watch command - run a pass whenever the sync root settles after a change.
//!
//! Every relevant filesystem event pushes the deadline out by
//! `debounce_ms`; the pass runs once the directory has been quiet that long.
//! Our own pulls also generate events, so a pass that pulled files is
//! followed by one more (normally empty) pass.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::Path;
use sync_content::TEMP_SUFFIX;
use sync_core::Settings;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{ctrl_c_flag, sync::pass};

/// Run the watch command.
pub async fn run(settings: &Settings) -> Result<()> {
    let root = settings.local_dir.clone();
    let shutdown = ctrl_c_flag();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |evt: notify::Result<Event>| {
        drop(tx.send(evt));
    })
    .context("Failed to start filesystem watcher")?;
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", root.display()))?;

    println!("Watching {}", root.display());
    println!("  Peer: {}", settings.peer_address());
    println!("  Press Ctrl-C to stop");

    // Converge once before waiting for changes.
    run_pass(settings, &shutdown).await;

    let debounce = settings.debounce();
    let mut deadline: Option<Instant> = None;
    let mut stop = shutdown.clone();

    loop {
        let quiet = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = stop.wait_for(|stopped| *stopped) => break,
            event = rx.recv() => match event {
                Some(Ok(event)) => {
                    if is_relevant(&event) {
                        tracing::trace!("change: {:?} {:?}", event.kind, event.paths);
                        deadline = Some(Instant::now() + debounce);
                    }
                }
                Some(Err(e)) => tracing::warn!("watcher error: {}", e),
                None => break,
            },
            _ = quiet => {
                deadline = None;
                run_pass(settings, &shutdown).await;
            }
        }
    }

    drop(watcher);
    println!("Stopped watching {}", root.display());
    Ok(())
}

async fn run_pass(settings: &Settings, shutdown: &tokio::sync::watch::Receiver<bool>) {
    if *shutdown.borrow() {
        return;
    }
    match pass(settings, shutdown.clone()).await {
        Ok(report) if report.is_clean() => {
            if report.transferred() > 0 {
                tracing::info!(
                    "synced: {} pushed, {} pulled",
                    report.pushed.len(),
                    report.pulled.len()
                );
            }
        }
        Ok(report) => tracing::warn!(
            "pass finished with {} failure(s){}",
            report.failures.len(),
            if report.cancelled { ", cancelled" } else { "" }
        ),
        Err(e) => tracing::error!("{:#}", e),
    }
}

/// Whether `event` could change what a pass would do.
///
/// Access events, directory events and temp files are ignored.
pub fn is_relevant(event: &Event) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    if let EventKind::Create(notify::event::CreateKind::Folder)
    | EventKind::Remove(notify::event::RemoveKind::Folder) = event.kind
    {
        return false;
    }
    event.paths.iter().any(|p| !is_temp(p) && !p.is_dir())
}

fn is_temp(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(TEMP_SUFFIX))
}
