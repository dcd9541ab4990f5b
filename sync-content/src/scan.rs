//! Recursive inventory of a synchronization root.

use std::path::Path;

use sync_core::Inventory;
use sync_types::FileEntry;
use walkdir::WalkDir;

use crate::{mtime_of, wire_path, ContentError, TEMP_SUFFIX};

/// Enumerate every regular file below `root`.
///
/// Symlinks are not followed. In-flight temp files from [`PartialFile`]
/// are skipped, as are names that are not valid UTF-8. An unreadable
/// subdirectory is logged and skipped; an unreadable root is an error.
///
/// Blocking: call from `spawn_blocking` in async contexts.
///
/// [`PartialFile`]: crate::PartialFile
pub fn scan_dir(root: &Path) -> Result<Inventory, ContentError> {
    let mut inventory = Inventory::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("walk failed at root"));
                return Err(ContentError::io(root, source));
            }
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        if is_temp_file(entry.path()) {
            continue;
        }
        let Some(path) = wire_path(root, entry.path()) else {
            tracing::warn!("skipping non-UTF-8 path {}", entry.path().display());
            continue;
        };

        // The file may vanish between listing and stat.
        let metadata = match entry.metadata() {
            Ok(md) => md,
            Err(e) => {
                tracing::debug!("skipping {}: {}", path, e);
                continue;
            }
        };

        inventory.insert(FileEntry::new(path, metadata.len(), mtime_of(&metadata)));
    }

    tracing::debug!(
        "scanned {}: {} files, {} bytes",
        root.display(),
        inventory.len(),
        inventory.total_size()
    );
    Ok(inventory)
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(TEMP_SUFFIX))
}
