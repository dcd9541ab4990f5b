//! Print the local inventory.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use sync_content::{hash_file, resolve_path, scan_dir};
use sync_core::Settings;

/// One scanned file, as printed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRow {
    /// Path relative to the sync root.
    pub path: String,
    /// Length in bytes.
    pub size: u64,
    /// Modification time, seconds since the Unix epoch.
    pub mtime: f64,
    /// Hex SHA-256, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Run the scan command.
pub async fn run(settings: &Settings, hash: bool, json: bool) -> Result<()> {
    let root = settings.local_dir.clone();
    let rows = tokio::task::spawn_blocking(move || collect(&root, hash)).await??;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for row in &rows {
        match &row.sha256 {
            Some(digest) => println!(
                "{:>12}  {:>17.3}  {}  {}",
                row.size, row.mtime, digest, row.path
            ),
            None => println!("{:>12}  {:>17.3}  {}", row.size, row.mtime, row.path),
        }
    }
    let total: u64 = rows.iter().map(|r| r.size).sum();
    println!();
    println!(
        "{} file(s), {} bytes in {}",
        rows.len(),
        total,
        settings.local_dir.display()
    );
    Ok(())
}

/// Scan `root`, hashing each file when `hash` is set.
pub fn collect(root: &Path, hash: bool) -> Result<Vec<ScanRow>> {
    let inventory =
        scan_dir(root).with_context(|| format!("Failed to scan {}", root.display()))?;

    let mut rows = Vec::with_capacity(inventory.len());
    for entry in inventory.into_entries() {
        let sha256 = if hash {
            let path = resolve_path(root, &entry.path)?;
            Some(hash_file(&path).with_context(|| format!("Failed to hash {}", entry.path))?)
        } else {
            None
        };
        rows.push(ScanRow {
            path: entry.path,
            size: entry.size,
            mtime: entry.mtime,
            sha256,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn collect_lists_files_sorted() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"bb").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();

        let rows = collect(dir.path(), false).unwrap();

        let paths: Vec<_> = rows.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "sub/b.txt"]);
        assert_eq!(rows[1].size, 2);
        assert!(rows.iter().all(|r| r.sha256.is_none()));
    }

    #[test]
    fn collect_with_hash() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("abc"), b"abc").unwrap();

        let rows = collect(dir.path(), true).unwrap();

        assert_eq!(
            rows[0].sha256.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn json_omits_missing_hash() {
        let row = ScanRow {
            path: "a".into(),
            size: 1,
            mtime: 2.5,
            sha256: None,
        };
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"path":"a","size":1,"mtime":2.5}"#);
    }

    #[test]
    fn collect_missing_root_fails() {
        let dir = tempdir().unwrap();
        assert!(collect(&dir.path().join("absent"), false).is_err());
    }
}
