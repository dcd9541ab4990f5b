//! Confinement of wire paths to the synchronization root.
//!
//! Wire paths are `/`-separated and relative. Anything that could name a
//! location outside the root is rejected before it reaches the filesystem:
//!
//! - empty paths, or paths that reduce to the root itself
//! - absolute paths (leading `/`)
//! - any `..` segment
//! - backslashes and NUL bytes
//! - segments the host would read as a drive prefix or root
//!
//! `.` and empty segments (`a//b`) are dropped. The check is lexical; a
//! symlink already inside the root is followed like any other file.

use std::path::{Component, Path, PathBuf};

use crate::ContentError;

/// Map a wire path onto a filesystem path below `root`.
pub fn resolve_path(root: &Path, wire_path: &str) -> Result<PathBuf, ContentError> {
    let reject = |reason| ContentError::PathEscape {
        path: wire_path.to_string(),
        reason,
    };

    if wire_path.is_empty() {
        return Err(reject("empty path"));
    }
    if wire_path.contains('\0') {
        return Err(reject("contains NUL"));
    }
    if wire_path.contains('\\') {
        return Err(reject("contains backslash"));
    }
    if wire_path.starts_with('/') {
        return Err(reject("absolute path"));
    }

    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;
    for segment in wire_path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(reject("parent directory segment")),
            _ => {}
        }
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return Err(reject("not a plain path segment")),
        }
        resolved.push(segment);
        depth += 1;
    }

    if depth == 0 {
        return Err(reject("names the root itself"));
    }
    Ok(resolved)
}

/// The wire form of `path`, relative to `root`.
///
/// `None` when `path` is not below `root` or a component is not valid UTF-8.
pub fn wire_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/srv/sync")
    }

    fn escape_reason(wire: &str) -> &'static str {
        match resolve_path(&root(), wire) {
            Err(ContentError::PathEscape { reason, .. }) => reason,
            other => panic!("expected rejection for {:?}, got {:?}", wire, other),
        }
    }

    #[test]
    fn plain_paths_resolve_below_root() {
        assert_eq!(
            resolve_path(&root(), "a.txt").unwrap(),
            PathBuf::from("/srv/sync/a.txt")
        );
        assert_eq!(
            resolve_path(&root(), "docs/2024/report.pdf").unwrap(),
            PathBuf::from("/srv/sync/docs/2024/report.pdf")
        );
    }

    #[test]
    fn dot_and_empty_segments_are_dropped() {
        assert_eq!(
            resolve_path(&root(), "./a//b/./c").unwrap(),
            PathBuf::from("/srv/sync/a/b/c")
        );
    }

    #[test]
    fn parent_segments_are_rejected() {
        assert_eq!(escape_reason("../etc/passwd"), "parent directory segment");
        assert_eq!(escape_reason("a/../../b"), "parent directory segment");
        assert_eq!(escape_reason("a/.."), "parent directory segment");
    }

    #[test]
    fn absolute_and_odd_paths_are_rejected() {
        assert_eq!(escape_reason("/etc/passwd"), "absolute path");
        assert_eq!(escape_reason(""), "empty path");
        assert_eq!(escape_reason("a\\..\\b"), "contains backslash");
        assert_eq!(escape_reason("a\0b"), "contains NUL");
        assert_eq!(escape_reason("./."), "names the root itself");
    }

    #[test]
    fn rejection_maps_to_path_escape_kind() {
        let err = resolve_path(&root(), "../x").unwrap_err();
        assert_eq!(err.kind(), sync_types::ErrorKind::PathEscape);
    }

    #[test]
    fn wire_path_joins_with_slashes() {
        let path = root().join("a").join("b.txt");
        assert_eq!(wire_path(&root(), &path).as_deref(), Some("a/b.txt"));
        assert_eq!(wire_path(&root(), &root()), None);
        assert_eq!(wire_path(&root(), Path::new("/elsewhere/x")), None);
    }

    #[test]
    fn wire_path_and_resolve_agree() {
        let resolved = resolve_path(&root(), "x/y/z.bin").unwrap();
        assert_eq!(wire_path(&root(), &resolved).as_deref(), Some("x/y/z.bin"));
    }
}
