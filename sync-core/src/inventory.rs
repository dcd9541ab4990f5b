//! Inventory of one side's files.
//!
//! An inventory is built fresh on each pass (never persisted) and is only
//! read by the reconciler. Entries are kept ordered by path so that plans,
//! logs and reports come out in a stable order.

use std::collections::BTreeMap;

use sync_types::FileEntry;

/// Mapping from relative path to [`FileEntry`] for one side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    entries: BTreeMap<String, FileEntry>,
}

impl Inventory {
    /// Create an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an inventory from entries.
    ///
    /// Paths are unique within an inventory; a repeated path keeps the last
    /// entry seen.
    pub fn from_entries(entries: impl IntoIterator<Item = FileEntry>) -> Self {
        entries.into_iter().collect()
    }

    /// Insert an entry, returning the previous entry for the same path.
    pub fn insert(&mut self, entry: FileEntry) -> Option<FileEntry> {
        self.entries.insert(entry.path.clone(), entry)
    }

    /// Look up an entry by path.
    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.entries.get(path)
    }

    /// Whether the inventory has an entry for `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the inventory has no files.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values()
    }

    /// Iterate paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Sum of all file sizes.
    pub fn total_size(&self) -> u64 {
        self.entries.values().map(|e| e.size).sum()
    }

    /// Consume the inventory into a path-ordered list (the `list_response` shape).
    pub fn into_entries(self) -> Vec<FileEntry> {
        self.entries.into_values().collect()
    }
}

impl FromIterator<FileEntry> for Inventory {
    fn from_iter<I: IntoIterator<Item = FileEntry>>(iter: I) -> Self {
        let mut inventory = Inventory::new();
        for entry in iter {
            inventory.insert(entry);
        }
        inventory
    }
}

impl IntoIterator for Inventory {
    type Item = FileEntry;
    type IntoIter = std::collections::btree_map::IntoValues<String, FileEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_values()
    }
}
