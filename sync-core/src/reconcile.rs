//! Reconciliation: two inventories in, one transfer plan out.
//!
//! Modification time is authoritative, not content. For a path present on
//! both sides:
//!
//! ```text
//!   Δ = mtime_local − mtime_remote
//!
//!   |Δ| ≤ skew   → skip   (sizes are not compared)
//!    Δ > skew    → push   (local is newer)
//!    Δ < −skew   → pull   (remote is newer)
//! ```
//!
//! Concurrent edits on both sides within the skew window are skipped and
//! the sides stay diverged. [`TieBreak`] is the hook for deciding those
//! paths differently; the default [`MtimeOnly`] keeps the skip.

use std::collections::BTreeSet;

use sync_types::FileEntry;

use crate::Inventory;

/// Where a path's content should flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local → remote.
    Push,
    /// Remote → local.
    Pull,
    /// Considered identical.
    Skip,
}

/// Decides paths whose mtimes are equal within the skew tolerance.
pub trait TieBreak {
    /// Direction for a path present on both sides with `|Δ| ≤ skew`.
    fn decide(&self, local: &FileEntry, remote: &FileEntry) -> Direction;
}

/// Equality within the tolerance always wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct MtimeOnly;

impl TieBreak for MtimeOnly {
    fn decide(&self, _local: &FileEntry, _remote: &FileEntry) -> Direction {
        Direction::Skip
    }
}

/// Three disjoint path sets derived from two inventories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Paths to send local → remote.
    pub push: BTreeSet<String>,
    /// Paths to fetch remote → local.
    pub pull: BTreeSet<String>,
    /// Paths considered equal.
    pub skip: BTreeSet<String>,
}

impl SyncPlan {
    /// Whether the plan transfers nothing.
    pub fn is_noop(&self) -> bool {
        self.push.is_empty() && self.pull.is_empty()
    }

    /// Total number of paths covered by the plan.
    pub fn len(&self) -> usize {
        self.push.len() + self.pull.len() + self.skip.len()
    }

    /// Whether the plan covers no paths at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The set a path was placed in, if any.
    pub fn direction_of(&self, path: &str) -> Option<Direction> {
        if self.push.contains(path) {
            Some(Direction::Push)
        } else if self.pull.contains(path) {
            Some(Direction::Pull)
        } else if self.skip.contains(path) {
            Some(Direction::Skip)
        } else {
            None
        }
    }

    fn place(&mut self, path: &str, direction: Direction) {
        let set = match direction {
            Direction::Push => &mut self.push,
            Direction::Pull => &mut self.pull,
            Direction::Skip => &mut self.skip,
        };
        set.insert(path.to_string());
    }
}

/// Compute the transfer plan with the default mtime-only policy.
pub fn reconcile(local: &Inventory, remote: &Inventory, skew_seconds: f64) -> SyncPlan {
    reconcile_with(local, remote, skew_seconds, &MtimeOnly)
}

/// Compute the transfer plan, consulting `tie_break` inside the skew window.
///
/// A negative or NaN tolerance is treated as zero.
pub fn reconcile_with(
    local: &Inventory,
    remote: &Inventory,
    skew_seconds: f64,
    tie_break: &dyn TieBreak,
) -> SyncPlan {
    let skew = skew_seconds.max(0.0);
    let mut plan = SyncPlan::default();

    for entry in local.iter() {
        let direction = match remote.get(&entry.path) {
            None => Direction::Push,
            Some(theirs) => {
                let delta = entry.mtime - theirs.mtime;
                if delta.abs() <= skew {
                    tie_break.decide(entry, theirs)
                } else if delta > skew {
                    Direction::Push
                } else {
                    Direction::Pull
                }
            }
        };
        plan.place(&entry.path, direction);
    }

    for entry in remote.iter().filter(|e| !local.contains(&e.path)) {
        plan.place(&entry.path, Direction::Pull);
    }

    plan
}
