//! # sync-content
//!
//! Everything peersync does to the local filesystem.
//!
//! - [`scan_dir`] builds an [`Inventory`](sync_core::Inventory) of a root
//! - [`resolve_path`] confines wire paths to the root
//! - [`SourceFile`] / [`PartialFile`] are the two ends of a transfer, with
//!   atomic commit on the receiving end
//! - [`hash_file`] computes SHA-256 digests for diagnostics
//!
//! Both the client and the server go through this crate, so a path the
//! server would refuse is refused by the client too.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hash;
mod mtime;
mod paths;
mod scan;
mod transfer;

pub use error::ContentError;
pub use hash::hash_file;
pub use mtime::{file_mtime, mtime_of, set_file_mtime};
pub use paths::{resolve_path, wire_path};
pub use scan::scan_dir;
pub use transfer::{PartialFile, SourceFile, TEMP_SUFFIX};
