//! # sync-core
//!
//! Pure logic for peersync (no network I/O, instant tests).
//!
//! This crate implements the decisions of a sync pass without touching the
//! network:
//! - [`Inventory`] - what files exist on one side, keyed by relative path
//! - [`reconcile`] - two inventories + skew tolerance → [`SyncPlan`]
//! - [`Settings`] - the settings value passed into every component
//!
//! ## Design Philosophy
//!
//! Reconciliation is a **pure** function: same inventories and tolerance in,
//! same plan out. The actual I/O (network, disk) is performed by
//! `sync-client` and `sync-server`, which act on the plan.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod inventory;
pub mod reconcile;

pub use config::{CertsConfig, ConfigError, PeerConfig, ServerConfig, Settings};
pub use inventory::Inventory;
pub use reconcile::{reconcile, reconcile_with, Direction, MtimeOnly, SyncPlan, TieBreak};
