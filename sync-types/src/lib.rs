//! # sync-types
//!
//! Wire format types for the peersync two-peer directory sync protocol.
//!
//! This crate provides the foundational types used across all peersync crates:
//! - [`FileEntry`] - One file's metadata as observed by a side
//! - [`Message`] - Protocol messages (list, push, pull, ack, error)
//! - [`Codec`] / [`FramedStream`] - Length-prefixed framing over a byte stream
//! - [`SyncError`] / [`ErrorKind`] - Error types shared by every layer
//!
//! ## Wire format
//!
//! ```text
//! ┌──────────────────┬─────────────────────────────────┐
//! │ LENGTH (u32, BE) │ MessagePack map (LENGTH bytes)  │
//! └──────────────────┴─────────────────────────────────┘
//! ```
//!
//! A `pull_response` frame is immediately followed by exactly `size` raw
//! bytes of file content, with no framing inside the payload.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod codec;
mod error;
mod messages;

pub use codec::{
    Codec, FrameConfig, FramedStream, DEFAULT_IO_TIMEOUT, DEFAULT_MAX_MESSAGE_SIZE,
    LENGTH_PREFIX_SIZE, PAYLOAD_CHUNK_SIZE,
};
pub use error::{ErrorKind, SyncError};
pub use messages::{
    reasons, Ack, ErrorMessage, FileEntry, ListResponse, Message, PullRequest, PullResponse,
    PushRequest,
};
