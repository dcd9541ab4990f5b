//! Protocol messages for peersync.
//!
//! Every message is an internally tagged map: the `type` key carries the
//! message name (`list`, `push`, `pull_response`, ...) and the remaining keys
//! carry its fields. Field names are the wire contract.

use serde::{Deserialize, Serialize};

use crate::SyncError;

/// Well-known `status` and `message` strings carried by `ack` and `error`.
pub mod reasons {
    /// Successful `ack` status.
    pub const OK: &str = "ok";
    /// Push payload ended before the declared size.
    pub const SIZE_MISMATCH: &str = "size_mismatch";
    /// Pull of a path that does not exist.
    pub const FILE_NOT_FOUND: &str = "file not found";
    /// Requested path resolves outside the sync root.
    pub const PATH_ESCAPE: &str = "path escapes sync root";
    /// The server could not scan its root.
    pub const LIST_FAILED: &str = "could not list sync root";
    /// The inventory does not fit in one frame.
    pub const INVENTORY_TOO_LARGE: &str = "inventory exceeds max_message_size";
    /// A pushed file could not be written into place.
    pub const STORE_FAILED: &str = "could not store file";
    /// A pulled file exists but could not be opened.
    pub const READ_FAILED: &str = "could not read file";
}

/// One file's metadata as observed by a side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the sync root, `/`-separated.
    pub path: String,
    /// Length in bytes.
    pub size: u64,
    /// Modification time, seconds since the Unix epoch.
    pub mtime: f64,
}

impl FileEntry {
    /// Create a new entry.
    pub fn new(path: impl Into<String>, size: u64, mtime: f64) -> Self {
        Self {
            path: path.into(),
            size,
            mtime,
        }
    }
}

/// All possible protocol messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Ask the peer for its inventory
    #[serde(rename = "list")]
    ListRequest,
    /// The peer's inventory
    ListResponse(ListResponse),
    /// Upload header, followed by `size` raw bytes
    #[serde(rename = "push")]
    PushRequest(PushRequest),
    /// Positive acknowledgement
    Ack(Ack),
    /// Request a file's content
    #[serde(rename = "pull")]
    PullRequest(PullRequest),
    /// Download header, followed by `size` raw bytes
    PullResponse(PullResponse),
    /// Failure report
    Error(ErrorMessage),
    /// Any `type` tag this version does not know
    #[serde(other)]
    Unknown,
}

impl Message {
    /// Serialize to MessagePack bytes (map encoding, field names included).
    pub fn to_bytes(&self) -> Result<Vec<u8>, SyncError> {
        rmp_serde::to_vec_named(self).map_err(SyncError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        rmp_serde::from_slice(bytes).map_err(SyncError::Deserialization)
    }

    /// `ack` with status `ok`.
    pub fn ack_ok() -> Self {
        Message::Ack(Ack {
            status: reasons::OK.to_string(),
            message: None,
        })
    }

    /// `error` with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Message::Error(ErrorMessage {
            message: message.into(),
        })
    }

    /// Wire name of this message.
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::ListRequest => "list",
            Message::ListResponse(_) => "list_response",
            Message::PushRequest(_) => "push",
            Message::Ack(_) => "ack",
            Message::PullRequest(_) => "pull",
            Message::PullResponse(_) => "pull_response",
            Message::Error(_) => "error",
            Message::Unknown => "unknown",
        }
    }
}

/// Inventory returned for a `list` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    /// Every regular file under the peer's root.
    pub files: Vec<FileEntry>,
}

/// Upload header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Destination path relative to the peer's root
    pub path: String,
    /// Number of raw bytes that follow
    pub size: u64,
    /// Modification time to apply on commit
    pub mtime: f64,
}

/// Acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    /// `ok` on success
    pub status: String,
    /// Optional human-readable detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Ack {
    /// Whether the status is `ok`.
    pub fn is_ok(&self) -> bool {
        self.status == reasons::OK
    }
}

/// Download request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Path relative to the peer's root
    pub path: String,
}

/// Download header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    /// Path being served
    pub path: String,
    /// Number of raw bytes that follow
    pub size: u64,
    /// Modification time on the serving side
    pub mtime: f64,
}

/// Failure report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Human-readable reason
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_request_roundtrip() {
        let bytes = Message::ListRequest.to_bytes().unwrap();
        let restored = Message::from_bytes(&bytes).unwrap();
        assert_eq!(restored, Message::ListRequest);
    }

    #[test]
    fn list_response_preserves_subsecond_mtime() {
        let msg = Message::ListResponse(ListResponse {
            files: vec![
                FileEntry::new("a.txt", 10, 1_705_000_000.123_456_7),
                FileEntry::new("dir/b.bin", 0, 0.5),
            ],
        });

        let bytes = msg.to_bytes().unwrap();
        let restored = Message::from_bytes(&bytes).unwrap();

        assert_eq!(msg, restored);
    }

    #[test]
    fn push_request_roundtrip() {
        let msg = Message::PushRequest(PushRequest {
            path: "docs/report.pdf".into(),
            size: 4096,
            mtime: 1_700_000_000.25,
        });

        let restored = Message::from_bytes(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(msg, restored);
    }

    #[test]
    fn pull_response_roundtrip() {
        let msg = Message::PullResponse(PullResponse {
            path: "x".into(),
            size: u64::MAX,
            mtime: -1.5,
        });

        let restored = Message::from_bytes(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(msg, restored);
    }

    #[test]
    fn ack_without_message_omits_field() {
        let bytes = Message::ack_ok().to_bytes().unwrap();
        let restored = Message::from_bytes(&bytes).unwrap();

        match restored {
            Message::Ack(ack) => {
                assert!(ack.is_ok());
                assert!(ack.message.is_none());
            }
            other => panic!("expected ack, got {:?}", other),
        }
    }

    #[test]
    fn error_roundtrip() {
        let msg = Message::error(reasons::FILE_NOT_FOUND);
        let restored = Message::from_bytes(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(msg, restored);
    }

    #[test]
    fn encoding_is_a_map_with_type_tag() {
        let msg = Message::PullRequest(PullRequest {
            path: "notes.md".into(),
        });
        let bytes = msg.to_bytes().unwrap();

        // Field names travel on the wire; decode generically to check them.
        let value: std::collections::BTreeMap<String, String> =
            rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(value.get("type").map(String::as_str), Some("pull"));
        assert_eq!(value.get("path").map(String::as_str), Some("notes.md"));
    }

    #[test]
    fn unknown_type_decodes_to_unknown() {
        let mut map = std::collections::BTreeMap::new();
        map.insert("type", "echo");
        map.insert("content", "hello from client");
        let bytes = rmp_serde::to_vec_named(&map).unwrap();

        let restored = Message::from_bytes(&bytes).unwrap();
        assert_eq!(restored, Message::Unknown);
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(Message::from_bytes(&[0xc1, 0x00, 0xff]).is_err());
    }

    #[test]
    fn type_names_match_wire_tags() {
        assert_eq!(Message::ListRequest.type_name(), "list");
        assert_eq!(Message::ack_ok().type_name(), "ack");
        assert_eq!(Message::error("x").type_name(), "error");
    }
}
