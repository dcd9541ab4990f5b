//! Settings for a peersync node.
//!
//! Settings are loaded from a TOML file and passed by value into each
//! component at session start; nothing re-reads the file behind a caller's
//! back.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use sync_types::{ErrorKind, FrameConfig, DEFAULT_MAX_MESSAGE_SIZE};

/// Root settings for one node.
///
/// Scalar fields come before the tables so the TOML output stays valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Absolute path of the directory being synchronized.
    pub local_dir: PathBuf,
    /// Quiescence window for the file watcher, in milliseconds (default: 800).
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Tolerance within which two mtimes count as equal (default: 2.0 s).
    #[serde(default = "default_mtime_skew_sec")]
    pub mtime_skew_sec: f64,
    /// Upper bound on concurrently handled server connections (default: 4).
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Deadline for each socket read or write, in seconds (default: 30).
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
    /// Largest accepted protocol frame, in bytes (default: 16 MiB).
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Where the peer's server listens.
    #[serde(default)]
    pub peer: PeerConfig,
    /// Where this node's server listens.
    #[serde(default)]
    pub server: ServerConfig,
    /// Certificate material for mutual TLS.
    #[serde(default)]
    pub certs: CertsConfig,
}

/// Peer endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Peer host name or IP address (default: 127.0.0.1).
    #[serde(default = "default_peer_host")]
    pub host: String,
    /// Peer port (default: 5555).
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Local listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host (default: 0.0.0.0).
    #[serde(default = "default_server_host")]
    pub host: String,
    /// Bind port (default: 5555).
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Certificate file paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertsConfig {
    /// This node's PEM certificate chain.
    #[serde(default = "default_cert")]
    pub cert: PathBuf,
    /// This node's PEM private key.
    #[serde(default = "default_key")]
    pub key: PathBuf,
    /// The peer's PEM certificate (the only one trusted).
    #[serde(default = "default_peer_cert")]
    pub peer_cert: PathBuf,
}

// Default value functions
fn default_debounce_ms() -> u64 {
    800
}

fn default_mtime_skew_sec() -> f64 {
    2.0
}

fn default_max_concurrency() -> usize {
    4
}

fn default_io_timeout_secs() -> u64 {
    30
}

fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}

fn default_peer_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5555
}

fn default_cert() -> PathBuf {
    PathBuf::from("local.crt")
}

fn default_key() -> PathBuf {
    PathBuf::from("local.key")
}

fn default_peer_cert() -> PathBuf {
    PathBuf::from("peer.crt")
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            host: default_peer_host(),
            port: default_port(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_port(),
        }
    }
}

impl Default for CertsConfig {
    fn default() -> Self {
        Self {
            cert: default_cert(),
            key: default_key(),
            peer_cert: default_peer_cert(),
        }
    }
}

impl Settings {
    /// Settings with every default and the given sync directory.
    pub fn new(local_dir: impl Into<PathBuf>) -> Self {
        Self {
            local_dir: local_dir.into(),
            debounce_ms: default_debounce_ms(),
            mtime_skew_sec: default_mtime_skew_sec(),
            max_concurrency: default_max_concurrency(),
            io_timeout_secs: default_io_timeout_secs(),
            max_message_size: default_max_message_size(),
            peer: PeerConfig::default(),
            server: ServerConfig::default(),
            certs: CertsConfig::default(),
        }
    }

    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Write settings to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml_string()?;
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)
        };
        write().map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Check invariants the rest of the system relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.local_dir.as_os_str().is_empty() || !self.local_dir.is_absolute() {
            return Err(ConfigError::Invalid(format!(
                "local_dir must be an absolute path, got {:?}",
                self.local_dir
            )));
        }
        if !self.mtime_skew_sec.is_finite() || self.mtime_skew_sec < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "mtime_skew_sec must be a non-negative number, got {}",
                self.mtime_skew_sec
            )));
        }
        if self.io_timeout_secs == 0 {
            return Err(ConfigError::Invalid("io_timeout_secs must be > 0".into()));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid("max_concurrency must be > 0".into()));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::Invalid("max_message_size must be > 0".into()));
        }
        if self.peer.host.trim().is_empty() {
            return Err(ConfigError::Invalid("peer.host must not be empty".into()));
        }
        Ok(())
    }

    /// `host:port` of the peer.
    pub fn peer_address(&self) -> String {
        format!("{}:{}", self.peer.host, self.peer.port)
    }

    /// `host:port` to bind the local server on.
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Per-operation I/O deadline.
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    /// Watcher quiescence window.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Limits for framed streams.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_message_size: self.max_message_size,
            io_timeout: self.io_timeout(),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Failed to write configuration file.
    #[error("failed to write config file {path}: {source}")]
    Write {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to render settings as TOML.
    #[error("failed to serialize settings: {0}")]
    Serialize(#[source] toml::ser::Error),
    /// A setting holds an unusable value.
    #[error("invalid settings: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = Settings::new("/srv/sync");
        settings.validate().unwrap();
        assert_eq!(settings.debounce_ms, 800);
        assert_eq!(settings.mtime_skew_sec, 2.0);
        assert_eq!(settings.peer_address(), "127.0.0.1:5555");
        assert_eq!(settings.server_address(), "0.0.0.0:5555");
    }

    #[test]
    fn settings_from_toml_string() {
        let toml = r#"
local_dir = "/home/user/sync_folder"
debounce_ms = 500
mtime_skew_sec = 1.5
max_concurrency = 1

[peer]
host = "192.168.1.101"
port = 6000

[server]
port = 7000

[certs]
cert = "/certs/linux.crt"
key = "/certs/linux.key"
peer_cert = "/certs/android.crt"
"#;

        let settings: Settings = toml::from_str(toml).unwrap();
        assert_eq!(settings.local_dir, PathBuf::from("/home/user/sync_folder"));
        assert_eq!(settings.debounce_ms, 500);
        assert_eq!(settings.mtime_skew_sec, 1.5);
        assert_eq!(settings.max_concurrency, 1);
        assert_eq!(settings.peer_address(), "192.168.1.101:6000");
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 7000);
        assert_eq!(settings.certs.peer_cert, PathBuf::from("/certs/android.crt"));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let settings: Settings = toml::from_str(r#"local_dir = "/data""#).unwrap();
        assert_eq!(settings, Settings::new("/data"));
        assert_eq!(settings.io_timeout(), Duration::from_secs(30));
        assert_eq!(settings.frame_config().max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
    }

    #[test]
    fn integer_skew_is_accepted() {
        // Hand-written files often say `mtime_skew_sec = 2`.
        let settings: Settings =
            toml::from_str("local_dir = \"/data\"\nmtime_skew_sec = 2\n").unwrap();
        assert_eq!(settings.mtime_skew_sec, 2.0);
    }

    #[test]
    fn relative_local_dir_is_invalid() {
        let settings = Settings::new("relative/dir");
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn negative_skew_is_invalid() {
        let mut settings = Settings::new("/data");
        settings.mtime_skew_sec = -1.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let mut settings = Settings::new("/data");
        settings.io_timeout_secs = 0;
        let err = settings.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("peersync.toml");

        let mut settings = Settings::new("/data/sync");
        settings.peer.host = "10.0.0.2".into();
        settings.mtime_skew_sec = 0.25;
        settings.save(&path).unwrap();

        let reloaded = Settings::from_file(&path).unwrap();
        assert_eq!(reloaded, settings);
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = Settings::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
