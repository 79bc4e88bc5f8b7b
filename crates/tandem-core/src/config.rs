//! Configuration system for Tandem.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $TANDEM_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/tandem/config.toml
//!   3. ~/.config/tandem/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::chunk::clamp_chunk_size;
use crate::wire::{DEFAULT_MAX_FRAME_LEN, MAX_CHUNK_SIZE};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TandemConfig {
    pub network: NetworkConfig,
    pub transfer: TransferConfig,
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the daemon listens on.
    pub listen_addr: String,
    /// Address the client connects to.
    pub server_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Bytes per outbound chunk. Clamped to 1..=65536.
    pub chunk_size: usize,
    /// Largest frame payload accepted or sent. Bounds the echo frame.
    pub max_frame_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// File pushed to every client, independent of what it uploads.
    pub push_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// File uploaded when none is given on the command line.
    pub upload_file: PathBuf,
    /// Directory the download lands in as `downloaded-<upload name>`.
    pub download_dir: PathBuf,
    pub sink_write: SinkWrite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Run a Noise_XX handshake before the first frame. Both ends must agree.
    pub encrypt: bool,
    /// Hex-encoded X25519 private key, generated on first use.
    pub key_file: PathBuf,
}

/// When the client's inbound pump rewrites the destination file relative
/// to appending the chunk it just received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkWrite {
    /// Append, then write. The file on disk always equals the payload.
    #[default]
    AfterAppend,
    /// Write, then append. The file on disk lags one chunk behind and
    /// never sees the last chunk. Kept for compatibility with older peers'
    /// observable output.
    BeforeAppend,
}

impl std::str::FromStr for SinkWrite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "after_append" => Ok(SinkWrite::AfterAppend),
            "before_append" => Ok(SinkWrite::BeforeAppend),
            other => Err(format!("unknown sink_write mode: {other}")),
        }
    }
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:50000".to_string(),
            server_addr: "127.0.0.1:50000".to_string(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: MAX_CHUNK_SIZE,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            push_file: PathBuf::from("job.log"),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            upload_file: PathBuf::from("SampleFile.txt"),
            download_dir: PathBuf::from("."),
            sink_write: SinkWrite::default(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            encrypt: true,
            key_file: config_dir().join("static.key"),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("tandem")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl TandemConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_file(&Self::file_path())?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a specific file, or defaults when it does not exist.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(TandemConfig::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("TANDEM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        Self::write_default_to(&path)?;
        Ok(path)
    }

    fn write_default_to(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text = toml::to_string_pretty(&TandemConfig::default())
            .map_err(ConfigError::SerializeFailed)?;
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    /// Apply TANDEM_* overrides. `lookup` is `std::env::var` outside tests.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("TANDEM_NETWORK__LISTEN_ADDR") {
            self.network.listen_addr = v;
        }
        if let Some(v) = lookup("TANDEM_NETWORK__SERVER_ADDR") {
            self.network.server_addr = v;
        }
        if let Some(v) = lookup("TANDEM_TRANSFER__CHUNK_SIZE") {
            if let Ok(n) = v.parse() {
                self.transfer.chunk_size = n;
            }
        }
        if let Some(v) = lookup("TANDEM_SERVER__PUSH_FILE") {
            self.server.push_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("TANDEM_CLIENT__UPLOAD_FILE") {
            self.client.upload_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("TANDEM_CLIENT__SINK_WRITE") {
            if let Ok(mode) = v.parse() {
                self.client.sink_write = mode;
            }
        }
        if let Some(v) = lookup("TANDEM_SECURITY__ENCRYPT") {
            if let Ok(on) = v.parse() {
                self.security.encrypt = on;
            }
        }
        if let Some(v) = lookup("TANDEM_SECURITY__KEY_FILE") {
            self.security.key_file = PathBuf::from(v);
        }
    }
}

impl TransferConfig {
    /// Chunk size after clamping into the legal range.
    pub fn effective_chunk_size(&self) -> usize {
        clamp_chunk_size(self.chunk_size)
    }
}

impl ClientConfig {
    /// Where the download for `upload` lands: `<download_dir>/downloaded-<name>`.
    pub fn destination_for(&self, upload: &Path) -> PathBuf {
        let name = upload
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("stream");
        self.download_dir.join(format!("downloaded-{name}"))
    }
}
