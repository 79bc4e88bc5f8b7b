//! Error taxonomy shared by transports and sessions.

use std::path::PathBuf;

use crate::completion::CompletionError;
use crate::crypto::CryptoError;
use crate::wire::WireError;

/// Anything that goes wrong on the stream itself. Always fatal to the
/// session; never retried.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("stream i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed frame: {0}")]
    Wire(#[from] WireError),

    #[error("frame of {len} bytes exceeds maximum {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("peer closed the stream without end-of-stream")]
    UnexpectedEof,

    #[error("send after half-close")]
    SendAfterClose,

    #[error("stream already closed")]
    Closed,

    #[error("remote reported error: {0}")]
    Remote(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("secure channel failed: {0}")]
    Crypto(#[from] CryptoError),
}

/// Failure of a whole transfer session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{op} {path} failed: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("session aborted: {0}")]
    Aborted(String),
}

impl SessionError {
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SessionError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// True for local file-system failures, false for stream failures.
    pub fn is_local_io(&self) -> bool {
        matches!(self, SessionError::Io { .. })
    }
}
