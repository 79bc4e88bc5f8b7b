//! Static keys and Noise handshake parameters.
//!
//! Every Tandem endpoint owns a long-term X25519 keypair. Connections run a
//! Noise_XX handshake with it (see [`crate::transport::noise`]), which
//! authenticates both ends and encrypts everything after the handshake.
//!
//! Keypairs are managed via x25519-dalek; snow drives the state machine.
//! Private key bytes are zeroized on drop.

use std::path::{Path, PathBuf};

use snow::params::NoiseParams;
use snow::{Builder, HandshakeState};
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Noise_XX: mutual authentication, both static keys transmitted encrypted.
pub const NOISE_PATTERN: &str = "Noise_XX_25519_ChaChaPoly_BLAKE2s";

// ── Keypair ───────────────────────────────────────────────────────────────────

/// A long-term static X25519 keypair.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Keypair {
    private: Zeroizing<[u8; 32]>,
    pub public: [u8; 32],
}

impl Keypair {
    /// Generate a new random X25519 keypair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::thread_rng());
        Self::from_private(secret.to_bytes())
    }

    /// Reconstruct a keypair from stored private key bytes.
    /// The public key is derived deterministically from the private key.
    pub fn from_private(private_bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(private_bytes);
        let public = PublicKey::from(&secret);
        Self {
            private: Zeroizing::new(private_bytes),
            public: *public.as_bytes(),
        }
    }

    /// Load the hex-encoded private key at `path`, or generate one and
    /// store it there (mode 0600) when the file does not exist yet.
    pub fn load_or_generate(path: &Path) -> Result<Self, CryptoError> {
        if path.exists() {
            return Self::load(path);
        }
        let keypair = Self::generate();
        keypair.store(path)?;
        tracing::info!(
            path = %path.display(),
            public = hex::encode(keypair.public),
            "generated static key"
        );
        Ok(keypair)
    }

    fn load(path: &Path) -> Result<Self, CryptoError> {
        let text = Zeroizing::new(
            std::fs::read_to_string(path)
                .map_err(|e| CryptoError::KeyRead(path.to_path_buf(), e))?,
        );
        let mut private = Zeroizing::new([0u8; 32]);
        hex::decode_to_slice(text.trim(), &mut private[..])
            .map_err(|_| CryptoError::BadKey(path.to_path_buf()))?;
        Ok(Self::from_private(*private))
    }

    fn store(&self, path: &Path) -> Result<(), CryptoError> {
        use std::io::Write;

        let write_err = |e| CryptoError::KeyWrite(path.to_path_buf(), e);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path).map_err(write_err)?;
        let text = Zeroizing::new(hex::encode(*self.private));
        file.write_all(text.as_bytes()).map_err(write_err)?;
        file.write_all(b"\n").map_err(write_err)
    }

    /// Handshake state for the side that dials.
    pub(crate) fn initiator(&self) -> Result<HandshakeState, CryptoError> {
        self.builder()?
            .local_private_key(&*self.private)
            .build_initiator()
            .map_err(CryptoError::Noise)
    }

    /// Handshake state for the side that accepts.
    pub(crate) fn responder(&self) -> Result<HandshakeState, CryptoError> {
        self.builder()?
            .local_private_key(&*self.private)
            .build_responder()
            .map_err(CryptoError::Noise)
    }

    fn builder(&self) -> Result<Builder<'_>, CryptoError> {
        let params: NoiseParams = NOISE_PATTERN.parse().map_err(|_| CryptoError::BadPattern)?;
        Ok(Builder::new(params))
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid Noise pattern string")]
    BadPattern,

    #[error("Noise protocol error: {0}")]
    Noise(#[from] snow::Error),

    #[error("peer finished the handshake without a static key")]
    MissingRemoteKey,

    #[error("handshake did not complete in time")]
    HandshakeTimeout,

    #[error("failed to read key file {0}: {1}")]
    KeyRead(PathBuf, std::io::Error),

    #[error("failed to write key file {0}: {1}")]
    KeyWrite(PathBuf, std::io::Error),

    #[error("key file {0} does not hold a 32-byte hex key")]
    BadKey(PathBuf),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
