//! Tandem wire format: the frame header every message travels behind.
//!
//! A frame is an 8-byte header followed by `length` payload bytes. The
//! header is #[repr(C, packed)] with zerocopy derives, so encoding and
//! decoding are plain byte views with no unsafe code.

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{BigEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Frame Header ─────────────────────────────────────────────────────────────

/// Precedes every frame on a Tandem connection.
///
/// Wire size: 8 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct FrameHeader {
    /// One of the [`FrameKind`] discriminants.
    pub kind: u8,

    /// Reserved, must be zero.
    pub flags: u8,

    /// Reserved, must be zero.
    pub reserved: [u8; 2],

    /// Payload length in bytes, big-endian, not including this header.
    pub length: U32<BigEndian>,
}

assert_eq_size!(FrameHeader, [u8; 8]);

/// Wire size of [`FrameHeader`].
pub const HEADER_LEN: usize = 8;

impl FrameHeader {
    pub fn new(kind: FrameKind, length: u32) -> Self {
        Self {
            kind: kind.into(),
            flags: 0,
            reserved: [0; 2],
            length: U32::new(length),
        }
    }

    /// Parse and validate a header from exactly [`HEADER_LEN`] bytes.
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Result<(FrameKind, u32), WireError> {
        let header = FrameHeader::read_from(&bytes[..]).ok_or(WireError::Truncated)?;
        let kind = FrameKind::try_from(header.kind)?;
        if header.flags != 0 {
            return Err(WireError::ReservedFlagsSet(header.flags));
        }
        if header.reserved != [0; 2] {
            return Err(WireError::ReservedBytesSet);
        }
        Ok((kind, header.length.get()))
    }
}

// ── Frame Kind ────────────────────────────────────────────────────────────────

/// What a frame means to the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Opens an RPC. Payload is the UTF-8 method name.
    /// Only valid as the first frame the client sends.
    Call = 0x01,

    /// One `data` field: a chunk, the start marker, or an echo.
    Data = 0x02,

    /// Half-close. The sender will send nothing more on this direction.
    End = 0x03,

    /// Terminates the server→client direction with a UTF-8 status message.
    Error = 0x04,
}

impl TryFrom<u8> for FrameKind {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, WireError> {
        match value {
            0x01 => Ok(FrameKind::Call),
            0x02 => Ok(FrameKind::Data),
            0x03 => Ok(FrameKind::End),
            0x04 => Ok(FrameKind::Error),
            other => Err(WireError::UnknownKind(other)),
        }
    }
}

impl From<FrameKind> for u8 {
    fn from(k: FrameKind) -> u8 {
        k as u8
    }
}

// ── Constants ─────────────────────────────────────────────────────────────────

/// Largest chunk a pump ever emits.
pub const MAX_CHUNK_SIZE: usize = 64 * 1024;

/// Default bound on a single frame's payload.
///
/// Larger than [`MAX_CHUNK_SIZE`] because the server's echo frame carries
/// the whole uploaded payload in one message.
pub const DEFAULT_MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

/// Seconds either side waits for the Noise handshake to finish.
pub const HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// Largest Noise transport message, ciphertext and tag included.
pub const MAX_NOISE_MESSAGE_LEN: usize = 65535;

/// Poly1305 tag appended to every Noise transport message.
pub const NOISE_TAG_LEN: usize = 16;

/// Method name of the bidirectional file stream.
pub const METHOD_STREAM_DATA: &str = "streaming.StreamData";

/// Method name of the unary greeting.
pub const METHOD_SAY_HELLO: &str = "hello.SayHello";

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unknown frame kind: 0x{0:02x}")]
    UnknownKind(u8),

    #[error("reserved flags are non-zero: 0x{0:02x}")]
    ReservedFlagsSet(u8),

    #[error("reserved header bytes are non-zero")]
    ReservedBytesSet,

    #[error("frame header truncated")]
    Truncated,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
