//! Stream transport: the duplex frame channel a session runs over.
//!
//! A [`FrameStream`] splits into a [`FrameSink`] and a [`FrameSource`]
//! that can be driven from two different tasks without extra locking.
//! Frames are opaque `data` payloads, delivered in order, at most once.

pub mod framed;
pub mod memory;
pub mod noise;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

/// Send direction of a stream.
///
/// `#[async_trait]` keeps the trait dyn-compatible so sessions can hold
/// `Box<dyn FrameSink>` regardless of what carries the bytes.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one frame. Fails after [`FrameSink::close_send`] or
    /// [`FrameSink::close`].
    async fn send(&mut self, data: Bytes) -> Result<(), TransportError>;

    /// Half-close: tell the peer no more frames follow. Receiving is
    /// unaffected. Calling it again is a no-op.
    async fn close_send(&mut self) -> Result<(), TransportError>;

    /// Terminate this direction with an error status instead of a clean
    /// end-of-stream. Used by servers to report handler failures.
    async fn abort(&mut self, message: &str) -> Result<(), TransportError>;

    /// Full close. Idempotent.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Receive direction of a stream.
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` once the peer half-closed. Keeps returning
    /// `None` after end-of-stream.
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError>;
}

#[async_trait]
impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        (**self).recv().await
    }
}

pub type FrameSinkPtr = Box<dyn FrameSink>;
pub type FrameSourcePtr = Box<dyn FrameSource>;

/// One established duplex stream.
pub struct FrameStream {
    pub sink: FrameSinkPtr,
    pub source: FrameSourcePtr,
}

impl FrameStream {
    pub fn new(sink: FrameSinkPtr, source: FrameSourcePtr) -> Self {
        Self { sink, source }
    }

    /// Separate the two directions so they can run concurrently.
    pub fn split(self) -> (FrameSinkPtr, FrameSourcePtr) {
        (self.sink, self.source)
    }
}
