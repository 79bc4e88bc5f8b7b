//! Length-prefixed frames over any byte stream (TCP in production,
//! `tokio::io::duplex` in tests).

use std::io;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use zerocopy::AsBytes;

use super::{FrameSink, FrameSource, FrameStream};
use crate::error::TransportError;
use crate::wire::{FrameHeader, FrameKind, HEADER_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendState {
    Open,
    HalfClosed,
    Closed,
}

/// Writes frames to the send half of a byte stream.
pub struct FramedSink<W> {
    writer: W,
    max_frame_len: usize,
    state: SendState,
}

impl<W: AsyncWrite + Send + Unpin> FramedSink<W> {
    pub fn new(writer: W, max_frame_len: usize) -> Self {
        Self {
            writer,
            max_frame_len,
            state: SendState::Open,
        }
    }

    async fn write_frame(&mut self, kind: FrameKind, payload: &[u8]) -> Result<(), TransportError> {
        let length = frame_length(payload.len(), self.max_frame_len)?;
        let header = FrameHeader::new(kind, length);
        self.writer.write_all(header.as_bytes()).await?;
        if !payload.is_empty() {
            self.writer.write_all(payload).await?;
        }
        self.writer.flush().await?;
        Ok(())
    }

    /// Open an RPC by naming the method. Must be the first frame sent.
    pub async fn send_call(&mut self, method: &str) -> Result<(), TransportError> {
        self.write_frame(FrameKind::Call, method.as_bytes()).await
    }

    fn check_open(&self) -> Result<(), TransportError> {
        match self.state {
            SendState::Open => Ok(()),
            SendState::HalfClosed => Err(TransportError::SendAfterClose),
            SendState::Closed => Err(TransportError::Closed),
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Send + Unpin> FrameSink for FramedSink<W> {
    async fn send(&mut self, data: Bytes) -> Result<(), TransportError> {
        self.check_open()?;
        self.write_frame(FrameKind::Data, &data).await
    }

    async fn close_send(&mut self) -> Result<(), TransportError> {
        match self.state {
            SendState::Open => {
                self.write_frame(FrameKind::End, &[]).await?;
                self.state = SendState::HalfClosed;
                Ok(())
            }
            SendState::HalfClosed => Ok(()),
            SendState::Closed => Err(TransportError::Closed),
        }
    }

    async fn abort(&mut self, message: &str) -> Result<(), TransportError> {
        self.check_open()?;
        self.state = SendState::HalfClosed;
        self.write_frame(FrameKind::Error, message.as_bytes()).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.state == SendState::Closed {
            return Ok(());
        }
        self.state = SendState::Closed;
        match self.writer.shutdown().await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => {
                tracing::debug!("peer already disconnected at close");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Reads frames from the receive half of a byte stream.
pub struct FramedSource<R> {
    reader: R,
    max_frame_len: usize,
    finished: bool,
}

impl<R: AsyncRead + Send + Unpin> FramedSource<R> {
    pub fn new(reader: R, max_frame_len: usize) -> Self {
        Self {
            reader,
            max_frame_len,
            finished: false,
        }
    }

    async fn read_frame(&mut self) -> Result<(FrameKind, Bytes), TransportError> {
        let mut header = [0u8; HEADER_LEN];
        self.reader.read_exact(&mut header).await.map_err(eof_aware)?;
        let (kind, len) = FrameHeader::parse(&header)?;
        let len = len as usize;
        if len > self.max_frame_len {
            return Err(TransportError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        let mut payload = BytesMut::zeroed(len);
        if len > 0 {
            self.reader.read_exact(&mut payload).await.map_err(eof_aware)?;
        }
        Ok((kind, payload.freeze()))
    }

    /// Read the CALL frame that opens an RPC and return the method name.
    pub async fn recv_call(&mut self) -> Result<String, TransportError> {
        match self.read_frame().await? {
            (FrameKind::Call, payload) => String::from_utf8(payload.to_vec())
                .map_err(|_| TransportError::Protocol("method name is not UTF-8".into())),
            (kind, _) => Err(TransportError::Protocol(format!(
                "expected CALL as first frame, got {kind:?}"
            ))),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Send + Unpin> FrameSource for FramedSource<R> {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        if self.finished {
            return Ok(None);
        }
        match self.read_frame().await? {
            (FrameKind::Data, payload) => Ok(Some(payload)),
            (FrameKind::End, _) => {
                self.finished = true;
                Ok(None)
            }
            (FrameKind::Error, payload) => {
                self.finished = true;
                Err(TransportError::Remote(
                    String::from_utf8_lossy(&payload).into_owned(),
                ))
            }
            (FrameKind::Call, _) => Err(TransportError::Protocol(
                "CALL frame on an open stream".into(),
            )),
        }
    }
}

/// Header length field for a payload of `len` bytes. The payload must fit
/// both the configured bound and the 32-bit field.
fn frame_length(len: usize, max_frame_len: usize) -> Result<u32, TransportError> {
    match u32::try_from(len) {
        Ok(length) if len <= max_frame_len => Ok(length),
        _ => Err(TransportError::FrameTooLarge {
            len,
            max: max_frame_len,
        }),
    }
}

pub(crate) fn eof_aware(e: io::Error) -> TransportError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        TransportError::UnexpectedEof
    } else {
        TransportError::Io(e)
    }
}

// ── Stream setup ──────────────────────────────────────────────────────────────

/// Client side: send the CALL frame for `method` and hand back the stream.
pub async fn open<S>(
    io: S,
    method: &str,
    max_frame_len: usize,
) -> Result<FrameStream, TransportError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(io);
    let mut sink = FramedSink::new(write_half, max_frame_len);
    sink.send_call(method).await?;
    let source = FramedSource::new(read_half, max_frame_len);
    Ok(FrameStream::new(Box::new(sink), Box::new(source)))
}

/// Server side: read the CALL frame and hand back the method name plus the
/// stream. The concrete halves are returned so a failed lookup can still
/// answer with an error frame.
pub async fn accept<S>(
    io: S,
    max_frame_len: usize,
) -> Result<(String, FramedSink<WriteHalf<S>>, FramedSource<ReadHalf<S>>), TransportError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(io);
    let mut source = FramedSource::new(read_half, max_frame_len);
    let sink = FramedSink::new(write_half, max_frame_len);
    let method = source.recv_call().await?;
    tracing::trace!(%method, "call frame received");
    Ok((method, sink, source))
}
