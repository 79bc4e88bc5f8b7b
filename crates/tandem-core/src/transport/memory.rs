//! In-process transport backed by mpsc channels.
//!
//! Created in connected pairs. Dropping a sink without `close_send` looks
//! like a hangup to the peer, exactly as a dropped TCP connection does.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::{FrameSink, FrameSource, FrameStream};
use crate::error::TransportError;

#[derive(Debug)]
enum Message {
    Data(Bytes),
    End,
    Error(String),
}

pub struct MemorySink {
    tx: Option<mpsc::UnboundedSender<Message>>,
    half_closed: bool,
}

impl MemorySink {
    fn push(&mut self, msg: Message) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(msg).map_err(|_| {
            TransportError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        })
    }
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, data: Bytes) -> Result<(), TransportError> {
        if self.half_closed {
            return Err(TransportError::SendAfterClose);
        }
        self.push(Message::Data(data))
    }

    async fn close_send(&mut self) -> Result<(), TransportError> {
        if self.half_closed {
            return Ok(());
        }
        self.push(Message::End)?;
        self.half_closed = true;
        Ok(())
    }

    async fn abort(&mut self, message: &str) -> Result<(), TransportError> {
        if self.half_closed {
            return Err(TransportError::SendAfterClose);
        }
        self.push(Message::Error(message.to_string()))?;
        self.half_closed = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        Ok(())
    }
}

pub struct MemorySource {
    rx: mpsc::UnboundedReceiver<Message>,
    finished: bool,
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        if self.finished {
            return Ok(None);
        }
        match self.rx.recv().await {
            Some(Message::Data(data)) => Ok(Some(data)),
            Some(Message::End) => {
                self.finished = true;
                Ok(None)
            }
            Some(Message::Error(msg)) => {
                self.finished = true;
                Err(TransportError::Remote(msg))
            }
            None => Err(TransportError::UnexpectedEof),
        }
    }
}

/// Two connected streams: what one sends, the other receives.
pub fn pair() -> (FrameStream, FrameStream) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    let a = FrameStream::new(
        Box::new(MemorySink {
            tx: Some(a_tx),
            half_closed: false,
        }),
        Box::new(MemorySource {
            rx: b_rx,
            finished: false,
        }),
    );
    let b = FrameStream::new(
        Box::new(MemorySink {
            tx: Some(b_tx),
            half_closed: false,
        }),
        Box::new(MemorySource {
            rx: a_rx,
            finished: false,
        }),
    );
    (a, b)
}

/// Wraps a source and fails with a connection reset after `frames_ok`
/// frames have been delivered.
pub struct FailingSource<S> {
    inner: S,
    frames_ok: usize,
}

impl<S> FailingSource<S> {
    pub fn new(inner: S, frames_ok: usize) -> Self {
        Self { inner, frames_ok }
    }
}

#[async_trait]
impl<S: FrameSource> FrameSource for FailingSource<S> {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        if self.frames_ok == 0 {
            return Err(TransportError::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionReset,
            )));
        }
        self.frames_ok -= 1;
        self.inner.recv().await
    }
}
