//! Noise_XX encrypted byte stream.
//!
//! [`initiate`] and [`respond`] run the three-message handshake over any
//! byte stream and return a [`NoiseStream`], which is itself an
//! `AsyncRead + AsyncWrite`. Frames are layered on top unchanged, so
//! `framed::open(noise_stream, ..)` gives an encrypted RPC stream.
//!
//! Wire format, handshake and transport alike:
//!   [u16 length BE] [Noise message]
//!
//! Transport messages use implicit nonces: one counter per direction,
//! starting at zero. TCP delivers in order, so no nonce travels on the wire
//! and a dropped, replayed or reordered record fails authentication.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use bytes::{Buf, BytesMut};
use snow::{HandshakeState, StatelessTransportState};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};

use super::framed::eof_aware;
use crate::crypto::{CryptoError, Keypair};
use crate::error::TransportError;
use crate::wire::{HANDSHAKE_TIMEOUT_SECS, MAX_NOISE_MESSAGE_LEN, NOISE_TAG_LEN};

/// Largest plaintext carried by one transport message.
pub const MAX_PLAINTEXT_LEN: usize = MAX_NOISE_MESSAGE_LEN - NOISE_TAG_LEN;

const LEN_PREFIX: usize = 2;

// ── Handshake ─────────────────────────────────────────────────────────────────

/// Dialing side of the handshake.
pub async fn initiate<S>(io: S, keypair: &Keypair) -> Result<NoiseStream<S>, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let state = keypair.initiator()?;
    with_deadline(handshake(io, state)).await
}

/// Accepting side of the handshake.
pub async fn respond<S>(io: S, keypair: &Keypair) -> Result<NoiseStream<S>, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let state = keypair.responder()?;
    with_deadline(handshake(io, state)).await
}

async fn with_deadline<T>(
    fut: impl std::future::Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    match tokio::time::timeout(Duration::from_secs(HANDSHAKE_TIMEOUT_SECS), fut).await {
        Ok(result) => result,
        Err(_) => Err(CryptoError::HandshakeTimeout.into()),
    }
}

/// Drive XX to completion: -> e, <- e ee s es, -> s se.
async fn handshake<S>(
    mut io: S,
    mut state: HandshakeState,
) -> Result<NoiseStream<S>, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; MAX_NOISE_MESSAGE_LEN];
    while !state.is_handshake_finished() {
        if state.is_my_turn() {
            let len = state.write_message(&[], &mut buf).map_err(CryptoError::Noise)?;
            write_message(&mut io, &buf[..len]).await?;
        } else {
            let message = read_message(&mut io).await?;
            state
                .read_message(&message, &mut buf)
                .map_err(CryptoError::Noise)?;
        }
    }

    let remote_static: [u8; 32] = state
        .get_remote_static()
        .and_then(|key| key.try_into().ok())
        .ok_or(CryptoError::MissingRemoteKey)?;
    let transport = state
        .into_stateless_transport_mode()
        .map_err(CryptoError::Noise)?;
    tracing::trace!(
        remote = hex::encode(&remote_static[..8]),
        "noise handshake finished"
    );
    Ok(NoiseStream::new(io, transport, remote_static))
}

async fn write_message<S: AsyncWrite + Unpin>(io: &mut S, message: &[u8]) -> io::Result<()> {
    let len = u16::try_from(message.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "handshake message too long"))?;
    io.write_all(&len.to_be_bytes()).await?;
    io.write_all(message).await?;
    io.flush().await
}

async fn read_message<S: AsyncRead + Unpin>(io: &mut S) -> Result<Vec<u8>, TransportError> {
    let len = io.read_u16().await.map_err(eof_aware)? as usize;
    let mut message = vec![0u8; len];
    io.read_exact(&mut message).await.map_err(eof_aware)?;
    Ok(message)
}

// ── Stream ────────────────────────────────────────────────────────────────────

/// An established Noise session over `S`.
pub struct NoiseStream<S> {
    io: S,
    transport: StatelessTransportState,
    remote_static: [u8; 32],
    send_nonce: u64,
    recv_nonce: u64,
    /// Sealed bytes accepted by `poll_write` but not yet written to `io`.
    pending_out: Vec<u8>,
    pending_out_pos: usize,
    /// Raw bytes read from `io` that do not yet form a whole message.
    pending_in: BytesMut,
    /// Opened plaintext not yet handed to the reader.
    plain_in: BytesMut,
}

impl<S> NoiseStream<S> {
    fn new(io: S, transport: StatelessTransportState, remote_static: [u8; 32]) -> Self {
        Self {
            io,
            transport,
            remote_static,
            send_nonce: 0,
            recv_nonce: 0,
            pending_out: Vec::with_capacity(LEN_PREFIX + MAX_NOISE_MESSAGE_LEN),
            pending_out_pos: 0,
            pending_in: BytesMut::with_capacity(LEN_PREFIX + MAX_NOISE_MESSAGE_LEN),
            plain_in: BytesMut::new(),
        }
    }

    /// The peer's static public key, authenticated by the handshake.
    pub fn remote_static(&self) -> &[u8; 32] {
        &self.remote_static
    }

    fn seal(&mut self, plaintext: &[u8]) -> io::Result<()> {
        let sealed_len = plaintext.len() + NOISE_TAG_LEN;
        let prefix = u16::try_from(sealed_len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "noise message too long"))?;
        self.pending_out.clear();
        self.pending_out.extend_from_slice(&prefix.to_be_bytes());
        self.pending_out.resize(LEN_PREFIX + sealed_len, 0);
        let written = self
            .transport
            .write_message(self.send_nonce, plaintext, &mut self.pending_out[LEN_PREFIX..])
            .map_err(noise_io)?;
        self.pending_out.truncate(LEN_PREFIX + written);
        self.pending_out_pos = 0;
        self.send_nonce += 1;
        Ok(())
    }

    /// Open the next whole message in `pending_in`, if one has arrived.
    fn open_next(&mut self) -> io::Result<bool> {
        if self.pending_in.len() < LEN_PREFIX {
            return Ok(false);
        }
        let len = u16::from_be_bytes([self.pending_in[0], self.pending_in[1]]) as usize;
        if len < NOISE_TAG_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "noise message shorter than its tag",
            ));
        }
        if self.pending_in.len() < LEN_PREFIX + len {
            return Ok(false);
        }

        self.pending_in.advance(LEN_PREFIX);
        let sealed = self.pending_in.split_to(len);
        self.plain_in.clear();
        self.plain_in.resize(len, 0);
        let opened = self
            .transport
            .read_message(self.recv_nonce, &sealed, &mut self.plain_in)
            .map_err(noise_io)?;
        self.plain_in.truncate(opened);
        self.recv_nonce += 1;
        Ok(true)
    }
}

impl<S: AsyncWrite + Unpin> NoiseStream<S> {
    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while self.pending_out_pos < self.pending_out.len() {
            let n = ready!(
                Pin::new(&mut self.io).poll_write(cx, &self.pending_out[self.pending_out_pos..])
            )?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.pending_out_pos += n;
        }
        self.pending_out.clear();
        self.pending_out_pos = 0;
        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for NoiseStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if !this.plain_in.is_empty() {
                let n = this.plain_in.len().min(buf.remaining());
                buf.put_slice(&this.plain_in[..n]);
                this.plain_in.advance(n);
                return Poll::Ready(Ok(()));
            }
            if this.open_next()? {
                continue;
            }

            let mut chunk = [0u8; 16 * 1024];
            let mut raw = ReadBuf::new(&mut chunk);
            ready!(Pin::new(&mut this.io).poll_read(cx, &mut raw))?;
            if raw.filled().is_empty() {
                if this.pending_in.is_empty() {
                    return Poll::Ready(Ok(()));
                }
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended inside a noise message",
                )));
            }
            this.pending_in.extend_from_slice(raw.filled());
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for NoiseStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let n = buf.len().min(MAX_PLAINTEXT_LEN);
        this.seal(&buf[..n])?;
        // The message is accepted once sealed; a pending write finishes on
        // the next poll_write or poll_flush.
        if let Poll::Ready(Err(e)) = this.poll_drain(cx) {
            return Poll::Ready(Err(e));
        }
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.io).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.io).poll_shutdown(cx)
    }
}

fn noise_io(e: snow::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, CryptoError::Noise(e))
}
