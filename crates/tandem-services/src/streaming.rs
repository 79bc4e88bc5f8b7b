//! Server side of the bidirectional file stream.
//!
//! Two pumps run concurrently on one stream: the push pump sends a fixed
//! local file, the collect pump assembles whatever the client uploads.
//! Once both are done the whole upload goes back as one echo frame. The
//! pushed file and the echo are unrelated flows sharing one direction.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;

use tandem_core::config::{ServerConfig, TransferConfig};
use tandem_core::wire::METHOD_STREAM_DATA;
use tandem_core::{Assembly, ChunkReader, FrameSink, FrameSource, SessionError};

use crate::service::StreamService;

/// What one server session moved.
#[derive(Debug, Clone)]
pub struct ServerReport {
    pub pushed_bytes: u64,
    pub pushed_frames: usize,
    /// Frames received, including the empty start marker.
    pub received_frames: usize,
    pub echo: Bytes,
}

pub struct StreamingService {
    push_file: PathBuf,
    chunk_size: usize,
}

impl StreamingService {
    pub fn new(server: &ServerConfig, transfer: &TransferConfig) -> Self {
        Self {
            push_file: server.push_file.clone(),
            chunk_size: transfer.effective_chunk_size(),
        }
    }

    pub fn push_file(&self) -> &Path {
        &self.push_file
    }

    /// Run one session to completion. The caller closes the stream.
    pub async fn handle_stream(
        &self,
        sink: &mut dyn FrameSink,
        source: &mut dyn FrameSource,
    ) -> Result<ServerReport, SessionError> {
        tracing::info!(push_file = %self.push_file.display(), "server: streaming session started");

        let ((pushed_bytes, pushed_frames), upload) = tokio::try_join!(
            push_pump(&mut *sink, &self.push_file, self.chunk_size),
            collect_pump(&mut *source),
        )?;

        let received_frames = upload.chunk_count();
        let empty_frames = upload.empty_chunk_count();
        let echo = upload.freeze();
        tracing::info!(
            len = echo.len(),
            frames = received_frames,
            empty_frames,
            digest = %hex::encode(&blake3::hash(&echo).as_bytes()[..8]),
            "server: file received"
        );

        sink.send(echo.clone()).await?;
        sink.close_send().await?;

        tracing::info!(pushed_bytes, pushed_frames, "server: streaming session finished");
        Ok(ServerReport {
            pushed_bytes,
            pushed_frames,
            received_frames,
            echo,
        })
    }
}

#[async_trait]
impl StreamService for StreamingService {
    fn method(&self) -> &'static str {
        METHOD_STREAM_DATA
    }

    async fn handle(
        &self,
        sink: &mut dyn FrameSink,
        source: &mut dyn FrameSource,
    ) -> Result<(), SessionError> {
        self.handle_stream(sink, source).await.map(|_| ())
    }
}

/// Stream the fixed push file in chunks. Does not half-close: the echo
/// still has to follow on this direction.
async fn push_pump(
    sink: &mut dyn FrameSink,
    path: &Path,
    chunk_size: usize,
) -> Result<(u64, usize), SessionError> {
    let file = File::open(path)
        .await
        .map_err(|e| SessionError::io("open", path, e))?;
    let mut reader = ChunkReader::new(file, chunk_size);

    let mut bytes = 0u64;
    let mut frames = 0usize;
    while let Some(chunk) = reader
        .next_chunk()
        .await
        .map_err(|e| SessionError::io("read", path, e))?
    {
        bytes += chunk.len() as u64;
        frames += 1;
        sink.send(chunk).await?;
    }

    tracing::debug!(bytes, frames, "server: push file exhausted");
    Ok((bytes, frames))
}

/// Receive until the client half-closes. The empty start marker is just a
/// zero-length chunk here.
async fn collect_pump(source: &mut dyn FrameSource) -> Result<Assembly, SessionError> {
    let mut upload = Assembly::new();
    while let Some(chunk) = source.recv().await? {
        tracing::debug!(len = chunk.len(), total = upload.len(), "server: received data");
        upload.append(&chunk);
    }
    Ok(upload)
}
