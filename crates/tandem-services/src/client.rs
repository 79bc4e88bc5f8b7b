//! Client side of the bidirectional file stream.
//!
//! The upload pump runs on the calling task; the download pump runs as a
//! spawned task and fires the completion signal when the server
//! half-closes. The driver waits on that signal before closing the stream.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use tokio::fs::File;

use tandem_core::config::{ClientConfig, SinkWrite, TransferConfig};
use tandem_core::{
    Assembly, ChunkReader, Completion, FrameSink, FrameSourcePtr, FrameStream, SessionError,
};

/// How long a failed upload waits for the download side to report why.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one client session.
#[derive(Debug, Clone)]
pub struct TransferReport {
    pub uploaded_bytes: u64,
    /// Data frames sent after the start marker.
    pub upload_frames: usize,
    pub download_frames: usize,
    /// Everything the server sent, pushed file and echo alike.
    pub downloaded: Bytes,
    pub destination: PathBuf,
}

impl TransferReport {
    /// Short BLAKE3 fingerprint of the download, for logs and the CLI.
    pub fn download_digest(&self) -> String {
        hex::encode(&blake3::hash(&self.downloaded).as_bytes()[..8])
    }
}

pub struct ClientSession {
    chunk_size: usize,
    sink_write: SinkWrite,
}

impl ClientSession {
    pub fn new(transfer: &TransferConfig, client: &ClientConfig) -> Self {
        Self {
            chunk_size: transfer.effective_chunk_size(),
            sink_write: client.sink_write,
        }
    }

    /// Upload `file_path` while downloading into `destination`.
    ///
    /// Any transport error on either direction, or any local file error,
    /// fails the whole session. Nothing is retried.
    pub async fn upload_and_download(
        &self,
        stream: FrameStream,
        file_path: &Path,
        destination: &Path,
    ) -> Result<TransferReport, SessionError> {
        let (mut sink, source) = stream.split();

        let file = match File::open(file_path).await {
            Ok(f) => f,
            Err(e) => {
                let _ = sink.close().await;
                return Err(SessionError::io("open", file_path, e));
            }
        };
        tracing::info!(file = %file_path.display(), "client: streaming file");

        let done = Completion::new();
        let mut inbound = tokio::spawn(download_pump(
            source,
            destination.to_path_buf(),
            self.sink_write,
            done.clone(),
        ));

        let upload = upload_pump(sink.as_mut(), file, file_path, self.chunk_size).await;
        let (uploaded_bytes, upload_frames) = match upload {
            Ok(totals) => totals,
            Err(e) if e.is_local_io() => {
                inbound.abort();
                let _ = sink.close().await;
                return Err(e);
            }
            Err(e) => {
                // A broken upload usually means the server gave up first. Its
                // status is still queued on the download side, so drain it.
                let _ = sink.close().await;
                tracing::debug!(
                    error = %e,
                    download_done = done.is_fired(),
                    "client: upload failed, draining download"
                );
                let err = match tokio::time::timeout(DRAIN_TIMEOUT, &mut inbound).await {
                    Ok(Ok(Err(download_err))) => download_err,
                    Ok(_) => e,
                    Err(_) => {
                        inbound.abort();
                        e
                    }
                };
                return Err(err);
            }
        };

        let joined = tokio::select! {
            _ = done.wait() => None,
            joined = &mut inbound => Some(joined),
        };
        let joined = match joined {
            Some(joined) => joined,
            None => inbound.await,
        };

        let download = match joined {
            Ok(Ok(download)) => download,
            Ok(Err(e)) => {
                let _ = sink.close().await;
                return Err(e);
            }
            Err(join_err) => {
                let _ = sink.close().await;
                return Err(SessionError::Aborted(join_err.to_string()));
            }
        };

        sink.close().await?;

        let report = TransferReport {
            uploaded_bytes,
            upload_frames,
            download_frames: download.chunk_count(),
            downloaded: download.freeze(),
            destination: destination.to_path_buf(),
        };
        tracing::info!(
            uploaded_bytes,
            upload_frames,
            downloaded_bytes = report.downloaded.len(),
            download_frames = report.download_frames,
            digest = %report.download_digest(),
            "client: session finished"
        );
        Ok(report)
    }
}

/// Send the start marker, read the source in chunks, send each, then
/// half-close. The file is
/// dropped on every exit path.
async fn upload_pump(
    sink: &mut dyn FrameSink,
    file: File,
    path: &Path,
    chunk_size: usize,
) -> Result<(u64, usize), SessionError> {
    // Start marker: an empty data frame before any file content.
    sink.send(Bytes::new()).await?;

    let mut reader = ChunkReader::new(file, chunk_size);
    tracing::debug!(chunk_size = reader.chunk_size(), "client: upload started");
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
    sink.close_send().await?;
    tracing::debug!(bytes, frames, "client: upload half-closed");
    Ok((bytes, frames))
}

/// Receive until the server half-closes, rewriting `destination` on every
/// frame. Fires `done` once end-of-stream is seen.
async fn download_pump(
    mut source: FrameSourcePtr,
    destination: PathBuf,
    sink_write: SinkWrite,
    done: Completion,
) -> Result<Assembly, SessionError> {
    let mut payload = Assembly::new();
    while let Some(chunk) = source.recv().await? {
        tracing::debug!(len = chunk.len(), total = payload.len(), "client: received data");
        match sink_write {
            SinkWrite::BeforeAppend => {
                persist(&destination, payload.as_bytes()).await?;
                payload.append(&chunk);
            }
            SinkWrite::AfterAppend => {
                payload.append(&chunk);
                persist(&destination, payload.as_bytes()).await?;
            }
        }
    }

    if payload.chunk_count() == 0 && sink_write == SinkWrite::AfterAppend {
        persist(&destination, &[]).await?;
    }

    done.fire()?;
    Ok(payload)
}

async fn persist(path: &Path, data: &[u8]) -> Result<(), SessionError> {
    tokio::fs::write(path, data)
        .await
        .map_err(|e| SessionError::io("write", path, e))
}
