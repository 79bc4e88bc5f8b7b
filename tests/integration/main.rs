//! Tandem integration test harness.
//!
//! Each test starts its own server on an ephemeral loopback port, drives
//! the client over real TCP, and cleans up its scratch directory.
//!
//!   cargo test --test integration

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rand::RngCore;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use tandem_core::config::{ClientConfig, ServerConfig, SinkWrite, TransferConfig};
use tandem_core::transport::noise;
use tandem_core::wire::DEFAULT_MAX_FRAME_LEN;
use tandem_core::Keypair;
use tandem_services::{HelloService, ServiceDispatcher, StreamService, StreamingService};

mod failures;
mod files;
mod hello;
mod secure;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Per-test scratch directory, removed on drop.
pub struct Scratch {
    pub dir: PathBuf,
}

impl Scratch {
    pub fn new(tag: &str) -> Result<Self> {
        let dir = std::env::temp_dir().join(format!("tandem-it-{tag}-{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn write(&self, name: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.path(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).ok();
    }
}

/// A server accepting connections on loopback until dropped.
pub struct TestServer {
    pub addr: SocketAddr,
    task: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start a server that pushes `push_file` on every stream and answers
/// greetings.
pub async fn spawn_server(push_file: &Path) -> Result<TestServer> {
    start_server(push_file, None).await
}

/// Like [`spawn_server`], but every connection must complete a Noise
/// handshake against `keypair` first.
pub async fn spawn_secure_server(push_file: &Path, keypair: Keypair) -> Result<TestServer> {
    start_server(push_file, Some(Arc::new(keypair))).await
}

async fn start_server(push_file: &Path, keypair: Option<Arc<Keypair>>) -> Result<TestServer> {
    let transfer = TransferConfig::default();
    let server = ServerConfig {
        push_file: push_file.to_path_buf(),
    };

    let mut dispatcher = ServiceDispatcher::new();
    dispatcher.register(
        Arc::new(StreamingService::new(&server, &transfer)) as Arc<dyn StreamService>
    );
    dispatcher.register(Arc::new(HelloService) as Arc<dyn StreamService>);
    let dispatcher = Arc::new(dispatcher);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind loopback listener")?;
    let addr = listener.local_addr()?;

    let task = tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let dispatcher = dispatcher.clone();
            let keypair = keypair.clone();
            tokio::spawn(async move {
                let Some(keypair) = keypair else {
                    let _ = dispatcher.serve_connection(tcp, DEFAULT_MAX_FRAME_LEN).await;
                    return;
                };
                if let Ok(secure) = noise::respond(tcp, &keypair).await {
                    let _ = dispatcher.serve_connection(secure, DEFAULT_MAX_FRAME_LEN).await;
                }
            });
        }
    });

    Ok(TestServer { addr, task })
}

pub fn client_config(download_dir: &Path, sink_write: SinkWrite) -> ClientConfig {
    ClientConfig {
        download_dir: download_dir.to_path_buf(),
        sink_write,
        ..ClientConfig::default()
    }
}

pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut data);
    data
}
