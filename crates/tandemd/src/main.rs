//! tandemd: Tandem streaming server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use tandem_core::config::TandemConfig;
use tandem_core::Keypair;
use tandem_services::{HelloService, ServiceDispatcher, StreamService, StreamingService};

mod listener;
mod sessions;

use sessions::SessionTable;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = TandemConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = TandemConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        TandemConfig::default()
    });

    let listen_addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.network.listen_addr.clone());
    tracing::info!(%listen_addr, "tandemd starting");

    let tcp = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to listen on {listen_addr}"))?;
    tracing::info!(addr = %tcp.local_addr()?, "server listening");

    // Services
    let dispatcher = {
        let mut d = ServiceDispatcher::new();
        let streaming = StreamingService::new(&config.server, &config.transfer);
        tracing::info!(
            push_file = %streaming.push_file().display(),
            chunk_size = config.transfer.effective_chunk_size(),
            max_frame_len = config.transfer.max_frame_len,
            "streaming service configured"
        );
        d.register(Arc::new(streaming) as Arc<dyn StreamService>);
        d.register(Arc::new(HelloService) as Arc<dyn StreamService>);
        tracing::info!(methods = ?d.methods(), "services registered");
        Arc::new(d)
    };

    let keypair = if config.security.encrypt {
        let path = &config.security.key_file;
        let keypair = Keypair::load_or_generate(path)
            .with_context(|| format!("failed to load static key {}", path.display()))?;
        tracing::info!(public = hex::encode(keypair.public), "noise encryption enabled");
        Some(Arc::new(keypair))
    } else {
        tracing::warn!("encryption disabled, streams travel in the clear");
        None
    };

    let sessions = SessionTable::new();

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let listener_task = tokio::spawn(
        listener::StreamListener::new(
            tcp,
            dispatcher,
            sessions.clone(),
            config.transfer.max_frame_len,
            keypair,
            shutdown_tx.subscribe(),
        )
        .run(),
    );

    let session_printer = {
        let sessions = sessions.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(10));
            loop {
                interval.tick().await;
                if !sessions.is_empty() {
                    sessions.log_snapshot();
                }
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv()  => tracing::info!("shutting down"),
        r = listener_task       => tracing::error!("stream listener exited: {:?}", r),
        r = session_printer     => tracing::error!("session printer exited: {:?}", r),
    }

    Ok(())
}
