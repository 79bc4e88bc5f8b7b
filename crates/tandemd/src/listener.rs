//! Stream listener.
//!
//! Accepts TCP connections, runs the Noise handshake when a static key is
//! configured, reads each one's CALL frame, records the session, and hands
//! the stream to the dispatcher on its own task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use rand::RngCore;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use tandem_core::transport::{framed, noise};
use tandem_core::Keypair;
use tandem_services::ServiceDispatcher;

use crate::sessions::{SessionInfo, SessionTable};

pub struct StreamListener {
    listener: TcpListener,
    dispatcher: Arc<ServiceDispatcher>,
    sessions: SessionTable,
    max_frame_len: usize,
    keypair: Option<Arc<Keypair>>,
    shutdown: broadcast::Receiver<()>,
}

impl StreamListener {
    pub fn new(
        listener: TcpListener,
        dispatcher: Arc<ServiceDispatcher>,
        sessions: SessionTable,
        max_frame_len: usize,
        keypair: Option<Arc<Keypair>>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            listener,
            dispatcher,
            sessions,
            max_frame_len,
            keypair,
            shutdown,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("stream listener shutting down");
                    return Ok(());
                }

                accepted = self.listener.accept() => {
                    let (tcp, peer_addr) = match accepted {
                        Ok(a) => a,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    tokio::spawn(serve(
                        tcp,
                        peer_addr,
                        self.dispatcher.clone(),
                        self.sessions.clone(),
                        self.max_frame_len,
                        self.keypair.clone(),
                    ));
                }
            }
        }
    }
}

async fn serve(
    tcp: TcpStream,
    peer_addr: SocketAddr,
    dispatcher: Arc<ServiceDispatcher>,
    sessions: SessionTable,
    max_frame_len: usize,
    keypair: Option<Arc<Keypair>>,
) {
    if let Err(e) = tcp.set_nodelay(true) {
        tracing::debug!(error = %e, "failed to set TCP_NODELAY");
    }

    let Some(keypair) = keypair else {
        return serve_stream(tcp, peer_addr, dispatcher, sessions, max_frame_len).await;
    };
    match noise::respond(tcp, &keypair).await {
        Ok(secure) => {
            tracing::debug!(
                %peer_addr,
                client_key = hex::encode(&secure.remote_static()[..8]),
                "handshake complete"
            );
            serve_stream(secure, peer_addr, dispatcher, sessions, max_frame_len).await
        }
        Err(e) => tracing::warn!(%peer_addr, error = %e, "handshake failed"),
    }
}

async fn serve_stream<S>(
    io: S,
    peer_addr: SocketAddr,
    dispatcher: Arc<ServiceDispatcher>,
    sessions: SessionTable,
    max_frame_len: usize,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (method, sink, source) = match framed::accept(io, max_frame_len).await {
        Ok(accepted) => accepted,
        Err(e) => {
            tracing::warn!(%peer_addr, error = %e, "connection did not open a call");
            return;
        }
    };

    let mut session_id = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut session_id);
    let _guard = sessions.open(
        session_id,
        SessionInfo {
            peer_addr,
            method: method.clone(),
            started_at: Instant::now(),
        },
    );

    let started = Instant::now();
    tracing::info!(
        session_id = hex::encode(session_id),
        %peer_addr,
        %method,
        active = sessions.len(),
        "session opened"
    );

    match dispatcher.dispatch(&method, Box::new(sink), Box::new(source)).await {
        Ok(()) => tracing::info!(
            session_id = hex::encode(session_id),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "session closed"
        ),
        Err(e) => tracing::warn!(
            session_id = hex::encode(session_id),
            error = %e,
            "session failed"
        ),
    }
}
