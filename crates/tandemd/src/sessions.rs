//! Session table: which streams are open right now.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

pub type SessionId = [u8; 8];

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub peer_addr: SocketAddr,
    pub method: String,
    pub started_at: Instant,
}

/// Shared across the listener and every connection task.
#[derive(Clone, Default)]
pub struct SessionTable {
    inner: Arc<DashMap<SessionId, SessionInfo>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a session and get back a guard that removes it on drop, so
    /// the entry goes away on every exit path of the connection task.
    pub fn open(&self, id: SessionId, info: SessionInfo) -> SessionGuard {
        self.inner.insert(id, info);
        SessionGuard {
            table: self.clone(),
            id,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Log every active session.
    pub fn log_snapshot(&self) {
        tracing::info!(count = self.len(), "session table snapshot");
        for s in self.inner.iter() {
            tracing::info!(
                session_id = hex::encode(s.key()),
                peer = %s.peer_addr,
                method = %s.method,
                age_secs = s.started_at.elapsed().as_secs(),
                "  session"
            );
        }
    }
}

pub struct SessionGuard {
    table: SessionTable,
    id: SessionId,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.table.inner.remove(&self.id);
    }
}
