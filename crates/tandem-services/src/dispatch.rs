//! Routes an accepted stream to the service named in its CALL frame.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use tandem_core::transport::framed;
use tandem_core::{FrameSinkPtr, FrameSourcePtr, SessionError, TransportError};

use crate::service::StreamService;

/// Maps method names to services.
#[derive(Default)]
pub struct ServiceDispatcher {
    services: HashMap<&'static str, Arc<dyn StreamService>>,
}

impl ServiceDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under its method name. A later registration for
    /// the same method replaces the earlier one.
    pub fn register(&mut self, service: Arc<dyn StreamService>) {
        self.services.insert(service.method(), service);
    }

    pub fn methods(&self) -> Vec<&'static str> {
        let mut methods: Vec<_> = self.services.keys().copied().collect();
        methods.sort_unstable();
        methods
    }

    /// Run the service for `method` on an open stream, report a failure to
    /// the peer as an error frame, and close the stream exactly once.
    pub async fn dispatch(
        &self,
        method: &str,
        mut sink: FrameSinkPtr,
        mut source: FrameSourcePtr,
    ) -> Result<(), SessionError> {
        let result = match self.services.get(method) {
            Some(service) => service.handle(sink.as_mut(), source.as_mut()).await,
            None => Err(TransportError::Protocol(format!("unknown method: {method}")).into()),
        };

        if let Err(e) = &result {
            tracing::warn!(method, error = %e, "stream handler failed");
            if let Err(report_err) = sink.abort(&e.to_string()).await {
                tracing::debug!(error = %report_err, "could not report failure to peer");
            }
        }

        let closed = sink.close().await;
        result?;
        closed?;
        Ok(())
    }

    /// Accept one connection: read its CALL frame, then dispatch.
    pub async fn serve_connection<S>(&self, io: S, max_frame_len: usize) -> Result<(), SessionError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (method, sink, source) = framed::accept(io, max_frame_len).await?;
        self.dispatch(&method, Box::new(sink), Box::new(source)).await
    }
}
