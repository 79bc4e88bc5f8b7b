//! Service trait for stream-based RPC methods.
//!
//! Every Tandem RPC is a duplex frame stream opened by a CALL frame. This
//! trait is the contract between the listener (which accepts connections
//! and reads the CALL) and the method logic (which drives the stream).

use async_trait::async_trait;

use tandem_core::{FrameSink, FrameSource, SessionError};

/// One implementation per RPC method.
///
/// The handler borrows both directions; the caller owns the stream and
/// closes it exactly once after the handler returns, reporting any error
/// to the peer first.
#[async_trait]
pub trait StreamService: Send + Sync {
    /// Method name carried in the CALL frame.
    fn method(&self) -> &'static str;

    async fn handle(
        &self,
        sink: &mut dyn FrameSink,
        source: &mut dyn FrameSource,
    ) -> Result<(), SessionError>;
}
