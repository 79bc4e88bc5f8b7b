//! Client-side connection setup over TCP.

use tokio::net::TcpStream;

use tandem_core::transport::{framed, noise};
use tandem_core::{FrameStream, Keypair, TransportError};

/// Connect to `addr` and open an RPC for `method` in the clear.
pub async fn connect(
    addr: &str,
    method: &str,
    max_frame_len: usize,
) -> Result<FrameStream, TransportError> {
    let tcp = dial(addr).await?;
    tracing::debug!(%addr, method, "connected");
    framed::open(tcp, method, max_frame_len).await
}

/// Connect to `addr`, run the Noise handshake with `keypair`, and open an
/// RPC for `method` over the encrypted stream.
pub async fn connect_secure(
    addr: &str,
    method: &str,
    max_frame_len: usize,
    keypair: &Keypair,
) -> Result<FrameStream, TransportError> {
    let tcp = dial(addr).await?;
    let secure = noise::initiate(tcp, keypair).await?;
    tracing::debug!(
        %addr,
        method,
        server_key = hex::encode(&secure.remote_static()[..8]),
        "connected, handshake complete"
    );
    framed::open(secure, method, max_frame_len).await
}

async fn dial(addr: &str) -> Result<TcpStream, TransportError> {
    let tcp = TcpStream::connect(addr).await?;
    tcp.set_nodelay(true)?;
    Ok(tcp)
}
