//! CLI command modules.

use anyhow::{Context, Result};

use tandem_core::config::TandemConfig;
use tandem_core::{FrameStream, Keypair};
use tandem_services::channel;

pub mod hello;
pub mod stream;

/// Open an RPC for `method`, encrypted unless the config turns it off.
pub async fn open_stream(config: &TandemConfig, addr: &str, method: &str) -> Result<FrameStream> {
    let max_frame_len = config.transfer.max_frame_len;
    let stream = if config.security.encrypt {
        let path = &config.security.key_file;
        let keypair = Keypair::load_or_generate(path)
            .with_context(|| format!("failed to load static key {}", path.display()))?;
        channel::connect_secure(addr, method, max_frame_len, &keypair).await
    } else {
        channel::connect(addr, method, max_frame_len).await
    };
    stream.with_context(|| format!("failed to connect to tandemd at {addr}; is it running?"))
}
