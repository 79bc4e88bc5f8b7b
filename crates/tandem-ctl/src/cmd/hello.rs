//! Unary greeting command.

use anyhow::{Context, Result};

use tandem_core::config::TandemConfig;
use tandem_core::wire::METHOD_SAY_HELLO;
use tandem_services::say_hello;

pub async fn cmd_hello(config: &TandemConfig, addr: &str, name: &str) -> Result<()> {
    let stream = super::open_stream(config, addr, METHOD_SAY_HELLO).await?;
    let reply = say_hello(stream, name).await.context("hello call failed")?;
    println!("{reply}");
    Ok(())
}
