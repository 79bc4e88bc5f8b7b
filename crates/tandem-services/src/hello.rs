//! Unary greeting: one request frame in, one reply frame out.

use async_trait::async_trait;
use bytes::Bytes;

use tandem_core::wire::METHOD_SAY_HELLO;
use tandem_core::{FrameSink, FrameSource, FrameStream, SessionError, TransportError};

use crate::service::StreamService;

pub struct HelloService;

#[async_trait]
impl StreamService for HelloService {
    fn method(&self) -> &'static str {
        METHOD_SAY_HELLO
    }

    async fn handle(
        &self,
        sink: &mut dyn FrameSink,
        source: &mut dyn FrameSource,
    ) -> Result<(), SessionError> {
        let name = source
            .recv()
            .await?
            .ok_or_else(|| TransportError::Protocol("unary call without a request".into()))?;
        if source.recv().await?.is_some() {
            return Err(TransportError::Protocol(
                "unary call carried more than one request".into(),
            )
            .into());
        }

        let name = String::from_utf8_lossy(&name);
        tracing::info!(%name, "received message from client");
        sink.send(Bytes::from(format!("Hello {name}"))).await?;
        sink.close_send().await?;
        Ok(())
    }
}

/// Client half of the greeting. Consumes and closes the stream.
pub async fn say_hello(stream: FrameStream, name: &str) -> Result<String, SessionError> {
    let (mut sink, mut source) = stream.split();
    let result: Result<String, TransportError> = async {
        sink.send(Bytes::copy_from_slice(name.as_bytes())).await?;
        sink.close_send().await?;
        let reply = source
            .recv()
            .await?
            .ok_or_else(|| TransportError::Protocol("unary call without a reply".into()))?;
        if source.recv().await?.is_some() {
            return Err(TransportError::Protocol(
                "unary call carried more than one reply".into(),
            ));
        }
        Ok(String::from_utf8_lossy(&reply).into_owned())
    }
    .await;
    sink.close().await?;
    Ok(result?)
}
