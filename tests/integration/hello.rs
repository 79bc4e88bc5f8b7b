use crate::*;

use tandem_core::wire::METHOD_SAY_HELLO;
use tandem_services::{channel, say_hello};

#[tokio::test]
async fn test_say_hello_over_tcp() -> Result<()> {
    let scratch = Scratch::new("hello")?;
    let push_path = scratch.write("job.log", b"")?;
    let server = spawn_server(&push_path).await?;

    let stream = channel::connect(&server.addr.to_string(), METHOD_SAY_HELLO, 1024).await?;
    let reply = say_hello(stream, "world").await?;
    assert_eq!(reply, "Hello world");
    Ok(())
}
