use crate::*;

use tandem_core::wire::METHOD_STREAM_DATA;
use tandem_core::{SessionError, TransportError};
use tandem_services::{channel, ClientSession};

/// The server cannot open its push file and gives up while the client is
/// still uploading. The client reports the server's status, not the broken
/// pipe its own upload ran into.
#[tokio::test]
async fn test_missing_push_file_fails_client() -> Result<()> {
    let scratch = Scratch::new("nopush")?;
    let upload_path = scratch.write("up.bin", &random_bytes(3 * 1024 * 1024))?;
    let server = spawn_server(&scratch.path("does-not-exist.log")).await?;

    let transfer = TransferConfig::default();
    let client = client_config(&scratch.dir, SinkWrite::AfterAppend);
    let stream = channel::connect(
        &server.addr.to_string(),
        METHOD_STREAM_DATA,
        transfer.max_frame_len,
    )
    .await?;
    let err = ClientSession::new(&transfer, &client)
        .upload_and_download(stream, &upload_path, &scratch.path("out.bin"))
        .await
        .unwrap_err();

    match err {
        SessionError::Transport(TransportError::Remote(msg)) => {
            assert!(msg.contains("open"), "message: {msg}");
            assert!(msg.contains("does-not-exist.log"), "message: {msg}");
        }
        other => panic!("expected the server's status, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_missing_upload_file_is_local_error() -> Result<()> {
    let scratch = Scratch::new("noupload")?;
    let push_path = scratch.write("job.log", b"data")?;
    let server = spawn_server(&push_path).await?;

    let transfer = TransferConfig::default();
    let client = client_config(&scratch.dir, SinkWrite::AfterAppend);
    let stream = channel::connect(
        &server.addr.to_string(),
        METHOD_STREAM_DATA,
        transfer.max_frame_len,
    )
    .await?;
    let err = ClientSession::new(&transfer, &client)
        .upload_and_download(stream, &scratch.path("missing.txt"), &scratch.path("out.bin"))
        .await
        .unwrap_err();

    assert!(err.is_local_io(), "got {err:?}");
    assert!(!scratch.path("out.bin").exists());
    Ok(())
}

#[tokio::test]
async fn test_unknown_method_is_rejected() -> Result<()> {
    let scratch = Scratch::new("unknown")?;
    let push_path = scratch.write("job.log", b"data")?;
    let server = spawn_server(&push_path).await?;

    let stream = channel::connect(&server.addr.to_string(), "nothing.Here", 1024).await?;
    let (_sink, mut source) = stream.split();
    match source.recv().await {
        Err(TransportError::Remote(msg)) => {
            assert!(msg.contains("unknown method: nothing.Here"), "message: {msg}")
        }
        other => panic!("expected remote error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_connection_refused() -> Result<()> {
    // Bind then drop to find a port nothing listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        listener.local_addr()?
    };
    match channel::connect(&addr.to_string(), METHOD_STREAM_DATA, 1024).await {
        Err(TransportError::Io(_)) => {}
        Err(other) => panic!("expected io error, got {other:?}"),
        Ok(_) => panic!("connected to a closed port"),
    }
    Ok(())
}
