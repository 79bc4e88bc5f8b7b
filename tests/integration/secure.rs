use crate::*;

use tandem_core::wire::{METHOD_SAY_HELLO, METHOD_STREAM_DATA};
use tandem_services::{channel, say_hello, ClientSession};

/// Full bidirectional transfer over loopback with Noise on both ends.
#[tokio::test]
async fn test_encrypted_transfer_over_loopback() -> Result<()> {
    let scratch = Scratch::new("secure")?;
    let push = random_bytes(200_000);
    let upload = random_bytes(90_000);
    let push_path = scratch.write("job.log", &push)?;
    let upload_path = scratch.write("SampleFile.txt", &upload)?;

    let server = spawn_secure_server(&push_path, Keypair::generate()).await?;
    let client_key = Keypair::generate();

    let transfer = TransferConfig::default();
    let client = client_config(&scratch.dir, SinkWrite::AfterAppend);
    let stream = channel::connect_secure(
        &server.addr.to_string(),
        METHOD_STREAM_DATA,
        transfer.max_frame_len,
        &client_key,
    )
    .await
    .context("secure connect failed")?;
    let report = ClientSession::new(&transfer, &client)
        .upload_and_download(stream, &upload_path, &client.destination_for(&upload_path))
        .await?;

    let mut expected = push.clone();
    expected.extend_from_slice(&upload);
    assert!(report.downloaded[..] == expected[..], "download mismatch");
    assert!(std::fs::read(&report.destination)? == expected, "destination mismatch");
    Ok(())
}

#[tokio::test]
async fn test_encrypted_say_hello() -> Result<()> {
    let scratch = Scratch::new("secure-hello")?;
    let push_path = scratch.write("job.log", b"")?;
    let server = spawn_secure_server(&push_path, Keypair::generate()).await?;

    let stream = channel::connect_secure(
        &server.addr.to_string(),
        METHOD_SAY_HELLO,
        1024,
        &Keypair::generate(),
    )
    .await?;
    assert_eq!(say_hello(stream, "noise").await?, "Hello noise");
    Ok(())
}

/// A client that skips the handshake never gets a session.
#[tokio::test]
async fn test_plaintext_client_rejected_by_secure_server() -> Result<()> {
    let scratch = Scratch::new("secure-plain")?;
    let push_path = scratch.write("job.log", &random_bytes(70_000))?;
    let upload_path = scratch.write("up.bin", &random_bytes(100_000))?;
    let server = spawn_secure_server(&push_path, Keypair::generate()).await?;

    let transfer = TransferConfig::default();
    let client = client_config(&scratch.dir, SinkWrite::AfterAppend);
    let stream = channel::connect(
        &server.addr.to_string(),
        METHOD_STREAM_DATA,
        transfer.max_frame_len,
    )
    .await?;
    let result = ClientSession::new(&transfer, &client)
        .upload_and_download(stream, &upload_path, &scratch.path("out.bin"))
        .await;
    assert!(result.is_err(), "plaintext session must not complete");
    Ok(())
}

/// A client that insists on a handshake fails fast against a plain server.
#[tokio::test]
async fn test_secure_client_rejected_by_plain_server() -> Result<()> {
    let scratch = Scratch::new("plain-secure")?;
    let push_path = scratch.write("job.log", b"data")?;
    let server = spawn_server(&push_path).await?;

    let result = channel::connect_secure(
        &server.addr.to_string(),
        METHOD_STREAM_DATA,
        DEFAULT_MAX_FRAME_LEN,
        &Keypair::generate(),
    )
    .await;
    assert!(result.is_err(), "handshake against a plain server must fail");
    Ok(())
}
