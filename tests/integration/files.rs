use crate::*;

use tandem_core::wire::METHOD_STREAM_DATA;
use tandem_services::{channel, ClientSession};

async fn stream_file(
    server: &TestServer,
    client: &ClientConfig,
    upload: &Path,
) -> Result<tandem_services::TransferReport> {
    let transfer = TransferConfig::default();
    let stream = channel::connect(
        &server.addr.to_string(),
        METHOD_STREAM_DATA,
        transfer.max_frame_len,
    )
    .await
    .context("connect failed")?;
    let destination = client.destination_for(upload);
    let report = ClientSession::new(&transfer, client)
        .upload_and_download(stream, upload, &destination)
        .await?;
    Ok(report)
}

/// Upload and push both cross the 64 KiB boundary; the client gets the
/// pushed file followed by its own upload echoed back as one frame.
#[tokio::test]
async fn test_large_upload_echoes_behind_push() -> Result<()> {
    let scratch = Scratch::new("large")?;
    let push = random_bytes(100_011);
    let upload = random_bytes(150_000);
    let push_path = scratch.write("job.log", &push)?;
    let upload_path = scratch.write("SampleFile.txt", &upload)?;

    let server = spawn_server(&push_path).await?;
    let client = client_config(&scratch.dir, SinkWrite::AfterAppend);
    let report = stream_file(&server, &client, &upload_path).await?;

    assert_eq!(report.uploaded_bytes, 150_000);
    assert_eq!(report.upload_frames, 3);
    // 65536 + 34475 pushed, then the echo
    assert_eq!(report.download_frames, 3);

    let mut expected = push.clone();
    expected.extend_from_slice(&upload);
    assert_eq!(report.downloaded.len(), expected.len());
    assert!(report.downloaded[..] == expected[..], "download mismatch");

    assert_eq!(report.destination, scratch.path("downloaded-SampleFile.txt"));
    let on_disk = std::fs::read(&report.destination)?;
    assert!(on_disk == expected, "destination file mismatch");
    Ok(())
}

#[tokio::test]
async fn test_hello_world_echo() -> Result<()> {
    let scratch = Scratch::new("echo")?;
    let push_path = scratch.write("job.log", b"job started\njob finished\n")?;
    let upload_path = scratch.write("note.txt", b"hello world")?;

    let server = spawn_server(&push_path).await?;
    let client = client_config(&scratch.dir, SinkWrite::AfterAppend);
    let report = stream_file(&server, &client, &upload_path).await?;

    assert_eq!(report.uploaded_bytes, 11);
    assert_eq!(report.upload_frames, 1);
    assert_eq!(
        &report.downloaded[..],
        &b"job started\njob finished\nhello world"[..]
    );
    assert_eq!(
        std::fs::read(scratch.path("downloaded-note.txt"))?,
        b"job started\njob finished\nhello world"
    );
    Ok(())
}

/// The download is the push file regardless of what the client sends.
#[tokio::test]
async fn test_push_is_independent_of_upload() -> Result<()> {
    let scratch = Scratch::new("independent")?;
    let push_path = scratch.write("job.log", b"fixed server stream")?;
    let first = scratch.write("a.txt", b"first")?;
    let second = scratch.write("b.txt", &random_bytes(70_000))?;

    let server = spawn_server(&push_path).await?;
    let client = client_config(&scratch.dir, SinkWrite::AfterAppend);

    let a = stream_file(&server, &client, &first).await?;
    let b = stream_file(&server, &client, &second).await?;

    let push_len = b"fixed server stream".len();
    assert_eq!(&a.downloaded[..push_len], &b"fixed server stream"[..]);
    assert_eq!(&b.downloaded[..push_len], &b"fixed server stream"[..]);
    assert_eq!(&a.downloaded[push_len..], &b"first"[..]);
    assert_eq!(b.downloaded.len(), push_len + 70_000);
    Ok(())
}

#[tokio::test]
async fn test_empty_upload_still_completes() -> Result<()> {
    let scratch = Scratch::new("empty")?;
    let push_path = scratch.write("job.log", b"x")?;
    let upload_path = scratch.write("empty.txt", b"")?;

    let server = spawn_server(&push_path).await?;
    let client = client_config(&scratch.dir, SinkWrite::AfterAppend);
    let report = stream_file(&server, &client, &upload_path).await?;

    assert_eq!(report.uploaded_bytes, 0);
    assert_eq!(report.upload_frames, 0);
    // push chunk plus an empty echo
    assert_eq!(report.download_frames, 2);
    assert_eq!(&report.downloaded[..], &b"x"[..]);
    Ok(())
}

/// Write-before-append leaves the last frame (the echo) off the file on
/// disk while the in-memory payload still has it.
#[tokio::test]
async fn test_before_append_file_lags_one_frame() -> Result<()> {
    let scratch = Scratch::new("lagging")?;
    let push_path = scratch.write("job.log", b"pushed")?;
    let upload_path = scratch.write("up.txt", b"echoed")?;

    let server = spawn_server(&push_path).await?;
    let client = client_config(&scratch.dir, SinkWrite::BeforeAppend);
    let report = stream_file(&server, &client, &upload_path).await?;

    assert_eq!(&report.downloaded[..], &b"pushedechoed"[..]);
    assert_eq!(std::fs::read(&report.destination)?, b"pushed");
    Ok(())
}

#[tokio::test]
async fn test_concurrent_sessions_stay_separate() -> Result<()> {
    let scratch = Scratch::new("concurrent")?;
    let push_path = scratch.write("job.log", &random_bytes(5_000))?;
    let server = spawn_server(&push_path).await?;

    let mut handles = Vec::new();
    for i in 0..6 {
        let upload = random_bytes(20_000 + i * 1_000);
        let upload_path = scratch.write(&format!("up-{i}.bin"), &upload)?;
        let addr = server.addr.to_string();
        let client = client_config(&scratch.dir, SinkWrite::AfterAppend);
        handles.push(tokio::spawn(async move {
            let transfer = TransferConfig::default();
            let stream =
                channel::connect(&addr, METHOD_STREAM_DATA, transfer.max_frame_len).await?;
            let destination = client.destination_for(&upload_path);
            let report = ClientSession::new(&transfer, &client)
                .upload_and_download(stream, &upload_path, &destination)
                .await?;
            anyhow::Ok((upload, report))
        }));
    }

    for handle in handles {
        let (upload, report) = handle.await??;
        assert_eq!(report.downloaded.len(), 5_000 + upload.len());
        assert!(report.downloaded[5_000..] == upload[..], "echo belongs to another session");
    }
    Ok(())
}
