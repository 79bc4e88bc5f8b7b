//! Bidirectional file stream command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use tandem_core::config::TandemConfig;
use tandem_core::wire::METHOD_STREAM_DATA;
use tandem_services::ClientSession;

pub async fn cmd_stream(
    config: &TandemConfig,
    addr: &str,
    file: Option<&str>,
    out: Option<&str>,
) -> Result<()> {
    let upload = file
        .map(PathBuf::from)
        .unwrap_or_else(|| config.client.upload_file.clone());
    let destination = match out {
        Some(path) => PathBuf::from(path),
        None => config.client.destination_for(&upload),
    };

    let stream = super::open_stream(config, addr, METHOD_STREAM_DATA).await?;

    let session = ClientSession::new(&config.transfer, &config.client);
    let report = session
        .upload_and_download(stream, &upload, &destination)
        .await
        .with_context(|| format!("transfer of {} failed", upload.display()))?;

    print_summary(&upload, &report);
    Ok(())
}

fn print_summary(upload: &Path, report: &tandem_services::TransferReport) {
    println!("═══════════════════════════════════════");
    println!("  Transfer Complete");
    println!("═══════════════════════════════════════");
    println!("  Uploaded    : {} ({} bytes)", upload.display(), report.uploaded_bytes);
    println!("  Frames sent : {}", report.upload_frames);
    println!(
        "  Downloaded  : {} bytes in {} frames",
        report.downloaded.len(),
        report.download_frames
    );
    println!("  Written to  : {}", report.destination.display());
    println!("  BLAKE3      : {}", report.download_digest());
}
