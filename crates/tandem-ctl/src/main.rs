//! tandem-ctl: command-line client for the Tandem server.

use anyhow::{Context, Result};

use tandem_core::config::TandemConfig;

mod cmd;

fn print_usage() {
    println!("Usage: tandem-ctl [--addr <host:port>] <command>");
    println!();
    println!("Commands:");
    println!("  stream [<file>] [--out <path>]   Upload a file, download the server's stream");
    println!("  hello <name>                     Send a unary greeting");
    println!();
    println!("Options:");
    println!("  --addr <host:port>   Server address (default: network.server_addr from config)");
    println!("  --out <path>         Download destination");
    println!("                       (default: <download_dir>/downloaded-<file>)");
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = TandemConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        TandemConfig::default()
    });

    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --addr and --out options
    let mut addr = config.network.server_addr.clone();
    let mut out: Option<String> = None;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" => {
                i += 1;
                addr = args.get(i).context("--addr requires a value")?.clone();
            }
            "--out" => {
                i += 1;
                out = Some(args.get(i).context("--out requires a value")?.clone());
            }
            _ => remaining.push(&args[i]),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["stream"] => cmd::stream::cmd_stream(&config, &addr, None, out.as_deref()).await,
        ["stream", file] => {
            cmd::stream::cmd_stream(&config, &addr, Some(*file), out.as_deref()).await
        }
        ["hello", name] => cmd::hello::cmd_hello(&config, &addr, name).await,
        ["help"] | ["--help"] | ["-h"] | [] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            print_usage();
            std::process::exit(1);
        }
    }
}
