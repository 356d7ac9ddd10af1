use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing_subscriber::EnvFilter;

/// A reference worker: connects to a dispatch master, answers `{"a", "b"}`
/// jobs with their sum, and echoes back anything else under `{"echo": ...}`.
/// Exists to exercise `dispatch-net`'s wire protocol end to end; a real
/// worker is free to speak the same two-line protocol in any language.
#[derive(Parser, Debug)]
#[command(name = "echo-worker", version, about)]
struct Cli {
    #[arg(long, env = "DISPATCH_HOST", default_value = "127.0.0.1")]
    host: String,

    #[arg(long, env = "DISPATCH_PORT", default_value_t = dispatch_net::DEFAULT_PORT)]
    port: u16,

    #[arg(long, env = "DISPATCH_LOG", default_value = "info")]
    log: String,
}

fn handle(call: serde_json::Value) -> serde_json::Value {
    match (call.get("a").and_then(|v| v.as_i64()), call.get("b").and_then(|v| v.as_i64())) {
        (Some(a), Some(b)) => serde_json::json!({"sum": a + b}),
        _ => serde_json::json!({"echo": call}),
    }
}

async fn run_once(host: &str, port: u16) -> std::io::Result<()> {
    let stream = TcpStream::connect((host, port)).await?;
    stream.set_nodelay(true).ok();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            tracing::info!("master closed the connection");
            return Ok(());
        }
        let call: serde_json::Value = match serde_json::from_str(line.trim_end()) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(%err, "master sent malformed call, disconnecting");
                return Ok(());
            }
        };
        let response = handle(call).to_string() + "\n";
        write_half.write_all(response.as_bytes()).await?;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cli.log.clone()))
        .init();

    let mut backoff = Duration::from_millis(200);
    loop {
        tracing::info!(host = %cli.host, port = cli.port, "connecting to master");
        match run_once(&cli.host, cli.port).await {
            Ok(()) => break,
            Err(err) => {
                tracing::warn!(%err, delay = ?backoff, "connection failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_secs(10));
            }
        }
    }
    Ok(())
}
