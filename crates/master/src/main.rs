mod cli;
mod shutdown;

use std::io::BufRead;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use dispatch_core::Job;
use dispatch_net::Master;

use cli::Cli;
use shutdown::{spawn_ctrl_c_handler, ShutdownController, ShutdownEvent};

/// A job whose call and result are both opaque JSON values, read straight
/// from stdin. Lets this binary dispatch any worker protocol without
/// knowing the job's domain.
struct RawJob(serde_json::Value);

impl Job for RawJob {
    type Output = serde_json::Value;

    fn call(&self) -> serde_json::Value {
        self.0.clone()
    }

    fn result(&self, response: serde_json::Value) -> Self::Output {
        response
    }
}

/// A lazy, blocking source of [`RawJob`]s read one line at a time from
/// stdin — never materialized into a `Vec` up front, so a job set backed
/// by this iterator only ever reads as many lines as jobs actually get
/// dispatched, and a generator piping jobs in forever works unmodified.
///
/// Reading blocks the thread that pulls it, which here is the single
/// dispatch-actor task; acceptable since that task's own state machine is
/// synchronous by design (see `dispatch-core`) and this binary exists as
/// a demonstration, not a high-throughput server.
struct StdinJobs {
    reader: std::io::BufReader<std::io::Stdin>,
}

impl StdinJobs {
    fn new() -> Self {
        Self {
            reader: std::io::BufReader::new(std::io::stdin()),
        }
    }
}

impl Iterator for StdinJobs {
    type Item = RawJob;

    fn next(&mut self) -> Option<RawJob> {
        loop {
            let mut line = String::new();
            let read = self.reader.read_line(&mut line).ok()?;
            if read == 0 {
                return None;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str(trimmed) {
                Ok(value) => return Some(RawJob(value)),
                Err(err) => {
                    tracing::warn!(%err, line = trimmed, "skipping invalid JSON line on stdin");
                    continue;
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cli.log.clone()))
        .init();

    let master: Master<RawJob> = Master::bind((cli.host.as_str(), cli.port)).await?;
    tracing::info!(addr = %master.local_addr(), "dispatch master ready, waiting for workers");

    let shutdown = Arc::new(ShutdownController::new());
    let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel();
    spawn_ctrl_c_handler(shutdown, shutdown_tx);

    tracing::info!("submitting job set, reading jobs from stdin lazily");
    let set_id = master.submit(StdinJobs::new()).await?;
    let mut results = master.results(set_id);

    loop {
        tokio::select! {
            biased;
            Some(event) = shutdown_rx.recv() => match event {
                ShutdownEvent::Graceful => {
                    tracing::info!("shutdown requested, cancelling outstanding jobs");
                    master.cancel(set_id).await;
                }
                ShutdownEvent::Immediate => {
                    tracing::warn!("second shutdown request, exiting without waiting");
                    break;
                }
            },
            next = results.next() => match next {
                Some(value) => println!("{value}"),
                None => break,
            },
        }
    }

    master.close().await;
    Ok(())
}
