use tokio::io::BufReader;
use tokio::net::TcpStream;

use dispatch_core::{DispatchError, Job, WorkerTransportError};

use crate::handle::Handle;
use crate::wire::{self, WireError};

/// Map a framing-layer [`WireError`] to the crate-wide
/// [`WorkerTransportError`] taxonomy `session` logs against.
fn as_transport_error(err: WireError) -> WorkerTransportError {
    match err {
        WireError::Closed => WorkerTransportError::Closed,
        WireError::Io(err) => WorkerTransportError::Io(err),
        WireError::Decode(err) => WorkerTransportError::Decode(err),
    }
}

/// Drive one worker connection until it disconnects or misbehaves.
///
/// Each iteration leases a job from the manager, sends it, and waits for
/// a response line. Any transport or decode failure ends the session: the
/// leased job (if any) is handed back for another worker to pick up, and
/// the connection is dropped without attempting to resynchronize the
/// stream. A worker that wants to keep working reconnects; that is
/// simpler and safer than trying to recover mid-protocol.
pub async fn run<J: Job>(stream: TcpStream, handle: Handle<J>) {
    let peer = stream.peer_addr().ok();
    stream.set_nodelay(true).ok();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let Some((job_id, payload)) = handle.request_job().await else {
            tracing::debug!(?peer, "master shut down while waiting for work");
            return;
        };

        if let Err(err) = wire::send_line(&mut write_half, &payload).await {
            let err = DispatchError::from(as_transport_error(err));
            tracing::warn!(?peer, %err, "failed to send job to worker");
            handle.return_job(job_id);
            return;
        }

        match wire::recv_line(&mut reader).await {
            Ok(response) => handle.report_result(job_id, response),
            Err(err) => {
                let err = DispatchError::from(as_transport_error(err));
                tracing::warn!(?peer, %err, "failed to read result from worker");
                handle.return_job(job_id);
                return;
            }
        }
    }
}
