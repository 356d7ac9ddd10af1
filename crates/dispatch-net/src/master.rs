use std::net::SocketAddr;

use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::task::JoinHandle;

use dispatch_core::{DispatchError, Job, JobSetId};

use crate::actor;
use crate::handle::{Handle, ResultCursor};
use crate::session;

/// The default TCP port a master listens on when the caller does not pick one.
pub const DEFAULT_PORT: u16 = 48484;

/// A running dispatch master: one job manager plus the TCP listener that
/// feeds worker connections into it.
///
/// Dropping a `Master` leaves its background tasks running; call
/// [`Master::close`] to shut down deliberately and wait for the actor to
/// drain.
pub struct Master<J: Job> {
    handle: Handle<J>,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
    actor_task: JoinHandle<()>,
}

impl<J: Job> Master<J> {
    /// Bind a listener and start accepting worker connections.
    pub async fn bind(addr: impl ToSocketAddrs) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (commands, actor_task) = actor::spawn::<J>();
        let handle = Handle::new(commands);

        let accept_handle = handle.clone();
        let accept_task = tokio::spawn(accept_loop(listener, accept_handle));

        tracing::info!(%local_addr, "dispatch master listening");
        Ok(Self {
            handle,
            local_addr,
            accept_task,
            actor_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A cloneable handle for submitting work and reading results.
    pub fn handle(&self) -> Handle<J> {
        self.handle.clone()
    }

    /// Submit a batch of jobs, lazily pulled from `jobs` as they are
    /// actually dispatched — an unbounded or infinite source is fine.
    pub async fn submit<I>(&self, jobs: I) -> Result<JobSetId, DispatchError>
    where
        I: IntoIterator<Item = J>,
        I::IntoIter: Send + 'static,
    {
        self.handle.submit(jobs).await
    }

    pub fn results(&self, set_id: JobSetId) -> ResultCursor<J> {
        self.handle.results(set_id)
    }

    pub async fn cancel(&self, set_id: JobSetId) {
        self.handle.cancel(set_id).await;
    }

    /// Stop accepting new worker connections and shut down the dispatch
    /// actor, then wait for it to finish draining its command queue.
    ///
    /// Every job set still active or pending at this point is cancelled,
    /// so its result stream ends deterministically with `Cancelled`
    /// rather than being silently abandoned mid-flight. Worker sessions
    /// already in flight are not forcibly disconnected: a session blocked
    /// mid-call finishes that call naturally (its eventual report finds
    /// the manager closed and is dropped), and one parked waiting for the
    /// next job sees the actor disappear and exits on its own.
    pub async fn close(self) {
        self.accept_task.abort();
        self.handle.shutdown();
        let _ = self.actor_task.await;
    }
}

async fn accept_loop<J: Job>(listener: TcpListener, handle: Handle<J>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tracing::debug!(%peer, "worker connected");
                let session_handle = handle.clone();
                tokio::spawn(async move {
                    session::run(stream, session_handle).await;
                });
            }
            Err(err) => {
                tracing::warn!(%err, "accept failed");
            }
        }
    }
}
