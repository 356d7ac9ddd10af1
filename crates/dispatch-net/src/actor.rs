use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use dispatch_core::{DispatchError, Job, JobId, JobManager, JobSetId, NextOutcome};

/// Messages the public [`crate::handle::Handle`] and worker sessions send
/// to the task that owns the [`JobManager`].
///
/// Everything that touches manager state flows through this channel, so
/// the manager itself never needs a lock: exactly one task drains
/// `commands` and runs each variant to completion before looking at the
/// next.
pub(crate) enum Command<J: Job> {
    Submit {
        jobs: Box<dyn Iterator<Item = J> + Send>,
        reply: oneshot::Sender<Result<JobSetId, DispatchError>>,
    },
    RequestJob {
        reply: oneshot::Sender<(JobId, serde_json::Value)>,
    },
    ReturnJob {
        job_id: JobId,
    },
    ReportResult {
        job_id: JobId,
        response: serde_json::Value,
    },
    PollResult {
        set_id: JobSetId,
        index: usize,
        reply: oneshot::Sender<NextOutcome<J::Output>>,
    },
    Cancel {
        set_id: JobSetId,
    },
    IsDone {
        set_id: JobSetId,
        reply: oneshot::Sender<Option<bool>>,
    },
    Retire {
        set_id: JobSetId,
    },
    Shutdown,
}

/// Spawn the actor task that owns a fresh [`JobManager`], returning the
/// command channel callers use to reach it and a join handle for shutdown.
pub(crate) fn spawn<J: Job>() -> (mpsc::UnboundedSender<Command<J>>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let join = tokio::spawn(run(rx));
    (tx, join)
}

async fn run<J: Job>(mut commands: mpsc::UnboundedReceiver<Command<J>>) {
    let mut manager = JobManager::<J>::new();
    while let Some(command) = commands.recv().await {
        match command {
            Command::Submit { jobs, reply } => {
                let result = manager.submit(jobs);
                let _ = reply.send(result);
            }
            Command::RequestJob { reply } => match manager.try_request_job() {
                Some((job_id, payload)) => {
                    let _ = reply.send((job_id, payload));
                }
                None => manager.register_waiting_worker(reply),
            },
            Command::ReturnJob { job_id } => manager.return_job(job_id),
            Command::ReportResult { job_id, response } => {
                manager.report_result(job_id, response)
            }
            Command::PollResult {
                set_id,
                index,
                reply,
            } => manager.poll_result(set_id, index, reply),
            Command::Cancel { set_id } => manager.cancel(set_id),
            Command::IsDone { set_id, reply } => {
                let _ = reply.send(manager.is_done(set_id));
            }
            Command::Retire { set_id } => manager.retire(set_id),
            Command::Shutdown => {
                // Cancel every outstanding job set before exiting, so
                // their result streams end deterministically instead of
                // being silently abandoned along with the manager.
                manager.close();
                break;
            }
        }
    }
    tracing::debug!("dispatch actor shutting down");
}
