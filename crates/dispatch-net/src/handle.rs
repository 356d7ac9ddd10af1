use tokio::sync::{mpsc, oneshot};

use dispatch_core::{DispatchError, Job, JobId, JobSetId, NextOutcome};

use crate::actor::Command;

/// A cheaply cloneable reference to a running [`crate::master::Master`].
///
/// All methods talk to the dispatch actor over a channel; none of them
/// touch manager state directly, so a `Handle` can be freely cloned
/// across tasks (one per worker session, plus however many the
/// application keeps for submitting work and reading results).
pub struct Handle<J: Job> {
    commands: mpsc::UnboundedSender<Command<J>>,
}

impl<J: Job> Clone for Handle<J> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
        }
    }
}

fn master_closed() -> DispatchError {
    DispatchError::PreconditionViolation("master is closed".to_string())
}

impl<J: Job> Handle<J> {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command<J>>) -> Self {
        Self { commands }
    }

    /// Submit a batch of jobs and get back the id of the resulting set.
    ///
    /// `jobs` is consumed lazily by the job set it backs — nothing here
    /// materializes the whole sequence up front, so an unbounded or even
    /// infinite source is fine to pass in.
    ///
    /// Fails if the master has already shut down, or if it was still
    /// running but already closed when the command was processed.
    pub async fn submit<I>(&self, jobs: I) -> Result<JobSetId, DispatchError>
    where
        I: IntoIterator<Item = J>,
        I::IntoIter: Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let boxed: Box<dyn Iterator<Item = J> + Send> = Box::new(jobs.into_iter());
        self.commands
            .send(Command::Submit { jobs: boxed, reply })
            .map_err(|_| master_closed())?;
        rx.await.map_err(|_| master_closed())?
    }

    /// Start reading results for `set_id` from the beginning. Each call
    /// returns an independent cursor; reading from one does not affect
    /// any other, including one created earlier for the same set.
    pub fn results(&self, set_id: JobSetId) -> ResultCursor<J> {
        ResultCursor {
            commands: self.commands.clone(),
            set_id,
            index: 0,
        }
    }

    /// Cancel a job set. A no-op if it does not exist or is already done.
    pub async fn cancel(&self, set_id: JobSetId) {
        let _ = self.commands.send(Command::Cancel { set_id });
    }

    /// Whether `set_id` has finished (completed or cancelled). `None` if
    /// the set is unknown, e.g. it was already [`Self::retire`]d.
    pub async fn is_done(&self, set_id: JobSetId) -> Option<bool> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::IsDone { set_id, reply })
            .ok()?;
        rx.await.ok().flatten()
    }

    /// Release a finished set's state once no further result reads are
    /// expected. Fire-and-forget: there is nothing meaningful to wait for.
    pub fn retire(&self, set_id: JobSetId) {
        let _ = self.commands.send(Command::Retire { set_id });
    }

    /// Tell the actor to stop after draining whatever is already queued.
    pub(crate) fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    /// Request the next available job, parking until one is submitted or
    /// returned if none is ready yet. Returns `None` once the master has
    /// shut down with this request still unanswered.
    pub(crate) async fn request_job(&self) -> Option<(JobId, serde_json::Value)> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(Command::RequestJob { reply }).ok()?;
        rx.await.ok()
    }

    pub(crate) fn return_job(&self, job_id: JobId) {
        let _ = self.commands.send(Command::ReturnJob { job_id });
    }

    pub(crate) fn report_result(&self, job_id: JobId, response: serde_json::Value) {
        let _ = self.commands.send(Command::ReportResult { job_id, response });
    }
}

/// An independent cursor over one job set's results, starting at index 0.
pub struct ResultCursor<J: Job> {
    commands: mpsc::UnboundedSender<Command<J>>,
    set_id: JobSetId,
    index: usize,
}

impl<J: Job> ResultCursor<J> {
    /// The next result in submission order, or `None` once the set has
    /// ended (completed or cancelled) with no more results to give.
    pub async fn next(&mut self) -> Option<J::Output> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::PollResult {
                set_id: self.set_id,
                index: self.index,
                reply,
            })
            .ok()?;
        match rx.await.ok()? {
            NextOutcome::Value(value) => {
                self.index += 1;
                Some(value)
            }
            NextOutcome::End(_) => None,
        }
    }
}
