use std::collections::{HashMap, VecDeque};

use tokio::sync::oneshot;

use crate::error::DispatchError;
use crate::ids::{JobId, JobSetId};
use crate::job::Job;
use crate::job_set::JobSet;
use crate::result_stream::NextOutcome;

/// A worker waiting for a job when none was available at request time.
type WaitingWorker = oneshot::Sender<(JobId, serde_json::Value)>;

/// Owns every job set submitted to one master and distributes jobs to
/// workers one job set at a time.
///
/// `JobManager` holds no lock of its own: it is designed to live behind a
/// single-threaded actor loop (see `dispatch-net::actor`), so every method
/// here takes `&mut self` and runs to completion without yielding. Only
/// one job set is ever dispatching at a time — `active`, with the rest
/// parked in `pending` — so jobs from set B never interleave with set A
/// while A is still outstanding, only after it's fully done. A queue of
/// parked worker replies lets `request_job` be satisfied later, by
/// `submit` or `return_job`, instead of the caller busy-polling.
pub struct JobManager<J: Job> {
    sets: HashMap<JobSetId, JobSet<J>>,
    active: Option<JobSetId>,
    pending: VecDeque<JobSetId>,
    waiting_workers: VecDeque<WaitingWorker>,
    next_set_id: u64,
    closed: bool,
}

impl<J: Job> JobManager<J> {
    pub fn new() -> Self {
        Self {
            sets: HashMap::new(),
            active: None,
            pending: VecDeque::new(),
            waiting_workers: VecDeque::new(),
            next_set_id: 0,
            closed: false,
        }
    }

    /// Submit a new batch of jobs, returning the id of the resulting set.
    ///
    /// `jobs` is taken as an iterator and only ever pulled one element at
    /// a time by the job set it backs — an infinite source is fine. If no
    /// set is currently active, this one becomes active immediately and,
    /// if workers are already parked waiting for work, jobs from it are
    /// handed to them right away, in submission order. Otherwise it waits
    /// in line behind whatever set is currently active.
    ///
    /// Fails with [`DispatchError::PreconditionViolation`] if the manager
    /// has already been [`Self::close`]d.
    pub fn submit<I>(&mut self, jobs: I) -> Result<JobSetId, DispatchError>
    where
        I: IntoIterator<Item = J>,
        I::IntoIter: Send + 'static,
    {
        if self.closed {
            return Err(DispatchError::PreconditionViolation(
                "submit called on a closed job manager".to_string(),
            ));
        }
        let set_id = JobSetId(self.next_set_id);
        self.next_set_id += 1;
        let set = JobSet::new(set_id, Box::new(jobs.into_iter()));
        let already_done = set.is_done();
        self.sets.insert(set_id, set);
        tracing::debug!(%set_id, "submitted job set");

        if self.active.is_none() {
            self.active = Some(set_id);
            if already_done {
                self.advance_past_done_active(set_id);
            } else {
                self.drain_waiting_workers();
            }
        } else {
            self.pending.push_back(set_id);
        }
        Ok(set_id)
    }

    /// Immediately hand out a job from the active set, if one is available.
    pub fn try_request_job(&mut self) -> Option<(JobId, serde_json::Value)> {
        let active_id = self.active?;
        let set = self.sets.get_mut(&active_id)?;
        if !set.job_available() {
            return None;
        }
        Some(set.get_job())
    }

    /// Park a worker reply for the next job to become available.
    pub fn register_waiting_worker(&mut self, reply: WaitingWorker) {
        if self.closed {
            // Nothing will ever wake this; dropping it closes the
            // worker's channel, which is exactly what it should see.
            return;
        }
        self.waiting_workers.push_back(reply);
    }

    fn drain_waiting_workers(&mut self) {
        while !self.waiting_workers.is_empty() {
            let Some((job_id, payload)) = self.try_request_job() else {
                break;
            };
            let reply = self
                .waiting_workers
                .pop_front()
                .expect("checked non-empty");
            if let Err((job_id, _payload)) = reply.send((job_id, payload)) {
                // Worker went away before we could hand it work; requeue.
                self.return_job(job_id);
            }
        }
    }

    /// Return a dispatched job to its set's requeue buffer, e.g. after a
    /// dead worker. Silently dropped if the job's set is already done, or
    /// the set no longer exists (pruned via [`Self::retire`]).
    pub fn return_job(&mut self, job_id: JobId) {
        if self.closed {
            return;
        }
        let set_id = job_id.job_set();
        let Some(set) = self.sets.get_mut(&set_id) else {
            return;
        };
        set.return_job(job_id);
        self.drain_waiting_workers();
    }

    /// Record a worker's response for a dispatched job. If that completes
    /// the job's set and it was the active one, promotes the next
    /// non-done pending set (if any) to active.
    pub fn report_result(&mut self, job_id: JobId, response: serde_json::Value) {
        let set_id = job_id.job_set();
        let Some(set) = self.sets.get_mut(&set_id) else {
            return;
        };
        set.add_result(job_id, response);
        if set.is_done() {
            self.advance_past_done_active(set_id);
        }
    }

    /// Cancel a job set. A no-op if it does not exist or is already done.
    /// If the cancelled set was active, promotes the next pending set.
    pub fn cancel(&mut self, set_id: JobSetId) {
        let Some(set) = self.sets.get_mut(&set_id) else {
            return;
        };
        set.cancel();
        tracing::debug!(%set_id, "cancelled job set");
        self.advance_past_done_active(set_id);
    }

    pub fn is_done(&self, set_id: JobSetId) -> Option<bool> {
        self.sets.get(&set_id).map(JobSet::is_done)
    }

    /// Fetch the result at `index` for `set_id`, or park `reply` until one
    /// becomes available. If `set_id` is unknown (never existed, or was
    /// already [`Self::retire`]d), `reply` is dropped and the caller sees
    /// a closed channel.
    pub fn poll_result(
        &mut self,
        set_id: JobSetId,
        index: usize,
        reply: oneshot::Sender<NextOutcome<J::Output>>,
    ) {
        if let Some(set) = self.sets.get_mut(&set_id) {
            set.poll_result(index, reply);
        }
    }

    /// Drop a completed or cancelled set's state, once the caller knows no
    /// further consumer will ask for its results. Not required for
    /// correctness — an unretired set is simply kept around — but bounds
    /// memory for a long-lived master handling many short job sets.
    pub fn retire(&mut self, set_id: JobSetId) {
        if self.sets.remove(&set_id).is_some() {
            tracing::trace!(%set_id, "retired job set");
        }
    }

    /// Shut the manager down: sticky, idempotent. Cancels the active set
    /// (if any) and every pending set, so their result streams end
    /// deterministically rather than being silently abandoned. Does not
    /// synchronously drain worker calls already in flight — those find
    /// `closed` set and are dropped when they eventually report in.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(active_id) = self.active.take() {
            if let Some(set) = self.sets.get_mut(&active_id) {
                set.cancel();
            }
        }
        for set_id in self.pending.drain(..) {
            if let Some(set) = self.sets.get_mut(&set_id) {
                set.cancel();
            }
        }
        tracing::info!("job manager closed");
    }

    /// If `set_id` is the active set and it has just become done, pop
    /// `pending` (discarding any head that's already done, e.g. an empty
    /// set submitted while something else was active) until a non-done
    /// set is promoted to active, or `pending` is exhausted.
    fn advance_past_done_active(&mut self, set_id: JobSetId) {
        if self.active != Some(set_id) {
            return;
        }
        let Some(set) = self.sets.get(&set_id) else {
            return;
        };
        if !set.is_done() {
            return;
        }
        self.active = None;
        while let Some(candidate) = self.pending.pop_front() {
            let done = self.sets.get(&candidate).map(JobSet::is_done).unwrap_or(true);
            if done {
                continue;
            }
            self.active = Some(candidate);
            break;
        }
        self.drain_waiting_workers();
    }
}
