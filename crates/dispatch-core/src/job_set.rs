use std::collections::{HashMap, VecDeque};

use crate::ids::{JobId, JobSetId};
use crate::job::Job;
use crate::result_stream::{NextOutcome, ResultStream, StreamEnd};
use tokio::sync::oneshot;

/// One submitted batch of jobs plus the result stream it feeds.
///
/// The job source is a lazy, possibly-infinite [`Iterator`], pulled one
/// element at a time into `on_deck` rather than materialized up front — a
/// caller can `submit` a generator that produces jobs forever and only as
/// much of it is ever read as jobs are actually dispatched. `requeue`
/// holds jobs whose worker failed and is always drained before `on_deck`,
/// so a job that needs a second try is never starved behind fresh work.
pub struct JobSet<J: Job> {
    id: JobSetId,
    iter: Box<dyn Iterator<Item = J> + Send>,
    on_deck: Option<(JobId, J)>,
    requeue: VecDeque<JobId>,
    outstanding: HashMap<JobId, J>,
    next_seq: u64,
    active: usize,
    cancelled: bool,
    pub(crate) results: ResultStream<J::Output>,
}

impl<J: Job> JobSet<J> {
    pub fn new(id: JobSetId, iter: Box<dyn Iterator<Item = J> + Send>) -> Self {
        let mut set = Self {
            id,
            iter,
            on_deck: None,
            requeue: VecDeque::new(),
            outstanding: HashMap::new(),
            next_seq: 0,
            active: 0,
            cancelled: false,
            results: ResultStream::new(),
        };
        set.load_next();
        if set.active == 0 {
            // The source was empty: nothing will ever be dispatched.
            set.results.close(StreamEnd::Completed);
        }
        set
    }

    pub fn id(&self) -> JobSetId {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// True once every dispatched job has produced a result and the
    /// source is exhausted, or the set was cancelled.
    pub fn is_done(&self) -> bool {
        self.active == 0
    }

    /// True if a job can be handed out right now without pulling the
    /// iterator further than it already has been.
    pub fn job_available(&self) -> bool {
        !self.cancelled && (!self.requeue.is_empty() || self.on_deck.is_some())
    }

    /// Pull one job into `on_deck`, advancing `iter`. Counts the pulled
    /// job toward `active` immediately — it is now either on deck or
    /// about to be, and either way it owes the set a result. A no-op if
    /// `on_deck` is already occupied or the set is cancelled.
    fn load_next(&mut self) {
        if self.cancelled || self.on_deck.is_some() {
            return;
        }
        if let Some(job) = self.iter.next() {
            let job_id = JobId {
                set: self.id,
                seq: self.next_seq,
            };
            self.next_seq += 1;
            self.on_deck = Some((job_id, job));
            self.active += 1;
        }
    }

    /// Lease the next job: a requeued one first, the next fresh one
    /// otherwise. The caller MUST have checked [`Self::job_available`]
    /// first; calling this on an empty or cancelled set is a logic bug in
    /// the manager, not a recoverable condition, so it panics rather than
    /// returning a soft error.
    pub fn get_job(&mut self) -> (JobId, serde_json::Value) {
        assert!(
            self.job_available(),
            "get_job called on a job set with no pending job"
        );
        if let Some(job_id) = self.requeue.pop_front() {
            let job = self
                .outstanding
                .get(&job_id)
                .expect("requeued job id missing from outstanding map");
            return (job_id, job.call());
        }
        let (job_id, job) = self
            .on_deck
            .take()
            .expect("job_available implies on_deck is present once requeue is empty");
        let payload = job.call();
        self.outstanding.insert(job_id, job);
        self.load_next();
        (job_id, payload)
    }

    /// Return a dispatched job to the requeue buffer, e.g. after its
    /// worker died. The job stays outstanding — `active` is unchanged —
    /// it just needs dispatching again, ahead of any fresh job still
    /// waiting in `iter`.
    ///
    /// A no-op if the set is already done or cancelled, or if `job_id`
    /// does not belong to this set or is not currently outstanding —
    /// matching the source system's behavior of silently dropping stale
    /// requeues rather than treating them as errors.
    pub fn return_job(&mut self, job_id: JobId) {
        if self.is_done() {
            return;
        }
        if self.outstanding.contains_key(&job_id) {
            self.requeue.push_back(job_id);
        }
    }

    /// Record a worker's result for a dispatched job.
    ///
    /// A no-op if the set is already done or cancelled, or the job is not
    /// currently outstanding (duplicate or late result from a requeued
    /// job whose original worker answered anyway). Also prunes any
    /// matching requeue entry, so a late result never leaves the requeue
    /// buffer pointing at a job no longer in `outstanding`.
    pub fn add_result(&mut self, job_id: JobId, response: serde_json::Value) {
        if self.is_done() {
            return;
        }
        let Some(job) = self.outstanding.remove(&job_id) else {
            return;
        };
        self.requeue.retain(|&id| id != job_id);
        let output = job.result(response);
        self.results.push(output);
        self.active -= 1;
        if self.active == 0 {
            self.results.close(StreamEnd::Completed);
        }
    }

    /// Cancel the set: no further jobs are handed out, no further results
    /// are accepted, and every parked result waiter is woken with
    /// `Cancelled`. History already pushed via [`Self::add_result`] is
    /// kept, not cleared.
    pub fn cancel(&mut self) {
        if self.cancelled || self.is_done() {
            return;
        }
        self.cancelled = true;
        self.iter = Box::new(std::iter::empty());
        self.on_deck = None;
        self.requeue.clear();
        self.outstanding.clear();
        self.active = 0;
        self.results.close(StreamEnd::Cancelled);
    }

    pub fn poll_result(&mut self, index: usize, reply: oneshot::Sender<NextOutcome<J::Output>>) {
        self.results.poll_or_wait(index, reply);
    }
}
