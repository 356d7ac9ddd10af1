/// A unit of work dispatched to workers.
///
/// One `Job` type is shared by every job set inside a given
/// [`crate::manager::JobManager`] instance — a master that needs to run
/// more than one kind of workload runs more than one manager.
///
/// `call` produces the wire payload sent to a worker; `result` turns the
/// worker's decoded response back into the typed value handed to callers
/// of [`crate::job_set::JobSet`] result streams. Keeping the two separate
/// lets a job borrow nothing across the call/response boundary and lets
/// the manager clone `call`'s output freely when a job is requeued after
/// a dead worker.
pub trait Job: Send + Sync + 'static {
    /// The value produced once a worker's response has been decoded.
    type Output: Send + Clone + 'static;

    /// Build the JSON payload sent to a worker for this job.
    fn call(&self) -> serde_json::Value;

    /// Turn a worker's decoded JSON response into this job's output.
    fn result(&self, response: serde_json::Value) -> Self::Output;
}
