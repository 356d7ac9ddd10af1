use thiserror::Error;

/// Failures from the worker-facing transport: socket I/O, a connection
/// that closes mid-call, or a response line that doesn't parse as JSON.
/// Recovery is always the same at this layer: requeue the job, close the
/// session, and keep the job set alive.
#[derive(Debug, Error)]
pub enum WorkerTransportError {
    #[error("transport io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("connection closed by peer")]
    Closed,
}

/// Crate-wide error taxonomy.
///
/// `Cancelled`, `EndOfResults`, and `ManagerClosed` are deliberately not
/// variants here: they are outcomes of the result-stream and manager
/// APIs (see [`crate::NextOutcome`]/[`crate::StreamEnd`]), not failures —
/// a results iterator only ever signals end-of-stream, never an error.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("worker transport error: {0}")]
    WorkerTransport(#[from] WorkerTransportError),

    /// An invariant only a caller or manager bug could violate, e.g.
    /// `submit` after `close`. Asserted against in tests; a well-behaved
    /// caller should never see this.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),
}
