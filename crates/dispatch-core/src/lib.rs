//! Core dispatch state machine: job sets, result streams, and fair
//! distribution of work across an in-memory manager.
//!
//! This crate has no notion of workers, sockets, or wire formats — see
//! `dispatch-net` for the actor and transport that sit on top of it. Kept
//! separate so the dispatch logic can be unit tested without async I/O.

mod error;
mod ids;
mod job;
mod job_set;
mod manager;
mod result_stream;

pub use error::{DispatchError, WorkerTransportError};
pub use ids::{JobId, JobSetId};
pub use job::Job;
pub use job_set::JobSet;
pub use manager::JobManager;
pub use result_stream::{NextOutcome, ResultStream, StreamEnd};
