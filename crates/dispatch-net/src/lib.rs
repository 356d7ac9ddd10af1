//! TCP transport and actor runtime for [`dispatch_core`].
//!
//! A [`Master`] binds a socket, speaks the line-delimited JSON protocol to
//! workers that connect to it, and drives a [`dispatch_core::JobManager`]
//! from a single background task so the manager itself never needs a lock.

mod actor;
mod handle;
mod session;
mod wire;

pub mod master;

pub use handle::{Handle, ResultCursor};
pub use master::{Master, DEFAULT_PORT};
pub use wire::WireError;

pub use dispatch_core::{
    DispatchError, Job, JobId, JobSet, JobSetId, NextOutcome, StreamEnd, WorkerTransportError,
};
