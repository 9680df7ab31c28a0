use engine_core::error::{ExecutorError, JobError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Forest discovery request failed: {0}")]
    Request(#[from] ExecutorError),

    #[error("Malformed forest info response: {0}")]
    Malformed(String),

    #[error("The database reported no forests")]
    NoForests,
}

/// Outcome of a failed dispatch, as seen by a worker.
#[derive(Error, Debug)]
pub enum BatchError {
    /// Recoverable through the batch's disposition.
    #[error(transparent)]
    Request(#[from] ExecutorError),

    /// Ends the job without consulting the disposition.
    #[error(transparent)]
    Fatal(#[from] JobError),
}
