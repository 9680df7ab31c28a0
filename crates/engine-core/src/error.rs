use thiserror::Error;

/// Failure reported by the request executor for a single dispatch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ExecutorError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ExecutorError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Error that ends a job. Recorded once, emitted once on the job's stream
/// and reported in the completion summary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    #[error("Retry count exceeded for batch '{batch_id}' after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        batch_id: String,
        attempts: usize,
        last_error: ExecutorError,
    },

    #[error("Batch '{batch_id}' aborted: {reason}")]
    Aborted { batch_id: String, reason: String },

    #[error("Batch error handler panicked while handling batch '{batch_id}'")]
    HandlerPanicked { batch_id: String },

    #[error("No consistent snapshot timestamp in the first response from forest '{forest}'")]
    MissingTimestamp { forest: String },

    #[error("Worker failed: {0}")]
    WorkerFailed(String),

    #[error("Consumer job failed to start: {0}")]
    Consumer(String),
}
