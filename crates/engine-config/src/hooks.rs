use crate::report::summary::{CompletionSummary, Progress};
use engine_core::{error::ExecutorError, retry::Disposition};
use model::core::identifiers::Timestamp;
use std::{fmt, sync::Arc};

pub type BatchSuccessHook = Arc<dyn Fn(&Progress) + Send + Sync>;

/// Decides what happens to a failed batch: `(progress, failed items, error)`.
pub type BatchErrorHook<T> =
    Arc<dyn Fn(&Progress, &[T], &ExecutorError) -> Disposition<T> + Send + Sync>;

pub type CompletionHook = Arc<dyn Fn(&CompletionSummary) + Send + Sync>;

pub type InitialTimestampHook = Arc<dyn Fn(&Timestamp) + Send + Sync>;

/// Caller callbacks for a job over items of type `T`.
pub struct JobHooks<T> {
    pub on_batch_success: Option<BatchSuccessHook>,
    pub on_batch_error: Option<BatchErrorHook<T>>,
    pub on_completion: Option<CompletionHook>,
    pub on_initial_timestamp: Option<InitialTimestampHook>,
}

impl<T> JobHooks<T> {
    /// Hooks that do not depend on the item type, carried into a job over
    /// another item type.
    pub fn untyped<U>(&self) -> JobHooks<U> {
        JobHooks {
            on_batch_success: self.on_batch_success.clone(),
            on_batch_error: None,
            on_completion: self.on_completion.clone(),
            on_initial_timestamp: self.on_initial_timestamp.clone(),
        }
    }
}

impl<T> Default for JobHooks<T> {
    fn default() -> Self {
        Self {
            on_batch_success: None,
            on_batch_error: None,
            on_completion: None,
            on_initial_timestamp: None,
        }
    }
}

impl<T> Clone for JobHooks<T> {
    fn clone(&self) -> Self {
        Self {
            on_batch_success: self.on_batch_success.clone(),
            on_batch_error: self.on_batch_error.clone(),
            on_completion: self.on_completion.clone(),
            on_initial_timestamp: self.on_initial_timestamp.clone(),
        }
    }
}

impl<T> fmt::Debug for JobHooks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHooks")
            .field("on_batch_success", &self.on_batch_success.is_some())
            .field("on_batch_error", &self.on_batch_error.is_some())
            .field("on_completion", &self.on_completion.is_some())
            .field("on_initial_timestamp", &self.on_initial_timestamp.is_some())
            .finish()
    }
}
