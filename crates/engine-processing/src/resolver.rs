use engine_config::{hooks::BatchErrorHook, report::summary::Progress};
use engine_core::{
    error::{ExecutorError, JobError},
    retry::{Disposition, RetryBudget},
};
use model::core::identifiers::BatchId;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, warn};

/// What a worker does next with a failed batch.
#[derive(Debug, PartialEq)]
pub enum Resolution<T> {
    Retry(Vec<T>),
    Skip,
    Abort(JobError),
}

/// Turns a batch failure into a resolution, consulting the caller's error
/// callback when one is configured and enforcing the batch's retry budget.
pub struct DispositionResolver<T> {
    hook: Option<BatchErrorHook<T>>,
}

impl<T> DispositionResolver<T> {
    pub fn new(hook: Option<BatchErrorHook<T>>) -> Self {
        Self { hook }
    }

    pub fn resolve(
        &self,
        batch_id: &BatchId,
        progress: &Progress,
        items: Vec<T>,
        error: &ExecutorError,
        budget: &mut RetryBudget,
    ) -> Resolution<T> {
        let disposition = match &self.hook {
            None => Disposition::Retry(items),
            Some(hook) => match catch_unwind(AssertUnwindSafe(|| hook(progress, &items, error))) {
                Ok(disposition) => disposition,
                Err(_) => {
                    warn!(batch_id = %batch_id, "Batch error callback panicked");
                    return Resolution::Abort(JobError::HandlerPanicked {
                        batch_id: batch_id.to_string(),
                    });
                }
            },
        };

        match disposition {
            Disposition::Abort(reason) => Resolution::Abort(JobError::Aborted {
                batch_id: batch_id.to_string(),
                reason,
            }),
            // A batch that used up its retries ends the job even when skipped.
            Disposition::Skip if budget.is_exhausted() => exhausted(batch_id, budget, error),
            Disposition::Retry(items) if items.is_empty() && budget.is_exhausted() => {
                exhausted(batch_id, budget, error)
            }
            Disposition::Skip => Resolution::Skip,
            Disposition::Retry(items) if items.is_empty() => Resolution::Skip,
            Disposition::Retry(items) => {
                if budget.consume() {
                    debug!(
                        batch_id = %batch_id,
                        items = items.len(),
                        retries_left = budget.remaining(),
                        "Retrying batch"
                    );
                    Resolution::Retry(items)
                } else {
                    exhausted(batch_id, budget, error)
                }
            }
        }
    }
}

fn exhausted<T>(
    batch_id: &BatchId,
    budget: &RetryBudget,
    error: &ExecutorError,
) -> Resolution<T> {
    warn!(batch_id = %batch_id, attempts = budget.used() + 1, "Retry count exceeded");
    Resolution::Abort(JobError::RetriesExhausted {
        batch_id: batch_id.to_string(),
        attempts: budget.used() + 1,
        last_error: error.clone(),
    })
}
