use engine_core::error::JobError;
use engine_processing::{job::JobState, tracker::OutputSender};
use std::{future::Future, sync::Arc};
use tokio::task::{JoinError, JoinSet};
use tracing::{Instrument, debug, info, info_span};

/// Runs a job's workers to completion.
///
/// With a pending snapshot only worker 0 starts; the rest are spawned once
/// its first response has resolved the timestamp. If it exits first, the rest
/// are never spawned unless the pool hands the first dispatch on.
pub struct WorkerPool {
    state: Arc<JobState>,
    worker_count: usize,
    hand_off: bool,
}

impl WorkerPool {
    pub fn new(state: Arc<JobState>, worker_count: usize) -> Self {
        Self {
            state,
            worker_count,
            hand_off: false,
        }
    }

    /// Starts the next unstarted worker when the one making the first
    /// dispatch ends cleanly before the snapshot resolves. Only for workers
    /// that own disjoint work, such as one query worker per forest.
    pub fn hand_off_first_dispatch(mut self) -> Self {
        self.hand_off = true;
        self
    }

    pub async fn run<O, F, Fut>(self, errors: OutputSender<O>, mut make_worker: F)
    where
        O: Send + 'static,
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut workers = JoinSet::new();
        let snapshot = self.state.snapshot();
        let mut next = if snapshot.requires_staggering() {
            self.worker_count.min(1)
        } else {
            self.worker_count
        };

        for index in 0..next {
            self.spawn(&mut workers, index, make_worker(index));
        }

        if next < self.worker_count {
            while snapshot.is_pending() && !self.state.is_failed() {
                if workers.is_empty() {
                    if !self.hand_off || next == self.worker_count || errors.is_closed() {
                        break;
                    }
                    debug!(
                        job_id = %self.state.id(),
                        worker = next,
                        "Snapshot still pending; handing first dispatch to next worker"
                    );
                    self.spawn(&mut workers, next, make_worker(next));
                    next += 1;
                    continue;
                }

                tokio::select! {
                    _ = snapshot.wait_ready() => {}
                    _ = self.state.cancelled() => {}
                    Some(joined) = workers.join_next() => self.on_joined(joined, &errors).await,
                }
            }

            if snapshot.is_pending() || self.state.is_failed() {
                info!(
                    job_id = %self.state.id(),
                    skipped = self.worker_count - next,
                    "Not starting remaining workers"
                );
            } else {
                debug!(job_id = %self.state.id(), "Snapshot resolved; starting remaining workers");
                for index in next..self.worker_count {
                    self.spawn(&mut workers, index, make_worker(index));
                }
            }
        }

        while let Some(joined) = workers.join_next().await {
            self.on_joined(joined, &errors).await;
        }
    }

    fn spawn<Fut>(&self, workers: &mut JoinSet<()>, index: usize, worker: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let guard = self.state.enter_worker(index);
        let span = info_span!(
            "worker",
            job_id = %self.state.id(),
            operation = %self.state.operation(),
            worker = index
        );

        workers.spawn(
            async move {
                let _guard = guard;
                worker.await;
            }
            .instrument(span),
        );
    }

    async fn on_joined<O>(&self, joined: Result<(), JoinError>, errors: &OutputSender<O>) {
        let Err(err) = joined else {
            return;
        };

        let failure = JobError::WorkerFailed(err.to_string());
        if self.state.fail(failure.clone()) {
            let _ = errors.send(Err(failure)).await;
        }
    }
}
