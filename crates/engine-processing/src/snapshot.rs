use engine_config::hooks::InitialTimestampHook;
use engine_core::{error::JobError, executor::Response};
use model::{core::identifiers::Timestamp, snapshot::ConsistentSnapshot};
use std::sync::OnceLock;
use tokio::sync::watch;
use tracing::{info, warn};

/// Shares one point-in-time timestamp across every request of a job.
///
/// The timestamp goes from pending to resolved once and never changes after.
pub struct SnapshotCoordinator {
    mode: ConsistentSnapshot,
    resolved: OnceLock<Timestamp>,
    hook: Option<InitialTimestampHook>,
    ready: watch::Sender<bool>,
}

impl SnapshotCoordinator {
    pub fn new(mode: ConsistentSnapshot, hook: Option<InitialTimestampHook>) -> Self {
        let resolved = OnceLock::new();
        if let ConsistentSnapshot::At(ts) = &mode {
            let _ = resolved.set(ts.clone());
        }
        let pending = matches!(mode, ConsistentSnapshot::Latest);
        let (ready, _) = watch::channel(!pending);

        Self {
            mode,
            resolved,
            hook,
            ready,
        }
    }

    pub fn disabled() -> Self {
        Self::new(ConsistentSnapshot::Off, None)
    }

    pub fn mode(&self) -> &ConsistentSnapshot {
        &self.mode
    }

    /// Whether only the first worker may run until the timestamp is learned.
    pub fn requires_staggering(&self) -> bool {
        matches!(self.mode, ConsistentSnapshot::Latest)
    }

    /// Timestamp every request should carry, if any.
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.resolved.get().cloned()
    }

    pub fn is_pending(&self) -> bool {
        self.requires_staggering() && self.resolved.get().is_none()
    }

    /// Learns the timestamp from a response while it is still pending.
    ///
    /// A pending snapshot whose first response carries no timestamp cannot be
    /// honored and ends the job.
    pub fn observe(&self, response: &Response, forest: &str) -> Result<(), JobError> {
        if !self.is_pending() {
            return Ok(());
        }

        match response.effective_timestamp() {
            Some(ts) => {
                self.resolve(ts);
                Ok(())
            }
            None => {
                warn!(forest, "First response carried no effective timestamp");
                Err(JobError::MissingTimestamp {
                    forest: forest.to_string(),
                })
            }
        }
    }

    fn resolve(&self, ts: Timestamp) {
        if self.resolved.set(ts.clone()).is_err() {
            return;
        }

        info!(timestamp = %ts, "Resolved consistent snapshot timestamp");
        if let Some(hook) = &self.hook {
            hook(&ts);
        }
        self.ready.send_replace(true);
    }

    /// Waits until no request needs to hold back for the timestamp.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use std::time::Duration;

    #[tokio::test]
    async fn latest_resolves_once_from_first_response() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let coordinator = Arc::new(SnapshotCoordinator::new(
            ConsistentSnapshot::Latest,
            Some(Arc::new(move |ts: &Timestamp| {
                assert_eq!(ts.as_str(), "100");
                seen.fetch_add(1, Ordering::SeqCst);
            })),
        ));
        assert!(coordinator.is_pending());

        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.wait_ready().await })
        };

        let first = Response::empty().with_header("ML-Effective-Timestamp", "100");
        coordinator.observe(&first, "f1").unwrap();
        let later = Response::empty().with_header("ML-Effective-Timestamp", "200");
        coordinator.observe(&later, "f2").unwrap();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(coordinator.timestamp(), Some(Timestamp::from("100")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_timestamp_while_pending_is_fatal() {
        let coordinator = SnapshotCoordinator::new(ConsistentSnapshot::Latest, None);
        let err = coordinator.observe(&Response::empty(), "f1").unwrap_err();
        assert_eq!(
            err,
            JobError::MissingTimestamp {
                forest: "f1".into()
            }
        );
    }

    #[tokio::test]
    async fn fixed_timestamp_needs_no_coordination() {
        let coordinator =
            SnapshotCoordinator::new(ConsistentSnapshot::At(Timestamp::from("42")), None);
        assert!(!coordinator.requires_staggering());
        assert!(!coordinator.is_pending());
        coordinator.wait_ready().await;

        coordinator.observe(&Response::empty(), "f1").unwrap();
        assert_eq!(coordinator.timestamp(), Some(Timestamp::from("42")));
    }

    #[test]
    fn disabled_ignores_response_timestamps() {
        let coordinator = SnapshotCoordinator::disabled();
        let resp = Response::empty().with_header("ML-Effective-Timestamp", "7");
        coordinator.observe(&resp, "f1").unwrap();
        assert_eq!(coordinator.timestamp(), None);
    }
}
