use model::core::{identifiers::Timestamp, operation::Operation};
use serde::{Serialize, Serializer, ser::SerializeMap};
use std::time::Duration;
use uuid::Uuid;

/// Running totals handed to batch callbacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub succeeded: u64,
    pub failed: u64,
    pub time_elapsed: Duration,
}

/// Final report of a bulk job, produced once after the output stream ends.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSummary {
    pub job_id: Uuid,
    pub operation: Operation,
    pub succeeded: u64,
    pub failed: u64,
    pub time_elapsed: Duration,
    pub error: Option<String>,
    pub consistent_snapshot_timestamp: Option<Timestamp>,
}

impl CompletionSummary {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn progress(&self) -> Progress {
        Progress {
            succeeded: self.succeeded,
            failed: self.failed,
            time_elapsed: self.time_elapsed,
        }
    }
}

impl Serialize for CompletionSummary {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(self.operation.success_key(), &self.succeeded)?;
        map.serialize_entry(self.operation.failure_key(), &self.failed)?;
        map.serialize_entry("timeElapsed", &(self.time_elapsed.as_millis() as u64))?;
        if let Some(error) = &self.error {
            map.serialize_entry("error", error)?;
        }
        if let Some(ts) = &self.consistent_snapshot_timestamp {
            map.serialize_entry("consistentSnapshotTimestamp", ts)?;
        }
        map.end()
    }
}
