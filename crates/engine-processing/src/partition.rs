use crate::error::DiscoveryError;
use engine_core::executor::{Request, RequestExecutor};
use model::partition::{Forest, PartitionSet};
use std::sync::Arc;
use tracing::{debug, info};

pub const FOREST_INFO_PATH: &str = "/v1/internal/forestinfo";

/// Resolves the forests backing a job with a single request at job start.
pub struct PartitionDirectory {
    executor: Arc<dyn RequestExecutor>,
}

impl PartitionDirectory {
    pub fn new(executor: Arc<dyn RequestExecutor>) -> Self {
        Self { executor }
    }

    pub async fn discover(&self) -> Result<PartitionSet, DiscoveryError> {
        let response = self.executor.dispatch(Request::get(FOREST_INFO_PATH)).await?;
        let body = response
            .into_json()
            .map_err(|e| DiscoveryError::Malformed(e.to_string()))?;
        let forests: Vec<Forest> =
            serde_json::from_value(body).map_err(|e| DiscoveryError::Malformed(e.to_string()))?;

        for forest in &forests {
            debug!(forest = %forest.name, host = %forest.host, "Found forest");
        }

        let partitions = PartitionSet::new(forests).ok_or(DiscoveryError::NoForests)?;
        info!(
            forests = partitions.forests().len(),
            hosts = partitions.hosts().len(),
            "Discovered partitions"
        );

        Ok(partitions)
    }
}
