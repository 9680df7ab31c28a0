use serde::{Deserialize, Serialize};

/// A partition of the document store; the unit of parallelism for bulk jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub host: String,
}

impl Forest {
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            host: host.into(),
        }
    }
}

/// What the worker count is a multiple of.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionUnit {
    #[default]
    Forests,
    Hosts,
}

/// The forests backing a job, discovered once at start and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSet {
    forests: Vec<Forest>,
    hosts: Vec<String>,
}

impl PartitionSet {
    /// Returns `None` for an empty forest list; a job cannot run without partitions.
    pub fn new(forests: Vec<Forest>) -> Option<Self> {
        if forests.is_empty() {
            return None;
        }

        let mut hosts: Vec<String> = Vec::new();
        for forest in &forests {
            if !hosts.contains(&forest.host) {
                hosts.push(forest.host.clone());
            }
        }

        Some(Self { forests, hosts })
    }

    pub fn forests(&self) -> &[Forest] {
        &self.forests
    }

    /// Distinct hosts in first-seen order.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn cardinality(&self, unit: PartitionUnit) -> usize {
        match unit {
            PartitionUnit::Forests => self.forests.len(),
            PartitionUnit::Hosts => self.hosts.len(),
        }
    }

    /// Forest a worker stays bound to for its lifetime.
    pub fn forest_for(&self, worker: usize) -> &Forest {
        &self.forests[worker % self.forests.len()]
    }
}
