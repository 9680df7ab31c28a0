use serde::Serialize;
use std::fmt;

/// The bulk operations the engine knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Write,
    Read,
    QueryUris,
    Transform,
    Remove,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Write => "write",
            Operation::Read => "read",
            Operation::QueryUris => "query-uris",
            Operation::Transform => "transform",
            Operation::Remove => "remove",
        }
    }

    /// Key under which the completion summary reports successful items.
    pub fn success_key(&self) -> &'static str {
        match self {
            Operation::Write => "docsWrittenSuccessfully",
            Operation::Read => "docsReadSuccessfully",
            Operation::QueryUris => "urisReadSoFar",
            Operation::Transform => "docsTransformedSuccessfully",
            Operation::Remove => "docsRemovedSuccessfully",
        }
    }

    /// Key under which the completion summary reports failed items.
    pub fn failure_key(&self) -> &'static str {
        match self {
            Operation::Write => "docsFailedToBeWritten",
            Operation::Read => "docsFailedToBeRead",
            Operation::QueryUris => "urisFailedToBeRead",
            Operation::Transform => "docsFailedToBeTransformed",
            Operation::Remove => "docsFailedToBeRemoved",
        }
    }

    /// Whether the operation can run against a consistent snapshot.
    pub fn supports_snapshot(&self) -> bool {
        matches!(
            self,
            Operation::Read | Operation::QueryUris | Operation::Transform
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
