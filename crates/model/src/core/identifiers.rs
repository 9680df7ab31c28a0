use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// Server-issued point-in-time marker used for consistent snapshot reads.
///
/// The database reports it as a decimal string; it is kept opaque here.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(Arc<str>);

impl Timestamp {
    pub fn new(ts: impl Into<String>) -> Self {
        Self(Arc::from(ts.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Timestamp {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Timestamp {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<u64> for Timestamp {
    fn from(ts: u64) -> Self {
        Self::new(ts.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(Arc<str>);

impl BatchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BatchId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_serializes_as_plain_string() {
        let ts = Timestamp::from(16849712345u64);
        assert_eq!(ts.as_str(), "16849712345");
        assert_eq!(serde_json::to_string(&ts).unwrap(), "\"16849712345\"");
    }
}
