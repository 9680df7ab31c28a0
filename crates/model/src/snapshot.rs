use crate::core::identifiers::Timestamp;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Point-in-time mode requested for a job.
///
/// Deserializes from the option's legacy shapes: `false`/absent, `true`, or a
/// timestamp given as a string or number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConsistentSnapshot {
    /// Every request sees the latest state.
    #[default]
    Off,
    /// Learn the timestamp from the first response and pin every later request to it.
    Latest,
    /// Pin every request to a caller-supplied timestamp.
    At(Timestamp),
}

impl ConsistentSnapshot {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, ConsistentSnapshot::Off)
    }

    pub fn fixed(&self) -> Option<&Timestamp> {
        match self {
            ConsistentSnapshot::At(ts) => Some(ts),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for ConsistentSnapshot {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Number(u64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => ConsistentSnapshot::Latest,
            Raw::Flag(false) => ConsistentSnapshot::Off,
            Raw::Number(ts) => ConsistentSnapshot::At(Timestamp::from(ts)),
            Raw::Text(ts) => ConsistentSnapshot::At(Timestamp::new(ts)),
        })
    }
}

impl Serialize for ConsistentSnapshot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ConsistentSnapshot::Off => serializer.serialize_bool(false),
            ConsistentSnapshot::Latest => serializer.serialize_bool(true),
            ConsistentSnapshot::At(ts) => serializer.serialize_str(ts.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_shapes_deserialize() {
        let on: ConsistentSnapshot = serde_json::from_str("true").unwrap();
        let off: ConsistentSnapshot = serde_json::from_str("false").unwrap();
        let at_num: ConsistentSnapshot = serde_json::from_str("1234").unwrap();
        let at_str: ConsistentSnapshot = serde_json::from_str("\"5678\"").unwrap();

        assert_eq!(on, ConsistentSnapshot::Latest);
        assert_eq!(off, ConsistentSnapshot::Off);
        assert_eq!(at_num, ConsistentSnapshot::At(Timestamp::from("1234")));
        assert_eq!(at_str.fixed().map(|t| t.as_str()), Some("5678"));
        assert!(!off.is_enabled());
    }
}
