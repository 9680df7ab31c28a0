use model::{
    partition::PartitionUnit,
    records::document::{Category, DocumentMetadata},
    snapshot::ConsistentSnapshot,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::BTreeMap, fmt};

pub mod error;
pub mod validated;
pub mod validator;

/// Options accepted by every bulk operation, as supplied by the caller.
///
/// Unset fields fall back to per-operation defaults during validation; an
/// option an operation does not understand is rejected there.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct JobSettings {
    pub batch_size: Option<usize>,
    pub concurrent_requests: Option<ConcurrentRequests>,
    pub input_kind: Option<InputKind>,
    pub output_stream_type: Option<OutputStreamType>,
    pub categories: Option<Vec<Category>>,
    pub transform: Option<TransformSpec>,
    pub transform_strategy: Option<TransformStrategy>,
    pub consistent_snapshot: ConsistentSnapshot,
    pub default_metadata: Option<DocumentMetadata>,
    pub retry_delay_ms: Option<u64>,
}

/// How many workers to run: `multiplier` per forest or per host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConcurrentRequests {
    pub multiple_of: PartitionUnit,
    pub multiplier: usize,
}

impl Default for ConcurrentRequests {
    fn default() -> Self {
        Self {
            multiple_of: PartitionUnit::Forests,
            multiplier: 4,
        }
    }
}

/// Shape of the reads a job takes from its input stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputKind {
    /// One read is one item.
    #[default]
    #[serde(rename = "string")]
    Items,
    /// One read is a whole batch.
    #[serde(rename = "array")]
    Arrays,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Items => f.write_str("items"),
            InputKind::Arrays => f.write_str("arrays"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStreamType {
    /// Raw content bytes per document.
    Chunked,
    /// Whole documents including requested metadata.
    #[default]
    Object,
}

/// A server-side transform and its parameters.
///
/// Accepts a bare name, a `[name, {params}]` pair, or `{name, params}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformSpec {
    pub name: String,
    pub params: BTreeMap<String, String>,
}

impl TransformSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

impl<'de> Deserialize<'de> for TransformSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Name(String),
            Pair(String, BTreeMap<String, String>),
            Object {
                name: String,
                #[serde(default)]
                params: BTreeMap<String, String>,
            },
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Name(name) => TransformSpec::new(name),
            Raw::Pair(name, params) | Raw::Object { name, params } => {
                TransformSpec { name, params }
            }
        })
    }
}

/// What the server does with a transform's output during an in-place transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformStrategy {
    #[default]
    Replace,
    Ignore,
}

impl TransformStrategy {
    pub fn as_param(&self) -> &'static str {
        match self {
            TransformStrategy::Replace => "replace",
            TransformStrategy::Ignore => "ignore",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_deserialize_from_option_names() {
        let raw = r#"{
            "batchSize": 50,
            "concurrentRequests": {"multipleOf": "hosts", "multiplier": 2},
            "inputKind": "string",
            "outputStreamType": "chunked",
            "categories": ["content", "metadataValues"],
            "transform": ["enrich", {"flag": "on"}],
            "consistentSnapshot": true
        }"#;
        let settings: JobSettings = serde_json::from_str(raw).unwrap();

        assert_eq!(settings.batch_size, Some(50));
        assert_eq!(
            settings.concurrent_requests,
            Some(ConcurrentRequests {
                multiple_of: PartitionUnit::Hosts,
                multiplier: 2
            })
        );
        assert_eq!(settings.input_kind, Some(InputKind::Items));
        assert_eq!(settings.output_stream_type, Some(OutputStreamType::Chunked));
        assert_eq!(
            settings.categories,
            Some(vec![Category::Content, Category::MetadataValues])
        );
        assert_eq!(
            settings.transform,
            Some(TransformSpec::new("enrich").param("flag", "on"))
        );
        assert_eq!(settings.consistent_snapshot, ConsistentSnapshot::Latest);
    }

    #[test]
    fn concurrency_defaults_apply_per_field() {
        let parsed: ConcurrentRequests = serde_json::from_str(r#"{"multiplier": 1}"#).unwrap();
        assert_eq!(parsed.multiple_of, PartitionUnit::Forests);
        assert_eq!(parsed.multiplier, 1);
    }

    #[test]
    fn unknown_options_are_rejected() {
        let parsed = serde_json::from_str::<JobSettings>(r#"{"batchsize": 10}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn transform_accepts_bare_name() {
        let parsed: TransformSpec = serde_json::from_str(r#""redact""#).unwrap();
        assert_eq!(parsed, TransformSpec::new("redact"));
    }
}
