use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Body of a stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "value", rename_all = "lowercase")]
pub enum Content {
    Json(Value),
    Text(String),
    Binary(Vec<u8>),
}

impl Content {
    pub fn content_type(&self) -> &'static str {
        match self {
            Content::Json(_) => "application/json",
            Content::Text(_) => "text/plain",
            Content::Binary(_) => "application/octet-stream",
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Content::Json(value) => value.to_string().into_bytes(),
            Content::Text(text) => text.as_bytes().to_vec(),
            Content::Binary(bytes) => bytes.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Read,
    Update,
    Insert,
    Execute,
    NodeUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub role_name: String,
    pub capabilities: Vec<Capability>,
}

impl Permission {
    pub fn new(role_name: impl Into<String>, capabilities: &[Capability]) -> Self {
        Self {
            role_name: role_name.into(),
            capabilities: capabilities.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentMetadata {
    pub collections: Vec<String>,
    pub permissions: Vec<Permission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<i32>,
    pub metadata_values: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
}

impl DocumentMetadata {
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
            && self.permissions.is_empty()
            && self.quality.is_none()
            && self.metadata_values.is_empty()
            && self.properties.is_none()
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collections.push(collection.into());
        self
    }

    pub fn permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    pub fn quality(mut self, quality: i32) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn metadata_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata_values.insert(key.into(), value.into());
        self
    }
}

/// A document as written to or read from the database.
///
/// Read results may omit `content` or `metadata` depending on the requested
/// categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocumentMetadata>,
}

impl Document {
    pub fn new(uri: impl Into<String>, content: Content) -> Self {
        Self {
            uri: uri.into(),
            content: Some(content),
            metadata: None,
        }
    }

    pub fn json(uri: impl Into<String>, value: Value) -> Self {
        Self::new(uri, Content::Json(value))
    }

    pub fn text(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(uri, Content::Text(text.into()))
    }

    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn has_metadata(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| !m.is_empty())
    }
}

/// Parts of a document a bulk read should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Content,
    Collections,
    Permissions,
    Properties,
    Quality,
    MetadataValues,
    Metadata,
}

impl Category {
    pub fn as_param(&self) -> &'static str {
        match self {
            Category::Content => "content",
            Category::Collections => "collections",
            Category::Permissions => "permissions",
            Category::Properties => "properties",
            Category::Quality => "quality",
            Category::MetadataValues => "metadata-values",
            Category::Metadata => "metadata",
        }
    }
}

/// One item on a bulk read's output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadItem {
    /// Whole document, emitted in object mode.
    Document(Document),
    /// Raw content bytes, emitted in chunked mode.
    Chunk(Vec<u8>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_metadata_does_not_count() {
        let doc = Document::json("/a.json", json!({"k": 1}));
        assert!(!doc.has_metadata());

        let doc = doc.clone().with_metadata(DocumentMetadata::default());
        assert!(!doc.has_metadata());

        let doc = doc.with_metadata(DocumentMetadata::default().collection("c1"));
        assert!(doc.has_metadata());
    }

    #[test]
    fn json_content_renders_compact_bytes() {
        let content = Content::Json(json!({"a": [1, 2]}));
        assert_eq!(content.to_bytes(), br#"{"a":[1,2]}"#.to_vec());
        assert_eq!(content.content_type(), "application/json");
    }

    #[test]
    fn metadata_uses_camel_case_keys() {
        let meta = DocumentMetadata::default()
            .permission(Permission::new("rest-reader", &[Capability::Read]))
            .metadata_value("source", "bulk");
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["permissions"][0]["roleName"], "rest-reader");
        assert_eq!(value["permissions"][0]["capabilities"][0], "read");
        assert_eq!(value["metadataValues"]["source"], "bulk");
    }
}
