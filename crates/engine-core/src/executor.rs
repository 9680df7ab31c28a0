use crate::error::ExecutorError;
use async_trait::async_trait;
use model::{core::identifiers::Timestamp, records::document::Document};
use serde_json::Value;
use std::{collections::HashMap, fmt};

/// Response header carrying the server's point-in-time timestamp.
pub const EFFECTIVE_TIMESTAMP_HEADER: &str = "ML-Effective-Timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    /// Newline-joined URIs sent as `text/uri-list`.
    UriList(Vec<String>),
    /// Documents sent as `multipart/mixed`; the part rendering is up to the executor.
    Documents(Vec<Document>),
}

impl RequestBody {
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            RequestBody::Empty => None,
            RequestBody::Json(_) => Some("application/json"),
            RequestBody::UriList(_) => Some("text/uri-list"),
            RequestBody::Documents(_) => Some("multipart/mixed"),
        }
    }
}

/// A transport-neutral request the engine hands to the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    /// Preferred host for forest-affine dispatch.
    pub host: Option<String>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            host: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Appends a query parameter; repeated names are kept in order.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        if let Some(content_type) = body.content_type() {
            self.headers
                .retain(|(name, _)| !name.eq_ignore_ascii_case("content-type"));
            self.headers
                .push(("Content-Type".to_string(), content_type.to_string()));
        }
        self.body = body;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// First value of a query parameter.
    pub fn param_value(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a repeated query parameter.
    pub fn param_values(&self, name: &str) -> Vec<&str> {
        self.params
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseBody {
    #[default]
    Empty,
    Json(Value),
    Text(String),
    Documents(Vec<Document>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    headers: HashMap<String, String>,
    pub body: ResponseBody,
}

impl Response {
    pub fn new(body: ResponseBody) -> Self {
        Self {
            headers: HashMap::new(),
            body,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn json(value: Value) -> Self {
        Self::new(ResponseBody::Json(value))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(ResponseBody::Text(text.into()))
    }

    pub fn documents(documents: Vec<Document>) -> Self {
        Self::new(ResponseBody::Documents(documents))
    }

    /// Header names are matched case-insensitively.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_effective_timestamp(self, ts: &Timestamp) -> Self {
        self.with_header(EFFECTIVE_TIMESTAMP_HEADER, ts.as_str())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn effective_timestamp(&self) -> Option<Timestamp> {
        self.header(EFFECTIVE_TIMESTAMP_HEADER)
            .filter(|ts| !ts.trim().is_empty())
            .map(|ts| Timestamp::new(ts.trim()))
    }

    pub fn into_text(self) -> Result<String, ExecutorError> {
        match self.body {
            ResponseBody::Text(text) => Ok(text),
            ResponseBody::Empty => Ok(String::new()),
            other => Err(ExecutorError::Decode(format!(
                "expected a text body, got {}",
                body_kind(&other)
            ))),
        }
    }

    pub fn into_json(self) -> Result<Value, ExecutorError> {
        match self.body {
            ResponseBody::Json(value) => Ok(value),
            ResponseBody::Text(text) => serde_json::from_str(&text)
                .map_err(|e| ExecutorError::Decode(format!("invalid JSON body: {e}"))),
            other => Err(ExecutorError::Decode(format!(
                "expected a JSON body, got {}",
                body_kind(&other)
            ))),
        }
    }

    pub fn into_documents(self) -> Result<Vec<Document>, ExecutorError> {
        match self.body {
            ResponseBody::Documents(documents) => Ok(documents),
            ResponseBody::Empty => Ok(Vec::new()),
            other => Err(ExecutorError::Decode(format!(
                "expected a document body, got {}",
                body_kind(&other)
            ))),
        }
    }
}

fn body_kind(body: &ResponseBody) -> &'static str {
    match body {
        ResponseBody::Empty => "an empty body",
        ResponseBody::Json(_) => "JSON",
        ResponseBody::Text(_) => "text",
        ResponseBody::Documents(_) => "documents",
    }
}

/// Sends requests to the database on behalf of the engine.
///
/// Implemented by the application's transport layer; it owns connection
/// handling, authentication and the wire encoding of bodies.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn dispatch(&self, request: Request) -> Result<Response, ExecutorError>;
}
