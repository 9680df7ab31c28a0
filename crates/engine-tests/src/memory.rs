use async_trait::async_trait;
use engine_core::{
    error::ExecutorError,
    executor::{EFFECTIVE_TIMESTAMP_HEADER, Method, Request, RequestBody, RequestExecutor, Response},
};
use engine_processing::{
    ops::{DOCUMENTS_PATH, transform::APPLY_TRANSFORM_PATH},
    partition::FOREST_INFO_PATH,
    query::URIS_PATH,
};
use model::{
    partition::Forest,
    records::document::{Content, Document},
};
use serde_json::{Value, json};
use std::{
    collections::BTreeMap,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
};
use tracing::debug;

/// One version of a stored document.
#[derive(Debug, Clone)]
struct Version {
    forest: String,
    document: Document,
    written: u64,
    removed: Option<u64>,
}

#[derive(Debug, Default)]
struct Store {
    clock: u64,
    documents: BTreeMap<String, Vec<Version>>,
}

impl Store {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn visible(&self, uri: &str, at: u64) -> Option<&Version> {
        self.documents
            .get(uri)?
            .iter()
            .rev()
            .find(|v| v.written <= at)
            .filter(|v| v.removed.is_none_or(|removed| removed > at))
    }

    fn put(&mut self, forest: &str, document: Document, at: u64) {
        self.documents.entry(document.uri.clone()).or_default().push(Version {
            forest: forest.to_string(),
            document,
            written: at,
            removed: None,
        });
    }

    fn remove(&mut self, uri: &str, at: u64) {
        if let Some(latest) = self.documents.get_mut(uri).and_then(|v| v.last_mut()) {
            latest.removed.get_or_insert(at);
        }
    }
}

/// In-memory document database speaking the engine's request protocol.
///
/// Every write advances a logical clock and keeps the previous versions, so
/// requests pinned to a timestamp see the database as it was at that point.
pub struct MemoryDatabase {
    forests: Vec<Forest>,
    store: Mutex<Store>,
    failing_writes: AtomicUsize,
    requests: AtomicUsize,
}

impl MemoryDatabase {
    pub fn new(forests: Vec<Forest>) -> Self {
        Self {
            forests,
            store: Mutex::new(Store::default()),
            failing_writes: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
        }
    }

    /// Fails the next `count` document writes with a 503.
    pub fn fail_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Loads documents round-robin across the forests.
    pub fn seed(&self, documents: Vec<Document>) {
        let mut store = self.lock();
        let at = store.tick();
        for (i, document) in documents.into_iter().enumerate() {
            let forest = &self.forests[i % self.forests.len()].name;
            store.put(forest, document, at);
        }
    }

    pub fn get(&self, uri: &str) -> Option<Document> {
        let store = self.lock();
        store.visible(uri, store.clock).map(|v| v.document.clone())
    }

    /// Number of live documents.
    pub fn len(&self) -> usize {
        let store = self.lock();
        store
            .documents
            .keys()
            .filter(|uri| store.visible(uri, store.clock).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live documents per forest.
    pub fn forest_counts(&self) -> BTreeMap<String, usize> {
        let store = self.lock();
        let mut counts = BTreeMap::new();
        for uri in store.documents.keys() {
            if let Some(version) = store.visible(uri, store.clock) {
                *counts.entry(version.forest.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Requests served, forest discovery excluded.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn handle(&self, request: &Request) -> Result<(Response, u64), ExecutorError> {
        match (&request.method, request.path.as_str(), &request.body) {
            (Method::Get, FOREST_INFO_PATH, _) => {
                Ok((Response::json(json!(self.forests)), self.lock().clock))
            }
            (Method::Post, DOCUMENTS_PATH, RequestBody::Documents(documents)) => {
                self.write(request, documents)
            }
            (Method::Post, DOCUMENTS_PATH, RequestBody::UriList(uris)) => self.read(request, uris),
            (Method::Post, URIS_PATH, RequestBody::Json(query)) => self.page(request, query),
            (Method::Post, APPLY_TRANSFORM_PATH, RequestBody::UriList(uris)) => {
                self.apply_transform(request, uris)
            }
            (Method::Delete, DOCUMENTS_PATH, _) => {
                let mut store = self.lock();
                let at = store.tick();
                for uri in request.param_values("uri") {
                    store.remove(uri, at);
                }
                Ok((Response::empty(), at))
            }
            _ => Err(ExecutorError::Status {
                status: 404,
                message: format!("No endpoint for {:?} {}", request.method, request.path),
            }),
        }
    }

    fn write(
        &self,
        request: &Request,
        documents: &[Document],
    ) -> Result<(Response, u64), ExecutorError> {
        let failing = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(ExecutorError::Status {
                status: 503,
                message: "Server busy".to_string(),
            });
        }

        let forest = required_param(request, "forest-name")?;
        let documents = documents
            .iter()
            .map(|doc| transformed(request, doc.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut store = self.lock();
        let at = store.tick();
        for document in documents {
            store.put(forest, document, at);
        }
        Ok((Response::empty(), at))
    }

    fn read(&self, request: &Request, uris: &[String]) -> Result<(Response, u64), ExecutorError> {
        let categories = request.param_values("category");
        let wants_content = categories.is_empty() || categories.contains(&"content");
        let wants_metadata = categories.iter().any(|c| *c != "content");

        let store = self.lock();
        let at = pinned(request)?.unwrap_or(store.clock);
        let mut found = Vec::new();
        for uri in uris {
            let Some(version) = store.visible(uri, at) else {
                continue;
            };
            let mut document = transformed(request, version.document.clone())?;
            if !wants_content {
                document.content = None;
            }
            if !wants_metadata {
                document.metadata = None;
            }
            found.push(document);
        }

        Ok((Response::documents(found), at))
    }

    fn page(&self, request: &Request, query: &Value) -> Result<(Response, u64), ExecutorError> {
        let forest = required_param(request, "forest-name")?;
        let page_length: usize = required_param(request, "pageLength")?
            .parse()
            .map_err(|_| bad_request("pageLength must be a number"))?;
        let after = request.param_value("after");
        let collection = query["collection"].as_str();

        let store = self.lock();
        let at = pinned(request)?.unwrap_or(store.clock);
        let page: String = store
            .documents
            .keys()
            .filter(|uri| after.is_none_or(|after| uri.as_str() > after))
            .filter_map(|uri| store.visible(uri, at).map(|v| (uri, v)))
            .filter(|(_, v)| v.forest == forest)
            .filter(|(_, v)| {
                collection.is_none_or(|c| {
                    v.document
                        .metadata
                        .as_ref()
                        .is_some_and(|m| m.collections.iter().any(|have| have == c))
                })
            })
            .take(page_length)
            .map(|(uri, _)| format!("{uri}\n"))
            .collect();

        Ok((Response::text(page), at))
    }

    fn apply_transform(
        &self,
        request: &Request,
        uris: &[String],
    ) -> Result<(Response, u64), ExecutorError> {
        let replace = match request.param_value("result") {
            Some("replace") => true,
            Some("ignore") => false,
            other => return Err(bad_request(&format!("Unknown result mode {other:?}"))),
        };

        let mut store = self.lock();
        let read_at = pinned(request)?.unwrap_or(store.clock);
        let mut updated = Vec::new();
        for uri in uris {
            if let Some(version) = store.visible(uri, read_at) {
                let document = transformed(request, version.document.clone())?;
                updated.push((version.forest.clone(), document));
            }
        }

        if !replace {
            return Ok((Response::empty(), store.clock));
        }
        let at = store.tick();
        for (forest, document) in updated {
            store.put(&forest, document, at);
        }
        Ok((Response::empty(), at))
    }
}

#[async_trait]
impl RequestExecutor for MemoryDatabase {
    async fn dispatch(&self, request: Request) -> Result<Response, ExecutorError> {
        if request.path != FOREST_INFO_PATH {
            self.requests.fetch_add(1, Ordering::SeqCst);
        }
        tokio::task::yield_now().await;

        let (response, at) = self.handle(&request)?;
        debug!(method = ?request.method, path = %request.path, at, "Served request");
        Ok(response.with_header(EFFECTIVE_TIMESTAMP_HEADER, at.to_string()))
    }
}

fn bad_request(message: &str) -> ExecutorError {
    ExecutorError::Status {
        status: 400,
        message: message.to_string(),
    }
}

fn required_param<'a>(request: &'a Request, name: &str) -> Result<&'a str, ExecutorError> {
    request
        .param_value(name)
        .ok_or_else(|| bad_request(&format!("Missing parameter {name}")))
}

fn pinned(request: &Request) -> Result<Option<u64>, ExecutorError> {
    request
        .param_value("timestamp")
        .map(|ts| ts.parse().map_err(|_| bad_request("Malformed timestamp")))
        .transpose()
}

/// Applies the request's transform, if any. Only `stamp` is installed: it
/// sets the `stampedBy` property of JSON content to its `by` parameter.
fn transformed(request: &Request, mut document: Document) -> Result<Document, ExecutorError> {
    match request.param_value("transform") {
        None => Ok(document),
        Some("stamp") => {
            let by = request.param_value("trans:by").unwrap_or("unknown");
            if let Some(Content::Json(Value::Object(fields))) = &mut document.content {
                fields.insert("stampedBy".to_string(), Value::String(by.to_string()));
            }
            Ok(document)
        }
        Some(other) => Err(bad_request(&format!("Transform {other} is not installed"))),
    }
}
