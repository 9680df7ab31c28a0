use crate::{
    error::BatchError,
    job::JobState,
    resolver::{DispositionResolver, Resolution},
    tracker::OutputSender,
    worker::make_batch_id,
};
use engine_config::hooks::BatchSuccessHook;
use engine_core::{
    error::JobError,
    executor::{Request, RequestBody, RequestExecutor},
    retry::RetryPolicy,
};
use model::partition::Forest;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const URIS_PATH: &str = "/v1/internal/uris";

/// Splits a newline-delimited URI page.
///
/// The entry after the final newline is a delimiter artifact and is dropped.
pub fn parse_uri_list(text: &str) -> Vec<String> {
    let mut entries: Vec<&str> = text.split('\n').collect();
    entries.pop();
    entries
        .into_iter()
        .map(|uri| uri.trim_end_matches('\r'))
        .filter(|uri| !uri.is_empty())
        .map(str::to_string)
        .collect()
}

/// Everything a query worker shares with the other workers of its job.
#[derive(Clone)]
pub struct QueryContext {
    pub state: Arc<JobState>,
    pub executor: Arc<dyn RequestExecutor>,
    pub query: Arc<Value>,
    pub page_length: usize,
    pub retry_policy: RetryPolicy,
    /// Failed items handed to the error callback are the page's `after` cursor.
    pub resolver: Arc<DispositionResolver<String>>,
    pub output: OutputSender<Vec<String>>,
    pub on_batch_success: Option<BatchSuccessHook>,
}

/// Pages through the URIs a query matches in one forest.
pub struct QueryWorker {
    index: usize,
    forest: Forest,
    ctx: QueryContext,
    after: Option<String>,
    sequence: u64,
}

impl QueryWorker {
    pub fn new(index: usize, forest: Forest, ctx: QueryContext) -> Self {
        Self {
            index,
            forest,
            ctx,
            after: None,
            sequence: 0,
        }
    }

    pub async fn run(mut self) {
        let state = self.ctx.state.clone();
        debug!(worker = self.index, forest = %self.forest.name, "Query worker running");

        loop {
            if state.is_failed() {
                break;
            }

            let Some(uris) = self.next_page().await else {
                break;
            };
            self.sequence += 1;

            let count = uris.len();
            let short = count < self.ctx.page_length;
            if let Some(last) = uris.last() {
                self.after = Some(last.clone());
            }

            state.record_success(count as u64);
            state.record_batch();
            debug!(
                forest = %self.forest.name,
                uris = count,
                after = self.after.as_deref().unwrap_or(""),
                "Received URI page"
            );

            if count > 0 && self.ctx.output.send(Ok(uris)).await.is_err() {
                warn!(worker = self.index, "Output stream closed; stopping query worker");
                break;
            }

            if let Some(hook) = &self.ctx.on_batch_success {
                hook(&state.progress());
            }

            if short {
                info!(forest = %self.forest.name, pages = self.sequence, "Forest exhausted");
                break;
            }
        }
    }

    /// Fetches the page after the current cursor, resolving failures.
    /// `None` ends this forest.
    async fn next_page(&mut self) -> Option<Vec<String>> {
        let state = self.ctx.state.clone();
        let batch_id = make_batch_id(&state.id(), self.index, self.sequence);
        let mut budget = self.ctx.retry_policy.budget();
        let mut attempt = 0;

        loop {
            if state.is_failed() {
                return None;
            }

            let error = match self.fetch().await {
                Ok(uris) => return Some(uris),
                Err(BatchError::Fatal(err)) => {
                    self.abort(err).await;
                    return None;
                }
                Err(BatchError::Request(error)) => error,
            };

            warn!(
                batch_id = %batch_id,
                forest = %self.forest.name,
                attempt,
                error = %error,
                "URI page request failed"
            );

            let cursor = vec![self.after.clone().unwrap_or_default()];
            let progress = state.progress();
            match self
                .ctx
                .resolver
                .resolve(&batch_id, &progress, cursor, &error, &mut budget)
            {
                Resolution::Retry(cursor) => {
                    state.record_retry();
                    self.ctx.retry_policy.wait(attempt).await;
                    attempt += 1;
                    self.after = cursor.into_iter().last().filter(|c| !c.is_empty());
                }
                Resolution::Skip => {
                    info!(forest = %self.forest.name, "Skipping rest of forest after failed page");
                    return None;
                }
                Resolution::Abort(err) => {
                    self.abort(err).await;
                    return None;
                }
            }
        }
    }

    fn page_request(&self) -> Request {
        let mut request = Request::post(URIS_PATH)
            .param("filtered", "false")
            .param("start", "1")
            .param("pageLength", self.ctx.page_length.to_string())
            .param("forest-name", self.forest.name.as_str());

        if let Some(after) = &self.after {
            request = request.param("after", after.as_str());
        }
        if let Some(ts) = self.ctx.state.snapshot().timestamp() {
            request = request.param("timestamp", ts.as_str());
        }

        request
            .host(self.forest.host.as_str())
            .body(RequestBody::Json(self.ctx.query.as_ref().clone()))
    }

    async fn fetch(&self) -> Result<Vec<String>, BatchError> {
        let response = self.ctx.executor.dispatch(self.page_request()).await?;
        self.ctx
            .state
            .snapshot()
            .observe(&response, &self.forest.name)?;

        Ok(parse_uri_list(&response.into_text()?))
    }

    async fn abort(&self, err: JobError) {
        if self.ctx.state.fail(err.clone()) {
            let _ = self.ctx.output.send(Err(err)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_entry_is_dropped() {
        assert_eq!(parse_uri_list("/a\n/b\n"), vec!["/a", "/b"]);
        assert_eq!(parse_uri_list("/a\n/b"), vec!["/a"]);
        assert_eq!(parse_uri_list("/a\r\n/b\r\n"), vec!["/a", "/b"]);
        assert!(parse_uri_list("").is_empty());
        assert!(parse_uri_list("\n").is_empty());
    }
}
