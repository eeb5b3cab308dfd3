//! Paged delta fetch
//!
//! Pages are walked strictly in order. Each link carries server-side session
//! state and the final delta link only shows up on the last page, so a chain
//! can never be split across workers.

use maz_cache::{Cache, DirectoryObject};
use maz_http::{ApiCaller, ApiRequest, HttpError, RetryConfig, RetryMiddleware};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};

/// Default number of entries between checkpoints
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 5000;

const DELTA_LINK: &str = "@odata.deltaLink";
const NEXT_LINK: &str = "@odata.nextLink";
const ARM_NEXT_LINK: &str = "nextLink";

/// Where in-progress results are parked
pub trait CheckpointSink: Send + Sync {
    fn save_checkpoint(&self, entries: &[DirectoryObject]) -> maz_cache::Result<()>;
}

impl CheckpointSink for Cache {
    fn save_checkpoint(&self, entries: &[DirectoryObject]) -> maz_cache::Result<()> {
        Cache::save_checkpoint(self, entries)
    }
}

/// Everything a completed fetch produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    pub entries: Vec<DirectoryObject>,
    /// Continuation token for the next delta query, if the API handed one out
    pub delta_link: Option<String>,
    pub pages: usize,
}

/// Sequential pager over a Graph or ARM list/delta endpoint
pub struct DeltaFetcher<'a> {
    api: &'a dyn ApiCaller,
    retry: RetryMiddleware,
    checkpoint_interval: usize,
}

impl<'a> DeltaFetcher<'a> {
    pub fn new(api: &'a dyn ApiCaller) -> Self {
        Self {
            api,
            retry: RetryMiddleware::new(RetryConfig::default()),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
        }
    }

    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry = RetryMiddleware::new(config);
        self
    }

    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval.max(1);
        self
    }

    /// Walk the chain starting at `start` until a page carries a delta link or
    /// no next link. Headers of `start` are sent on every page; its query
    /// parameters only on the first, since links embed their own.
    ///
    /// A page that exhausts its retries aborts the fetch after flushing what was
    /// gathered so far to `sink`.
    pub async fn fetch(
        &self,
        start: ApiRequest,
        sink: Option<&dyn CheckpointSink>,
    ) -> Result<FetchOutcome> {
        let mut outcome = FetchOutcome::default();
        let mut next_checkpoint = self.checkpoint_interval;
        let mut request = start;

        loop {
            let page = match self.fetch_page(&request).await {
                Ok(page) => page,
                Err(source) => {
                    if let Some(sink) = sink {
                        if !outcome.entries.is_empty() {
                            sink.save_checkpoint(&outcome.entries)?;
                        }
                    }
                    return Err(SyncError::Aborted {
                        pages: outcome.pages,
                        fetched: outcome.entries.len(),
                        source,
                    });
                }
            };
            outcome.pages += 1;

            let body = page.unwrap_or(Value::Null);
            if let Some(values) = body.get("value").and_then(Value::as_array) {
                for value in values {
                    match DirectoryObject::from_value(value.clone()) {
                        Some(obj) => outcome.entries.push(obj),
                        None => warn!("skipping non-object entry on page {}", outcome.pages),
                    }
                }
            }
            debug!(
                page = outcome.pages,
                total = outcome.entries.len(),
                "fetched page"
            );

            if let Some(sink) = sink {
                if outcome.entries.len() >= next_checkpoint {
                    sink.save_checkpoint(&outcome.entries)?;
                    debug!(entries = outcome.entries.len(), "checkpoint written");
                    while next_checkpoint <= outcome.entries.len() {
                        next_checkpoint += self.checkpoint_interval;
                    }
                }
            }

            if let Some(link) = body.get(DELTA_LINK).and_then(Value::as_str) {
                outcome.delta_link = Some(link.to_string());
                return Ok(outcome);
            }

            let next = body
                .get(NEXT_LINK)
                .or_else(|| body.get(ARM_NEXT_LINK))
                .and_then(Value::as_str)
                .filter(|link| !link.is_empty());
            match next {
                Some(link) => {
                    let mut follow = ApiRequest::get(link);
                    follow.headers = request.headers.clone();
                    request = follow;
                }
                None => return Ok(outcome),
            }
        }
    }

    /// One GET with retries; non-2xx statuses become errors so 5xx/429 are retried
    async fn fetch_page(&self, request: &ApiRequest) -> std::result::Result<Option<Value>, HttpError> {
        self.retry
            .execute(|| async {
                let response = self.api.call(request.clone()).await?;
                response.error_for_status().map(|r| r.body)
            })
            .await
    }
}
