// Trait abstractions for the cycle orchestrator's dependencies.
//
// SearchJobApi — the provider's async-job protocol. The poll-and-paginate
//   loop is a default method, so the concrete client and the test mocks
//   share one implementation.
// KeywordSource / RawPostSink — candidate supply and record persistence.
//
// These enable deterministic testing with the mocks in `testing`: no
// network, no database.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use data365_client::{Data365Client, SearchParams, SearchType, TaskStatus};
use driftnet_common::{KeywordCandidate, RawPost};
use driftnet_store::RawPostWriter;

use crate::keywords::KeywordClient;

/// Fixed delay between successive results-page fetches.
const PAGE_FETCH_DELAY: Duration = Duration::from_secs(1);

/// How a processing unit polls a search task to completion. The product
/// `max_attempts * interval` is the hard ceiling on one unit's lifetime.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub page_size: u32,
}

// ---------------------------------------------------------------------------
// SearchJobApi
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SearchJobApi: Send + Sync {
    /// Start a search job. Returns the provider task id; any transport,
    /// HTTP, or provider-envelope failure is an error. Never retried here.
    async fn initiate(&self, term: &str, params: &SearchParams) -> Result<String>;

    /// Current status of the job addressed by term + search type.
    async fn status(&self, term: &str, search_type: SearchType) -> Result<TaskStatus>;

    /// One results page: items plus the next-page cursor, if any.
    async fn fetch_page(
        &self,
        term: &str,
        search_type: SearchType,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<(Vec<Value>, Option<String>)>;

    /// Poll the job to a terminal state, then drain every results page.
    ///
    /// All failure paths degrade to an empty batch: a failed or canceled
    /// job, attempts exhausted before a terminal status, or a page fetch
    /// that errors mid-pagination (pages already collected are kept — a
    /// truncated batch is indistinguishable from a complete one here). A
    /// status call that errors consumes an attempt and waits, same as a
    /// pending status. `task_id` is carried for log traceability only; the
    /// provider addresses the job by term + search type.
    async fn collect_results(
        &self,
        term: &str,
        task_id: &str,
        search_type: SearchType,
        poll: &PollPolicy,
    ) -> Vec<Value> {
        for attempt in 1..=poll.max_attempts {
            match self.status(term, search_type).await {
                Ok(TaskStatus::Finished) => {
                    info!(term, task_id, "Search task finished, fetching results");
                    return drain_pages(self, term, search_type, poll.page_size).await;
                }
                Ok(status @ (TaskStatus::Fail | TaskStatus::Canceled)) => {
                    warn!(term, task_id, %status, "Search task ended without results");
                    return Vec::new();
                }
                Ok(status) => {
                    debug!(
                        term,
                        task_id,
                        %status,
                        attempt,
                        max_attempts = poll.max_attempts,
                        "Search task not ready, waiting"
                    );
                }
                Err(e) => {
                    warn!(term, task_id, error = %e, attempt, "Status poll failed, waiting");
                }
            }
            tokio::time::sleep(poll.interval).await;
        }
        warn!(
            term,
            task_id,
            attempts = poll.max_attempts,
            "Search task polling timed out"
        );
        Vec::new()
    }
}

/// Fetch pages until the cursor runs out, an empty page comes back, or a
/// fetch fails. An empty page is terminal even if a cursor is present.
async fn drain_pages<C: SearchJobApi + ?Sized>(
    client: &C,
    term: &str,
    search_type: SearchType,
    page_size: u32,
) -> Vec<Value> {
    let mut collected = Vec::new();
    let mut cursor: Option<String> = None;
    let mut page = 1u32;
    loop {
        let (items, next_cursor) = match client
            .fetch_page(term, search_type, cursor.as_deref(), page_size)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(term, page, error = %e, "Results page fetch failed, stopping pagination");
                break;
            }
        };
        if items.is_empty() {
            warn!(term, page, "Empty results page, stopping pagination");
            break;
        }
        collected.extend(items);
        debug!(term, page, total = collected.len(), "Fetched results page");
        match next_cursor {
            Some(next) => {
                cursor = Some(next);
                page += 1;
                tokio::time::sleep(PAGE_FETCH_DELAY).await;
            }
            None => {
                info!(term, pages = page, total = collected.len(), "Fetched all result pages");
                break;
            }
        }
    }
    collected
}

#[async_trait]
impl SearchJobApi for Data365Client {
    async fn initiate(&self, term: &str, params: &SearchParams) -> Result<String> {
        Ok(self.initiate_search(term, params).await?)
    }

    async fn status(&self, term: &str, search_type: SearchType) -> Result<TaskStatus> {
        Ok(self.task_status(term, search_type).await?)
    }

    async fn fetch_page(
        &self,
        term: &str,
        search_type: SearchType,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<(Vec<Value>, Option<String>)> {
        Ok(self.results_page(term, search_type, cursor, page_size).await?)
    }
}

// ---------------------------------------------------------------------------
// KeywordSource
// ---------------------------------------------------------------------------

/// Supplies candidate keywords for a language. Fail-soft by contract: any
/// failure yields an empty list, never an error.
#[async_trait]
pub trait KeywordSource: Send + Sync {
    async fn fetch_candidates(&self, language: &str, limit: u32) -> Vec<KeywordCandidate>;
}

#[async_trait]
impl KeywordSource for KeywordClient {
    async fn fetch_candidates(&self, language: &str, limit: u32) -> Vec<KeywordCandidate> {
        KeywordClient::fetch_candidates(self, language, limit).await
    }
}

// ---------------------------------------------------------------------------
// RawPostSink
// ---------------------------------------------------------------------------

/// Receives the cycle's record batch. Partial failures are the sink's
/// problem; an error here means the batch as a whole could not be written.
#[async_trait]
pub trait RawPostSink: Send + Sync {
    async fn insert_posts(&self, posts: &[RawPost]) -> Result<()>;
}

#[async_trait]
impl RawPostSink for RawPostWriter {
    async fn insert_posts(&self, posts: &[RawPost]) -> Result<()> {
        Ok(RawPostWriter::insert_posts(self, posts).await?)
    }
}
