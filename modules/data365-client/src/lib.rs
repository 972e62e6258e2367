pub mod error;
pub mod types;

pub use error::{Data365Error, Result};
pub use types::{SearchParams, SearchType, TaskStatus};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};
use types::{Envelope, ResultsPage, TaskCreated, TaskState};

const DEFAULT_BASE_URL: &str = "https://api.data365.co/v1.1";

/// Maximum items Data365 will return per results page.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Client for Data365's asynchronous Facebook search protocol. A search task
/// has no standalone handle: status and results are addressed by the same
/// URL-encoded term + search type used to initiate it. The `task_id` returned
/// at initiation is only useful for traceability.
pub struct Data365Client {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl Data365Client {
    pub fn new(token: String) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string(), token)
    }

    pub fn with_base_url(base_url: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Start an asynchronous Facebook post search task. Returns the provider
    /// task id; a response without one is an error. Never retried here.
    pub async fn initiate_search(&self, term: &str, params: &SearchParams) -> Result<String> {
        let url = self.search_url(term, params.search_type, "update");
        info!(
            term,
            search_type = %params.search_type,
            max_posts = params.max_posts,
            load_comments = params.load_comments,
            "Initiating Data365 search task"
        );

        let resp = self
            .client
            .post(&url)
            .query(&[("access_token", self.token.as_str())])
            .query(&[
                ("max_posts", params.max_posts.to_string()),
                ("load_comments", params.load_comments.to_string()),
                ("max_comments", params.max_comments.to_string()),
            ])
            .send()
            .await?;

        let envelope: Envelope<TaskCreated> = Self::decode(resp).await?;
        let task_id = envelope
            .data
            .and_then(|d| d.task_id)
            .ok_or(Data365Error::MissingField("task_id"))?;
        info!(term, task_id = task_id.as_str(), "Data365 search task initiated");
        Ok(task_id)
    }

    /// Read the current status of a search task. A successful call whose
    /// payload lacks a recognizable status yields `TaskStatus::Unknown`.
    pub async fn task_status(&self, term: &str, search_type: SearchType) -> Result<TaskStatus> {
        let url = self.search_url(term, search_type, "update");
        debug!(term, search_type = %search_type, "Checking Data365 task status");

        let resp = self
            .client
            .get(&url)
            .query(&[("access_token", self.token.as_str())])
            .send()
            .await?;

        let envelope: Envelope<TaskState> = Self::decode(resp).await?;
        match envelope.data.and_then(|d| d.status) {
            Some(raw) => {
                let status = TaskStatus::parse(&raw);
                debug!(term, %status, "Data365 task status");
                Ok(status)
            }
            None => {
                warn!(term, "Could not determine task status from response");
                Ok(TaskStatus::Unknown)
            }
        }
    }

    /// Fetch one page of results for a finished task. Returns the page items
    /// and the cursor for the next page, if any.
    pub async fn results_page(
        &self,
        term: &str,
        search_type: SearchType,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<(Vec<Value>, Option<String>)> {
        let url = self.search_url(term, search_type, "posts");
        debug!(term, ?cursor, "Fetching Data365 results page");

        let mut query = vec![("max_page_size", page_size.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        let resp = self
            .client
            .get(&url)
            .query(&[("access_token", self.token.as_str())])
            .query(&query)
            .send()
            .await?;

        let envelope: Envelope<ResultsPage> = Self::decode(resp).await?;
        let page = envelope.data.unwrap_or_default();
        let next_cursor = page.page_info.and_then(|p| p.next_cursor);
        debug!(
            term,
            items = page.items.len(),
            has_next = next_cursor.is_some(),
            "Fetched Data365 results page"
        );
        Ok((page.items, next_cursor))
    }

    fn search_url(&self, term: &str, search_type: SearchType, leaf: &str) -> String {
        format!(
            "{}/facebook/search/{}/posts/{}/{}",
            self.base_url,
            urlencoding::encode(term),
            search_type.as_str(),
            leaf
        )
    }

    /// Check the HTTP status and the provider's response envelope. Data365
    /// reports failures both ways: non-2xx statuses and 2xx bodies carrying
    /// `status: "fail"` or an `error` object.
    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<Envelope<T>> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Data365Error::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let envelope: Envelope<T> = resp.json().await?;

        if let Some(error) = &envelope.error {
            let code = error
                .code
                .as_ref()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let message = error
                .message
                .clone()
                .unwrap_or_else(|| "no error details provided".to_string());
            return Err(Data365Error::Provider(format!("code {code}: {message}")));
        }
        if envelope.status.as_deref() == Some("fail") {
            return Err(Data365Error::Provider("status=fail".to_string()));
        }

        Ok(envelope)
    }
}
