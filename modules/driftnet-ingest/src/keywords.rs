//! Client for the keyword manager's trending-keyword feed.

use std::time::Duration;

use tracing::{info, warn};

use driftnet_common::KeywordCandidate;

/// Bounded request time for one keyword fetch.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct KeywordClient {
    client: reqwest::Client,
    base_url: String,
}

impl KeywordClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch up to `limit` active keywords for `language`. Fail-soft: any
    /// transport, HTTP, or decode failure (including a non-list body) logs
    /// and yields an empty list.
    pub async fn fetch_candidates(&self, language: &str, limit: u32) -> Vec<KeywordCandidate> {
        let url = format!("{}/keywords", self.base_url);
        let limit_param = limit.to_string();
        info!(language, limit, "Fetching keywords");

        let resp = match self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .query(&[("lang", language), ("limit", limit_param.as_str())])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(language, error = %e, "Network error fetching keywords");
                return Vec::new();
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(
                language,
                status = status.as_u16(),
                body = body.as_str(),
                "HTTP error fetching keywords"
            );
            return Vec::new();
        }

        match resp.json::<Vec<KeywordCandidate>>().await {
            Ok(candidates) => {
                info!(language, count = candidates.len(), "Fetched keywords");
                candidates
            }
            Err(e) => {
                warn!(language, error = %e, "Keyword response was not a list of keywords");
                Vec::new()
            }
        }
    }
}
