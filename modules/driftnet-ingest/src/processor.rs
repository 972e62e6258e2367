//! Drives one keyword through the full search-job lifecycle: term
//! modification, job initiation, cache marking, polling, pagination, and
//! record structuring.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use data365_client::SearchParams;
use driftnet_common::{KeywordCandidate, RawPost};

use crate::cache::ReprocessCache;
use crate::traits::{PollPolicy, SearchJobApi};

/// Location qualifier appended to the submitted search term, per language.
/// Anchors results to the target region without touching the stored keyword.
const LOCATION_QUALIFIERS: &[(&str, &str)] = &[
    ("en", "Tunisia"),
    ("fr", "Tunisie"),
    ("ar", "تونس"),
];

fn location_qualifier(language: &str) -> Option<&'static str> {
    LOCATION_QUALIFIERS
        .iter()
        .find(|(lang, _)| *lang == language)
        .map(|(_, qualifier)| *qualifier)
}

pub struct KeywordProcessor {
    jobs: Arc<dyn SearchJobApi>,
    search: SearchParams,
    poll: PollPolicy,
}

impl KeywordProcessor {
    pub fn new(jobs: Arc<dyn SearchJobApi>, search: SearchParams, poll: PollPolicy) -> Self {
        Self { jobs, search, poll }
    }

    /// Process one candidate end to end. Every failure path degrades to an
    /// empty batch; nothing here propagates an error.
    ///
    /// The cache is marked as soon as a job is initiated, before its outcome
    /// is known — a failed or timed-out job still counts as covered for one
    /// TTL window.
    pub async fn process(
        &self,
        candidate: &KeywordCandidate,
        language: &str,
        cache: &ReprocessCache,
    ) -> Vec<RawPost> {
        let Some(term) = candidate.term.as_deref().filter(|t| !t.is_empty()) else {
            warn!(?candidate, "Skipping candidate with no term");
            return Vec::new();
        };
        let Some(concept_id) = candidate.concept_id.as_deref().filter(|c| !c.is_empty()) else {
            warn!(term, "Skipping candidate with no concept id");
            return Vec::new();
        };

        // The submitted term carries the location qualifier; the stored
        // records keep the original term.
        let submitted_term = match location_qualifier(language) {
            Some(qualifier) => {
                let modified = format!("{term} {qualifier}");
                info!(
                    term,
                    submitted = modified.as_str(),
                    language,
                    concept_id,
                    "Processing keyword"
                );
                modified
            }
            None => {
                warn!(language, term, "No location qualifier for language, using term as-is");
                term.to_string()
            }
        };

        let task_id = match self.jobs.initiate(&submitted_term, &self.search).await {
            Ok(task_id) => task_id,
            Err(e) => {
                warn!(
                    term,
                    submitted = submitted_term.as_str(),
                    error = %e,
                    "Failed to initiate search task, skipping keyword"
                );
                return Vec::new();
            }
        };

        // The job exists on the provider now — gate re-submission for a full
        // TTL window regardless of whether results ever arrive.
        cache.mark_processed(concept_id, Utc::now());

        let items = self
            .jobs
            .collect_results(&submitted_term, &task_id, self.search.search_type, &self.poll)
            .await;
        if items.is_empty() {
            info!(
                term,
                submitted = submitted_term.as_str(),
                "No posts fetched for keyword"
            );
            return Vec::new();
        }

        let mut posts = Vec::with_capacity(items.len());
        for item in items {
            match RawPost::from_item(term, Some(concept_id), language, &task_id, item) {
                Ok(post) => posts.push(post),
                Err(e) => warn!(term, error = %e, "Skipping malformed post item"),
            }
        }
        info!(term, count = posts.len(), "Prepared posts for insertion");
        posts
    }
}
