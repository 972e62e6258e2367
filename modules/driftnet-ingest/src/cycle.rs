//! One ingestion cycle: select candidates under the call budget, fan out
//! processing units, aggregate their records, persist the cache and the
//! batch.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use data365_client::{SearchParams, SearchType, MAX_PAGE_SIZE};
use driftnet_common::{Config, KeywordCandidate, RawPost};

use crate::budget::CallBudget;
use crate::cache::ReprocessCache;
use crate::processor::KeywordProcessor;
use crate::traits::{KeywordSource, PollPolicy, RawPostSink, SearchJobApi};

/// Cycle-wide settings, resolved once from config at startup.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub call_budget: u32,
    pub target_languages: Vec<String>,
    pub search: SearchParams,
    pub poll: PollPolicy,
    pub cache_path: PathBuf,
    pub cache_ttl: chrono::Duration,
}

impl IngestSettings {
    /// Resolve settings from the environment config. An unrecognized search
    /// type falls back to `latest`.
    pub fn from_config(config: &Config) -> Self {
        let search_type = SearchType::parse(&config.data365_search_type).unwrap_or_else(|| {
            warn!(
                value = config.data365_search_type.as_str(),
                "Unrecognized search type, falling back to latest"
            );
            SearchType::Latest
        });
        Self {
            call_budget: config.keywords_per_cycle,
            target_languages: config.target_languages.clone(),
            search: SearchParams {
                search_type,
                max_posts: config.data365_max_posts_per_keyword,
                load_comments: config.data365_load_comments,
                max_comments: config.data365_max_comments,
            },
            poll: PollPolicy {
                interval: Duration::from_secs(config.data365_poll_interval_seconds),
                max_attempts: config.data365_max_poll_attempts,
                page_size: MAX_PAGE_SIZE,
            },
            cache_path: PathBuf::from(&config.reprocess_cache_path),
            cache_ttl: chrono::Duration::hours(config.reprocess_ttl_hours),
        }
    }
}

/// Counters for one ingestion cycle. Logged at cycle end; the trigger
/// surface does not consume them.
#[derive(Debug, Default, Clone)]
pub struct CycleStats {
    pub languages_scanned: u32,
    pub candidates_seen: u32,
    pub skipped_no_concept: u32,
    pub cache_hits: u32,
    pub units_launched: u32,
    pub units_failed: u32,
    pub posts_collected: u32,
}

impl fmt::Display for CycleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} languages scanned, {} candidates seen ({} without concept id, \
             {} cache hits), {} units launched ({} failed), {} posts collected",
            self.languages_scanned,
            self.candidates_seen,
            self.skipped_no_concept,
            self.cache_hits,
            self.units_launched,
            self.units_failed,
            self.posts_collected,
        )
    }
}

pub struct Ingester {
    jobs: Arc<dyn SearchJobApi>,
    keywords: Arc<dyn KeywordSource>,
    sink: Arc<dyn RawPostSink>,
    settings: IngestSettings,
}

impl Ingester {
    pub fn new(
        jobs: Arc<dyn SearchJobApi>,
        keywords: Arc<dyn KeywordSource>,
        sink: Arc<dyn RawPostSink>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            jobs,
            keywords,
            sink,
            settings,
        }
    }

    /// Run one full ingestion cycle. Never returns an error: every upstream
    /// failure degrades to fewer records, and both the cache save and the
    /// batch insert are attempted regardless of what failed before them.
    pub async fn run_cycle(&self) -> CycleStats {
        info!("Starting ingestion cycle");
        let mut stats = CycleStats::default();

        let cache = Arc::new(ReprocessCache::load(&self.settings.cache_path));
        let mut budget = CallBudget::new(self.settings.call_budget);
        let now = Utc::now();

        // Select candidates per language, in configured order, until the
        // call budget is spent. Selection is call-count based: one selected
        // candidate = one provider job, however many pages it yields.
        let mut selected: Vec<(KeywordCandidate, String)> = Vec::new();
        for language in &self.settings.target_languages {
            if budget.exhausted() {
                info!(
                    language = language.as_str(),
                    "Call budget spent, skipping remaining languages"
                );
                break;
            }
            stats.languages_scanned += 1;
            let candidates = self
                .keywords
                .fetch_candidates(language, budget.overfetch_limit())
                .await;
            if candidates.is_empty() {
                info!(language = language.as_str(), "No keywords fetched for language");
                continue;
            }
            for candidate in candidates {
                if budget.exhausted() {
                    break;
                }
                stats.candidates_seen += 1;
                let Some(concept_id) = candidate.concept_id.as_deref().filter(|c| !c.is_empty())
                else {
                    stats.skipped_no_concept += 1;
                    warn!(
                        language = language.as_str(),
                        term = ?candidate.term,
                        "Candidate has no concept id, skipping"
                    );
                    continue;
                };
                if !cache.is_stale(concept_id, now, self.settings.cache_ttl) {
                    stats.cache_hits += 1;
                    debug!(concept_id, "Concept recently processed, skipping");
                    continue;
                }
                if budget.try_reserve() {
                    selected.push((candidate, language.clone()));
                }
            }
        }
        stats.units_launched = selected.len() as u32;
        info!(
            selected = selected.len(),
            budget_used = budget.used(),
            "Candidate selection complete"
        );

        // Fan out: every selected keyword runs its whole job lifecycle as an
        // independent task; one unit's failure never touches its siblings.
        let processor = Arc::new(KeywordProcessor::new(
            self.jobs.clone(),
            self.settings.search.clone(),
            self.settings.poll.clone(),
        ));
        let handles: Vec<_> = selected
            .into_iter()
            .map(|(candidate, language)| {
                let processor = processor.clone();
                let cache = cache.clone();
                tokio::spawn(
                    async move { processor.process(&candidate, &language, &cache).await },
                )
            })
            .collect();

        let mut batch: Vec<RawPost> = Vec::new();
        for result in join_all(handles).await {
            match result {
                Ok(posts) => batch.extend(posts),
                Err(e) => {
                    stats.units_failed += 1;
                    error!(error = %e, "Keyword processing task failed");
                }
            }
        }
        stats.posts_collected = batch.len() as u32;

        // The two effects below are the cycle's only durability guarantees;
        // they run no matter what happened upstream.
        cache.save();

        if batch.is_empty() {
            info!("No posts collected in this cycle");
        } else {
            info!(count = batch.len(), "Inserting collected posts");
            if let Err(e) = self.sink.insert_posts(&batch).await {
                error!(error = %e, "Failed to insert batch of posts");
            }
        }

        info!(%stats, "Ingestion cycle finished");
        stats
    }
}
