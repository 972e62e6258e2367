//! Scripted in-memory implementations of the orchestrator seams, for
//! deterministic tests: no network, no database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use data365_client::{SearchParams, SearchType, TaskStatus};
use driftnet_common::{KeywordCandidate, RawPost};

use crate::traits::{KeywordSource, RawPostSink, SearchJobApi};

/// One scripted results page: items plus the cursor handed to the caller.
pub type ScriptedPage = (Vec<Value>, Option<String>);

/// Convenience constructor for candidates in tests.
pub fn candidate(term: &str, concept_id: &str) -> KeywordCandidate {
    KeywordCandidate {
        term: Some(term.to_string()),
        concept_id: Some(concept_id.to_string()),
    }
}

// ---------------------------------------------------------------------------
// ScriptedJobApi
// ---------------------------------------------------------------------------

/// Search-job mock driven by a scripted status sequence and page list.
///
/// Statuses are consumed per call; the last entry repeats forever. Pages are
/// consumed per call; past the end of the script, fetches return an empty
/// terminal page. `Err` entries model transport failures.
pub struct ScriptedJobApi {
    task_id: Option<String>,
    statuses: Vec<Result<TaskStatus, String>>,
    pages: Vec<Result<ScriptedPage, String>>,
    status_calls: AtomicUsize,
    page_calls: AtomicUsize,
    /// Terms passed to `initiate`, in call order.
    pub initiated: Mutex<Vec<String>>,
    /// Cursor passed to each `fetch_page` call, in call order.
    pub cursors_seen: Mutex<Vec<Option<String>>>,
}

impl ScriptedJobApi {
    /// A job that initiates with `task_id` and reports `finished` right away.
    pub fn new(task_id: &str) -> Self {
        Self {
            task_id: Some(task_id.to_string()),
            statuses: vec![Ok(TaskStatus::Finished)],
            pages: Vec::new(),
            status_calls: AtomicUsize::new(0),
            page_calls: AtomicUsize::new(0),
            initiated: Mutex::new(Vec::new()),
            cursors_seen: Mutex::new(Vec::new()),
        }
    }

    /// A job whose initiation always fails.
    pub fn refusing_initiation() -> Self {
        let mut api = Self::new("unused");
        api.task_id = None;
        api
    }

    pub fn with_statuses(mut self, statuses: Vec<Result<TaskStatus, String>>) -> Self {
        self.statuses = statuses;
        self
    }

    pub fn with_pages(mut self, pages: Vec<Result<ScriptedPage, String>>) -> Self {
        self.pages = pages;
        self
    }

    pub fn status_call_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn page_call_count(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub fn initiated_terms(&self) -> Vec<String> {
        self.initiated.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchJobApi for ScriptedJobApi {
    async fn initiate(&self, term: &str, _params: &SearchParams) -> Result<String> {
        self.initiated.lock().unwrap().push(term.to_string());
        match &self.task_id {
            Some(id) => Ok(id.clone()),
            None => Err(anyhow!("initiation refused by script")),
        }
    }

    async fn status(&self, _term: &str, _search_type: SearchType) -> Result<TaskStatus> {
        let i = self.status_calls.fetch_add(1, Ordering::SeqCst);
        let entry = self
            .statuses
            .get(i)
            .or_else(|| self.statuses.last())
            .cloned()
            .unwrap_or(Ok(TaskStatus::Unknown));
        entry.map_err(|e| anyhow!(e))
    }

    async fn fetch_page(
        &self,
        _term: &str,
        _search_type: SearchType,
        cursor: Option<&str>,
        _page_size: u32,
    ) -> Result<(Vec<Value>, Option<String>)> {
        self.cursors_seen
            .lock()
            .unwrap()
            .push(cursor.map(str::to_string));
        let i = self.page_calls.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(i) {
            Some(Ok(page)) => Ok(page.clone()),
            Some(Err(e)) => Err(anyhow!(e.clone())),
            None => Ok((Vec::new(), None)),
        }
    }
}

// ---------------------------------------------------------------------------
// FixedKeywordSource
// ---------------------------------------------------------------------------

/// Keyword source serving fixed per-language candidate lists and recording
/// the (language, limit) pairs it was asked for.
#[derive(Default)]
pub struct FixedKeywordSource {
    by_language: HashMap<String, Vec<KeywordCandidate>>,
    pub requests: Mutex<Vec<(String, u32)>>,
}

impl FixedKeywordSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_language(mut self, language: &str, candidates: Vec<KeywordCandidate>) -> Self {
        self.by_language.insert(language.to_string(), candidates);
        self
    }

    pub fn requested_languages(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(lang, _)| lang.clone())
            .collect()
    }
}

#[async_trait]
impl KeywordSource for FixedKeywordSource {
    async fn fetch_candidates(&self, language: &str, limit: u32) -> Vec<KeywordCandidate> {
        self.requests
            .lock()
            .unwrap()
            .push((language.to_string(), limit));
        let mut candidates = self.by_language.get(language).cloned().unwrap_or_default();
        candidates.truncate(limit as usize);
        candidates
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// Sink that buffers every inserted batch in memory.
#[derive(Default)]
pub struct MemorySink {
    pub batches: Mutex<Vec<Vec<RawPost>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All inserted posts, across batches, flattened in insertion order.
    pub fn inserted(&self) -> Vec<RawPost> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

#[async_trait]
impl RawPostSink for MemorySink {
    async fn insert_posts(&self, posts: &[RawPost]) -> Result<()> {
        self.batches.lock().unwrap().push(posts.to_vec());
        Ok(())
    }
}
