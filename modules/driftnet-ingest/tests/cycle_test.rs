//! Cycle orchestrator tests: budget enforcement, cache gating, fan-out, and
//! cycle-end persistence.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tempfile::tempdir;

use data365_client::{SearchParams, SearchType};
use driftnet_common::KeywordCandidate;
use driftnet_ingest::testing::{candidate, FixedKeywordSource, MemorySink, ScriptedJobApi};
use driftnet_ingest::traits::PollPolicy;
use driftnet_ingest::{IngestSettings, Ingester};

fn settings(budget: u32, languages: &[&str], cache_path: PathBuf) -> IngestSettings {
    IngestSettings {
        call_budget: budget,
        target_languages: languages.iter().map(|s| s.to_string()).collect(),
        search: SearchParams {
            search_type: SearchType::Latest,
            max_posts: 100,
            load_comments: false,
            max_comments: 10,
        },
        poll: PollPolicy {
            interval: Duration::ZERO,
            max_attempts: 3,
            page_size: 100,
        },
        cache_path,
        cache_ttl: chrono::Duration::hours(24),
    }
}

fn saved_cache(path: &PathBuf) -> HashMap<String, String> {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn candidates(pairs: &[(&str, &str)]) -> Vec<KeywordCandidate> {
    pairs.iter().map(|(term, id)| candidate(term, id)).collect()
}

#[tokio::test]
async fn budget_caps_launched_units() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("cache.json");

    let jobs = Arc::new(ScriptedJobApi::new("task-1"));
    let source = Arc::new(FixedKeywordSource::new().with_language(
        "en",
        candidates(&[
            ("k1", "c1"),
            ("k2", "c2"),
            ("k3", "c3"),
            ("k4", "c4"),
            ("k5", "c5"),
            ("k6", "c6"),
            ("k7", "c7"),
            ("k8", "c8"),
            ("k9", "c9"),
            ("k10", "c10"),
        ]),
    ));
    let sink = Arc::new(MemorySink::new());

    let ingester = Ingester::new(
        jobs.clone(),
        source,
        sink,
        settings(3, &["en"], cache_path),
    );
    let stats = ingester.run_cycle().await;

    assert_eq!(stats.units_launched, 3);
    assert_eq!(jobs.initiated_terms().len(), 3);
}

// Two languages, budget 3. Language "en" offers five candidates, two of
// which are freshly cached — the three stale ones spend the whole budget,
// so "fr" is never even fetched. The two fresh entries come through the
// cycle untouched.
#[tokio::test]
async fn exhausted_budget_skips_remaining_languages() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("cache.json");

    let fresh = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339_opts(SecondsFormat::Secs, true);
    fs::write(
        &cache_path,
        serde_json::to_string(&HashMap::from([
            ("c1".to_string(), fresh.clone()),
            ("c2".to_string(), fresh.clone()),
        ]))
        .unwrap(),
    )
    .unwrap();

    let jobs = Arc::new(ScriptedJobApi::new("task-1"));
    let source = Arc::new(
        FixedKeywordSource::new()
            .with_language(
                "en",
                candidates(&[
                    ("k1", "c1"),
                    ("k2", "c2"),
                    ("k3", "c3"),
                    ("k4", "c4"),
                    ("k5", "c5"),
                ]),
            )
            .with_language("fr", candidates(&[("f1", "cf1")])),
    );
    let sink = Arc::new(MemorySink::new());

    let ingester = Ingester::new(
        jobs.clone(),
        source.clone(),
        sink,
        settings(3, &["en", "fr"], cache_path.clone()),
    );
    let stats = ingester.run_cycle().await;

    assert_eq!(stats.units_launched, 3);
    assert_eq!(stats.cache_hits, 2);

    let mut initiated = jobs.initiated_terms();
    initiated.sort();
    assert_eq!(initiated, vec!["k3 Tunisia", "k4 Tunisia", "k5 Tunisia"]);

    assert_eq!(source.requested_languages(), vec!["en"]);

    let saved = saved_cache(&cache_path);
    assert_eq!(saved.len(), 5);
    assert_eq!(saved.get("c1"), Some(&fresh));
    assert_eq!(saved.get("c2"), Some(&fresh));
    for concept in ["c3", "c4", "c5"] {
        assert_ne!(saved.get(concept), Some(&fresh));
        assert!(saved.contains_key(concept));
    }
}

#[tokio::test]
async fn candidate_without_concept_id_is_never_enqueued_or_cached() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("cache.json");

    let jobs = Arc::new(ScriptedJobApi::new("task-1"));
    let nameless = KeywordCandidate {
        term: Some("k2".to_string()),
        concept_id: None,
    };
    let source = Arc::new(
        FixedKeywordSource::new().with_language("en", vec![candidate("k1", "c1"), nameless]),
    );
    let sink = Arc::new(MemorySink::new());

    let ingester = Ingester::new(
        jobs.clone(),
        source,
        sink,
        settings(5, &["en"], cache_path.clone()),
    );
    let stats = ingester.run_cycle().await;

    assert_eq!(stats.units_launched, 1);
    assert_eq!(stats.skipped_no_concept, 1);
    assert_eq!(jobs.initiated_terms(), vec!["k1 Tunisia"]);

    let saved = saved_cache(&cache_path);
    assert_eq!(saved.len(), 1);
    assert!(saved.contains_key("c1"));
}

#[tokio::test]
async fn cache_is_saved_even_when_no_units_run() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("cache.json");

    let jobs = Arc::new(ScriptedJobApi::new("task-1"));
    let source = Arc::new(FixedKeywordSource::new());
    let sink = Arc::new(MemorySink::new());

    let ingester = Ingester::new(
        jobs,
        source,
        sink.clone(),
        settings(3, &["en"], cache_path.clone()),
    );
    let stats = ingester.run_cycle().await;

    assert_eq!(stats.units_launched, 0);
    assert!(saved_cache(&cache_path).is_empty());
    assert_eq!(sink.batch_count(), 0);
}

#[tokio::test]
async fn fresh_concepts_are_skipped() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("cache.json");

    let fresh = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339_opts(SecondsFormat::Secs, true);
    fs::write(
        &cache_path,
        serde_json::to_string(&HashMap::from([("c1".to_string(), fresh.clone())])).unwrap(),
    )
    .unwrap();

    let jobs = Arc::new(ScriptedJobApi::new("task-1"));
    let source = Arc::new(FixedKeywordSource::new().with_language("en", candidates(&[("k1", "c1")])));
    let sink = Arc::new(MemorySink::new());

    let ingester = Ingester::new(
        jobs.clone(),
        source,
        sink,
        settings(3, &["en"], cache_path.clone()),
    );
    let stats = ingester.run_cycle().await;

    assert_eq!(stats.units_launched, 0);
    assert_eq!(stats.cache_hits, 1);
    assert!(jobs.initiated_terms().is_empty());
    assert_eq!(saved_cache(&cache_path).get("c1"), Some(&fresh));
}

#[tokio::test]
async fn collected_posts_are_inserted_in_one_batch() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("cache.json");

    let jobs = Arc::new(ScriptedJobApi::new("task-1").with_pages(vec![
        Ok((vec![json!({"id": "a"})], None)),
        Ok((vec![json!({"id": "b"})], None)),
    ]));
    let source = Arc::new(
        FixedKeywordSource::new().with_language("en", candidates(&[("k1", "c1"), ("k2", "c2")])),
    );
    let sink = Arc::new(MemorySink::new());

    let ingester = Ingester::new(
        jobs,
        source,
        sink.clone(),
        settings(5, &["en"], cache_path),
    );
    let stats = ingester.run_cycle().await;

    assert_eq!(stats.units_launched, 2);
    assert_eq!(stats.posts_collected, 2);
    assert_eq!(sink.batch_count(), 1);
    assert_eq!(sink.inserted().len(), 2);
}

#[tokio::test]
async fn candidates_are_overfetched_to_absorb_rejections() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("cache.json");

    let jobs = Arc::new(ScriptedJobApi::new("task-1"));
    let source = Arc::new(FixedKeywordSource::new().with_language("en", candidates(&[("k1", "c1")])));
    let sink = Arc::new(MemorySink::new());

    let ingester = Ingester::new(
        jobs,
        source.clone(),
        sink,
        settings(4, &["en"], cache_path),
    );
    ingester.run_cycle().await;

    assert_eq!(*source.requests.lock().unwrap(), vec![("en".to_string(), 15)]);
}
