//! Durable reprocess cache — concept_id mapped to the last time a search job
//! was *initiated* for it. Loaded once per cycle, mutated in memory as jobs
//! are initiated, written back wholesale at cycle end. Initiation, not
//! completion, is the gate: a failed or timed-out job still suppresses
//! re-submission for a full TTL window.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tracing::{info, warn};

/// Returns true when an entry no longer suppresses reprocessing: it is
/// absent, its timestamp does not parse, or its age is at least `ttl`.
pub fn entry_is_stale(entry: Option<&str>, now: DateTime<Utc>, ttl: Duration) -> bool {
    let Some(raw) = entry else {
        return true;
    };
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => now - ts.with_timezone(&Utc) >= ttl,
        Err(e) => {
            warn!(timestamp = raw, error = %e, "Unparseable cache timestamp, treating as stale");
            true
        }
    }
}

/// File-backed map of concept ids to the ISO-8601 UTC timestamp of their
/// last initiated search job. Shared across concurrent processing units
/// within a cycle; each unit only ever writes its own concept's key.
pub struct ReprocessCache {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl ReprocessCache {
    /// Load the cache from disk. A missing, empty, malformed, or non-object
    /// file yields an empty cache; this never fails.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(map) => {
                    info!(entries = map.len(), path = %path.display(), "Loaded reprocess cache");
                    map
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Malformed reprocess cache, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No reprocess cache on disk, starting empty");
                HashMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read reprocess cache, starting empty");
                HashMap::new()
            }
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// Whether `concept_id` is eligible for reprocessing.
    pub fn is_stale(&self, concept_id: &str, now: DateTime<Utc>, ttl: Duration) -> bool {
        let entries = self.entries.lock().unwrap();
        entry_is_stale(entries.get(concept_id).map(String::as_str), now, ttl)
    }

    /// Record that a search job was initiated for `concept_id` at `now`.
    /// Idempotent; a repeat call simply refreshes the timestamp.
    pub fn mark_processed(&self, concept_id: &str, now: DateTime<Utc>) {
        let stamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        self.entries
            .lock()
            .unwrap()
            .insert(concept_id.to_string(), stamp);
    }

    /// Write the cache back to disk, replacing the previous file wholesale.
    /// Best-effort: failures are logged, never raised — the worst outcome is
    /// one extra reprocessing after a restart.
    pub fn save(&self) {
        let entries = self.entries.lock().unwrap();
        let json = match serde_json::to_string_pretty(&*entries) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize reprocess cache");
                return;
            }
        };
        match self.write_replacing(&json) {
            Ok(()) => {
                info!(entries = entries.len(), path = %self.path.display(), "Saved reprocess cache")
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to save reprocess cache")
            }
        }
    }

    // Temp-file-then-rename so a crash mid-write never leaves a torn file.
    fn write_replacing(&self, json: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)
    }

    /// Number of cached concepts.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the underlying map, timestamps as stored.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use tempfile::tempdir;

    fn stamp(ts: DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    #[test]
    fn absent_entry_is_stale() {
        assert!(entry_is_stale(None, Utc::now(), Duration::hours(24)));
    }

    #[test]
    fn unparseable_entry_is_stale() {
        assert!(entry_is_stale(
            Some("not a timestamp"),
            Utc::now(),
            Duration::hours(24)
        ));
    }

    #[test]
    fn fresh_entry_is_not_stale() {
        let now = Utc::now();
        let entry = stamp(now - Duration::hours(1));
        assert!(!entry_is_stale(Some(&entry), now, Duration::hours(24)));
    }

    #[test]
    fn entry_exactly_at_ttl_is_stale() {
        let now = Utc::now().with_nanosecond(0).unwrap();
        let entry = stamp(now - Duration::hours(24));
        assert!(entry_is_stale(Some(&entry), now, Duration::hours(24)));
    }

    #[test]
    fn entry_older_than_ttl_is_stale() {
        let now = Utc::now();
        let entry = stamp(now - Duration::hours(25));
        assert!(entry_is_stale(Some(&entry), now, Duration::hours(24)));
    }

    #[test]
    fn load_missing_file_yields_empty_cache() {
        let dir = tempdir().unwrap();
        let cache = ReprocessCache::load(dir.path().join("nope.json"));
        assert!(cache.is_empty());
    }

    #[test]
    fn load_malformed_file_yields_empty_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "this is not json").unwrap();
        assert!(ReprocessCache::load(&path).is_empty());
    }

    #[test]
    fn load_non_object_file_yields_empty_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(ReprocessCache::load(&path).is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let now = Utc::now();

        let cache = ReprocessCache::load(&path);
        cache.mark_processed("concept-a", now);
        cache.mark_processed("concept-b", now - Duration::hours(3));
        cache.save();

        let reloaded = ReprocessCache::load(&path);
        assert_eq!(reloaded.snapshot(), cache.snapshot());
    }

    #[test]
    fn save_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/cache.json");
        let cache = ReprocessCache::load(&path);
        cache.mark_processed("concept-a", Utc::now());
        cache.save();
        assert!(!ReprocessCache::load(&path).is_empty());
    }

    #[test]
    fn mark_processed_is_idempotent() {
        let dir = tempdir().unwrap();
        let cache = ReprocessCache::load(dir.path().join("cache.json"));
        let now = Utc::now();
        cache.mark_processed("concept-a", now);
        cache.mark_processed("concept-a", now);
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.snapshot().get("concept-a"),
            Some(&stamp(now))
        );
    }

    #[test]
    fn marked_entry_is_fresh_until_ttl_passes() {
        let dir = tempdir().unwrap();
        let cache = ReprocessCache::load(dir.path().join("cache.json"));
        let now = Utc::now();
        cache.mark_processed("concept-a", now);
        assert!(!cache.is_stale("concept-a", now, Duration::hours(24)));
        assert!(cache.is_stale("concept-a", now + Duration::hours(25), Duration::hours(24)));
        assert!(cache.is_stale("never-seen", now, Duration::hours(24)));
    }
}
