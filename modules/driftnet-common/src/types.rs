use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// API label stored on every raw post.
pub const SOURCE_API: &str = "Data365/Facebook";

/// A candidate keyword from the keyword manager. Both fields decode leniently
/// so one malformed element never fails a whole keyword-list response;
/// eligibility is checked where the candidate is used.
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordCandidate {
    #[serde(default)]
    pub term: Option<String>,
    /// Stable identity of the keyword's concept; the reprocess-cache key.
    #[serde(default)]
    pub concept_id: Option<String>,
}

/// A raw Facebook post as ingested, wrapping the untouched provider payload.
///
/// `retrieved_by_keyword` always holds the original keyword term, even though
/// the term actually submitted to the provider may carry a location qualifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPost {
    pub ingestion_timestamp: DateTime<Utc>,
    pub source_api: String,
    pub data_type: String,
    pub retrieved_by_keyword: String,
    pub keyword_concept_id: Option<String>,
    pub keyword_language: String,
    pub data365_task_id: Option<String>,
    pub original_post_data: Value,
}

impl RawPost {
    /// Build a post record from one provider item. Items that are not JSON
    /// objects are rejected.
    pub fn from_item(
        original_term: &str,
        concept_id: Option<&str>,
        language: &str,
        task_id: &str,
        item: Value,
    ) -> anyhow::Result<Self> {
        if !item.is_object() {
            anyhow::bail!("provider item is not a JSON object: {item}");
        }
        Ok(Self {
            ingestion_timestamp: Utc::now(),
            source_api: SOURCE_API.to_string(),
            data_type: "post".to_string(),
            retrieved_by_keyword: original_term.to_string(),
            keyword_concept_id: concept_id.map(str::to_string),
            keyword_language: language.to_string(),
            data365_task_id: Some(task_id.to_string()),
            original_post_data: item,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn candidate_decodes_with_missing_fields() {
        let candidates: Vec<KeywordCandidate> =
            serde_json::from_value(json!([{"term": "flood"}, {"concept_id": "c1"}, {}])).unwrap();
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].term.as_deref(), Some("flood"));
        assert!(candidates[0].concept_id.is_none());
        assert!(candidates[1].term.is_none());
        assert!(candidates[2].term.is_none());
    }

    #[test]
    fn candidate_ignores_extra_fields() {
        let candidate: KeywordCandidate =
            serde_json::from_value(json!({"term": "flood", "concept_id": "c1", "score": 0.9}))
                .unwrap();
        assert_eq!(candidate.term.as_deref(), Some("flood"));
        assert_eq!(candidate.concept_id.as_deref(), Some("c1"));
    }

    #[test]
    fn from_item_rejects_non_object_payloads() {
        assert!(RawPost::from_item("t", Some("c"), "en", "task", json!("a string")).is_err());
        assert!(RawPost::from_item("t", Some("c"), "en", "task", json!(42)).is_err());
        assert!(RawPost::from_item("t", Some("c"), "en", "task", Value::Null).is_err());
    }

    #[test]
    fn from_item_keeps_the_payload_untouched() {
        let payload = json!({"id": "p1", "text": "hello", "nested": {"likes": 3}});
        let post = RawPost::from_item("flood", Some("c1"), "en", "task-9", payload.clone()).unwrap();
        assert_eq!(post.original_post_data, payload);
        assert_eq!(post.retrieved_by_keyword, "flood");
        assert_eq!(post.keyword_concept_id.as_deref(), Some("c1"));
        assert_eq!(post.keyword_language, "en");
        assert_eq!(post.data365_task_id.as_deref(), Some("task-9"));
        assert_eq!(post.source_api, SOURCE_API);
        assert_eq!(post.data_type, "post");
    }
}
