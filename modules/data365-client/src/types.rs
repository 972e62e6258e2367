use std::fmt;

use serde::Deserialize;
use serde_json::Value;

/// Provider-side ranking mode for a search task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Top,
    Latest,
    Hashtag,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Top => "top",
            SearchType::Latest => "latest",
            SearchType::Hashtag => "hashtag",
        }
    }

    /// Parse a configured search type. Returns None for anything the
    /// provider does not support.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "top" => Some(SearchType::Top),
            "latest" => Some(SearchType::Latest),
            "hashtag" => Some(SearchType::Hashtag),
            _ => None,
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters applied to every search task a cycle initiates.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub search_type: SearchType,
    pub max_posts: u32,
    /// Comments cost extra provider credits; off by default.
    pub load_comments: bool,
    pub max_comments: u32,
}

/// Lifecycle state of a Data365 search task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Created,
    Pending,
    Finished,
    Fail,
    Canceled,
    Unknown,
}

impl TaskStatus {
    /// Parse the provider's status string. Unrecognized values map to
    /// `Unknown` rather than failing the call.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "created" => TaskStatus::Created,
            "pending" => TaskStatus::Pending,
            "finished" => TaskStatus::Finished,
            "fail" => TaskStatus::Fail,
            "canceled" => TaskStatus::Canceled,
            _ => TaskStatus::Unknown,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Created => "created",
            TaskStatus::Pending => "pending",
            TaskStatus::Finished => "finished",
            TaskStatus::Fail => "fail",
            TaskStatus::Canceled => "canceled",
            TaskStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Envelope wrapping every Data365 response body. A 2xx response can still
/// carry `status: "fail"` or an `error` object; both count as call failures.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
    pub status: Option<String>,
    pub error: Option<ApiErrorBody>,
}

/// Error details the provider embeds in a failed envelope.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub code: Option<Value>,
    pub message: Option<String>,
}

/// `data` object returned when a search task is created.
#[derive(Debug, Deserialize)]
pub struct TaskCreated {
    pub task_id: Option<String>,
}

/// `data` object returned by a status poll.
#[derive(Debug, Deserialize)]
pub struct TaskState {
    pub status: Option<String>,
}

/// `data` object for one results page.
#[derive(Debug, Default, Deserialize)]
pub struct ResultsPage {
    #[serde(default)]
    pub items: Vec<Value>,
    pub page_info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
pub struct PageInfo {
    pub next_cursor: Option<String>,
}
