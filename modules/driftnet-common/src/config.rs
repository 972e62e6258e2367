use std::env;
use std::str::FromStr;

use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // MongoDB
    pub mongo_uri: String,
    pub mongo_db_name: String,
    pub raw_data_collection: String,

    // Keyword manager
    pub keyword_manager_url: String,

    // Data365
    pub data365_api_key: String,
    pub data365_base_url: String,
    pub data365_search_type: String,
    pub data365_max_posts_per_keyword: u32,
    pub data365_load_comments: bool,
    pub data365_max_comments: u32,
    pub data365_poll_interval_seconds: u64,
    pub data365_max_poll_attempts: u32,

    // Ingestion
    /// Per-cycle cap on search tasks initiated against the provider.
    pub keywords_per_cycle: u32,
    pub target_languages: Vec<String>,
    /// 0 disables the periodic trigger; cycles then run only via the API.
    pub ingestion_interval_minutes: u64,
    pub reprocess_cache_path: String,
    pub reprocess_ttl_hours: i64,

    // Web server
    pub web_host: String,
    pub web_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            mongo_uri: required_env("MONGO_URI"),
            mongo_db_name: env_or("MONGO_DB_NAME", "driftnet_raw_data"),
            raw_data_collection: env_or("RAW_DATA_COLLECTION", "facebook_posts"),
            keyword_manager_url: required_env("KEYWORD_MANAGER_URL")
                .trim_end_matches('/')
                .to_string(),
            data365_api_key: required_env("DATA365_API_KEY"),
            data365_base_url: env_or("DATA365_BASE_URL", "https://api.data365.co/v1.1"),
            data365_search_type: env_or("DATA365_SEARCH_TYPE", "latest"),
            data365_max_posts_per_keyword: parsed_env("DATA365_MAX_POSTS_PER_KEYWORD", 100),
            data365_load_comments: parsed_env("DATA365_LOAD_COMMENTS", false),
            data365_max_comments: parsed_env("DATA365_MAX_COMMENTS", 10),
            data365_poll_interval_seconds: parsed_env("DATA365_POLL_INTERVAL_SECONDS", 30),
            data365_max_poll_attempts: parsed_env("DATA365_MAX_POLL_ATTEMPTS", 20),
            keywords_per_cycle: parsed_env("KEYWORDS_PER_CYCLE", 50),
            target_languages: list_env("TARGET_LANGUAGES", &["ar", "fr", "en"]),
            ingestion_interval_minutes: parsed_env("INGESTION_INTERVAL_MINUTES", 0),
            reprocess_cache_path: env_or("REPROCESS_CACHE_PATH", "data/reprocess_cache.json"),
            reprocess_ttl_hours: parsed_env("REPROCESS_TTL_HOURS", 24),
            web_host: env_or("WEB_HOST", "0.0.0.0"),
            web_port: parsed_env("WEB_PORT", 8001),
        }
    }

    /// Log the non-secret configuration at startup.
    pub fn log_summary(&self) {
        info!(
            db = self.mongo_db_name.as_str(),
            collection = self.raw_data_collection.as_str(),
            languages = ?self.target_languages,
            calls_per_cycle = self.keywords_per_cycle,
            search_type = self.data365_search_type.as_str(),
            cache_ttl_hours = self.reprocess_ttl_hours,
            interval_minutes = self.ingestion_interval_minutes,
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_env<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} has an invalid value: {raw}")),
        Err(_) => default,
    }
}

fn list_env(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}
