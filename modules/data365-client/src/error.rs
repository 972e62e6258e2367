use thiserror::Error;

pub type Result<T> = std::result::Result<T, Data365Error>;

#[derive(Debug, Error)]
pub enum Data365Error {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Data365 reported failure: {0}")]
    Provider(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing `{0}` in Data365 response")]
    MissingField(&'static str),
}

impl From<reqwest::Error> for Data365Error {
    fn from(err: reqwest::Error) -> Self {
        Data365Error::Network(err.to_string())
    }
}

impl From<serde_json::Error> for Data365Error {
    fn from(err: serde_json::Error) -> Self {
        Data365Error::Parse(err.to_string())
    }
}
