use thiserror::Error;

pub type Result<T> = std::result::Result<T, HeadlessError>;

#[derive(Debug, Error)]
pub enum HeadlessError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Timed out after {timeout_ms}ms waiting for '{selector}'")]
    Timeout { selector: String, timeout_ms: u64 },
}

impl From<reqwest::Error> for HeadlessError {
    fn from(err: reqwest::Error) -> Self {
        HeadlessError::Network(err.to_string())
    }
}
