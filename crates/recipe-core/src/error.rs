use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Page fetch failed: {0}")]
    FetchError(#[from] reqwest::Error),

    #[error("Parse failed: {0}")]
    ParseError(String),

    #[error("Key-value store error: {0}")]
    StoreError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Push error: {0}")]
    PushError(String),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

#[cfg(feature = "kv")]
impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::StoreError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
