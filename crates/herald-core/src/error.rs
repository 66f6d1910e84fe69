//! Herald error types.

use thiserror::Error;

/// Errors surfaced by herald subsystems.
#[derive(Debug, Error)]
pub enum HeraldError {
    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("crawler error: {0}")]
    Crawler(String),

    #[error("analysis error: {0}")]
    Analysis(String),

    #[error("notify error: {0}")]
    Notify(String),

    #[error("invalid trigger time '{0}' (expected HH:MM)")]
    InvalidTrigger(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, HeraldError>;

impl HeraldError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn crawler(msg: impl Into<String>) -> Self {
        Self::Crawler(msg.into())
    }

    pub fn analysis(msg: impl Into<String>) -> Self {
        Self::Analysis(msg.into())
    }

    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }
}
