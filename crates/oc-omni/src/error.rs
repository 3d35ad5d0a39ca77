//! エラー型定義 (oc-omni)

use thiserror::Error;

/// oc-omni のエラー型
///
/// Each remote operation has its own variant so callers can tell which
/// step of the workflow failed.
#[derive(Error, Debug)]
pub enum OmniError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Contact lookup failed: {0}")]
    Lookup(String),

    #[error("Contact creation failed: {0}")]
    Create(String),

    #[error("Template fetch failed: {0}")]
    TemplateFetch(String),

    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result 型エイリアス
pub type Result<T> = std::result::Result<T, OmniError>;
