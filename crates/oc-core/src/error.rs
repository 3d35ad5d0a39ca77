//! Error types for oc-core

use thiserror::Error;

/// Main error type for oc-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias for oc-core
pub type Result<T> = std::result::Result<T, Error>;
