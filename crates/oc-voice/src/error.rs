//! エラー型定義 (oc-voice)

use thiserror::Error;

/// oc-voice のエラー型
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("OmniChat error: {0}")]
    Omni(#[from] oc_omni::OmniError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),
}

/// Result 型エイリアス
pub type Result<T> = std::result::Result<T, VoiceError>;
