//! Twilio voice webhook types

use serde::Deserialize;

/// Voice call webhook parameters.
///
/// Twilio posts many more fields; only the ones used for routing and
/// logging are kept.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallEvent {
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub account_sid: Option<String>,
    /// Caller number in E.164 format
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub call_status: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
}

impl CallEvent {
    /// Parse a form-urlencoded webhook body
    pub fn from_form(body: &[u8]) -> Result<Self, serde_urlencoded::de::Error> {
        serde_urlencoded::from_bytes(body)
    }

    /// Caller number, if present and non-blank
    pub fn caller(&self) -> Option<&str> {
        self.from
            .as_deref()
            .map(str::trim)
            .filter(|from| !from.is_empty())
    }
}
