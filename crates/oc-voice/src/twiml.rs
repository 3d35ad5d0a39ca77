//! TwiML responses

use axum::http::header;
use axum::response::{IntoResponse, Response};

/// Ends the call immediately
pub const HANGUP: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response><Hangup/></Response>"#;

/// `text/xml` response carrying [`HANGUP`]
pub fn hangup() -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], HANGUP).into_response()
}
