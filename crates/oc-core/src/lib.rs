//! oc-core: shared configuration and error types for omni-callback
//!
//! Loads the settings for the inbound webhook server, the messaging
//! platform credentials and the optional Twilio request validation.

pub mod config;
pub mod error;

pub use config::{Config, OmniConfig, ServerConfig, TwilioConfig};
pub use error::{Error, Result};
