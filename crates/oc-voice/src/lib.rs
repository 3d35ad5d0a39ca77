//! oc-voice: inbound voice webhook for omni-callback
//!
//! Answers Twilio voice webhooks with an immediate hang-up and, in the
//! background, sends the caller a WhatsApp template through OmniChat.

pub mod error;
pub mod signature;
pub mod twiml;
pub mod types;
pub mod webhook;
pub mod workflow;

pub use error::{Result, VoiceError};
pub use signature::SignatureValidator;
pub use webhook::{WebhookState, create_router, drain_workflows, start_server};
pub use workflow::{CallHandler, CallWorkflow, WorkflowOutcome};
