//! oc-omni: OmniChat messaging platform client
//!
//! Authenticates against the platform with a cached, expiry-aware bearer
//! token, resolves callers to contact records (lookup first, create only
//! when absent) and sends templated WhatsApp broadcasts to them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use oc_omni::{ContactResolver, OmniClient, SessionManager, TemplateBroadcaster};
//!
//! let client = OmniClient::new(&config.omni)?;
//! let session = Arc::new(SessionManager::new(client.clone()));
//! let resolver = ContactResolver::new(client.clone(), session.clone());
//! let broadcaster = TemplateBroadcaster::new(client, session);
//!
//! if let Some(contact_id) = resolver.resolve_contact("+447700900123").await?.contact_id() {
//!     broadcaster.send_template_message(contact_id, &[]).await?;
//! }
//! ```

pub mod client;
pub mod contacts;
pub mod error;
pub mod session;
pub mod template;
pub mod types;

pub use client::OmniClient;
pub use contacts::{ContactResolution, ContactResolver};
pub use error::{OmniError, Result};
pub use session::{Credential, SessionManager};
pub use template::{TemplateBroadcaster, compose_message};
