//! Contact resolution
//!
//! Maps a caller's phone number to a platform contact: look it up first and
//! create a presubscribed contact only when the lookup finds nothing.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::client::OmniClient;
use crate::error::Result;
use crate::session::SessionManager;

/// Outcome of resolving a phone number to a contact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactResolution {
    /// The lookup matched an existing contact
    Existing(String),
    /// No match; a new contact was created
    Created(String),
    /// Creation failed, nothing should be sent
    Unavailable,
}

impl ContactResolution {
    /// Contact identifier, if one was resolved
    pub fn contact_id(&self) -> Option<&str> {
        match self {
            Self::Existing(id) | Self::Created(id) => Some(id),
            Self::Unavailable => None,
        }
    }
}

/// Resolves phone numbers to contact identifiers.
///
/// Lookup and creation for the same number are serialized within the
/// process so two calls from one caller cannot both create a contact.
/// Other processes can still race; that is left to the platform.
pub struct ContactResolver {
    client: OmniClient,
    session: Arc<SessionManager>,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl ContactResolver {
    pub fn new(client: OmniClient, session: Arc<SessionManager>) -> Self {
        Self {
            client,
            session,
            in_flight: DashMap::new(),
        }
    }

    /// Resolve `phone_number` to a contact.
    ///
    /// A failed token exchange is returned as an error. A failed lookup
    /// falls through to creation; a failed creation yields
    /// [`ContactResolution::Unavailable`].
    pub async fn resolve_contact(&self, phone_number: &str) -> Result<ContactResolution> {
        let lock = self
            .in_flight
            .entry(phone_number.to_string())
            .or_default()
            .clone();

        let guard = lock.lock().await;
        let result = self.lookup_or_create(phone_number).await;
        drop(guard);
        drop(lock);

        // Only the map itself still references an idle lock
        self.in_flight
            .remove_if(phone_number, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    async fn lookup_or_create(&self, phone_number: &str) -> Result<ContactResolution> {
        let token = self.session.bearer_token().await?;

        match self.client.find_contacts(&token, phone_number).await {
            Ok(list) => {
                if let Some(contact) = list.items.into_iter().next() {
                    info!(phone = %phone_number, contact_id = %contact.contact_id, "Found existing contact");
                    return Ok(ContactResolution::Existing(contact.contact_id));
                }
            }
            Err(e) => {
                warn!(phone = %phone_number, error = %e, "Contact lookup failed, creating contact");
            }
        }

        match self.client.create_contact(&token, phone_number).await {
            Ok(created) => {
                info!(phone = %phone_number, contact_id = %created.contact_id, "Created presubscribed contact");
                Ok(ContactResolution::Created(created.contact_id))
            }
            Err(e) => {
                warn!(phone = %phone_number, error = %e, "Contact creation failed");
                Ok(ContactResolution::Unavailable)
            }
        }
    }

    /// Number of phone numbers currently being resolved
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}
