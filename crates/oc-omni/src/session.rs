//! Bearer token session management
//!
//! Caches the platform's bearer token in memory and renews it shortly
//! before it expires.

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::client::OmniClient;
use crate::error::Result;

/// Tokens are renewed once they are this close to expiry
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// A bearer token and its absolute expiry
#[derive(Clone)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Usable only while `now` is strictly more than the margin before expiry.
    /// Must not panic for any representable `expires_at`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty()
            && self.expires_at.signed_duration_since(now) > Duration::seconds(EXPIRY_MARGIN_SECS)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Owns the single cached credential for the process.
///
/// The lock is held across the renewal exchange, so callers racing on an
/// expired token wait for one exchange instead of each starting their own.
pub struct SessionManager {
    client: OmniClient,
    credential: Mutex<Option<Credential>>,
}

impl SessionManager {
    /// Create a session manager with an empty cache
    pub fn new(client: OmniClient) -> Self {
        Self {
            client,
            credential: Mutex::new(None),
        }
    }

    /// Create a session manager seeded with an existing credential
    pub fn with_credential(client: OmniClient, credential: Credential) -> Self {
        Self {
            client,
            credential: Mutex::new(Some(credential)),
        }
    }

    /// Return a valid bearer token, renewing it if needed.
    ///
    /// Errors from the token exchange are returned as-is; there is no retry.
    pub async fn bearer_token(&self) -> Result<String> {
        let mut cached = self.credential.lock().await;

        if let Some(credential) = cached.as_ref() {
            if credential.is_fresh(Utc::now()) {
                return Ok(credential.token.clone());
            }
            debug!("Bearer token expires at {}, renewing", credential.expires_at);
        }

        let response = self.client.authenticate().await?;
        let credential = Credential::new(response.access_token, response.expires_at);

        info!("Obtained bearer token valid until {}", credential.expires_at);

        let token = credential.token.clone();
        *cached = Some(credential);
        Ok(token)
    }

    /// Drop the cached credential so the next call re-authenticates
    pub async fn invalidate(&self) {
        self.credential.lock().await.take();
    }

    /// Expiry of the cached credential, if any
    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.credential.lock().await.as_ref().map(|c| c.expires_at)
    }
}
