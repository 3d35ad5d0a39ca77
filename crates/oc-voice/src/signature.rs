//! Twilio request signature validation
//!
//! `X-Twilio-Signature` is the base64 HMAC-SHA1, keyed by the account's auth
//! token, of the full webhook URL followed by every POST parameter (sorted
//! by name) as `name` + `value`.

use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::{Result, VoiceError};

type HmacSha1 = Hmac<Sha1>;

/// Header Twilio puts the signature in
pub const SIGNATURE_HEADER: &str = "x-twilio-signature";

/// Validates inbound webhook signatures
#[derive(Clone)]
pub struct SignatureValidator {
    auth_token: String,
    webhook_url: String,
}

impl SignatureValidator {
    pub fn new(auth_token: &str, webhook_url: &str) -> Result<Self> {
        if auth_token.is_empty() {
            return Err(VoiceError::Config("Twilio auth token not configured".to_string()));
        }
        if webhook_url.is_empty() {
            return Err(VoiceError::Config("Twilio webhook URL not configured".to_string()));
        }

        Ok(Self {
            auth_token: auth_token.to_string(),
            webhook_url: webhook_url.to_string(),
        })
    }

    /// Build a validator from config, `None` when validation is disabled
    pub fn from_config(config: &oc_core::TwilioConfig) -> Result<Option<Self>> {
        if !config.validate_signature {
            return Ok(None);
        }

        let auth_token = config.auth_token.as_deref().unwrap_or_default();
        let webhook_url = config.webhook_url.as_deref().unwrap_or_default();
        Self::new(auth_token, webhook_url).map(Some)
    }

    fn mac(&self, params: &[(String, String)]) -> Option<HmacSha1> {
        let mut mac = HmacSha1::new_from_slice(self.auth_token.as_bytes()).ok()?;

        let mut sorted: Vec<&(String, String)> = params.iter().collect();
        sorted.sort();

        mac.update(self.webhook_url.as_bytes());
        for (name, value) in sorted {
            mac.update(name.as_bytes());
            mac.update(value.as_bytes());
        }

        Some(mac)
    }

    /// Expected signature for the given POST parameters
    pub fn sign(&self, params: &[(String, String)]) -> String {
        self.mac(params)
            .map(|mac| STANDARD.encode(mac.finalize().into_bytes()))
            .unwrap_or_default()
    }

    /// Constant-time check of a received signature
    pub fn verify(&self, params: &[(String, String)], signature: &str) -> bool {
        let Ok(provided) = STANDARD.decode(signature.trim()) else {
            return false;
        };

        match self.mac(params) {
            Some(mac) => mac.verify_slice(&provided).is_ok(),
            None => false,
        }
    }
}
