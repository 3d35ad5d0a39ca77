//! Template broadcasting
//!
//! Templates carry numbered placeholders (`{{1}}`, `{{2}}`, ...) that are
//! filled positionally from a list of values before the message is sent.

use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};
use tracing::info;

use crate::client::OmniClient;
use crate::error::Result;
use crate::session::SessionManager;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([0-9]+)\s*\}\}").expect("placeholder pattern is valid")
});

/// Substitute `{{n}}` with `values[n - 1]`, or an empty string when there
/// is no such value. Single left-to-right pass; `{{` cannot be escaped.
pub fn compose_message<S: AsRef<str>>(template_text: &str, values: &[S]) -> String {
    PLACEHOLDER
        .replace_all(template_text, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|idx| values.get(idx))
                .map(|value| value.as_ref().to_string())
                .unwrap_or_default()
        })
        .into_owned()
}

/// Sends the configured template to a contact
pub struct TemplateBroadcaster {
    client: OmniClient,
    session: Arc<SessionManager>,
}

impl TemplateBroadcaster {
    pub fn new(client: OmniClient, session: Arc<SessionManager>) -> Self {
        Self { client, session }
    }

    /// Fetch the template, fill it with `values` and queue it for
    /// `contact_id`. Returns the platform's broadcast id; delivery itself is
    /// not confirmed.
    pub async fn send_template_message<S: AsRef<str>>(
        &self,
        contact_id: &str,
        values: &[S],
    ) -> Result<String> {
        let token = self.session.bearer_token().await?;
        let template_id = self.client.template_id();

        // Always fetched fresh, templates can be edited on the platform
        let template = self.client.get_template(&token, template_id).await?;
        let message = compose_message(&template.template_text, values);

        let response = self.client.send_broadcast(&token, contact_id, &message).await?;

        info!(
            contact_id = %contact_id,
            broadcast_id = %response.broadcast_id,
            "Broadcast queued"
        );
        Ok(response.broadcast_id)
    }
}
