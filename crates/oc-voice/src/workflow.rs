//! Call workflow
//!
//! Runs after the webhook has already answered: resolve the caller to a
//! contact, then send them the configured template.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Instrument, debug, error, info, info_span, warn};

use oc_core::Config;
use oc_omni::{ContactResolution, ContactResolver, OmniClient, SessionManager, TemplateBroadcaster};

use crate::error::Result;

/// Terminal outcome of a workflow that did not error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    /// Template queued for the contact
    Sent {
        contact_id: String,
        broadcast_id: String,
    },
    /// No contact could be found or created, nothing was sent
    NoContact,
}

/// Background work triggered by an inbound call
#[async_trait]
pub trait CallHandler: Send + Sync {
    /// Handle a call from `phone_number`. Never fails: the caller has
    /// already been answered, so errors can only be logged.
    async fn handle_call(&self, phone_number: String);
}

/// Resolve the caller, then broadcast the template to them
pub struct CallWorkflow {
    resolver: ContactResolver,
    broadcaster: TemplateBroadcaster,
}

impl CallWorkflow {
    pub fn new(resolver: ContactResolver, broadcaster: TemplateBroadcaster) -> Self {
        Self {
            resolver,
            broadcaster,
        }
    }

    /// Build the workflow and its shared session from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = OmniClient::new(&config.omni)?;
        let session = Arc::new(SessionManager::new(client.clone()));

        Ok(Self::new(
            ContactResolver::new(client.clone(), Arc::clone(&session)),
            TemplateBroadcaster::new(client, session),
        ))
    }

    /// Run the workflow for one caller.
    ///
    /// The template is sent without substitution values; calls carry nothing
    /// to personalise it with.
    pub async fn run(&self, phone_number: &str) -> Result<WorkflowOutcome> {
        debug!("Resolving contact");

        let contact_id = match self.resolver.resolve_contact(phone_number).await? {
            ContactResolution::Existing(id) | ContactResolution::Created(id) => id,
            ContactResolution::Unavailable => return Ok(WorkflowOutcome::NoContact),
        };

        debug!(contact_id = %contact_id, "Sending template");

        let values: &[&str] = &[];
        let broadcast_id = self
            .broadcaster
            .send_template_message(&contact_id, values)
            .await?;

        Ok(WorkflowOutcome::Sent {
            contact_id,
            broadcast_id,
        })
    }
}

#[async_trait]
impl CallHandler for CallWorkflow {
    async fn handle_call(&self, phone_number: String) {
        let span = info_span!("call_workflow", phone = %phone_number);

        async {
            match self.run(&phone_number).await {
                Ok(WorkflowOutcome::Sent {
                    contact_id,
                    broadcast_id,
                }) => {
                    info!(contact_id = %contact_id, broadcast_id = %broadcast_id, "WhatsApp template sent");
                }
                Ok(WorkflowOutcome::NoContact) => {
                    warn!("Contact not available, no WhatsApp sent");
                }
                Err(e) => {
                    error!(error = %e, "Call workflow failed");
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use oc_core::OmniConfig;
    use oc_omni::{Credential, OmniError};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::error::VoiceError;

    const PHONE: &str = "+447700900123";

    fn workflow(base_url: &str) -> CallWorkflow {
        let client = OmniClient::new(&OmniConfig {
            base_url: base_url.to_string(),
            username: "user".to_string(),
            password: "secret".to_string(),
            app_name: "callback".to_string(),
            api_account_id: "A1".to_string(),
            template_id: "T1".to_string(),
            request_timeout_secs: 5,
        })
        .unwrap();
        let session = Arc::new(SessionManager::with_credential(
            client.clone(),
            Credential::new("tok-1", Utc::now() + Duration::hours(1)),
        ));
        CallWorkflow::new(
            ContactResolver::new(client.clone(), Arc::clone(&session)),
            TemplateBroadcaster::new(client, session),
        )
    }

    async fn mount_empty_lookup(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/contact"))
            .and(query_param("mobileNumber", PHONE))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn new_caller_gets_welcome_message() {
        let server = MockServer::start().await;

        mount_empty_lookup(&server).await;
        Mock::given(method("POST"))
            .and(path("/contact"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"contactId": "C1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/template/T1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"templateText": "Welcome {{1}}"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/broadcast"))
            .and(body_json(serde_json::json!({
                "apiAccountId": "A1",
                "contactId": "C1",
                "templateId": "T1",
                "message": "Welcome "
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"broadcastId": "B1"})))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = workflow(&server.uri()).run(PHONE).await.unwrap();
        assert_eq!(
            outcome,
            WorkflowOutcome::Sent {
                contact_id: "C1".to_string(),
                broadcast_id: "B1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn create_failure_aborts_before_broadcast() {
        let server = MockServer::start().await;

        mount_empty_lookup(&server).await;
        Mock::given(method("POST"))
            .and(path("/contact"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/template/T1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/broadcast"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = workflow(&server.uri()).run(PHONE).await.unwrap();
        assert_eq!(outcome, WorkflowOutcome::NoContact);
    }

    #[tokio::test]
    async fn template_failure_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/contact"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"contactId": "C5"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/template/T1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = workflow(&server.uri()).run(PHONE).await;
        assert!(matches!(
            result,
            Err(VoiceError::Omni(OmniError::TemplateFetch(_)))
        ));
    }

    #[tokio::test]
    async fn handle_call_swallows_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/contact"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"contactId": "C5"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/template/T1"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        // Completes without panicking; the failure is only logged
        workflow(&server.uri()).handle_call(PHONE.to_string()).await;
    }
}
