//! OmniChat REST API client
//!
//! One method per remote endpoint. Token caching, lookup-or-create and
//! template composition live in the session, contacts and template modules.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use oc_core::OmniConfig;

use crate::error::{OmniError, Result};
use crate::types::*;

/// Header identifying the calling application on the token exchange
const CALLING_APPLICATION_HEADER: &str = "X-Calling-Application";

/// OmniChat API client
#[derive(Clone)]
pub struct OmniClient {
    client: Client,
    base_url: String,
    config: OmniConfig,
}

impl OmniClient {
    /// Create a new OmniChat API client
    pub fn new(config: &OmniConfig) -> Result<Self> {
        if config.request_timeout_secs == 0 {
            return Err(OmniError::Config("request timeout must be greater than zero".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(OmniError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config: config.clone(),
        })
    }

    /// Account every contact and broadcast is scoped to
    pub fn api_account_id(&self) -> &str {
        &self.config.api_account_id
    }

    /// Template sent by the broadcaster
    pub fn template_id(&self) -> &str {
        &self.config.template_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange the configured credentials for a bearer token
    pub async fn authenticate(&self) -> Result<TokenResponse> {
        let body = TokenRequest {
            username: &self.config.username,
            password: &self.config.password,
        };

        debug!("Requesting bearer token for application {}", self.config.app_name);

        let request = self
            .client
            .post(self.url("/oauth/token"))
            .header(CALLING_APPLICATION_HEADER, &self.config.app_name)
            .json(&body);

        send_json(request, OmniError::Auth).await
    }

    /// Search the account's contacts by mobile number
    pub async fn find_contacts(&self, token: &str, mobile_number: &str) -> Result<ContactList> {
        debug!("Looking up contact for {}", mobile_number);

        let request = self
            .client
            .get(self.url("/contact"))
            .bearer_auth(token)
            .query(&[
                ("apiAccountId", self.config.api_account_id.as_str()),
                ("mobileNumber", mobile_number),
            ]);

        send_json(request, OmniError::Lookup).await
    }

    /// Create a presubscribed contact named after its mobile number
    pub async fn create_contact(&self, token: &str, mobile_number: &str) -> Result<CreatedContact> {
        let body = CreateContact {
            mobile_number,
            name: mobile_number,
            status: PRESUBSCRIBED,
            api_account_id: &self.config.api_account_id,
        };

        debug!("Creating contact for {}", mobile_number);

        let request = self.client.post(self.url("/contact")).bearer_auth(token).json(&body);

        send_json(request, OmniError::Create).await
    }

    /// Fetch a template definition
    pub async fn get_template(&self, token: &str, template_id: &str) -> Result<Template> {
        debug!("Fetching template {}", template_id);

        let request = self
            .client
            .get(self.url(&format!("/template/{}", template_id)))
            .bearer_auth(token);

        send_json(request, OmniError::TemplateFetch).await
    }

    /// Queue a broadcast of `message` to a contact
    pub async fn send_broadcast(
        &self,
        token: &str,
        contact_id: &str,
        message: &str,
    ) -> Result<BroadcastResponse> {
        let body = BroadcastRequest {
            api_account_id: &self.config.api_account_id,
            contact_id,
            template_id: &self.config.template_id,
            message,
        };

        debug!("Submitting broadcast to contact {}", contact_id);

        let request = self.client.post(self.url("/broadcast")).bearer_auth(token).json(&body);

        send_json(request, OmniError::Broadcast).await
    }
}

/// Send a request and decode a JSON success body.
///
/// Transport errors, non-success statuses and undecodable bodies all map
/// to the calling operation's error variant.
async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    to_error: fn(String) -> OmniError,
) -> Result<T> {
    let response = request.send().await.map_err(|e| to_error(e.to_string()))?;

    let status = response.status();
    let body = response.text().await.map_err(|e| to_error(e.to_string()))?;

    if !status.is_success() {
        warn!("OmniChat API error: {} - {}", status, body);
        return Err(to_error(format!("{}: {}", status, body)));
    }

    serde_json::from_str(&body)
        .map_err(|e| to_error(format!("Failed to parse response: {} - {}", e, body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> OmniConfig {
        OmniConfig {
            base_url: base_url.to_string(),
            username: "user".to_string(),
            password: "secret".to_string(),
            app_name: "callback".to_string(),
            api_account_id: "A1".to_string(),
            template_id: "T1".to_string(),
            request_timeout_secs: 5,
        }
    }

    #[test]
    fn test_client_creation() {
        let client = OmniClient::new(&test_config("https://omni.example.com/")).unwrap();
        assert_eq!(client.base_url, "https://omni.example.com");
        assert_eq!(client.api_account_id(), "A1");
        assert_eq!(client.template_id(), "T1");
    }

    #[test]
    fn test_client_rejects_zero_timeout() {
        let mut config = test_config("https://omni.example.com");
        config.request_timeout_secs = 0;
        assert!(matches!(OmniClient::new(&config), Err(OmniError::Config(_))));
    }

    #[tokio::test]
    async fn authenticate_sends_credentials_and_app_header() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(header("X-Calling-Application", "callback"))
            .and(body_json(serde_json::json!({"username": "user", "password": "secret"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "expires_at": "2030-01-01T00:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OmniClient::new(&test_config(&server.uri())).unwrap();
        let token = client.authenticate().await.unwrap();
        assert_eq!(token.access_token, "tok-1");
    }

    #[tokio::test]
    async fn authenticate_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let client = OmniClient::new(&test_config(&server.uri())).unwrap();
        let err = client.authenticate().await.unwrap_err();
        assert!(matches!(err, OmniError::Auth(_)));
        assert!(err.to_string().contains("bad credentials"), "got: {err}");
    }

    #[tokio::test]
    async fn authenticate_unreachable() {
        // Nothing listens on the discard port
        let client = OmniClient::new(&test_config("http://127.0.0.1:9")).unwrap();
        assert!(matches!(client.authenticate().await, Err(OmniError::Auth(_))));
    }

    #[tokio::test]
    async fn find_contacts_encodes_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/contact"))
            .and(query_param("apiAccountId", "A1"))
            .and(query_param("mobileNumber", "+447700900123"))
            .and(header("Authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"contactId": "C7"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OmniClient::new(&test_config(&server.uri())).unwrap();
        let contacts = client.find_contacts("tok-1", "+447700900123").await.unwrap();
        assert_eq!(contacts.items.len(), 1);
        assert_eq!(contacts.items[0].contact_id, "C7");
    }

    #[tokio::test]
    async fn create_contact_malformed_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/contact"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = OmniClient::new(&test_config(&server.uri())).unwrap();
        let err = client.create_contact("tok-1", "+447700900123").await.unwrap_err();
        assert!(matches!(err, OmniError::Create(_)));
        assert!(err.to_string().contains("Failed to parse response"), "got: {err}");
    }

    #[tokio::test]
    async fn get_template_uses_template_path() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/template/T1"))
            .and(header("Authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "templateText": "Welcome {{1}}"
            })))
            .mount(&server)
            .await;

        let client = OmniClient::new(&test_config(&server.uri())).unwrap();
        let template = client.get_template("tok-1", "T1").await.unwrap();
        assert_eq!(template.template_text, "Welcome {{1}}");
    }

    #[tokio::test]
    async fn send_broadcast_failure_maps_to_broadcast_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/broadcast"))
            .respond_with(ResponseTemplate::new(500).set_body_string("queue down"))
            .mount(&server)
            .await;

        let client = OmniClient::new(&test_config(&server.uri())).unwrap();
        let err = client.send_broadcast("tok-1", "C1", "hi").await.unwrap_err();
        assert!(matches!(err, OmniError::Broadcast(_)));
    }
}
