//! Webhook server for Twilio voice calls
//!
//! Every call is answered with an immediate hang-up. The OmniChat workflow
//! runs on a spawned task so the response never waits on the platform.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::{Result, VoiceError};
use crate::signature::{SIGNATURE_HEADER, SignatureValidator};
use crate::twiml;
use crate::types::CallEvent;
use crate::workflow::CallHandler;

/// Path Twilio posts voice webhooks to
pub const VOICE_WEBHOOK_PATH: &str = "/twilio/voice";

/// How long shutdown waits for in-flight call workflows
pub const WORKFLOW_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Webhook server state
#[derive(Clone)]
pub struct WebhookState {
    pub handler: Arc<dyn CallHandler>,
    /// `None` when signature validation is disabled
    pub validator: Option<SignatureValidator>,
    /// Call workflows spawned by the webhook
    pub workflows: TaskTracker,
}

impl WebhookState {
    pub fn new(handler: Arc<dyn CallHandler>, validator: Option<SignatureValidator>) -> Self {
        Self {
            handler,
            validator,
            workflows: TaskTracker::new(),
        }
    }
}

/// Create webhook router
pub fn create_router(state: WebhookState) -> Router {
    Router::new()
        .route("/", get(health))
        .route(VOICE_WEBHOOK_PATH, post(handle_voice))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn health() -> &'static str {
    "OK"
}

/// Handle an incoming voice call
async fn handle_voice(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(validator) = &state.validator {
        if !has_valid_signature(validator, &headers, &body) {
            warn!("Rejecting voice webhook with missing or invalid signature");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    let event = CallEvent::from_form(&body).unwrap_or_else(|e| {
        warn!("Failed to parse voice webhook body: {}", e);
        CallEvent::default()
    });

    match event.caller() {
        Some(caller) => {
            info!(
                phone = %caller,
                call_sid = event.call_sid.as_deref().unwrap_or("-"),
                "Incoming call"
            );

            // Yield once so the hang-up is written before any remote call.
            // The response never waits on the workflow either way.
            let handler = Arc::clone(&state.handler);
            let phone_number = caller.to_string();
            state.workflows.spawn(async move {
                tokio::task::yield_now().await;
                handler.handle_call(phone_number).await
            });
        }
        None => {
            warn!(
                call_sid = event.call_sid.as_deref().unwrap_or("-"),
                "Incoming call without caller number, nothing to send"
            );
        }
    }

    twiml::hangup()
}

fn has_valid_signature(validator: &SignatureValidator, headers: &HeaderMap, body: &[u8]) -> bool {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        debug!("Missing {} header", SIGNATURE_HEADER);
        return false;
    };

    match serde_urlencoded::from_bytes::<Vec<(String, String)>>(body) {
        Ok(params) => validator.verify(&params, signature),
        Err(e) => {
            debug!("Unparseable webhook body: {}", e);
            false
        }
    }
}

/// Wait up to `timeout` for spawned workflows; `false` if some are still
/// running. No new workflows are accepted afterwards.
pub async fn drain_workflows(workflows: &TaskTracker, timeout: Duration) -> bool {
    workflows.close();

    if workflows.is_empty() {
        return true;
    }

    info!("Waiting for {} in-flight call workflow(s)", workflows.len());
    match tokio::time::timeout(timeout, workflows.wait()).await {
        Ok(()) => true,
        Err(_) => {
            warn!(
                "Abandoning {} call workflow(s) still running after {:?}",
                workflows.len(),
                timeout
            );
            false
        }
    }
}

/// Start the webhook server and serve until `shutdown` resolves, then
/// drain in-flight workflows
pub async fn start_server<F>(state: WebhookState, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let workflows = state.workflows.clone();
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| VoiceError::Server(format!("Failed to bind {}: {}", addr, e)))?;

    info!("Voice webhook server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| VoiceError::Server(e.to_string()))?;

    drain_workflows(&workflows, WORKFLOW_DRAIN_TIMEOUT).await;

    Ok(())
}
