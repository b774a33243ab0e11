//! Scan-decide-forward pipeline and proxied endpoint handlers.
//!
//! Each handler runs the same request lifecycle: derive the scan text from
//! the validated payload, scan it, persist an incident, then either reject
//! with a structured safety-violation response or forward the unmodified
//! body to the resolved backend and relay its response.

use crate::forward::Forwarder;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use promptgate_core::{
    AggregateScanResult, Direction, GatewayConfig, GatewayError, IncidentStore, NewIncident,
    ScanAction,
};
use promptgate_detectors::Scanner;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Shared state threaded through axum handlers via [`State`].
///
/// Constructed once at startup; the scanner's detector registry is
/// immutable, so the whole state is safe for unlimited concurrent readers.
pub struct AppState {
    /// Gateway configuration.
    pub config: GatewayConfig,
    /// Detector registry and aggregation policy.
    pub scanner: Scanner,
    /// Incident store for audit records.
    pub incidents: Arc<dyn IncidentStore>,
    /// Outbound HTTP client for the backends.
    pub forwarder: Forwarder,
}

// ---------------------------------------------------------------------------
// Request payload types
// ---------------------------------------------------------------------------

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// OpenAI-style chat completion request.
///
/// Fields the gateway does not inspect (temperature, max_tokens, ...) are
/// captured in `extra` and forwarded untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Ollama-style single-prompt generate request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub stream: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Ollama-style chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Pipeline outcome types
// ---------------------------------------------------------------------------

/// Terminal non-forwarded outcomes of the pipeline.
#[derive(Debug)]
pub enum PipelineRejection {
    /// The scan decided to block; carries the evidence for the caller.
    Blocked {
        threats: Vec<String>,
        risk_score: f64,
    },
    /// The incident could not be persisted; the request is not forwarded.
    Persistence(String),
    /// The backend call failed after the incident was recorded.
    Upstream(String),
}

impl IntoResponse for PipelineRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Blocked {
                threats,
                risk_score,
            } => (
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({
                    "error": "Safety violation detected",
                    "threats": threats,
                    "risk_score": risk_score,
                })),
            )
                .into_response(),
            Self::Persistence(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Failed to record incident",
                })),
            )
                .into_response(),
            Self::Upstream(_) => (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "error": "Upstream request failed",
                })),
            )
                .into_response(),
        }
    }
}

/// Which backend an allowed request is forwarded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendRoute {
    OpenAiChat,
    OllamaGenerate,
    OllamaChat,
}

impl BackendRoute {
    /// Upstream path for this route.
    fn path(self) -> &'static str {
        match self {
            Self::OpenAiChat => "/chat/completions",
            Self::OllamaGenerate => "/api/generate",
            Self::OllamaChat => "/api/chat",
        }
    }

    /// Request type label recorded in incident metadata.
    fn request_type(self) -> &'static str {
        match self {
            Self::OpenAiChat => "openai",
            Self::OllamaGenerate => "ollama_generate",
            Self::OllamaChat => "ollama_chat",
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Concatenate chat message contents with a single space, in message order,
/// to form the scan text.
fn messages_to_scan_text(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Best-effort caller address from forwarding headers.
fn client_addr(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Inbound `Authorization` header value, if present.
fn inbound_authorization(headers: &HeaderMap) -> Option<&str> {
    headers.get("authorization").and_then(|v| v.to_str().ok())
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the scan → record → branch → forward lifecycle for one request.
///
/// The incident is recorded before any branch on the action, so an audit
/// record exists for every scanned request whether it is blocked, forwarded,
/// or fails upstream. A persistence failure stops the request: an
/// un-recorded request is never forwarded.
async fn run_pipeline(
    state: &AppState,
    route: BackendRoute,
    scan_text: &str,
    model: &str,
    body: serde_json::Value,
    headers: &HeaderMap,
) -> Result<Json<serde_json::Value>, PipelineRejection> {
    // SCANNED
    let scan = state.scanner.scan_text(scan_text);
    info!(
        risk_score = scan.risk_score,
        risk_level = %scan.risk_level,
        action = %scan.action,
        request_type = route.request_type(),
        model,
        "Request scanned"
    );

    // Record the incident unconditionally before branching.
    record_incident(state, route, scan_text, model, &scan, headers).await?;

    // BLOCKED
    if scan.action == ScanAction::Block {
        warn!(
            risk_score = scan.risk_score,
            threat_count = scan.threats.len(),
            "Blocking request"
        );
        return Err(PipelineRejection::Blocked {
            threats: scan.threats,
            risk_score: scan.risk_score,
        });
    }

    // FORWARDING
    let response = match route {
        BackendRoute::OpenAiChat => {
            state
                .forwarder
                .forward_openai(
                    &state.config.openai_base_url,
                    route.path(),
                    &body,
                    inbound_authorization(headers),
                    &state.config.openai_api_key,
                )
                .await
        }
        BackendRoute::OllamaGenerate | BackendRoute::OllamaChat => {
            state
                .forwarder
                .forward(
                    &state.config.ollama_base_url,
                    route.path(),
                    reqwest::Method::POST,
                    &body,
                    None,
                )
                .await
        }
    };

    // RESPONDED
    match response {
        Ok(value) => Ok(Json(value)),
        Err(e) => {
            error!(error = %e, "Upstream call failed");
            Err(PipelineRejection::Upstream(e.to_string()))
        }
    }
}

/// Persist the incident for a scanned request.
async fn record_incident(
    state: &AppState,
    route: BackendRoute,
    scan_text: &str,
    model: &str,
    scan: &AggregateScanResult,
    headers: &HeaderMap,
) -> Result<(), PipelineRejection> {
    let mut incident = NewIncident::from_scan(
        Direction::Inbound,
        scan_text,
        scan,
        Some(serde_json::json!({
            "model": model,
            "type": route.request_type(),
        })),
    );
    if let Some(addr) = client_addr(headers) {
        incident = incident.with_source_ip(addr);
    }

    match state.incidents.record(&incident).await {
        Ok(stored) => {
            info!(incident_id = stored.id, "Incident recorded");
            Ok(())
        }
        Err(GatewayError::Storage(msg)) => {
            error!(error = %msg, "Failed to record incident, refusing to forward");
            Err(PipelineRejection::Persistence(msg))
        }
        Err(e) => {
            error!(error = %e, "Failed to record incident, refusing to forward");
            Err(PipelineRejection::Persistence(e.to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `POST /v1/chat/completions` — proxy to the cloud chat backend.
pub async fn openai_chat_proxy(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Json<serde_json::Value>, PipelineRejection> {
    let scan_text = messages_to_scan_text(&request.messages);
    let model = request.model.clone();
    let body = serde_json::to_value(&request)
        .map_err(|e| PipelineRejection::Upstream(e.to_string()))?;
    run_pipeline(
        &state,
        BackendRoute::OpenAiChat,
        &scan_text,
        &model,
        body,
        &headers,
    )
    .await
}

/// `POST /api/generate` — proxy to the local generation backend.
pub async fn ollama_generate_proxy(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<serde_json::Value>, PipelineRejection> {
    let scan_text = request.prompt.clone();
    let model = request.model.clone();
    let body = serde_json::to_value(&request)
        .map_err(|e| PipelineRejection::Upstream(e.to_string()))?;
    run_pipeline(
        &state,
        BackendRoute::OllamaGenerate,
        &scan_text,
        &model,
        body,
        &headers,
    )
    .await
}

/// `POST /api/chat` — proxy to the local chat backend.
pub async fn ollama_chat_proxy(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<serde_json::Value>, PipelineRejection> {
    let scan_text = messages_to_scan_text(&request.messages);
    let model = request.model.clone();
    let body = serde_json::to_value(&request)
        .map_err(|e| PipelineRejection::Upstream(e.to_string()))?;
    run_pipeline(
        &state,
        BackendRoute::OllamaChat,
        &scan_text,
        &model,
        body,
        &headers,
    )
    .await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
