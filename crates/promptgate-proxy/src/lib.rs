//! PromptGate reverse proxy
//!
//! An HTTP gateway that sits in front of LLM backends, scans every inbound
//! request with a set of content detectors, records an audit incident, and
//! either forwards the request upstream or rejects it with a structured
//! safety-violation response.

pub mod api;
pub mod config;
pub mod forward;
pub mod proxy;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub use forward::Forwarder;
pub use proxy::AppState;

/// Build the axum [`Router`] with all gateway routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health_handler))
        .route("/api/incidents", get(api::list_incidents))
        .route("/v1/chat/completions", post(proxy::openai_chat_proxy))
        .route("/api/generate", post(proxy::ollama_generate_proxy))
        .route("/api/chat", post(proxy::ollama_chat_proxy))
        .with_state(state)
}
