// ABOUTME: HTTP transport shell: one JSON-RPC request per POST /mcp, health endpoint
// ABOUTME: Axum router with tracing and CORS layers and graceful shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

//! # HTTP Transport
//!
//! `POST /mcp` carries one JSON-RPC request per call. Session affinity comes
//! from the `x-mcp-session` header; requests without it get an ephemeral
//! session at the default trust level. Concurrent requests run without
//! mutual exclusion.

use super::request_processor::McpRequestProcessor;
use super::resources::ServerResources;
use super::server_lifecycle::InFlight;
use crate::jsonrpc::JsonRpcRequest;
use anyhow::Result;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use uuid::Uuid;

/// Session affinity header for HTTP clients.
const SESSION_HEADER: &str = "x-mcp-session";

#[derive(Clone)]
struct HttpState {
    resources: Arc<ServerResources>,
    in_flight: InFlight,
}

/// Build the HTTP router.
#[must_use]
pub fn router(resources: Arc<ServerResources>, in_flight: InFlight) -> Router {
    let state = HttpState {
        resources,
        in_flight,
    };
    Router::new()
        .route("/mcp", post(handle_mcp))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve HTTP until the shutdown signal fires.
///
/// # Errors
/// Returns an error if the listener cannot bind.
pub async fn serve(
    resources: Arc<ServerResources>,
    in_flight: InFlight,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let app = router(resources, in_flight);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!(port, "MCP HTTP transport ready");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;
    Ok(())
}

async fn handle_mcp(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let _guard = state.in_flight.begin();

    // Header-based session affinity; one POST without it is its own session.
    let (session_id, ephemeral) = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or_else(
            || (format!("http-{}", Uuid::new_v4()), true),
            |id| (id.to_owned(), false),
        );

    // Trust context exists for the lifetime of the session, not just for
    // tool calls.
    state.resources.session(&session_id);

    let processor = McpRequestProcessor::new(Arc::clone(&state.resources), session_id.clone());
    let response = processor.handle_request(request).await;

    if ephemeral {
        state.resources.drop_session(&session_id);
    }

    match response {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        // Notifications have no response body.
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn handle_health(State(state): State<HttpState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "tools": state.resources.registry.tool_count(),
        "in_flight": state.in_flight.count(),
    }))
}
