// ABOUTME: MCP request processing: validation, method routing, and tool-call execution
// ABOUTME: Routes protocol methods to handlers and tools/call into the dispatcher
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

//! # MCP Request Processor
//!
//! Validates inbound JSON-RPC frames and routes them: protocol methods to
//! [`ProtocolHandler`], `tools/call` into the dispatcher with the session's
//! trust context. Notifications produce no response.

use super::protocol::ProtocolHandler;
use super::resources::ServerResources;
use crate::jsonrpc::{error_codes, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Processes MCP protocol requests for one session.
pub struct McpRequestProcessor {
    resources: Arc<ServerResources>,
    session_id: String,
}

impl McpRequestProcessor {
    /// Create a processor bound to a session.
    #[must_use]
    pub fn new(resources: Arc<ServerResources>, session_id: impl Into<String>) -> Self {
        Self {
            resources,
            session_id: session_id.into(),
        }
    }

    /// Handle one request. Returns `None` for notifications.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let started = Instant::now();
        debug!(
            method = %request.method,
            id = ?request.id,
            session_id = %self.session_id,
            "received MCP request"
        );

        if request.method.starts_with("notifications/") {
            debug!(method = %request.method, "notification received");
            return None;
        }

        let response = self.process_request(&request).await;

        debug!(
            method = %request.method,
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(0),
            "completed MCP request"
        );
        Some(response)
    }

    async fn process_request(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        if let Err(response) = Self::validate_request(request) {
            return response;
        }

        match request.method.as_str() {
            "initialize" => ProtocolHandler::handle_initialize(request, &self.resources),
            "ping" => ProtocolHandler::handle_ping(request),
            "tools/list" => {
                // Listing is a registry access: it triggers lazy discovery
                // the same way a call does.
                self.resources.discovery.ensure_fresh().await;
                ProtocolHandler::handle_tools_list(request, &self.resources)
            }
            "tools/call" => self.handle_tools_call(request).await,
            "resources/list" => ProtocolHandler::handle_resources_list(request, &self.resources),
            "resources/read" => {
                ProtocolHandler::handle_resources_read(request, &self.resources).await
            }
            "prompts/list" => ProtocolHandler::handle_prompts_list(request, &self.resources),
            "prompts/get" => ProtocolHandler::handle_prompts_get(request, &self.resources),
            _ => ProtocolHandler::handle_unknown_method(request),
        }
    }

    /// Validate the JSON-RPC frame itself.
    fn validate_request(request: &JsonRpcRequest) -> Result<(), JsonRpcResponse> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Err(JsonRpcResponse::error(
                request.id.clone(),
                error_codes::INVALID_REQUEST,
                format!(
                    "Invalid JSON-RPC version: got {:?}, expected {JSONRPC_VERSION:?}",
                    request.jsonrpc
                ),
            ));
        }
        if request.method.is_empty() {
            return Err(JsonRpcResponse::error(
                request.id.clone(),
                error_codes::INVALID_REQUEST,
                "Missing method",
            ));
        }
        Ok(())
    }

    /// Route a tool call into the dispatcher. The dispatcher never raises;
    /// its result (or error envelope) becomes the JSON-RPC result verbatim.
    async fn handle_tools_call(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let request_id = request.id.clone();

        let Some(params) = &request.params else {
            return JsonRpcResponse::error(
                request_id,
                error_codes::INVALID_PARAMS,
                "Missing parameters for tools/call",
            );
        };
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return JsonRpcResponse::error(
                request_id,
                error_codes::INVALID_PARAMS,
                "Missing tool name",
            );
        };
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let trust = self.resources.session(&self.session_id);
        let result = self
            .resources
            .dispatcher
            .dispatch(name, arguments, &trust)
            .await;

        JsonRpcResponse::success(request_id, result)
    }
}
