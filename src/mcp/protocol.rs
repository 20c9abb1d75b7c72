// ABOUTME: MCP protocol message handlers for core protocol operations
// ABOUTME: Handles initialize, ping, tools/list, resources, and prompts protocol messages
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

//! # MCP Protocol Handlers
//!
//! Core protocol message handling: initialization with version negotiation,
//! tool listing, resource reads, and prompt rendering. Tool calls go through
//! the dispatcher instead (see the request processor).

use super::resources::ServerResources;
use crate::jsonrpc::{error_codes, JsonRpcRequest, JsonRpcResponse};
use crate::prompts::render_prompt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;

/// MCP protocol handlers
pub struct ProtocolHandler;

/// Default id for responses to requests that did not carry one.
fn default_request_id() -> Value {
    Value::Number(serde_json::Number::from(0))
}

/// Initialize request parameters from the client.
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeRequest {
    /// Client's requested protocol version
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Client identity
    #[serde(rename = "clientInfo", default)]
    pub client_info: Option<ClientInfo>,
}

/// Client identity block.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    /// Client name
    pub name: String,
    /// Client version
    #[serde(default)]
    pub version: String,
}

/// Initialize response payload.
#[derive(Debug, Clone, Serialize)]
pub struct InitializeResponse {
    /// Negotiated protocol version
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Server identity
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
    /// Server capabilities
    pub capabilities: Value,
}

/// Server identity block.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name
    pub name: String,
    /// Server version
    pub version: String,
}

impl ProtocolHandler {
    /// Supported MCP protocol versions (in preference order)
    const SUPPORTED_VERSIONS: &'static [&'static str] = &["2025-06-18", "2024-11-05"];

    /// Handle initialize request with protocol version negotiation.
    #[must_use]
    pub fn handle_initialize(
        request: &JsonRpcRequest,
        resources: &Arc<ServerResources>,
    ) -> JsonRpcResponse {
        let request_id = request.id.clone().unwrap_or_else(default_request_id);

        let Some(init_request) = request
            .params
            .as_ref()
            .and_then(|params| serde_json::from_value::<InitializeRequest>(params.clone()).ok())
        else {
            return JsonRpcResponse::error(
                Some(request_id),
                error_codes::INVALID_PARAMS,
                "Invalid initialize request parameters",
            );
        };

        let client_version = &init_request.protocol_version;
        if !Self::SUPPORTED_VERSIONS.contains(&client_version.as_str()) {
            let supported = Self::SUPPORTED_VERSIONS.join(", ");
            return JsonRpcResponse::error(
                Some(request_id),
                error_codes::INVALID_PARAMS,
                format!(
                    "Unsupported protocol version {client_version}; server supports: {supported}"
                ),
            );
        }

        info!(
            version = %client_version,
            client = ?init_request.client_info.as_ref().map(|c| c.name.clone()),
            "MCP version negotiated"
        );

        let response = InitializeResponse {
            protocol_version: client_version.clone(),
            server_info: ServerInfo {
                name: resources.config.server_name.clone(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
            },
            capabilities: json!({
                "tools": { "listChanged": false },
                "resources": { "listChanged": false },
                "prompts": { "listChanged": false },
                "logging": {},
            }),
        };

        match serde_json::to_value(&response) {
            Ok(result) => JsonRpcResponse::success(Some(request_id), result),
            Err(e) => JsonRpcResponse::error(
                Some(request_id),
                error_codes::INTERNAL_ERROR,
                format!("Failed to serialize initialize response: {e}"),
            ),
        }
    }

    /// Handle ping request.
    #[must_use]
    pub fn handle_ping(request: &JsonRpcRequest) -> JsonRpcResponse {
        let request_id = request.id.clone().unwrap_or_else(default_request_id);
        JsonRpcResponse::success(Some(request_id), json!({}))
    }

    /// Handle tools/list: every visible descriptor's wire schema.
    #[must_use]
    pub fn handle_tools_list(
        request: &JsonRpcRequest,
        resources: &Arc<ServerResources>,
    ) -> JsonRpcResponse {
        let request_id = request.id.clone().unwrap_or_else(default_request_id);
        let tools: Vec<Value> = resources
            .registry
            .list_tools()
            .iter()
            .map(|d| d.wire_schema())
            .collect();
        JsonRpcResponse::success(Some(request_id), json!({ "tools": tools }))
    }

    /// Handle resources/list.
    #[must_use]
    pub fn handle_resources_list(
        request: &JsonRpcRequest,
        resources: &Arc<ServerResources>,
    ) -> JsonRpcResponse {
        let request_id = request.id.clone().unwrap_or_else(default_request_id);
        let listing: Vec<Value> = resources
            .registry
            .list_resources()
            .iter()
            .map(|r| {
                json!({
                    "uri": r.uri,
                    "name": r.name,
                    "description": r.description,
                    "mimeType": r.mime_type,
                })
            })
            .collect();
        JsonRpcResponse::success(Some(request_id), json!({ "resources": listing }))
    }

    /// Handle resources/read: run the content provider and wrap the JSON.
    pub async fn handle_resources_read(
        request: &JsonRpcRequest,
        resources: &Arc<ServerResources>,
    ) -> JsonRpcResponse {
        let request_id = request.id.clone().unwrap_or_else(default_request_id);

        let Some(uri) = request
            .params
            .as_ref()
            .and_then(|p| p.get("uri"))
            .and_then(Value::as_str)
        else {
            return JsonRpcResponse::error(
                Some(request_id),
                error_codes::INVALID_PARAMS,
                "Missing uri parameter",
            );
        };

        let Some(descriptor) = resources.registry.lookup_resource(uri) else {
            return JsonRpcResponse::error(
                Some(request_id),
                error_codes::METHOD_NOT_FOUND,
                format!("Unknown resource URI: {uri}"),
            );
        };

        let Some(provider) = descriptor.provider else {
            return JsonRpcResponse::error(
                Some(request_id),
                error_codes::INTERNAL_ERROR,
                format!("Resource {uri} has no content provider"),
            );
        };

        match provider().await {
            Ok(content) => {
                let text = serde_json::to_string_pretty(&content)
                    .unwrap_or_else(|_| "{}".to_owned());
                JsonRpcResponse::success(
                    Some(request_id),
                    json!({
                        "contents": [{
                            "uri": descriptor.uri,
                            "mimeType": descriptor.mime_type,
                            "text": text,
                        }]
                    }),
                )
            }
            Err(e) => JsonRpcResponse::error(
                Some(request_id),
                error_codes::INTERNAL_ERROR,
                format!("Resource read failed: {e}"),
            ),
        }
    }

    /// Handle prompts/list.
    #[must_use]
    pub fn handle_prompts_list(
        request: &JsonRpcRequest,
        resources: &Arc<ServerResources>,
    ) -> JsonRpcResponse {
        let request_id = request.id.clone().unwrap_or_else(default_request_id);
        let prompts: Vec<Value> = resources
            .registry
            .list_prompts()
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "description": p.description,
                    "arguments": p.arguments,
                })
            })
            .collect();
        JsonRpcResponse::success(Some(request_id), json!({ "prompts": prompts }))
    }

    /// Handle prompts/get: render the template with the call arguments.
    #[must_use]
    pub fn handle_prompts_get(
        request: &JsonRpcRequest,
        resources: &Arc<ServerResources>,
    ) -> JsonRpcResponse {
        let request_id = request.id.clone().unwrap_or_else(default_request_id);

        let Some(name) = request
            .params
            .as_ref()
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
        else {
            return JsonRpcResponse::error(
                Some(request_id),
                error_codes::INVALID_PARAMS,
                "Missing name parameter",
            );
        };

        let Some(descriptor) = resources.registry.lookup_prompt(name) else {
            return JsonRpcResponse::error(
                Some(request_id),
                error_codes::METHOD_NOT_FOUND,
                format!("Unknown prompt: {name}"),
            );
        };

        let arguments: Map<String, Value> = request
            .params
            .as_ref()
            .and_then(|p| p.get("arguments"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        match render_prompt(&descriptor, &arguments) {
            Ok(rendered) => JsonRpcResponse::success(
                Some(request_id),
                json!({
                    "description": descriptor.description,
                    "messages": [{
                        "role": "user",
                        "content": { "type": "text", "text": rendered },
                    }],
                }),
            ),
            Err(envelope) => JsonRpcResponse::error_with_data(
                Some(request_id),
                error_codes::INVALID_PARAMS,
                envelope.message.clone(),
                envelope.to_value(),
            ),
        }
    }

    /// Handle unknown method request.
    #[must_use]
    pub fn handle_unknown_method(request: &JsonRpcRequest) -> JsonRpcResponse {
        let request_id = request.id.clone().unwrap_or_else(default_request_id);
        JsonRpcResponse::error(
            Some(request_id),
            error_codes::METHOD_NOT_FOUND,
            format!("Unknown method: {}", request.method),
        )
    }
}
