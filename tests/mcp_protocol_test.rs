// ABOUTME: Tests for the MCP protocol surface: initialize, listing, calls, resources, prompts
// ABOUTME: Drives the request processor the way a transport does, frame in and frame out
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use codomyrmex_mcp_server::jsonrpc::{error_codes, JsonRpcRequest, JsonRpcResponse};
use codomyrmex_mcp_server::mcp::request_processor::McpRequestProcessor;
use serde_json::{json, Value};

fn processor(
    res: &std::sync::Arc<codomyrmex_mcp_server::mcp::resources::ServerResources>,
) -> McpRequestProcessor {
    McpRequestProcessor::new(std::sync::Arc::clone(res), "test-session")
}

async fn roundtrip(proc_: &McpRequestProcessor, method: &str, params: Value) -> JsonRpcResponse {
    proc_
        .handle_request(JsonRpcRequest::new(method, Some(params)))
        .await
        .unwrap()
}

#[tokio::test]
async fn initialize_negotiates_supported_version() {
    let res = common::server_resources();
    let response = roundtrip(
        &processor(&res),
        "initialize",
        json!({
            "protocolVersion": "2025-06-18",
            "clientInfo": {"name": "test-client", "version": "1.0"},
            "capabilities": {},
        }),
    )
    .await;

    assert!(response.is_success());
    let result = response.result.unwrap();
    assert_eq!(result["protocolVersion"], json!("2025-06-18"));
    assert_eq!(result["serverInfo"]["name"], json!("codomyrmex-test"));
    assert!(result["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn initialize_rejects_unsupported_version() {
    let res = common::server_resources();
    let response = roundtrip(
        &processor(&res),
        "initialize",
        json!({"protocolVersion": "1999-01-01", "capabilities": {}}),
    )
    .await;

    assert!(response.is_error());
    let error = response.error.unwrap();
    assert_eq!(error.code, error_codes::INVALID_PARAMS);
    assert!(error.message.contains("2025-06-18"));
}

#[tokio::test]
async fn ping_returns_empty_object() {
    let res = common::server_resources();
    let response = roundtrip(&processor(&res), "ping", json!({})).await;
    assert_eq!(response.result.unwrap(), json!({}));
}

#[tokio::test]
async fn cold_start_lists_static_and_discovered_tools() {
    // Warm-up enabled: first list must already include everything, with one
    // scan recorded and zero cache hits from the client's perspective.
    let res = common::server_resources();
    res.warm_up().await;

    let response = roundtrip(&processor(&res), "tools/list", json!({})).await;
    let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();

    assert!(tools.len() >= res.registry.static_count());
    let names: Vec<&str> = tools
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert!(names.contains(&"codomyrmex.read_file"));
    assert!(names.contains(&"codomyrmex.call_module_function"));
    assert!(names.contains(&"codomyrmex.obsidian.read_note"));
    assert!(tools.iter().all(|t| t["inputSchema"].is_object()));

    let metrics = res.discovery.metrics_value();
    assert_eq!(metrics["cache_hits"], json!(1)); // the tools/list access itself
    assert!(metrics["modules_scanned"].as_u64().unwrap() >= 3);
}

#[tokio::test]
async fn tools_call_unknown_tool_wire_shape() {
    let res = common::server_resources();
    let response = roundtrip(
        &processor(&res),
        "tools/call",
        json!({"name": "codomyrmex.nonexistent", "arguments": {}}),
    )
    .await;

    // The dispatcher's envelope rides inside the JSON-RPC result.
    assert!(response.is_success());
    let result = response.result.unwrap();
    assert_eq!(result["error"]["code"], json!("UNKNOWN_TOOL"));
    assert_eq!(result["error"]["tool_name"], json!("codomyrmex.nonexistent"));
}

#[tokio::test]
async fn tools_call_executes_handler() {
    let res = common::server_resources();
    let response = roundtrip(
        &processor(&res),
        "tools/call",
        json!({"name": "codomyrmex.pai_status", "arguments": {}}),
    )
    .await;
    let result = response.result.unwrap();
    assert_eq!(result["status"], json!("ok"));
}

#[tokio::test]
async fn tools_call_missing_name_is_invalid_params() {
    let res = common::server_resources();
    let response = roundtrip(&processor(&res), "tools/call", json!({"arguments": {}})).await;
    assert_eq!(response.error.unwrap().code, error_codes::INVALID_PARAMS);
}

#[tokio::test]
async fn resources_list_includes_builtins() {
    let res = common::server_resources();
    let response = roundtrip(&processor(&res), "resources/list", json!({})).await;
    let listing = response.result.unwrap()["resources"].as_array().unwrap().clone();
    let uris: Vec<&str> = listing.iter().filter_map(|r| r["uri"].as_str()).collect();
    assert!(uris.contains(&"codomyrmex://modules"));
    assert!(uris.contains(&"codomyrmex://discovery/metrics"));
    assert!(uris.contains(&"codomyrmex://status"));
}

#[tokio::test]
async fn resources_read_module_inventory() {
    let res = common::server_resources();
    let response = roundtrip(
        &processor(&res),
        "resources/read",
        json!({"uri": "codomyrmex://modules"}),
    )
    .await;
    let contents = response.result.unwrap()["contents"][0].clone();
    assert_eq!(contents["mimeType"], json!("application/json"));
    let body: Value = serde_json::from_str(contents["text"].as_str().unwrap()).unwrap();
    let modules = body["modules"].as_array().unwrap();
    assert_eq!(modules.len(), res.namespace.len());
}

#[tokio::test]
async fn resources_read_discovery_metrics() {
    let res = common::server_resources();
    res.warm_up().await;
    let response = roundtrip(
        &processor(&res),
        "resources/read",
        json!({"uri": "codomyrmex://discovery/metrics"}),
    )
    .await;
    let contents = response.result.unwrap()["contents"][0].clone();
    let body: Value = serde_json::from_str(contents["text"].as_str().unwrap()).unwrap();
    assert!(body["total_tools"].as_u64().unwrap() > 0);
    assert!(body["last_scan_time"].is_string());
    assert!(body["failed_modules"].as_array().unwrap().iter().any(|f| {
        f["module"] == json!("codomyrmex.schedule")
    }));
}

#[tokio::test]
async fn resources_read_unknown_uri() {
    let res = common::server_resources();
    let response = roundtrip(
        &processor(&res),
        "resources/read",
        json!({"uri": "codomyrmex://nope"}),
    )
    .await;
    assert_eq!(response.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn prompts_list_and_get() {
    let res = common::server_resources();
    let response = roundtrip(&processor(&res), "prompts/list", json!({})).await;
    let prompts = response.result.unwrap()["prompts"].as_array().unwrap().clone();
    assert_eq!(prompts.len(), 3);

    let response = roundtrip(
        &processor(&res),
        "prompts/get",
        json!({"name": "codomyrmex.analyze_module", "arguments": {"module_name": "security"}}),
    )
    .await;
    let text = response.result.unwrap()["messages"][0]["content"]["text"]
        .as_str()
        .unwrap()
        .to_owned();
    assert!(text.contains("'security'"));
    assert!(!text.contains("{module_name}"));
}

#[tokio::test]
async fn prompts_get_missing_required_argument() {
    let res = common::server_resources();
    let response = roundtrip(
        &processor(&res),
        "prompts/get",
        json!({"name": "codomyrmex.analyze_module", "arguments": {}}),
    )
    .await;
    let error = response.error.unwrap();
    assert_eq!(error.code, error_codes::INVALID_PARAMS);
    assert_eq!(error.data.unwrap()["code"], json!("VALIDATION_ERROR"));
}

#[tokio::test]
async fn unknown_method_is_method_not_found() {
    let res = common::server_resources();
    let response = roundtrip(&processor(&res), "tools/destroy", json!({})).await;
    assert_eq!(response.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn wrong_jsonrpc_version_rejected() {
    let res = common::server_resources();
    let mut request = JsonRpcRequest::new("ping", None);
    request.jsonrpc = "1.0".to_owned();
    let response = processor(&res).handle_request(request).await.unwrap();
    assert_eq!(response.error.unwrap().code, error_codes::INVALID_REQUEST);
}

#[tokio::test]
async fn notifications_produce_no_response() {
    let res = common::server_resources();
    let request = JsonRpcRequest::notification("notifications/cancelled", None);
    assert!(processor(&res).handle_request(request).await.is_none());
}

#[tokio::test]
async fn every_registered_schema_is_a_valid_object_schema() {
    let res = common::server_resources();
    res.warm_up().await;

    for tool in res.registry.list_tools() {
        let schema = &tool.parameter_schema;
        assert_eq!(
            schema["type"],
            json!("object"),
            "{} schema must be an object schema",
            tool.name
        );
        assert!(
            schema["properties"].is_object(),
            "{} schema must declare properties",
            tool.name
        );

        // Schemas without required fields must accept empty arguments, with
        // defaults materialised.
        let has_required = schema
            .get("required")
            .and_then(Value::as_array)
            .is_some_and(|r| !r.is_empty());
        if !has_required {
            let validated =
                codomyrmex_mcp_server::validation::validate_arguments(schema, json!({}));
            assert!(validated.is_ok(), "{} rejects its own defaults", tool.name);
        }
    }
}
