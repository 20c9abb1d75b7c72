// ABOUTME: Shared fixtures for integration tests
// ABOUTME: Builds test server resources and canned confirmation providers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

#![allow(dead_code)]

use async_trait::async_trait;
use codomyrmex_mcp_server::config::ServerConfig;
use codomyrmex_mcp_server::mcp::resources::ServerResources;
use codomyrmex_mcp_server::trust::{ConfirmationProvider, TrustLevel};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Config with a short tool deadline and warm-up disabled; tests trigger
/// discovery explicitly.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        server_name: "codomyrmex-test".to_owned(),
        cache_ttl: Duration::from_secs(300),
        default_trust_level: TrustLevel::Standard,
        tool_timeout: Duration::from_secs(5),
        http_port: 0,
        warm_up: false,
    }
}

/// Fresh server resources per test; never the process-wide singleton.
pub fn server_resources() -> Arc<ServerResources> {
    ServerResources::new(test_config())
}

/// Confirmation provider that approves everything.
pub struct ApproveAll;

#[async_trait]
impl ConfirmationProvider for ApproveAll {
    async fn confirm(&self, _tool_name: &str, _arguments: &Value) -> bool {
        true
    }
}

/// Confirmation provider that refuses everything.
pub struct DenyAll;

#[async_trait]
impl ConfirmationProvider for DenyAll {
    async fn confirm(&self, _tool_name: &str, _arguments: &Value) -> bool {
        false
    }
}
