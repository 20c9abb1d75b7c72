// ABOUTME: Tests for the environment configuration contract
// ABOUTME: Serialised because they mutate process environment variables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use codomyrmex_mcp_server::config::{ServerConfig, DEFAULT_CACHE_TTL_SECS, DEFAULT_TOOL_TIMEOUT_SECS};
use codomyrmex_mcp_server::trust::TrustLevel;
use serial_test::serial;
use std::env;
use std::time::Duration;

fn clear_env() {
    env::remove_var("CODOMYRMEX_MCP_CACHE_TTL");
    env::remove_var("CODOMYRMEX_TRUST_DEFAULT_LEVEL");
    env::remove_var("CODOMYRMEX_TOOL_TIMEOUT_SECS");
    env::remove_var("HTTP_PORT");
    env::remove_var("SERVER_NAME");
}

#[test]
#[serial]
fn defaults_when_environment_is_empty() {
    clear_env();
    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.cache_ttl, Duration::from_secs(DEFAULT_CACHE_TTL_SECS));
    assert_eq!(
        config.tool_timeout,
        Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS)
    );
    assert_eq!(config.default_trust_level, TrustLevel::Standard);
    assert_eq!(config.server_name, "codomyrmex-mcp-server");
    assert!(config.warm_up);
}

#[test]
#[serial]
fn env_values_override_defaults() {
    clear_env();
    env::set_var("CODOMYRMEX_MCP_CACHE_TTL", "120");
    env::set_var("CODOMYRMEX_TRUST_DEFAULT_LEVEL", "elevated");
    env::set_var("HTTP_PORT", "9000");

    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.cache_ttl, Duration::from_secs(120));
    assert_eq!(config.default_trust_level, TrustLevel::Elevated);
    assert_eq!(config.http_port, 9000);
    clear_env();
}

#[test]
#[serial]
fn invalid_ttl_is_a_config_error() {
    clear_env();
    env::set_var("CODOMYRMEX_MCP_CACHE_TTL", "five minutes");
    let err = ServerConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("CODOMYRMEX_MCP_CACHE_TTL"));
    clear_env();
}

#[test]
#[serial]
fn invalid_trust_level_is_a_config_error() {
    clear_env();
    env::set_var("CODOMYRMEX_TRUST_DEFAULT_LEVEL", "sudo");
    let err = ServerConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("CODOMYRMEX_TRUST_DEFAULT_LEVEL"));
    clear_env();
}

#[test]
#[serial]
fn summary_mentions_the_knobs() {
    clear_env();
    let config = ServerConfig::from_env().unwrap();
    let summary = config.summary();
    assert!(summary.contains("cache_ttl=300s"));
    assert!(summary.contains("trust_default=STANDARD"));
}
