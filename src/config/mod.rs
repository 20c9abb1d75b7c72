// ABOUTME: Server configuration loaded from environment variables and CLI overrides
// ABOUTME: Defines ServerConfig, the env contract, and validation with invalid-config errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

//! # Configuration
//!
//! Environment-only configuration in the same spirit as the rest of the
//! workspace: every knob has a default, invalid values fail fast with
//! [`ConfigError`], and the server binary maps that failure to exit code 2.

use crate::trust::TrustLevel;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default discovery cache TTL in seconds
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default per-call tool deadline in seconds
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// Default HTTP transport port
pub const DEFAULT_HTTP_PORT: u16 = 8765;

/// Grace window for draining in-flight dispatches at shutdown
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Invalid configuration error; maps to process exit code 2.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that does not parse
    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        /// Environment variable name
        var: &'static str,
        /// Offending value
        value: String,
        /// Parse failure description
        reason: String,
    },
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server identity name reported in `initialize`
    pub server_name: String,
    /// Discovery cache TTL
    pub cache_ttl: Duration,
    /// Initial trust level for new sessions
    pub default_trust_level: TrustLevel,
    /// Default per-call tool deadline
    pub tool_timeout: Duration,
    /// HTTP transport port
    pub http_port: u16,
    /// Perform an eager discovery scan before serving
    pub warm_up: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: "codomyrmex-mcp-server".to_owned(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            default_trust_level: TrustLevel::Standard,
            tool_timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
            http_port: DEFAULT_HTTP_PORT,
            warm_up: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cache_ttl_secs = parse_env_var("CODOMYRMEX_MCP_CACHE_TTL", DEFAULT_CACHE_TTL_SECS)?;
        let tool_timeout_secs =
            parse_env_var("CODOMYRMEX_TOOL_TIMEOUT_SECS", DEFAULT_TOOL_TIMEOUT_SECS)?;
        let http_port = parse_env_var("HTTP_PORT", DEFAULT_HTTP_PORT)?;

        let default_trust_level = match env::var("CODOMYRMEX_TRUST_DEFAULT_LEVEL") {
            Ok(raw) => raw
                .parse::<TrustLevel>()
                .map_err(|reason| ConfigError::InvalidValue {
                    var: "CODOMYRMEX_TRUST_DEFAULT_LEVEL",
                    value: raw,
                    reason,
                })?,
            Err(_) => TrustLevel::Standard,
        };

        Ok(Self {
            server_name: env::var("SERVER_NAME")
                .unwrap_or_else(|_| "codomyrmex-mcp-server".to_owned()),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            default_trust_level,
            tool_timeout: Duration::from_secs(tool_timeout_secs),
            http_port,
            warm_up: true,
        })
    }

    /// One-line startup summary for the boot log.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "server={} http_port={} cache_ttl={}s tool_timeout={}s trust_default={} warm_up={}",
            self.server_name,
            self.http_port,
            self.cache_ttl.as_secs(),
            self.tool_timeout.as_secs(),
            self.default_trust_level,
            self.warm_up,
        )
    }
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_var<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) => raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
            var,
            value: raw,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
