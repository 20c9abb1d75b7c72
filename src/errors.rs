// ABOUTME: Closed MCP error taxonomy and the structured envelope returned for failed tool calls
// ABOUTME: Defines error codes, the McpToolError envelope, and construction helpers used by the dispatcher
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

//! # Structured Error Taxonomy
//!
//! Every failed tool invocation produces a [`McpToolError`] envelope carrying
//! a code from the closed [`McpErrorCode`] enum. Envelopes serialise
//! losslessly to JSON and are returned as the tool result under the `error`
//! key; they are never raised over the wire.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// Closed set of protocol-level error codes.
///
/// The set is stable across minor versions; clients may match on the string
/// form exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpErrorCode {
    /// Tool name not present in the registry
    UnknownTool,
    /// Arguments failed schema validation
    ValidationError,
    /// Trust policy refused the call
    AccessDenied,
    /// Handler raised during execution
    ExecutionError,
    /// Per-call deadline exceeded
    Timeout,
    /// Unexpected server fault
    InternalError,
    /// A referenced resource (module, file) does not exist
    NotFound,
    /// Registration collision or state conflict
    Conflict,
}

impl McpErrorCode {
    /// Stable wire representation of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownTool => "UNKNOWN_TOOL",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::ExecutionError => "EXECUTION_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::InternalError => "INTERNAL_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
        }
    }
}

impl fmt::Display for McpErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for McpErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for McpErrorCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "UNKNOWN_TOOL" => Ok(Self::UnknownTool),
            "VALIDATION_ERROR" => Ok(Self::ValidationError),
            "ACCESS_DENIED" => Ok(Self::AccessDenied),
            "EXECUTION_ERROR" => Ok(Self::ExecutionError),
            "TIMEOUT" => Ok(Self::Timeout),
            "INTERNAL_ERROR" => Ok(Self::InternalError),
            "NOT_FOUND" => Ok(Self::NotFound),
            "CONFLICT" => Ok(Self::Conflict),
            _ => Err(serde::de::Error::unknown_variant(&s, &[])),
        }
    }
}

/// Structured failure envelope for a tool invocation.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{code} [{tool_name}]: {message}")]
pub struct McpToolError {
    /// Error code from the closed taxonomy
    pub code: McpErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Name of the tool the call targeted
    pub tool_name: String,
    /// Free-form structured data: validation details, cause chain, hints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl McpToolError {
    /// Create a new envelope with the given code and message.
    #[must_use]
    pub fn new(code: McpErrorCode, tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            tool_name: tool_name.into(),
            details: None,
        }
    }

    /// Attach a structured details object, merging with any existing details.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        match (&mut self.details, details) {
            (Some(Value::Object(existing)), Value::Object(new)) => {
                existing.extend(new);
            }
            (slot, value) => *slot = Some(value),
        }
        self
    }

    /// Set a single key inside `details`.
    #[must_use]
    pub fn with_detail(self, key: &str, value: Value) -> Self {
        self.with_details(json!({ key: value }))
    }

    /// Chain a causing envelope under `details.cause`.
    #[must_use]
    pub fn with_cause(self, cause: &Self) -> Self {
        self.with_detail("cause", cause.to_value())
    }

    /// Record the correlation id of the dispatch that produced this envelope.
    #[must_use]
    pub fn with_correlation_id(self, correlation_id: &str) -> Self {
        self.with_detail("correlation_id", Value::String(correlation_id.to_owned()))
    }

    /// Serialise the envelope to a JSON value. Infallible by construction:
    /// every field is already JSON-native.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            json!({
                "code": McpErrorCode::InternalError.as_str(),
                "message": "error envelope serialization failed",
                "tool_name": self.tool_name,
            })
        })
    }

    /// Package the envelope as a tool result: `{"error": {...}}`.
    #[must_use]
    pub fn into_result(self) -> Value {
        json!({ "error": self.to_value() })
    }
}

/// Tool name not present in the registry.
#[must_use]
pub fn unknown_tool(tool_name: &str) -> McpToolError {
    McpToolError::new(
        McpErrorCode::UnknownTool,
        tool_name,
        format!("Unknown tool: {tool_name:?}"),
    )
}

/// Arguments failed schema validation; `field` names the offending path.
#[must_use]
pub fn validation_error(
    tool_name: &str,
    message: impl Into<String>,
    field: Option<&str>,
) -> McpToolError {
    let err = McpToolError::new(McpErrorCode::ValidationError, tool_name, message);
    match field {
        Some(field) => err.with_detail("field", Value::String(field.to_owned())),
        None => err,
    }
}

/// Handler raised; `module` is the originating module hint.
#[must_use]
pub fn execution_error(
    tool_name: &str,
    cause: &dyn fmt::Display,
    module: Option<&str>,
) -> McpToolError {
    let err = McpToolError::new(McpErrorCode::ExecutionError, tool_name, cause.to_string());
    match module {
        Some(module) => err.with_detail("module", Value::String(module.to_owned())),
        None => err,
    }
}

/// Trust policy refused the call.
#[must_use]
pub fn access_denied(tool_name: &str, reason: impl Into<String>) -> McpToolError {
    McpToolError::new(McpErrorCode::AccessDenied, tool_name, reason)
}

/// Per-call deadline exceeded.
#[must_use]
pub fn timeout(tool_name: &str, deadline_secs: u64) -> McpToolError {
    McpToolError::new(
        McpErrorCode::Timeout,
        tool_name,
        format!("Tool did not complete within {deadline_secs}s deadline"),
    )
    .with_detail("deadline_secs", json!(deadline_secs))
}

/// Unexpected server fault.
#[must_use]
pub fn internal_error(tool_name: &str, message: impl Into<String>) -> McpToolError {
    McpToolError::new(McpErrorCode::InternalError, tool_name, message)
}

/// Fault type for tool handler bodies.
///
/// Handlers return `Result<Value, ToolError>`; the dispatcher maps each
/// variant onto the envelope taxonomy (`NotFound` -> NOT_FOUND,
/// `InvalidInput` -> VALIDATION_ERROR, the rest -> EXECUTION_ERROR).
#[derive(Debug, Error)]
pub enum ToolError {
    /// A referenced file, module, or entity does not exist
    #[error("{0}")]
    NotFound(String),
    /// Argument content is invalid beyond what the schema can express
    #[error("{0}")]
    InvalidInput(String),
    /// The operation itself failed
    #[error("{0}")]
    Execution(String),
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ToolError {
    /// Map the handler fault onto the wire taxonomy.
    #[must_use]
    pub const fn code(&self) -> McpErrorCode {
        match self {
            Self::NotFound(_) => McpErrorCode::NotFound,
            Self::InvalidInput(_) => McpErrorCode::ValidationError,
            Self::Execution(_) | Self::Io(_) | Self::Json(_) => McpErrorCode::ExecutionError,
        }
    }

    /// Wrap the fault into an envelope for the named tool.
    #[must_use]
    pub fn into_envelope(self, tool_name: &str, module: Option<&str>) -> McpToolError {
        let err = McpToolError::new(self.code(), tool_name, self.to_string());
        match module {
            Some(module) => err.with_detail("module", Value::String(module.to_owned())),
            None => err,
        }
    }
}
