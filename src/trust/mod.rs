// ABOUTME: Trust gateway enforcing per-tool trust classes against session trust levels
// ABOUTME: Holds trust contexts, the append-only audit log, confirmation hooks, and call deadlines
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

//! # Trust Gateway
//!
//! Every dispatch passes through the gateway. The policy table:
//!
//! | Tool trust class | Required session level |
//! |---|---|
//! | SAFE | UNTRUSTED or higher |
//! | MUTATING | STANDARD or higher |
//! | DESTRUCTIVE | ELEVATED or higher, plus interactive confirmation |
//! | SYSTEM | FULL only |
//!
//! Granted exceptions let a specific tool name bypass its class check once
//! the session is ELEVATED. The gateway also owns the per-call deadline:
//! handler cancellation is cooperative, so a handler that ignores its
//! cancellation flag keeps running detached while the caller receives a
//! TIMEOUT envelope. Its side effects may still complete; that is the
//! documented contract.

use crate::dispatch::CallContext;
use crate::errors::{access_denied, internal_error, timeout, McpToolError};
use crate::registry::{ToolDescriptor, TrustClass};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{info, warn};

/// Authorization capacity of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustLevel {
    /// No write access at all
    Untrusted,
    /// Ordinary workspace operations
    Standard,
    /// Destructive operations with confirmation
    Elevated,
    /// Unrestricted, including system tools
    Full,
}

impl TrustLevel {
    /// Stable wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Untrusted => "UNTRUSTED",
            Self::Standard => "STANDARD",
            Self::Elevated => "ELEVATED",
            Self::Full => "FULL",
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TrustLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNTRUSTED" => Ok(Self::Untrusted),
            "STANDARD" => Ok(Self::Standard),
            "ELEVATED" => Ok(Self::Elevated),
            "FULL" => Ok(Self::Full),
            other => Err(format!(
                "unknown trust level {other:?} (expected untrusted|standard|elevated|full)"
            )),
        }
    }
}

/// Required session level for a tool trust class.
#[must_use]
pub const fn required_level(class: TrustClass) -> TrustLevel {
    match class {
        TrustClass::Safe => TrustLevel::Untrusted,
        TrustClass::Mutating => TrustLevel::Standard,
        TrustClass::Destructive => TrustLevel::Elevated,
        TrustClass::System => TrustLevel::Full,
    }
}

/// Inbound channel for interactive approval of DESTRUCTIVE calls.
#[async_trait]
pub trait ConfirmationProvider: Send + Sync {
    /// Ask the operator to approve the call. `false` denies it.
    async fn confirm(&self, tool_name: &str, arguments: &Value) -> bool;
}

/// Session-scoped authorization state. Created at connection start, dropped
/// on disconnect. Never shared across sessions.
pub struct TrustContext {
    session_id: String,
    level: RwLock<TrustLevel>,
    granted_exceptions: RwLock<HashSet<String>>,
    confirmation: RwLock<Option<Arc<dyn ConfirmationProvider>>>,
}

impl fmt::Debug for TrustContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustContext")
            .field("session_id", &self.session_id)
            .field("level", &self.level())
            .finish_non_exhaustive()
    }
}

impl TrustContext {
    /// Create a context at the given starting level.
    #[must_use]
    pub fn new(session_id: impl Into<String>, level: TrustLevel) -> Self {
        Self {
            session_id: session_id.into(),
            level: RwLock::new(level),
            granted_exceptions: RwLock::new(HashSet::new()),
            confirmation: RwLock::new(None),
        }
    }

    /// Session identifier.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current trust level.
    #[must_use]
    pub fn level(&self) -> TrustLevel {
        *read(&self.level)
    }

    /// Raise or lower the session level.
    pub fn set_level(&self, level: TrustLevel) {
        *write(&self.level) = level;
        info!(session_id = %self.session_id, level = %level, "session trust level changed");
    }

    /// Allow a specific tool name beyond the session's level class checks.
    pub fn grant_exception(&self, tool_name: impl Into<String>) {
        write(&self.granted_exceptions).insert(tool_name.into());
    }

    /// Whether the tool name has a granted exception.
    #[must_use]
    pub fn has_exception(&self, tool_name: &str) -> bool {
        read(&self.granted_exceptions).contains(tool_name)
    }

    /// Install the interactive confirmation channel.
    pub fn set_confirmation(&self, provider: Arc<dyn ConfirmationProvider>) {
        *write(&self.confirmation) = Some(provider);
    }

    fn confirmation(&self) -> Option<Arc<dyn ConfirmationProvider>> {
        read(&self.confirmation).clone()
    }
}

/// Outcome of the gateway's policy check for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustDecision {
    /// Policy allowed the call
    Allowed,
    /// Policy refused the call
    Denied,
    /// The dispatch failed before reaching the gateway
    NotEvaluated,
}

/// Append-only per-invocation audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    /// Correlation id of the dispatch
    pub correlation_id: String,
    /// Session that issued the call
    pub session_id: String,
    /// Target tool name
    pub tool_name: String,
    /// SHA-256 fingerprint of the raw arguments
    pub arguments_fingerprint: String,
    /// Gateway decision
    pub trust_decision: TrustDecision,
    /// `ok` or the envelope error code
    pub outcome: String,
    /// Dispatch latency
    pub latency_ms: u64,
    /// When the record was written
    pub timestamp: DateTime<Utc>,
    /// Extra structured data (e.g. `coerced: true`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Append-only audit log. Each append is atomic: one record never
/// interleaves with another.
#[derive(Default)]
pub struct AuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl AuditLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record and emit it as a structured log event.
    pub fn append(&self, record: AuditRecord) {
        info!(
            correlation_id = %record.correlation_id,
            session_id = %record.session_id,
            tool = %record.tool_name,
            decision = ?record.trust_decision,
            outcome = %record.outcome,
            latency_ms = record.latency_ms,
            "audit"
        );
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(record);
    }

    /// Snapshot of all records so far.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Number of records written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// SHA-256 fingerprint of a JSON argument payload.
#[must_use]
pub fn arguments_fingerprint(arguments: &Value) -> String {
    let canonical = serde_json::to_string(arguments).unwrap_or_default();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Policy enforcement and deadline supervision for every dispatch.
pub struct TrustGateway {
    default_timeout: Duration,
}

impl TrustGateway {
    /// Create a gateway with the server-wide default deadline.
    #[must_use]
    pub const fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    /// Check the policy table for this descriptor against the session.
    ///
    /// # Errors
    /// Returns an ACCESS_DENIED envelope carrying the required level in
    /// `details` when the policy refuses.
    pub async fn authorize(
        &self,
        descriptor: &ToolDescriptor,
        arguments: &Value,
        trust: &TrustContext,
    ) -> Result<(), McpToolError> {
        let level = trust.level();
        let required = descriptor
            .required_level
            .unwrap_or_else(|| required_level(descriptor.trust_class))
            .max(required_level(descriptor.trust_class));

        // A granted exception bypasses the class check once the session is
        // ELEVATED.
        if trust.has_exception(&descriptor.name) && level >= TrustLevel::Elevated {
            return Ok(());
        }

        if level < required {
            warn!(
                tool = %descriptor.name,
                class = %descriptor.trust_class,
                session_level = %level,
                "trust policy denied call"
            );
            return Err(access_denied(
                &descriptor.name,
                format!(
                    "tool is {} and requires {} trust; session is {}",
                    descriptor.trust_class, required, level
                ),
            )
            .with_details(json!({
                "required": required.as_str(),
                "session_level": level.as_str(),
            })));
        }

        if descriptor.trust_class == TrustClass::Destructive {
            let Some(provider) = trust.confirmation() else {
                return Err(access_denied(
                    &descriptor.name,
                    "destructive tool requires interactive confirmation, but the session has no confirmation channel",
                )
                .with_details(json!({
                    "required": required.as_str(),
                    "confirmation": "unavailable",
                })));
            };
            if !provider.confirm(&descriptor.name, arguments).await {
                return Err(access_denied(
                    &descriptor.name,
                    "destructive call was not confirmed",
                )
                .with_details(json!({
                    "required": required.as_str(),
                    "confirmation": "refused",
                })));
            }
        }

        Ok(())
    }

    /// Run the handler under the per-call deadline.
    ///
    /// On deadline exceedance the cancellation flag is set and a TIMEOUT
    /// envelope is returned; a non-cooperative handler keeps running
    /// detached and its side effects may still complete.
    pub async fn run(
        &self,
        descriptor: &Arc<ToolDescriptor>,
        arguments: Value,
        call: &CallContext,
    ) -> Result<Value, McpToolError> {
        let Some(handler) = descriptor.handler.clone() else {
            return Err(internal_error(
                &descriptor.name,
                "descriptor is not callable (no handler attached)",
            ));
        };

        let deadline = descriptor.timeout_override.unwrap_or(self.default_timeout);
        let module = descriptor.source_module.clone();
        let name = descriptor.name.clone();
        let handler_call = call.clone();

        let task = tokio::spawn(handler(arguments, handler_call));

        match tokio::time::timeout(deadline, task).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(tool_err))) => {
                let module_hint = if module.is_empty() { None } else { Some(module.as_str()) };
                Err(tool_err.into_envelope(&name, module_hint))
            }
            Ok(Err(join_err)) => Err(internal_error(
                &name,
                format!("handler task failed: {join_err}"),
            )),
            Err(_elapsed) => {
                call.cancel();
                Err(timeout(&name, deadline.as_secs()))
            }
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}
