// ABOUTME: Dispatch pipeline: resolve, validate, authorize, execute, and package envelopes
// ABOUTME: Owns the per-call correlation scope, the state machine events, and audit emission
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

//! # Dispatcher
//!
//! `dispatch(name, arguments)` is the single entry point for tool calls. The
//! call moves through RECEIVED → RESOLVED → VALIDATED → AUTHORIZED →
//! EXECUTING and lands in exactly one terminal state; each transition is a
//! structured log event keyed by the correlation id. Exactly one audit
//! record is written per dispatch, whatever the outcome.
//!
//! The dispatcher never raises over the wire: every failure is packaged as
//! an error envelope carrying the correlation id. The registry write lock is
//! never held while a handler runs; lookup clones the descriptor out first.

use crate::discovery::DiscoveryEngine;
use crate::errors::{unknown_tool, validation_error, McpToolError};
use crate::registry::ToolRegistry;
use crate::trust::{arguments_fingerprint, AuditLog, AuditRecord, TrustContext, TrustDecision, TrustGateway};
use crate::validation::validate_arguments;
use chrono::Utc;
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-call context threaded into handlers.
///
/// Cancellation is cooperative: the gateway sets the flag when the deadline
/// passes, and handlers that poll [`CallContext::is_cancelled`] can stop
/// early. Handlers that do not poll simply run to completion while the
/// caller has already received a TIMEOUT envelope.
#[derive(Clone)]
pub struct CallContext {
    /// Opaque per-call identifier carried through logs, audit, and envelopes
    pub correlation_id: String,
    cancelled: Arc<AtomicBool>,
    coerced: Arc<AtomicBool>,
}

impl CallContext {
    /// Create a context for one dispatch.
    #[must_use]
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            cancelled: Arc::new(AtomicBool::new(false)),
            coerced: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the deadline has passed and the handler should stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Signal cooperative cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Record that a non-JSON return value was coerced to its string repr.
    pub fn mark_coerced(&self) {
        self.coerced.store(true, Ordering::Relaxed);
    }

    /// Whether any value was coerced during this call.
    #[must_use]
    pub fn was_coerced(&self) -> bool {
        self.coerced.load(Ordering::Relaxed)
    }
}

/// States of one dispatch lifecycle. Terminal states are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Request received, correlation scope opened
    Received,
    /// Descriptor resolved from the registry
    Resolved,
    /// Arguments validated against the schema
    Validated,
    /// Trust gateway allowed the call
    Authorized,
    /// Handler running
    Executing,
    /// Terminal: handler returned a result
    Completed,
    /// Terminal: handler raised
    Failed,
    /// Terminal: deadline exceeded
    TimedOut,
    /// Terminal: trust policy refused
    Denied,
    /// Terminal: unknown tool or invalid arguments
    Rejected,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "RECEIVED",
            Self::Resolved => "RESOLVED",
            Self::Validated => "VALIDATED",
            Self::Authorized => "AUTHORIZED",
            Self::Executing => "EXECUTING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::TimedOut => "TIMED_OUT",
            Self::Denied => "DENIED",
            Self::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

fn state_event(correlation_id: &str, tool: &str, state: DispatchState) {
    debug!(
        correlation_id = %correlation_id,
        tool = %tool,
        state = %state,
        "dispatch state"
    );
}

/// Terminal state for a failure envelope code.
fn terminal_for(error: &McpToolError) -> DispatchState {
    use crate::errors::McpErrorCode;
    match error.code {
        McpErrorCode::UnknownTool | McpErrorCode::ValidationError => DispatchState::Rejected,
        McpErrorCode::AccessDenied => DispatchState::Denied,
        McpErrorCode::Timeout => DispatchState::TimedOut,
        _ => DispatchState::Failed,
    }
}

/// Entry point for tool invocations.
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    discovery: Arc<DiscoveryEngine>,
    gateway: Arc<TrustGateway>,
    audit: Arc<AuditLog>,
}

impl Dispatcher {
    /// Create a dispatcher over shared plane state.
    #[must_use]
    pub fn new(
        registry: Arc<ToolRegistry>,
        discovery: Arc<DiscoveryEngine>,
        gateway: Arc<TrustGateway>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            registry,
            discovery,
            gateway,
            audit,
        }
    }

    /// Dispatch one tool call. Returns the handler's result mapping or an
    /// `{"error": {...}}` envelope; never raises.
    pub async fn dispatch(&self, name: &str, arguments: Value, trust: &TrustContext) -> Value {
        let started = Instant::now();
        let call = CallContext::new(Uuid::new_v4().to_string());
        let fingerprint = arguments_fingerprint(&arguments);
        state_event(&call.correlation_id, name, DispatchState::Received);

        // Lazy discovery: the first registry access after cold start or
        // invalidation pays for the scan here.
        self.discovery.ensure_fresh().await;

        let Some(descriptor) = self.registry.lookup(name) else {
            let envelope = unknown_tool(name).with_correlation_id(&call.correlation_id);
            return self.finish(
                trust,
                name,
                &call,
                &fingerprint,
                started,
                TrustDecision::NotEvaluated,
                Err(envelope),
            );
        };
        state_event(&call.correlation_id, name, DispatchState::Resolved);

        let arguments = match validate_arguments(&descriptor.parameter_schema, arguments) {
            Ok(augmented) => augmented,
            Err(violation) => {
                let envelope =
                    validation_error(name, violation.to_string(), Some(&violation.field))
                        .with_correlation_id(&call.correlation_id);
                return self.finish(
                    trust,
                    name,
                    &call,
                    &fingerprint,
                    started,
                    TrustDecision::NotEvaluated,
                    Err(envelope),
                );
            }
        };
        state_event(&call.correlation_id, name, DispatchState::Validated);

        if let Err(denial) = self.gateway.authorize(&descriptor, &arguments, trust).await {
            let envelope = denial.with_correlation_id(&call.correlation_id);
            return self.finish(
                trust,
                name,
                &call,
                &fingerprint,
                started,
                TrustDecision::Denied,
                Err(envelope),
            );
        }
        state_event(&call.correlation_id, name, DispatchState::Authorized);
        state_event(&call.correlation_id, name, DispatchState::Executing);

        let outcome = self
            .gateway
            .run(&descriptor, arguments, &call)
            .await
            .map(|value| match value {
                Value::Object(_) => value,
                other => json!({ "result": other }),
            })
            .map_err(|envelope| envelope.with_correlation_id(&call.correlation_id));

        self.finish(
            trust,
            name,
            &call,
            &fingerprint,
            started,
            TrustDecision::Allowed,
            outcome,
        )
    }

    /// Write the single audit record for this dispatch and package the wire
    /// value.
    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        trust: &TrustContext,
        name: &str,
        call: &CallContext,
        fingerprint: &str,
        started: Instant,
        decision: TrustDecision,
        outcome: Result<Value, McpToolError>,
    ) -> Value {
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let (state, outcome_code, value) = match outcome {
            Ok(value) => (DispatchState::Completed, "ok".to_owned(), value),
            Err(envelope) => {
                let state = terminal_for(&envelope);
                (state, envelope.code.to_string(), envelope.into_result())
            }
        };
        state_event(&call.correlation_id, name, state);

        let details = call.was_coerced().then(|| {
            warn!(
                correlation_id = %call.correlation_id,
                tool = %name,
                "non-JSON return value coerced to string"
            );
            json!({ "coerced": true })
        });

        self.audit.append(AuditRecord {
            correlation_id: call.correlation_id.clone(),
            session_id: trust.session_id().to_owned(),
            tool_name: name.to_owned(),
            arguments_fingerprint: fingerprint.to_owned(),
            trust_decision: decision,
            outcome: outcome_code,
            latency_ms,
            timestamp: Utc::now(),
            details,
        });

        value
    }
}
