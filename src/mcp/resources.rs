// ABOUTME: ServerResources bundles the shared state every transport and handler needs
// ABOUTME: Wires registry, discovery, gateway, dispatcher, sessions, and the built-in resources
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

//! # Server Resources
//!
//! One `Arc<ServerResources>` is threaded through every transport. It owns
//! the registry (populated with static tools at construction), the discovery
//! engine, the trust gateway, the dispatcher, and the per-session trust
//! contexts.

use crate::config::ServerConfig;
use crate::discovery::DiscoveryEngine;
use crate::dispatch::Dispatcher;
use crate::manifest::skill_manifest;
use crate::namespace::{builtin_namespace, ModuleNamespace};
use crate::prompts::builtin_prompts;
use crate::proxy::proxy_tools;
use crate::registry::{
    make_provider, ResourceDescriptor, ToolOrigin, ToolRegistry,
};
use crate::tools::static_tools;
use crate::trust::{AuditLog, TrustContext, TrustGateway};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Shared state for one server instance.
pub struct ServerResources {
    /// Effective configuration
    pub config: ServerConfig,
    /// Module namespace behind discovery and the proxy
    pub namespace: Arc<ModuleNamespace>,
    /// Tool/resource/prompt registry
    pub registry: Arc<ToolRegistry>,
    /// Discovery engine with TTL cache
    pub discovery: Arc<DiscoveryEngine>,
    /// Trust gateway
    pub gateway: Arc<TrustGateway>,
    /// Append-only audit log
    pub audit: Arc<AuditLog>,
    /// Dispatch entry point
    pub dispatcher: Dispatcher,
    /// Per-session trust contexts, keyed by session id
    sessions: DashMap<String, Arc<TrustContext>>,
    started_at: Instant,
    started_at_utc: DateTime<Utc>,
}

impl ServerResources {
    /// Build the full tool plane: registry with static tools, discovery
    /// engine, gateway, dispatcher, built-in resources and prompts.
    #[must_use]
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let namespace = Arc::new(builtin_namespace());
        let registry = Arc::new(ToolRegistry::new());
        let discovery = Arc::new(DiscoveryEngine::new(
            Arc::clone(&namespace),
            Arc::clone(&registry),
            config.cache_ttl,
        ));
        let gateway = Arc::new(TrustGateway::new(config.tool_timeout));
        let audit = Arc::new(AuditLog::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&discovery),
            Arc::clone(&gateway),
            Arc::clone(&audit),
        );

        let resources = Arc::new(Self {
            config,
            namespace,
            registry,
            discovery,
            gateway,
            audit,
            dispatcher,
            sessions: DashMap::new(),
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
        });

        resources.register_static_tools();
        resources.register_builtin_resources();
        resources.register_builtin_prompts();
        resources
    }

    /// Register the static core and proxy tool sets. Conflicts here are
    /// programming errors (two statics claiming one name) and are logged,
    /// not fatal.
    fn register_static_tools(&self) {
        let tools = static_tools()
            .into_iter()
            .chain(proxy_tools(&self.namespace, &self.discovery, &self.registry));
        for descriptor in tools {
            let name = descriptor.name.clone();
            if let Err(e) = self
                .registry
                .register(descriptor, ToolOrigin::Static, false)
            {
                warn!(tool = %name, error = %e, "static tool registration failed");
            }
        }
        info!(
            static_tools = self.registry.static_count(),
            "static tools registered"
        );
    }

    /// Register the built-in resources: module inventory, discovery metrics,
    /// system status, and the skill manifest.
    fn register_builtin_resources(&self) {
        let namespace = Arc::clone(&self.namespace);
        self.registry.register_resource(ResourceDescriptor {
            uri: "codomyrmex://modules".to_owned(),
            name: "Module Inventory".to_owned(),
            description: "Complete list of all Codomyrmex modules with descriptions".to_owned(),
            mime_type: "application/json".to_owned(),
            provider: Some(make_provider(move || {
                let namespace = Arc::clone(&namespace);
                async move {
                    Ok(json!({ "modules": namespace.module_paths() }))
                }
            })),
        });

        let discovery = Arc::clone(&self.discovery);
        self.registry.register_resource(ResourceDescriptor {
            uri: "codomyrmex://discovery/metrics".to_owned(),
            name: "Discovery Metrics".to_owned(),
            description:
                "Runtime metrics from MCP tool discovery (scan time, failures, cache hits)"
                    .to_owned(),
            mime_type: "application/json".to_owned(),
            provider: Some(make_provider(move || {
                let discovery = Arc::clone(&discovery);
                async move { Ok(discovery.metrics_value()) }
            })),
        });

        let registry = Arc::clone(&self.registry);
        let started_at = self.started_at;
        let started_at_utc = self.started_at_utc;
        let server_name = self.config.server_name.clone();
        self.registry.register_resource(ResourceDescriptor {
            uri: "codomyrmex://status".to_owned(),
            name: "System Status".to_owned(),
            description: "Current system status for this server instance".to_owned(),
            mime_type: "application/json".to_owned(),
            provider: Some(make_provider(move || {
                let registry = Arc::clone(&registry);
                let server_name = server_name.clone();
                async move {
                    Ok(json!({
                        "server": server_name,
                        "version": env!("CARGO_PKG_VERSION"),
                        "started_at": started_at_utc.to_rfc3339(),
                        "uptime_secs": started_at.elapsed().as_secs(),
                        "tools": registry.tool_count(),
                        "resources": registry.list_resources().len(),
                        "prompts": registry.list_prompts().len(),
                    }))
                }
            })),
        });

        let registry = Arc::clone(&self.registry);
        self.registry.register_resource(ResourceDescriptor {
            uri: "codomyrmex://manifest".to_owned(),
            name: "Skill Manifest".to_owned(),
            description: "Machine-readable summary of tools, resources, and prompts".to_owned(),
            mime_type: "application/json".to_owned(),
            provider: Some(make_provider(move || {
                let registry = Arc::clone(&registry);
                async move { Ok(skill_manifest(&registry)) }
            })),
        });
    }

    fn register_builtin_prompts(&self) {
        for prompt in builtin_prompts() {
            self.registry.register_prompt(prompt);
        }
    }

    /// Eagerly populate the discovery cache so the first client request does
    /// not pay the scan latency.
    pub async fn warm_up(&self) {
        let started = Instant::now();
        let report = self.discovery.ensure_fresh().await;
        info!(
            tools = report.tools.len(),
            failed = report.failed_modules.len(),
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "discovery warm-up completed"
        );
    }

    /// Get or create the trust context for a session. New sessions start at
    /// the configured default level.
    pub fn session(&self, session_id: &str) -> Arc<TrustContext> {
        self.sessions
            .entry(session_id.to_owned())
            .or_insert_with(|| {
                Arc::new(TrustContext::new(
                    session_id,
                    self.config.default_trust_level,
                ))
            })
            .clone()
    }

    /// Drop a session's trust context on disconnect.
    pub fn drop_session(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
