// ABOUTME: Dynamic tool discovery over the module namespace with TTL cache and single-flight scans
// ABOUTME: Captures per-module failures, records collisions, and exposes scan metrics
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

//! # Tool Discovery Engine
//!
//! Walks the module namespace, invokes each module's tool registrar, and
//! splices the results into the registry's discovered generation. A failing
//! registrar is recorded in `failed_modules` and never aborts the scan;
//! duplicate tool names are resolved later-wins with a CONFLICT record.
//!
//! Scans are cached under a TTL (default 300 s, `CODOMYRMEX_MCP_CACHE_TTL`).
//! Concurrent cold-cache readers pass through a single-flight gate so exactly
//! one scan runs; the waiters observe the fresh cache and count as hits.

use crate::errors::McpErrorCode;
use crate::namespace::{ModuleEntry, ModuleNamespace};
use crate::registry::{ToolDescriptor, ToolRegistry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Known module paths scanned when the namespace walk yields nothing.
const FALLBACK_SCAN_TARGETS: &[&str] = &[
    "codomyrmex.agentic_memory",
    "codomyrmex.feature_flags",
    "codomyrmex.security",
    "codomyrmex.coding",
];

/// One module that failed during a scan.
#[derive(Debug, Clone, Serialize)]
pub struct FailedModule {
    /// Dotted module path
    pub module: String,
    /// Failure description
    pub error: String,
    /// Taxonomy code: CONFLICT for name collisions, EXECUTION_ERROR otherwise
    pub code: McpErrorCode,
}

/// Result of one discovery scan.
#[derive(Clone)]
pub struct DiscoveryReport {
    /// Descriptors the scan produced (post collision resolution)
    pub tools: Vec<Arc<ToolDescriptor>>,
    /// Modules that failed, with reasons
    pub failed_modules: Vec<FailedModule>,
    /// Number of candidate modules attempted
    pub modules_scanned: usize,
    /// Wall-clock scan duration
    pub scan_duration_ms: u64,
    /// When the scan ran
    pub scanned_at: DateTime<Utc>,
}

struct CacheEntry {
    report: Arc<DiscoveryReport>,
    expires_at: Instant,
}

/// Report returned by a targeted single-module rescan.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleRescan {
    /// The module that was rescanned
    pub rescanned_module: String,
    /// Tools the registrar produced
    pub tools_found: usize,
    /// Whether the registrar failed
    pub failed: bool,
}

/// TTL-cached discovery engine over a module namespace.
pub struct DiscoveryEngine {
    namespace: Arc<ModuleNamespace>,
    registry: Arc<ToolRegistry>,
    ttl: Duration,
    cache: RwLock<Option<CacheEntry>>,
    last_report: RwLock<Option<Arc<DiscoveryReport>>>,
    scan_gate: tokio::sync::Mutex<()>,
    cache_hits: AtomicU64,
    scan_count: AtomicU64,
}

impl DiscoveryEngine {
    /// Create an engine over the given namespace and registry.
    #[must_use]
    pub fn new(namespace: Arc<ModuleNamespace>, registry: Arc<ToolRegistry>, ttl: Duration) -> Self {
        Self {
            namespace,
            registry,
            ttl,
            cache: RwLock::new(None),
            last_report: RwLock::new(None),
            scan_gate: tokio::sync::Mutex::new(()),
            cache_hits: AtomicU64::new(0),
            scan_count: AtomicU64::new(0),
        }
    }

    /// Return the current discovery report, scanning if the cache is cold or
    /// expired. Concurrent callers trigger exactly one scan.
    pub async fn ensure_fresh(&self) -> Arc<DiscoveryReport> {
        if let Some(report) = self.cached() {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!("discovery cache hit");
            return report;
        }

        let _flight = self.scan_gate.lock().await;
        // Re-check under the gate: a concurrent caller may have scanned while
        // this one waited.
        if let Some(report) = self.cached() {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return report;
        }

        let report = Arc::new(self.scan());
        self.registry
            .replace_discovered(report.tools.iter().map(|t| (**t).clone()).collect());
        *self.write(&self.cache) = Some(CacheEntry {
            report: Arc::clone(&report),
            expires_at: Instant::now() + self.ttl,
        });
        *self.write(&self.last_report) = Some(Arc::clone(&report));
        report
    }

    /// Drop the cached report so the next registry access performs a fresh
    /// scan.
    pub fn invalidate(&self) {
        *self.write(&self.cache) = None;
        info!("discovery cache invalidated");
    }

    /// Rescan a single module, replacing only its tools in the registry. The
    /// full cache is invalidated so the next access reconciles everything.
    #[must_use]
    pub fn rescan_module(&self, module: &str) -> ModuleRescan {
        let path = ModuleNamespace::canonical(module);
        let outcome = self
            .namespace
            .resolve(&path)
            .and_then(|entry| entry.registrar)
            .map(|registrar| registrar());

        let rescan = match outcome {
            Some(Ok(tools)) => {
                let found = tools.len();
                self.registry.replace_module_tools(&path, tools);
                ModuleRescan {
                    rescanned_module: path,
                    tools_found: found,
                    failed: false,
                }
            }
            Some(Err(e)) => {
                warn!(module = %path, error = %e, "module rescan failed");
                ModuleRescan {
                    rescanned_module: path,
                    tools_found: 0,
                    failed: true,
                }
            }
            None => ModuleRescan {
                rescanned_module: path,
                tools_found: 0,
                failed: true,
            },
        };

        self.invalidate();
        rescan
    }

    /// Number of cache hits since construction.
    #[must_use]
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Number of full scans performed since construction.
    #[must_use]
    pub fn scan_count(&self) -> u64 {
        self.scan_count.load(Ordering::Relaxed)
    }

    /// Metrics snapshot for the `codomyrmex://discovery/metrics` resource.
    #[must_use]
    pub fn metrics_value(&self) -> Value {
        let last = self.read(&self.last_report).clone();
        match last {
            Some(report) => json!({
                "total_tools": self.registry.tool_count(),
                "scan_duration_ms": report.scan_duration_ms,
                "failed_modules": report.failed_modules.clone(),
                "modules_scanned": report.modules_scanned,
                "cache_hits": self.cache_hits(),
                "last_scan_time": report.scanned_at.to_rfc3339(),
            }),
            None => json!({
                "total_tools": self.registry.tool_count(),
                "scan_duration_ms": 0,
                "failed_modules": [],
                "modules_scanned": 0,
                "cache_hits": self.cache_hits(),
                "last_scan_time": Value::Null,
            }),
        }
    }

    fn cached(&self) -> Option<Arc<DiscoveryReport>> {
        let guard = self.read(&self.cache);
        guard.as_ref().and_then(|entry| {
            (Instant::now() < entry.expires_at).then(|| Arc::clone(&entry.report))
        })
    }

    /// Walk the namespace and collect every module's tools. Failures stay
    /// per-module; collisions resolve later-wins and are recorded.
    fn scan(&self) -> DiscoveryReport {
        let started = Instant::now();
        self.scan_count.fetch_add(1, Ordering::Relaxed);

        let candidates: Vec<&ModuleEntry> = self.namespace.modules_with_tools();
        let mut failed_modules = Vec::new();
        let mut modules_scanned = 0usize;

        // Walk failure: an empty namespace yields no candidates at all. Fall
        // back to the known module paths so the scan still reports something
        // actionable.
        if self.namespace.is_empty() {
            warn!("namespace walk found no modules; using fallback scan targets");
            for target in FALLBACK_SCAN_TARGETS {
                failed_modules.push(FailedModule {
                    module: (*target).to_owned(),
                    error: "module not present in namespace".to_owned(),
                    code: McpErrorCode::NotFound,
                });
            }
            return DiscoveryReport {
                tools: Vec::new(),
                failed_modules,
                modules_scanned: 0,
                scan_duration_ms: duration_ms(started),
                scanned_at: Utc::now(),
            };
        }

        // name -> (descriptor, source module); later registration wins.
        let mut collected: HashMap<String, (ToolDescriptor, String)> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for entry in candidates {
            modules_scanned += 1;
            let Some(registrar) = entry.registrar else {
                continue;
            };
            match registrar() {
                Ok(tools) => {
                    for descriptor in tools {
                        let short = descriptor.name.rsplit('.').next().unwrap_or("");
                        if short.starts_with('_') {
                            debug!(tool = %descriptor.name, "skipping private callable");
                            continue;
                        }
                        let name = descriptor.name.clone();
                        if let Some((_, previous_module)) = collected.get(&name) {
                            failed_modules.push(FailedModule {
                                module: entry.path.to_owned(),
                                error: format!(
                                    "duplicate tool name {name:?} (previously registered by {previous_module}); later registration wins"
                                ),
                                code: McpErrorCode::Conflict,
                            });
                        } else if self.registry.has_static(&name) {
                            failed_modules.push(FailedModule {
                                module: entry.path.to_owned(),
                                error: format!(
                                    "tool name {name:?} shadows a statically registered tool; later registration wins"
                                ),
                                code: McpErrorCode::Conflict,
                            });
                            order.push(name.clone());
                        } else {
                            order.push(name.clone());
                        }
                        collected.insert(name, (descriptor, entry.path.to_owned()));
                    }
                }
                Err(e) => {
                    warn!(module = %entry.path, error = %e, "module scan failed");
                    failed_modules.push(FailedModule {
                        module: entry.path.to_owned(),
                        error: e.to_string(),
                        code: McpErrorCode::ExecutionError,
                    });
                }
            }
        }

        let tools: Vec<Arc<ToolDescriptor>> = order
            .iter()
            .filter_map(|name| collected.get(name))
            .map(|(descriptor, _)| Arc::new(descriptor.clone()))
            .collect();

        let report = DiscoveryReport {
            tools,
            failed_modules,
            modules_scanned,
            scan_duration_ms: duration_ms(started),
            scanned_at: Utc::now(),
        };
        info!(
            tools = report.tools.len(),
            modules = report.modules_scanned,
            failed = report.failed_modules.len(),
            duration_ms = report.scan_duration_ms,
            "discovery scan complete"
        );
        report
    }

    fn read<'a, T>(&self, lock: &'a RwLock<T>) -> std::sync::RwLockReadGuard<'a, T> {
        lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write<'a, T>(&self, lock: &'a RwLock<T>) -> std::sync::RwLockWriteGuard<'a, T> {
        lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn duration_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
