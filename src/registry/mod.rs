// ABOUTME: Tool, resource, and prompt descriptors plus the in-memory registry
// ABOUTME: Provides concurrent-read name lookup, insertion-ordered listing, and conflict detection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

//! # Tool Registry
//!
//! The registry is the single name→descriptor map behind dispatch. Lookups
//! take a read lock and clone out an `Arc`; handlers are always invoked after
//! the lock is released. Writers take a short exclusive lock to splice
//! descriptors in.
//!
//! Static registrations (server construction) and discovered registrations
//! (scans) live in separate generations: a discovered tool shadows a static
//! one of the same name (later registration wins), and a rescan replaces the
//! discovered generation wholesale without disturbing statics.

use crate::dispatch::CallContext;
use crate::errors::ToolError;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;

/// Handler contract: keyword-style JSON arguments in, JSON mapping out.
pub type ToolHandler =
    Arc<dyn Fn(Value, CallContext) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync>;

/// Wrap an async function into a [`ToolHandler`].
pub fn make_handler<F, Fut>(f: F) -> ToolHandler
where
    F: Fn(Value, CallContext) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    Arc::new(move |args, ctx| Box::pin(f(args, ctx)))
}

/// Wrap an async function into a [`ResourceProvider`].
pub fn make_provider<F, Fut>(f: F) -> ResourceProvider
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// Content provider for a registered resource.
pub type ResourceProvider =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync>;

/// Declared destructiveness of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustClass {
    /// Read-only, no side effects
    Safe,
    /// Writes state but is recoverable
    Mutating,
    /// Irreversible or externally visible side effects
    Destructive,
    /// Touches the host system itself
    System,
}

impl fmt::Display for TrustClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Safe => "SAFE",
            Self::Mutating => "MUTATING",
            Self::Destructive => "DESTRUCTIVE",
            Self::System => "SYSTEM",
        };
        f.write_str(s)
    }
}

/// Registry record for a callable tool.
#[derive(Clone)]
pub struct ToolDescriptor {
    /// Dotted, globally unique tool name (e.g. `codomyrmex.read_file`)
    pub name: String,
    /// Short human description
    pub description: String,
    /// Free-form category tag (e.g. `obsidian`, `security`, `general`)
    pub category: String,
    /// JSON-schema fragment describing the inputs
    pub parameter_schema: Value,
    /// The handler; `None` for descriptor-only entries
    pub handler: Option<ToolHandler>,
    /// Declared destructiveness
    pub trust_class: TrustClass,
    /// Module path the handler came from
    pub source_module: String,
    /// Per-descriptor deadline override
    pub timeout_override: Option<Duration>,
    /// Required session level override, stricter than the class implies.
    /// Used by proxy tools that cannot classify their downstream target.
    pub required_level: Option<crate::trust::TrustLevel>,
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("trust_class", &self.trust_class)
            .field("source_module", &self.source_module)
            .field("has_handler", &self.handler.is_some())
            .finish_non_exhaustive()
    }
}

impl ToolDescriptor {
    /// Create a descriptor with `SAFE` trust and `general` category defaults.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameter_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category: "general".to_owned(),
            parameter_schema,
            handler: None,
            trust_class: TrustClass::Safe,
            source_module: String::new(),
            timeout_override: None,
            required_level: None,
        }
    }

    /// Set the category tag.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Attach the handler.
    #[must_use]
    pub fn with_handler(mut self, handler: ToolHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Override the default trust class.
    #[must_use]
    pub const fn with_trust(mut self, trust_class: TrustClass) -> Self {
        self.trust_class = trust_class;
        self
    }

    /// Record the source module path.
    #[must_use]
    pub fn with_source(mut self, source_module: impl Into<String>) -> Self {
        self.source_module = source_module.into();
        self
    }

    /// Override the server-wide per-call deadline for this tool.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_override = Some(timeout);
        self
    }

    /// Require a session level stricter than the trust class implies.
    #[must_use]
    pub const fn with_required_level(mut self, level: crate::trust::TrustLevel) -> Self {
        self.required_level = Some(level);
        self
    }

    /// Wire schema entry (`{name, description, inputSchema}`).
    #[must_use]
    pub fn wire_schema(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.parameter_schema,
        })
    }
}

/// Registry record for a readable resource.
#[derive(Clone)]
pub struct ResourceDescriptor {
    /// Resource URI (e.g. `codomyrmex://modules`)
    pub uri: String,
    /// Display name
    pub name: String,
    /// Short human description
    pub description: String,
    /// MIME type of the content
    pub mime_type: String,
    /// Content provider computing the JSON body on read
    pub provider: Option<ResourceProvider>,
}

impl fmt::Debug for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("uri", &self.uri)
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

/// One declared argument of a prompt template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name, matching a `{name}` placeholder in the template
    pub name: String,
    /// Short human description
    pub description: String,
    /// Whether the argument must be supplied
    pub required: bool,
}

/// Registry record for a prompt template.
#[derive(Debug, Clone)]
pub struct PromptDescriptor {
    /// Prompt name
    pub name: String,
    /// Short human description
    pub description: String,
    /// Declared arguments
    pub arguments: Vec<PromptArgument>,
    /// Template with `{argument}` placeholders
    pub template: String,
}

/// Whether a tool arrived via static registration or a discovery scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOrigin {
    /// Registered at server construction
    Static,
    /// Found by a discovery scan
    Discovered,
}

/// Registry mutation error.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A descriptor with this name already exists and `overwrite` was false
    #[error("tool {0:?} is already registered")]
    Conflict(String),
}

#[derive(Default)]
struct RegistryInner {
    static_tools: HashMap<String, (Arc<ToolDescriptor>, u64)>,
    discovered_tools: HashMap<String, (Arc<ToolDescriptor>, u64)>,
    next_seq: u64,
    resources: Vec<ResourceDescriptor>,
    prompts: Vec<PromptDescriptor>,
}

/// In-memory name→descriptor registry with many-reader/single-writer locking.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<RegistryInner>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool descriptor.
    ///
    /// # Errors
    /// Returns [`RegistryError::Conflict`] when the name already exists in the
    /// same generation and `overwrite` is false. The first descriptor is left
    /// untouched in that case.
    pub fn register(
        &self,
        descriptor: ToolDescriptor,
        origin: ToolOrigin,
        overwrite: bool,
    ) -> Result<(), RegistryError> {
        let mut inner = self.write_lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let name = descriptor.name.clone();
        let table = match origin {
            ToolOrigin::Static => &mut inner.static_tools,
            ToolOrigin::Discovered => &mut inner.discovered_tools,
        };
        if !overwrite && table.contains_key(&name) {
            return Err(RegistryError::Conflict(name));
        }
        table.insert(name, (Arc::new(descriptor), seq));
        Ok(())
    }

    /// Remove a tool by name from both generations. Idempotent.
    pub fn deregister(&self, name: &str) {
        let mut inner = self.write_lock();
        inner.static_tools.remove(name);
        inner.discovered_tools.remove(name);
    }

    /// Look up a tool by name. Discovered tools shadow statics of the same
    /// name (later registration wins).
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<ToolDescriptor>> {
        let inner = self.read_lock();
        inner
            .discovered_tools
            .get(name)
            .or_else(|| inner.static_tools.get(name))
            .map(|(descriptor, _)| Arc::clone(descriptor))
    }

    /// List all visible tools: static-registered first, then discovery-found,
    /// each group in stable insertion order. Statics shadowed by a discovered
    /// tool of the same name are omitted.
    #[must_use]
    pub fn list_tools(&self) -> Vec<Arc<ToolDescriptor>> {
        let inner = self.read_lock();
        let mut statics: Vec<&(Arc<ToolDescriptor>, u64)> = inner
            .static_tools
            .iter()
            .filter(|(name, _)| !inner.discovered_tools.contains_key(*name))
            .map(|(_, entry)| entry)
            .collect();
        statics.sort_by_key(|(_, seq)| *seq);

        let mut discovered: Vec<&(Arc<ToolDescriptor>, u64)> =
            inner.discovered_tools.values().collect();
        discovered.sort_by_key(|(_, seq)| *seq);

        statics
            .into_iter()
            .chain(discovered)
            .map(|(descriptor, _)| Arc::clone(descriptor))
            .collect()
    }

    /// Distinct category tags across all visible tools.
    #[must_use]
    pub fn list_categories(&self) -> BTreeSet<String> {
        self.list_tools()
            .iter()
            .map(|d| d.category.clone())
            .collect()
    }

    /// Replace the entire discovered generation with a fresh scan result.
    /// Statics are untouched. Returns the new discovered count.
    pub fn replace_discovered(&self, tools: Vec<ToolDescriptor>) -> usize {
        let mut inner = self.write_lock();
        inner.discovered_tools.clear();
        for descriptor in tools {
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner
                .discovered_tools
                .insert(descriptor.name.clone(), (Arc::new(descriptor), seq));
        }
        inner.discovered_tools.len()
    }

    /// Replace only the discovered tools sourced from one module.
    pub fn replace_module_tools(&self, module: &str, tools: Vec<ToolDescriptor>) {
        let mut inner = self.write_lock();
        inner
            .discovered_tools
            .retain(|_, (descriptor, _)| descriptor.source_module != module);
        for descriptor in tools {
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner
                .discovered_tools
                .insert(descriptor.name.clone(), (Arc::new(descriptor), seq));
        }
    }

    /// Count of visible tools.
    #[must_use]
    pub fn tool_count(&self) -> usize {
        let inner = self.read_lock();
        let shadowed = inner
            .static_tools
            .keys()
            .filter(|name| inner.discovered_tools.contains_key(*name))
            .count();
        inner.static_tools.len() + inner.discovered_tools.len() - shadowed
    }

    /// Count of statically registered tools.
    #[must_use]
    pub fn static_count(&self) -> usize {
        self.read_lock().static_tools.len()
    }

    /// Whether a name is present in the static generation.
    #[must_use]
    pub fn has_static(&self, name: &str) -> bool {
        self.read_lock().static_tools.contains_key(name)
    }

    /// Count of discovery-found tools.
    #[must_use]
    pub fn discovered_count(&self) -> usize {
        self.read_lock().discovered_tools.len()
    }

    /// Register a resource descriptor. Re-registering a URI replaces it.
    pub fn register_resource(&self, descriptor: ResourceDescriptor) {
        let mut inner = self.write_lock();
        inner.resources.retain(|r| r.uri != descriptor.uri);
        inner.resources.push(descriptor);
    }

    /// List resources in registration order.
    #[must_use]
    pub fn list_resources(&self) -> Vec<ResourceDescriptor> {
        self.read_lock().resources.clone()
    }

    /// Look up a resource by URI.
    #[must_use]
    pub fn lookup_resource(&self, uri: &str) -> Option<ResourceDescriptor> {
        self.read_lock()
            .resources
            .iter()
            .find(|r| r.uri == uri)
            .cloned()
    }

    /// Register a prompt descriptor. Re-registering a name replaces it.
    pub fn register_prompt(&self, descriptor: PromptDescriptor) {
        let mut inner = self.write_lock();
        inner.prompts.retain(|p| p.name != descriptor.name);
        inner.prompts.push(descriptor);
    }

    /// List prompts in registration order.
    #[must_use]
    pub fn list_prompts(&self) -> Vec<PromptDescriptor> {
        self.read_lock().prompts.clone()
    }

    /// Look up a prompt by name.
    #[must_use]
    pub fn lookup_prompt(&self, name: &str) -> Option<PromptDescriptor> {
        self.read_lock()
            .prompts
            .iter()
            .find(|p| p.name == name)
            .cloned()
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, RegistryInner> {
        // A poisoned lock means a writer panicked mid-splice; the map itself
        // is still structurally sound, so recover the guard.
        self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
