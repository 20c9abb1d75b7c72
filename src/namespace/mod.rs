// ABOUTME: Module namespace describing the workspace modules the tool plane can see
// ABOUTME: Each entry carries docs, a public function table for the proxy, and an optional tool registrar
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

//! # Module Namespace
//!
//! The reflective surface the discovery engine walks and the universal proxy
//! exposes. Instead of runtime attribute attachment, each module contributes
//! an explicit entry: its dotted path, a one-line doc, a table of public
//! functions (name, signature, doc, handler), and optionally a tool
//! registrar. A module *has tools* exactly when it carries a registrar; a
//! registrar may fail, and discovery records that failure per module without
//! aborting the scan.

mod builtin;

pub use builtin::builtin_namespace;

use crate::errors::ToolError;
use crate::registry::ToolDescriptor;
use serde_json::{Map, Value};
use thiserror::Error;

/// Root namespace prefix for every module path.
pub const NAMESPACE_ROOT: &str = "codomyrmex";

/// Failure raised by a module registrar during a scan.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ModuleScanError(pub String);

/// Result of invoking a module function through the proxy.
///
/// `Json` values pass through untouched. `Opaque` marks a return value with
/// no JSON representation; the proxy coerces it to its string repr and flags
/// the coercion in the audit record.
#[derive(Debug, Clone)]
pub enum FunctionReturn {
    /// JSON-native return value
    Json(Value),
    /// Non-JSON return value, carried as its string repr
    Opaque(String),
}

/// Handler for one public module function: keyword arguments in, value out.
pub type ModuleFn = fn(&Map<String, Value>) -> Result<FunctionReturn, ToolError>;

/// Registrar a module exposes when it has MCP tools to contribute.
pub type ToolRegistrar = fn() -> Result<Vec<ToolDescriptor>, ModuleScanError>;

/// One public function in a module's reflective table.
#[derive(Clone, Copy)]
pub struct FunctionEntry {
    /// Public function name
    pub name: &'static str,
    /// Rendered parameter signature, e.g. `(a: int, b: int)`
    pub signature: &'static str,
    /// First line of the docstring
    pub doc: &'static str,
    /// The callable itself
    pub handler: ModuleFn,
}

/// One public class in a module's reflective table.
#[derive(Clone, Copy)]
pub struct ClassEntry {
    /// Public class name
    pub name: &'static str,
    /// First line of the docstring
    pub doc: &'static str,
    /// Public method names
    pub methods: &'static [&'static str],
}

/// One module visible to discovery and the proxy.
#[derive(Clone, Copy)]
pub struct ModuleEntry {
    /// Dotted module path under the root namespace
    pub path: &'static str,
    /// First line of the module docstring
    pub doc: &'static str,
    /// Public function table
    pub functions: &'static [FunctionEntry],
    /// Public class table
    pub classes: &'static [ClassEntry],
    /// Repo-relative path to the module's README/SPEC document
    pub doc_file: Option<&'static str>,
    /// Tool registrar; `Some` marks the module as carrying MCP tools
    pub registrar: Option<ToolRegistrar>,
}

impl ModuleEntry {
    /// Short name without the namespace prefix.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        self.path
            .strip_prefix(NAMESPACE_ROOT)
            .map_or(self.path, |rest| rest.trim_start_matches('.'))
    }

    /// Find a public function by name. Underscore-prefixed names are private
    /// by convention and never resolved.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&FunctionEntry> {
        if name.starts_with('_') {
            return None;
        }
        self.functions.iter().find(|f| f.name == name)
    }
}

/// The set of modules visible to the tool plane.
pub struct ModuleNamespace {
    modules: Vec<ModuleEntry>,
}

impl ModuleNamespace {
    /// Build a namespace from an explicit module list.
    #[must_use]
    pub fn new(modules: Vec<ModuleEntry>) -> Self {
        Self { modules }
    }

    /// Canonicalise a module path, prefixing the namespace root when absent.
    #[must_use]
    pub fn canonical(path: &str) -> String {
        if path == NAMESPACE_ROOT || path.starts_with("codomyrmex.") {
            path.to_owned()
        } else {
            format!("{NAMESPACE_ROOT}.{path}")
        }
    }

    /// Resolve a module by short or fully qualified path.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&ModuleEntry> {
        let full = Self::canonical(path);
        self.modules.iter().find(|m| m.path == full)
    }

    /// All modules in declaration order.
    #[must_use]
    pub fn modules(&self) -> &[ModuleEntry] {
        &self.modules
    }

    /// Sorted dotted paths of every module.
    #[must_use]
    pub fn module_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.modules.iter().map(|m| m.path.to_owned()).collect();
        paths.sort();
        paths
    }

    /// Modules carrying a tool registrar, in declaration order.
    #[must_use]
    pub fn modules_with_tools(&self) -> Vec<&ModuleEntry> {
        self.modules.iter().filter(|m| m.registrar.is_some()).collect()
    }

    /// Number of modules in the namespace.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the namespace is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
