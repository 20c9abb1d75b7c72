// ABOUTME: Universal module proxy tools exposing the whole namespace as a reflective surface
// ABOUTME: list_modules, list_module_functions, call_module_function, get_module_readme and friends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

//! # Proxy Tools
//!
//! Generic handlers that let agents treat the whole workspace as a
//! reflective surface without bespoke tools. The proxy group is trust-class
//! MUTATING because `call_module_function` can reach destructive operations
//! indirectly; that tool additionally requires an ELEVATED session until
//! per-target classification exists.
//!
//! Resolution failures inside `call_module_function` follow the module
//! contract: they come back as an `{"error": ...}` mapping in the tool
//! result, not as a protocol envelope.

use crate::discovery::DiscoveryEngine;
use crate::namespace::{FunctionReturn, ModuleNamespace};
use crate::registry::{make_handler, ToolDescriptor, ToolRegistry, TrustClass};
use crate::trust::TrustLevel;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Documentation excerpt cap for `get_module_readme`.
const README_MAX_CHARS: usize = 5000;

/// Docstring cap for `module_info`.
const DOCSTRING_MAX_CHARS: usize = 500;

#[derive(Deserialize)]
struct ModuleArg {
    module: String,
}

#[derive(Deserialize)]
struct ModuleNameArg {
    module_name: String,
}

#[derive(Deserialize)]
struct CallArgs {
    function: String,
    #[serde(default)]
    kwargs: Map<String, Value>,
}

#[derive(Deserialize)]
struct WorkflowArgs {
    #[serde(default = "default_project_root")]
    project_root: String,
}

fn default_project_root() -> String {
    ".".to_owned()
}

#[derive(Deserialize)]
struct InvalidateArgs {
    #[serde(default)]
    module: Option<String>,
}

/// Build the proxy and discovery-management tool set.
#[must_use]
pub fn proxy_tools(
    namespace: &Arc<ModuleNamespace>,
    discovery: &Arc<DiscoveryEngine>,
    registry: &Arc<ToolRegistry>,
) -> Vec<ToolDescriptor> {
    let mut tools = Vec::new();

    let ns = Arc::clone(namespace);
    tools.push(
        ToolDescriptor::new(
            "codomyrmex.list_modules",
            "List all available Codomyrmex modules",
            json!({"type": "object", "properties": {}}),
        )
        .with_trust(TrustClass::Mutating)
        .with_handler(make_handler(move |_args, _ctx| {
            let ns = Arc::clone(&ns);
            async move {
                let modules: Vec<Value> = ns
                    .modules()
                    .iter()
                    .map(|m| json!({"name": m.path, "doc": m.doc}))
                    .collect();
                Ok(json!({"modules": modules, "count": modules.len()}))
            }
        })),
    );

    let ns = Arc::clone(namespace);
    tools.push(
        ToolDescriptor::new(
            "codomyrmex.module_info",
            "Get info about a specific module (docstring, exports, path)",
            json!({
                "type": "object",
                "properties": {
                    "module_name": {"type": "string", "description": "Module name (e.g. 'security', 'feature_flags')"},
                },
                "required": ["module_name"],
            }),
        )
        .with_handler(make_handler(move |args, _ctx| {
            let ns = Arc::clone(&ns);
            async move {
                let params: ModuleNameArg = serde_json::from_value(args)?;
                let Some(entry) = ns.resolve(&params.module_name) else {
                    return Ok(json!({"error": format!("Module not found: {}", params.module_name)}));
                };
                let mut exports: Vec<&str> =
                    entry.functions.iter().map(|f| f.name).collect();
                exports.extend(entry.classes.iter().map(|c| c.name));
                exports.truncate(50);
                Ok(json!({
                    "module": entry.short_name(),
                    "docstring": truncate(entry.doc, DOCSTRING_MAX_CHARS),
                    "exports": exports,
                    "export_count": entry.functions.len() + entry.classes.len(),
                    "path": entry.path,
                }))
            }
        })),
    );

    let ns = Arc::clone(namespace);
    tools.push(
        ToolDescriptor::new(
            "codomyrmex.list_module_functions",
            "List all public callable functions and classes in any Codomyrmex module. \
             Use this to discover what's available before calling call_module_function.",
            json!({
                "type": "object",
                "properties": {
                    "module": {"type": "string", "description": "Module path (e.g. 'demo', 'feature_flags')"},
                },
                "required": ["module"],
            }),
        )
        .with_trust(TrustClass::Mutating)
        .with_handler(make_handler(move |args, _ctx| {
            let ns = Arc::clone(&ns);
            async move {
                let params: ModuleArg = serde_json::from_value(args)?;
                let full = ModuleNamespace::canonical(&params.module);
                let Some(entry) = ns.resolve(&params.module) else {
                    return Ok(json!({"error": format!("Module {full} not found")}));
                };
                let functions: Vec<Value> = entry
                    .functions
                    .iter()
                    .map(|f| json!({
                        "name": f.name,
                        "signature": f.signature,
                        "docstring": truncate(f.doc, 200),
                    }))
                    .collect();
                let classes: Vec<Value> = entry
                    .classes
                    .iter()
                    .map(|c| json!({
                        "name": c.name,
                        "docstring": truncate(c.doc, 200),
                        "public_methods": c.methods,
                    }))
                    .collect();
                Ok(json!({
                    "module": full,
                    "functions": functions,
                    "classes": classes,
                    "total_callables": entry.functions.len() + entry.classes.len(),
                }))
            }
        })),
    );

    let ns = Arc::clone(namespace);
    tools.push(
        ToolDescriptor::new(
            "codomyrmex.call_module_function",
            "Call any public function from any Codomyrmex module by path. \
             Use list_module_functions first to discover available functions.",
            json!({
                "type": "object",
                "properties": {
                    "function": {
                        "type": "string",
                        "description": "Fully qualified function path (e.g. 'demo.add', 'feature_flags.evaluate')",
                    },
                    "kwargs": {
                        "type": "object",
                        "description": "Keyword arguments to pass to the function",
                        "default": {},
                        "additionalProperties": true,
                    },
                },
                "required": ["function"],
            }),
        )
        .with_trust(TrustClass::Mutating)
        .with_required_level(TrustLevel::Elevated)
        .with_handler(make_handler(move |args, ctx| {
            let ns = Arc::clone(&ns);
            async move {
                let params: CallArgs = serde_json::from_value(args)?;
                let full = ModuleNamespace::canonical(&params.function);
                let Some((module_path, func_name)) = full.rsplit_once('.') else {
                    return Ok(json!({
                        "error": format!("Invalid function path: {:?}. Expected 'module.function'.", params.function),
                    }));
                };
                if func_name.starts_with('_') {
                    return Ok(json!({
                        "error": format!("Cannot call private function {func_name:?}."),
                    }));
                }
                let Some(entry) = ns.resolve(module_path) else {
                    return Ok(json!({"error": format!("Module {module_path} not found")}));
                };
                let Some(function) = entry.function(func_name) else {
                    let available: Vec<&str> = entry
                        .functions
                        .iter()
                        .map(|f| f.name)
                        .take(30)
                        .collect();
                    return Ok(json!({
                        "error": format!("Function {func_name:?} not found in {module_path}."),
                        "available": available,
                    }));
                };
                match (function.handler)(&params.kwargs) {
                    Ok(FunctionReturn::Json(value)) => Ok(json!({"result": value})),
                    Ok(FunctionReturn::Opaque(repr)) => {
                        // Non-JSON return value: coerce to its string repr and
                        // flag it for the audit record.
                        ctx.mark_coerced();
                        Ok(json!({"result": repr}))
                    }
                    Err(e) => Ok(json!({"error": e.to_string()})),
                }
            }
        })),
    );

    let ns = Arc::clone(namespace);
    tools.push(
        ToolDescriptor::new(
            "codomyrmex.get_module_readme",
            "Read the README.md or SPEC.md documentation for any Codomyrmex module",
            json!({
                "type": "object",
                "properties": {
                    "module": {"type": "string", "description": "Module name (e.g. 'agentic_memory', 'feature_flags')"},
                },
                "required": ["module"],
            }),
        )
        .with_trust(TrustClass::Mutating)
        .with_handler(make_handler(move |args, _ctx| {
            let ns = Arc::clone(&ns);
            async move {
                let params: ModuleArg = serde_json::from_value(args)?;
                let full = ModuleNamespace::canonical(&params.module);
                let Some(entry) = ns.resolve(&params.module) else {
                    return Ok(json!({"error": format!("Module {full} not found")}));
                };
                let Some(doc_file) = entry.doc_file else {
                    return Ok(json!({
                        "error": format!("No README.md or SPEC.md found for {full}"),
                    }));
                };
                let content = tokio::fs::read_to_string(doc_file).await.map_err(|e| {
                    crate::errors::ToolError::NotFound(format!(
                        "documentation file {doc_file} unreadable: {e}"
                    ))
                })?;
                let excerpt = if content.chars().count() > README_MAX_CHARS {
                    let head: String = content.chars().take(README_MAX_CHARS).collect();
                    format!("{head}\n\n... (truncated)")
                } else {
                    content
                };
                Ok(json!({"module": full, "path": doc_file, "content": excerpt}))
            }
        })),
    );

    tools.push(list_workflows_tool());
    tools.push(pai_status_tool(discovery, registry, namespace));
    tools.push(invalidate_cache_tool(discovery));

    tools
}

/// `codomyrmex.list_workflows`: enumerate workflow documents with their
/// frontmatter descriptions.
fn list_workflows_tool() -> ToolDescriptor {
    ToolDescriptor::new(
        "codomyrmex.list_workflows",
        "List available agent workflows",
        json!({
            "type": "object",
            "properties": {
                "project_root": {"type": "string", "default": "."},
            },
        }),
    )
    .with_handler(make_handler(|args, _ctx| async move {
        let params: WorkflowArgs = serde_json::from_value(args)?;
        let workflows_dir = PathBuf::from(&params.project_root)
            .join(".agent")
            .join("workflows");
        if !workflows_dir.is_dir() {
            return Ok(json!({
                "workflows": [],
                "count": 0,
                "error": "No workflow directory found",
            }));
        }

        let mut results = Vec::new();
        let mut warnings = Vec::new();
        for entry in std::fs::read_dir(&workflows_dir)? {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != "md") {
                continue;
            }
            let name = path
                .file_stem()
                .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    let (description, warning) = frontmatter_description(&content);
                    if let Some(warning) = warning {
                        warnings.push(format!("{name}.md: {warning}"));
                    }
                    results.push(json!({
                        "name": name,
                        "description": description,
                        "filepath": path.display().to_string(),
                        "size_bytes": content.len(),
                    }));
                }
                Err(e) => warnings.push(format!("Failed to read {name}.md: {e}")),
            }
        }
        results.sort_by(|a, b| {
            a.get("name")
                .and_then(Value::as_str)
                .cmp(&b.get("name").and_then(Value::as_str))
        });
        Ok(json!({
            "workflows": results,
            "count": results.len(),
            "warnings": warnings,
        }))
    }))
}

#[derive(Deserialize)]
struct WorkflowFrontmatter {
    #[serde(default)]
    description: Option<String>,
}

/// Extract the `description` key from YAML frontmatter delimited by `---`.
fn frontmatter_description(content: &str) -> (String, Option<String>) {
    let fallback = "No description".to_owned();
    if !content.starts_with("---") {
        return (fallback, None);
    }
    let mut parts = content.splitn(3, "---");
    parts.next();
    let Some(frontmatter) = parts.next() else {
        return (fallback, None);
    };
    match serde_yaml::from_str::<WorkflowFrontmatter>(frontmatter) {
        Ok(parsed) => (parsed.description.unwrap_or(fallback), None),
        Err(_) => (fallback, Some("Invalid YAML frontmatter".to_owned())),
    }
}

/// `codomyrmex.pai_status`: installation status and component inventory.
fn pai_status_tool(
    discovery: &Arc<DiscoveryEngine>,
    registry: &Arc<ToolRegistry>,
    namespace: &Arc<ModuleNamespace>,
) -> ToolDescriptor {
    let discovery = Arc::clone(discovery);
    let registry = Arc::clone(registry);
    let namespace = Arc::clone(namespace);
    ToolDescriptor::new(
        "codomyrmex.pai_status",
        "Get installation status and component inventory",
        json!({"type": "object", "properties": {}}),
    )
    .with_handler(make_handler(move |_args, _ctx| {
        let discovery = Arc::clone(&discovery);
        let registry = Arc::clone(&registry);
        let namespace = Arc::clone(&namespace);
        async move {
            Ok(json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
                "modules": namespace.len(),
                "tools": {
                    "total": registry.tool_count(),
                    "static": registry.static_count(),
                    "discovered": registry.discovered_count(),
                },
                "discovery": {
                    "cache_hits": discovery.cache_hits(),
                    "scans": discovery.scan_count(),
                },
            }))
        }
    }))
}

/// `codomyrmex.invalidate_cache`: clear the discovery cache, or rescan one
/// module.
fn invalidate_cache_tool(discovery: &Arc<DiscoveryEngine>) -> ToolDescriptor {
    let discovery = Arc::clone(discovery);
    ToolDescriptor::new(
        "codomyrmex.invalidate_cache",
        "Invalidate dynamic tool discovery cache",
        json!({
            "type": "object",
            "properties": {
                "module": {"type": "string", "description": "Specific module to rescan (optional)"},
            },
        }),
    )
    .with_trust(TrustClass::Mutating)
    .with_handler(make_handler(move |args, _ctx| {
        let discovery = Arc::clone(&discovery);
        async move {
            let params: InvalidateArgs = serde_json::from_value(args)?;
            match params.module {
                Some(module) => {
                    let rescan = discovery.rescan_module(&module);
                    Ok(json!({
                        "cleared": false,
                        "rescanned_module": rescan.rescanned_module,
                        "tools_found": rescan.tools_found,
                        "failed": rescan.failed,
                    }))
                }
                None => {
                    discovery.invalidate();
                    Ok(json!({"cleared": true}))
                }
            }
        }
    }))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    } else {
        text.to_owned()
    }
}
