// ABOUTME: Built-in module inventory mirroring the workspace modules the tool plane fronts
// ABOUTME: Declares proxy function tables and the tool registrars discovery collects from
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

//! Built-in module namespace.
//!
//! The domain modules themselves are external collaborators; the entries here
//! describe their reflective surface (docs, public callables) and contribute
//! the thin MCP tool handlers they register. The `schedule` registrar fails
//! deterministically: its initialisation cycle is a known defect upstream and
//! keeps the failure-capture path exercised end to end.

use super::{
    ClassEntry, FunctionEntry, FunctionReturn, ModuleEntry, ModuleNamespace, ModuleScanError,
};
use crate::errors::ToolError;
use crate::registry::{make_handler, ToolDescriptor, TrustClass};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sha2::Digest;
use std::path::{Path, PathBuf};

/// Assemble the built-in namespace.
#[must_use]
pub fn builtin_namespace() -> ModuleNamespace {
    ModuleNamespace::new(vec![
        ModuleEntry {
            path: "codomyrmex.demo",
            doc: "Minimal demonstration module used to exercise the proxy surface.",
            functions: DEMO_FUNCTIONS,
            classes: &[],
            doc_file: None,
            registrar: None,
        },
        ModuleEntry {
            path: "codomyrmex.feature_flags",
            doc: "Feature flag management with evaluation and rollout strategies.",
            functions: FEATURE_FLAG_FUNCTIONS,
            classes: &[ClassEntry {
                name: "FlagManager",
                doc: "Owns the flag table and evaluation strategies.",
                methods: &["evaluate", "list_flags", "set_override"],
            }],
            doc_file: Some("docs/modules/feature_flags.md"),
            registrar: Some(register_feature_flag_tools),
        },
        ModuleEntry {
            path: "codomyrmex.agentic_memory",
            doc: "Agentic long-term memory backed by Obsidian vaults.",
            functions: &[],
            classes: &[ClassEntry {
                name: "ObsidianVault",
                doc: "Vault handle exposing note CRUD, search, and the link graph.",
                methods: &["metadata", "get_all_tags", "read_note", "create_note", "delete_note"],
            }],
            doc_file: Some("docs/modules/agentic_memory.md"),
            registrar: Some(register_obsidian_tools),
        },
        ModuleEntry {
            path: "codomyrmex.schedule",
            doc: "Cron and recurring job scheduling.",
            functions: &[],
            classes: &[ClassEntry {
                name: "Scheduler",
                doc: "Recurring job scheduler with timezone-aware cron parsing.",
                methods: &["schedule", "cancel", "next_run"],
            }],
            doc_file: None,
            registrar: Some(register_schedule_tools),
        },
        ModuleEntry {
            path: "codomyrmex.security",
            doc: "Security primitives and audit surfaces.",
            functions: SECURITY_FUNCTIONS,
            classes: &[],
            doc_file: None,
            registrar: None,
        },
        ModuleEntry {
            path: "codomyrmex.coding",
            doc: "Code analysis and static analysis front ends.",
            functions: &[],
            classes: &[ClassEntry {
                name: "StaticAnalyzer",
                doc: "Runs configured analyzers over a source tree and merges findings.",
                methods: &["analyze_file", "analyze_tree", "list_analyzers"],
            }],
            doc_file: None,
            registrar: None,
        },
        ModuleEntry {
            path: "codomyrmex.logistics",
            doc: "Scheduling, routing, and task orchestration.",
            functions: &[],
            classes: &[ClassEntry {
                name: "RoutePlanner",
                doc: "Plans delivery routes over a weighted stop graph.",
                methods: &["plan", "estimate_cost"],
            }],
            doc_file: None,
            registrar: None,
        },
        ModuleEntry {
            path: "codomyrmex.relations",
            doc: "Content-addressed entity graphs and derivations.",
            functions: &[],
            classes: &[ClassEntry {
                name: "UorEngine",
                doc: "Universal object reference engine over the entity graph.",
                methods: &["derive", "resolve", "link"],
            }],
            doc_file: None,
            registrar: None,
        },
    ])
}

// ── demo ────────────────────────────────────────────────────────────────

const DEMO_FUNCTIONS: &[FunctionEntry] = &[
    FunctionEntry {
        name: "add",
        signature: "(a: int, b: int)",
        doc: "Add two integers.",
        handler: demo_add,
    },
    FunctionEntry {
        name: "echo",
        signature: "(message: str)",
        doc: "Return the message unchanged.",
        handler: demo_echo,
    },
    FunctionEntry {
        name: "handle",
        signature: "()",
        doc: "Return the module's runtime handle (not JSON serialisable).",
        handler: demo_handle,
    },
    FunctionEntry {
        name: "fail",
        signature: "()",
        doc: "Always raises, for error-path testing.",
        handler: demo_fail,
    },
];

fn demo_add(kwargs: &Map<String, Value>) -> Result<FunctionReturn, ToolError> {
    let a = int_arg(kwargs, "a")?;
    let b = int_arg(kwargs, "b")?;
    Ok(FunctionReturn::Json(json!(a + b)))
}

fn demo_echo(kwargs: &Map<String, Value>) -> Result<FunctionReturn, ToolError> {
    let message = str_arg(kwargs, "message")?;
    Ok(FunctionReturn::Json(json!(message)))
}

fn demo_handle(_kwargs: &Map<String, Value>) -> Result<FunctionReturn, ToolError> {
    Ok(FunctionReturn::Opaque(
        "ModuleHandle(codomyrmex.demo)".to_owned(),
    ))
}

fn demo_fail(_kwargs: &Map<String, Value>) -> Result<FunctionReturn, ToolError> {
    Err(ToolError::Execution("intentional demo failure".to_owned()))
}

// ── feature_flags ───────────────────────────────────────────────────────

/// Flag table: (name, enabled, rollout stage).
const FLAG_TABLE: &[(&str, bool, &str)] = &[
    ("obsidian_graph_view", true, "stable"),
    ("uor_derivation_cache", false, "experimental"),
    ("parallel_static_analysis", true, "beta"),
];

const FEATURE_FLAG_FUNCTIONS: &[FunctionEntry] = &[
    FunctionEntry {
        name: "evaluate",
        signature: "(flag: str, default: bool = False)",
        doc: "Evaluate a flag, falling back to the default for unknown names.",
        handler: flags_evaluate,
    },
    FunctionEntry {
        name: "list_flags",
        signature: "()",
        doc: "List every known flag with its rollout stage.",
        handler: flags_list,
    },
];

fn flags_evaluate(kwargs: &Map<String, Value>) -> Result<FunctionReturn, ToolError> {
    let flag = str_arg(kwargs, "flag")?;
    let default = kwargs.get("default").and_then(Value::as_bool).unwrap_or(false);
    let (enabled, known) = FLAG_TABLE
        .iter()
        .find(|(name, _, _)| *name == flag)
        .map_or((default, false), |(_, enabled, _)| (*enabled, true));
    Ok(FunctionReturn::Json(
        json!({"flag": flag, "enabled": enabled, "known": known}),
    ))
}

fn flags_list(_kwargs: &Map<String, Value>) -> Result<FunctionReturn, ToolError> {
    let flags: Vec<Value> = FLAG_TABLE
        .iter()
        .map(|(name, enabled, stage)| json!({"name": name, "enabled": enabled, "stage": stage}))
        .collect();
    Ok(FunctionReturn::Json(json!({"flags": flags, "count": flags.len()})))
}

fn register_feature_flag_tools() -> Result<Vec<ToolDescriptor>, ModuleScanError> {
    Ok(vec![
        ToolDescriptor::new(
            "codomyrmex.feature_flags.evaluate",
            "Evaluate a feature flag for the current workspace",
            json!({
                "type": "object",
                "properties": {
                    "flag": {"type": "string", "description": "Flag name"},
                    "default": {"type": "boolean", "default": false},
                },
                "required": ["flag"],
            }),
        )
        .with_category("feature_flags")
        .with_source("codomyrmex.feature_flags")
        .with_handler(make_handler(|args, _ctx| async move {
            let kwargs = as_kwargs(&args);
            match flags_evaluate(&kwargs)? {
                FunctionReturn::Json(v) => Ok(v),
                FunctionReturn::Opaque(s) => Ok(json!({"result": s})),
            }
        })),
        ToolDescriptor::new(
            "codomyrmex.feature_flags.list",
            "List all feature flags with rollout stages",
            json!({"type": "object", "properties": {}}),
        )
        .with_category("feature_flags")
        .with_source("codomyrmex.feature_flags")
        .with_handler(make_handler(|args, _ctx| async move {
            let kwargs = as_kwargs(&args);
            match flags_list(&kwargs)? {
                FunctionReturn::Json(v) => Ok(v),
                FunctionReturn::Opaque(s) => Ok(json!({"result": s})),
            }
        })),
    ])
}

// ── agentic_memory (obsidian) ───────────────────────────────────────────

#[derive(Deserialize)]
struct VaultArgs {
    vault_path: String,
}

#[derive(Deserialize)]
struct NoteArgs {
    vault_path: String,
    note_path: String,
}

#[derive(Deserialize)]
struct CreateNoteArgs {
    vault_path: String,
    note_path: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct SearchArgs {
    vault_path: String,
    query: String,
    #[serde(default = "default_search_limit")]
    limit: usize,
}

fn default_search_limit() -> usize {
    20
}

fn vault_path_prop() -> Value {
    json!({"type": "string", "description": "Vault root directory"})
}

fn register_obsidian_tools() -> Result<Vec<ToolDescriptor>, ModuleScanError> {
    Ok(vec![
        ToolDescriptor::new(
            "codomyrmex.obsidian.load_vault",
            "Load an Obsidian vault and return metadata",
            json!({
                "type": "object",
                "properties": {"vault_path": vault_path_prop()},
                "required": ["vault_path"],
            }),
        )
        .with_category("obsidian")
        .with_source("codomyrmex.agentic_memory")
        .with_handler(make_handler(|args, _ctx| async move {
            let params: VaultArgs = serde_json::from_value(args)?;
            let notes = collect_notes(Path::new(&params.vault_path))?;
            Ok(json!({
                "status": "ok",
                "path": params.vault_path,
                "note_count": notes.len(),
            }))
        })),
        ToolDescriptor::new(
            "codomyrmex.obsidian.read_note",
            "Read a note from an Obsidian vault",
            json!({
                "type": "object",
                "properties": {
                    "vault_path": vault_path_prop(),
                    "note_path": {"type": "string", "description": "Note path relative to the vault"},
                },
                "required": ["vault_path", "note_path"],
            }),
        )
        .with_category("obsidian")
        .with_source("codomyrmex.agentic_memory")
        .with_handler(make_handler(|args, _ctx| async move {
            let params: NoteArgs = serde_json::from_value(args)?;
            let path = Path::new(&params.vault_path).join(&params.note_path);
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|_| ToolError::NotFound(format!("note not found: {}", params.note_path)))?;
            Ok(json!({
                "status": "ok",
                "title": note_title(&path, &content),
                "path": params.note_path,
                "content": content,
            }))
        })),
        ToolDescriptor::new(
            "codomyrmex.obsidian.create_note",
            "Create a new note in an Obsidian vault",
            json!({
                "type": "object",
                "properties": {
                    "vault_path": vault_path_prop(),
                    "note_path": {"type": "string", "description": "Note path relative to the vault"},
                    "content": {"type": "string", "default": ""},
                },
                "required": ["vault_path", "note_path"],
            }),
        )
        .with_category("obsidian")
        .with_trust(TrustClass::Mutating)
        .with_source("codomyrmex.agentic_memory")
        .with_handler(make_handler(|args, _ctx| async move {
            let params: CreateNoteArgs = serde_json::from_value(args)?;
            let path = Path::new(&params.vault_path).join(&params.note_path);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, &params.content).await?;
            Ok(json!({
                "status": "ok",
                "title": note_title(&path, &params.content),
                "path": params.note_path,
            }))
        })),
        ToolDescriptor::new(
            "codomyrmex.obsidian.delete_note",
            "Delete a note from an Obsidian vault",
            json!({
                "type": "object",
                "properties": {
                    "vault_path": vault_path_prop(),
                    "note_path": {"type": "string", "description": "Note path relative to the vault"},
                },
                "required": ["vault_path", "note_path"],
            }),
        )
        .with_category("obsidian")
        .with_trust(TrustClass::Destructive)
        .with_source("codomyrmex.agentic_memory")
        .with_handler(make_handler(|args, _ctx| async move {
            let params: NoteArgs = serde_json::from_value(args)?;
            let path = Path::new(&params.vault_path).join(&params.note_path);
            let deleted = tokio::fs::remove_file(&path).await.is_ok();
            Ok(json!({
                "status": if deleted { "ok" } else { "not_found" },
                "deleted": deleted,
                "path": params.note_path,
            }))
        })),
        ToolDescriptor::new(
            "codomyrmex.obsidian.search",
            "Search notes in an Obsidian vault",
            json!({
                "type": "object",
                "properties": {
                    "vault_path": vault_path_prop(),
                    "query": {"type": "string", "description": "Search query"},
                    "limit": {"type": "integer", "default": 20},
                },
                "required": ["vault_path", "query"],
            }),
        )
        .with_category("obsidian")
        .with_source("codomyrmex.agentic_memory")
        .with_handler(make_handler(|args, _ctx| async move {
            let params: SearchArgs = serde_json::from_value(args)?;
            let needle = params.query.to_lowercase();
            let mut results = Vec::new();
            for note in collect_notes(Path::new(&params.vault_path))? {
                if results.len() >= params.limit {
                    break;
                }
                let Ok(content) = std::fs::read_to_string(&note) else {
                    continue;
                };
                if let Some(line) = content
                    .lines()
                    .find(|line| line.to_lowercase().contains(&needle))
                {
                    results.push(json!({
                        "title": note_title(&note, &content),
                        "path": note.display().to_string(),
                        "context": line.trim(),
                    }));
                }
            }
            Ok(json!({"status": "ok", "count": results.len(), "results": results}))
        })),
    ])
}

/// Title from the first level-1 heading, falling back to the file stem.
fn note_title(path: &Path, content: &str) -> String {
    content
        .lines()
        .find_map(|line| line.strip_prefix("# ").map(str::trim))
        .map_or_else(
            || {
                path.file_stem()
                    .map_or_else(String::new, |s| s.to_string_lossy().into_owned())
            },
            str::to_owned,
        )
}

/// Collect every `.md` note under the vault root.
fn collect_notes(root: &Path) -> Result<Vec<PathBuf>, ToolError> {
    if !root.is_dir() {
        return Err(ToolError::NotFound(format!(
            "vault not found: {}",
            root.display()
        )));
    }
    let mut notes = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().is_some_and(|ext| ext == "md") {
                notes.push(path);
            }
        }
    }
    notes.sort();
    Ok(notes)
}

// ── schedule ────────────────────────────────────────────────────────────

fn register_schedule_tools() -> Result<Vec<ToolDescriptor>, ModuleScanError> {
    // Known upstream defect: the scheduler pulls in orchestration during
    // init, which pulls schedule back in. Surfaces as a scan failure rather
    // than aborting the whole discovery pass.
    Err(ModuleScanError(
        "cyclic module initialisation: schedule -> orchestration -> schedule".to_owned(),
    ))
}

// ── security ────────────────────────────────────────────────────────────

const SECURITY_FUNCTIONS: &[FunctionEntry] = &[FunctionEntry {
    name: "fingerprint",
    signature: "(text: str, algorithm: str = 'sha256')",
    doc: "Hex digest of the given text.",
    handler: security_fingerprint,
}];

fn security_fingerprint(kwargs: &Map<String, Value>) -> Result<FunctionReturn, ToolError> {
    let text = str_arg(kwargs, "text")?;
    let algorithm = kwargs
        .get("algorithm")
        .and_then(Value::as_str)
        .unwrap_or("sha256");
    let digest = match algorithm {
        "sha256" => hex::encode(sha2::Sha256::digest(text.as_bytes())),
        "sha1" => hex::encode(sha1::Sha1::digest(text.as_bytes())),
        other => {
            return Err(ToolError::InvalidInput(format!(
                "unsupported algorithm: {other:?}"
            )))
        }
    };
    Ok(FunctionReturn::Json(
        json!({"algorithm": algorithm, "digest": digest}),
    ))
}

// ── shared argument helpers ─────────────────────────────────────────────

fn int_arg(kwargs: &Map<String, Value>, name: &str) -> Result<i64, ToolError> {
    kwargs
        .get(name)
        .and_then(Value::as_i64)
        .ok_or_else(|| ToolError::InvalidInput(format!("missing or non-integer argument {name:?}")))
}

fn str_arg<'a>(kwargs: &'a Map<String, Value>, name: &str) -> Result<&'a str, ToolError> {
    kwargs
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidInput(format!("missing or non-string argument {name:?}")))
}

fn as_kwargs(args: &Value) -> Map<String, Value> {
    args.as_object().cloned().unwrap_or_default()
}
