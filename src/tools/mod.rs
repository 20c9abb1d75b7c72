// ABOUTME: Static core tools registered at server construction: file, git, shell, data, testing
// ABOUTME: Thin async handlers over the local workspace, schema-typed per the tool contract
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

//! # Static Core Tools
//!
//! The tool set every server instance carries regardless of what discovery
//! finds: file and directory access, codebase search, git inspection, shell
//! execution, data utilities, and test running. Each handler takes the
//! validated (defaults-applied) argument object and returns a JSON mapping.

use crate::errors::ToolError;
use crate::registry::{make_handler, ToolDescriptor, TrustClass};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Digest;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Deadline for `codomyrmex.run_tests`.
const TEST_RUN_TIMEOUT: Duration = Duration::from_secs(120);

/// Directories never descended into by search and listing.
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules", ".venv", "__pycache__"];

#[derive(Deserialize)]
struct ReadFileArgs {
    path: String,
    encoding: String,
    max_size: u64,
}

#[derive(Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
    create_dirs: bool,
}

#[derive(Deserialize)]
struct ListDirectoryArgs {
    path: String,
    pattern: String,
    recursive: bool,
    max_items: usize,
}

#[derive(Deserialize)]
struct SearchArgs {
    pattern: String,
    path: String,
    #[serde(default)]
    file_types: Option<Vec<String>>,
    case_sensitive: bool,
    max_results: usize,
}

#[derive(Deserialize)]
struct GitStatusArgs {
    path: String,
}

#[derive(Deserialize)]
struct GitDiffArgs {
    path: String,
    staged: bool,
}

#[derive(Deserialize)]
struct RunCommandArgs {
    command: String,
    cwd: String,
    timeout: u64,
}

#[derive(Deserialize)]
struct JsonQueryArgs {
    path: String,
    #[serde(default)]
    query: Option<String>,
}

#[derive(Deserialize)]
struct ChecksumArgs {
    path: String,
    algorithm: String,
}

#[derive(Deserialize)]
struct RunTestsArgs {
    #[serde(default)]
    module: Option<String>,
    verbose: bool,
}

/// Build the static core tool set.
#[must_use]
pub fn static_tools() -> Vec<ToolDescriptor> {
    vec![
        read_file_tool(),
        write_file_tool(),
        list_directory_tool(),
        search_codebase_tool(),
        git_status_tool(),
        git_diff_tool(),
        run_command_tool(),
        json_query_tool(),
        checksum_file_tool(),
        run_tests_tool(),
    ]
}

fn read_file_tool() -> ToolDescriptor {
    ToolDescriptor::new(
        "codomyrmex.read_file",
        "Read file contents with metadata",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path to read"},
                "encoding": {"type": "string", "default": "utf-8"},
                "max_size": {"type": "integer", "default": 1_000_000},
            },
            "required": ["path"],
        }),
    )
    .with_category("file")
    .with_source("codomyrmex.tools")
    .with_handler(make_handler(|args, _ctx| async move {
        let params: ReadFileArgs = serde_json::from_value(args)?;
        if !matches!(params.encoding.as_str(), "utf-8" | "utf8") {
            return Err(ToolError::InvalidInput(format!(
                "unsupported encoding {:?}; only utf-8 is available",
                params.encoding
            )));
        }
        let bytes = tokio::fs::read(&params.path)
            .await
            .map_err(|_| ToolError::NotFound(format!("file not found: {}", params.path)))?;
        let size_bytes = bytes.len() as u64;
        let truncated = size_bytes > params.max_size;
        let visible = if truncated {
            &bytes[..params.max_size as usize]
        } else {
            &bytes[..]
        };
        Ok(json!({
            "path": params.path,
            "content": String::from_utf8_lossy(visible),
            "size_bytes": size_bytes,
            "truncated": truncated,
            "encoding": "utf-8",
        }))
    }))
}

fn write_file_tool() -> ToolDescriptor {
    ToolDescriptor::new(
        "codomyrmex.write_file",
        "Write content to a file",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path to write"},
                "content": {"type": "string", "description": "Content to write"},
                "create_dirs": {"type": "boolean", "default": true},
            },
            "required": ["path", "content"],
        }),
    )
    .with_category("file")
    .with_trust(TrustClass::Mutating)
    .with_source("codomyrmex.tools")
    .with_handler(make_handler(|args, _ctx| async move {
        let params: WriteFileArgs = serde_json::from_value(args)?;
        let path = PathBuf::from(&params.path);
        if params.create_dirs {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&path, params.content.as_bytes()).await?;
        Ok(json!({
            "path": params.path,
            "bytes_written": params.content.len(),
        }))
    }))
}

fn list_directory_tool() -> ToolDescriptor {
    ToolDescriptor::new(
        "codomyrmex.list_directory",
        "List directory contents with filtering",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "default": "."},
                "pattern": {"type": "string", "default": "*"},
                "recursive": {"type": "boolean", "default": false},
                "max_items": {"type": "integer", "default": 200},
            },
        }),
    )
    .with_category("file")
    .with_source("codomyrmex.tools")
    .with_handler(make_handler(|args, _ctx| async move {
        let params: ListDirectoryArgs = serde_json::from_value(args)?;
        let pattern = glob::Pattern::new(&params.pattern)
            .map_err(|e| ToolError::InvalidInput(format!("invalid glob pattern: {e}")))?;
        let root = PathBuf::from(&params.path);
        if !root.is_dir() {
            return Err(ToolError::NotFound(format!(
                "directory not found: {}",
                params.path
            )));
        }

        let mut items = Vec::new();
        let mut truncated = false;
        let mut stack = vec![root];
        'walk: while let Some(dir) = stack.pop() {
            let mut entries: Vec<_> = std::fs::read_dir(&dir)?.collect::<Result<_, _>>()?;
            entries.sort_by_key(std::fs::DirEntry::file_name);
            for entry in entries {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                let is_dir = path.is_dir();
                if is_dir && params.recursive && !SKIPPED_DIRS.contains(&name.as_str()) {
                    stack.push(path.clone());
                }
                if !pattern.matches(&name) {
                    continue;
                }
                if items.len() >= params.max_items {
                    truncated = true;
                    break 'walk;
                }
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                items.push(json!({
                    "name": name,
                    "path": path.display().to_string(),
                    "type": if is_dir { "dir" } else { "file" },
                    "size_bytes": size,
                }));
            }
        }
        Ok(json!({
            "path": params.path,
            "items": items,
            "count": items.len(),
            "truncated": truncated,
        }))
    }))
}

fn search_codebase_tool() -> ToolDescriptor {
    ToolDescriptor::new(
        "codomyrmex.search_codebase",
        "Search for patterns in code files (regex supported)",
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "description": "Search pattern"},
                "path": {"type": "string", "default": "."},
                "file_types": {"type": "array", "items": {"type": "string"}},
                "case_sensitive": {"type": "boolean", "default": false},
                "max_results": {"type": "integer", "default": 100},
            },
            "required": ["pattern"],
        }),
    )
    .with_category("file")
    .with_source("codomyrmex.tools")
    .with_handler(make_handler(|args, _ctx| async move {
        let params: SearchArgs = serde_json::from_value(args)?;
        let regex = regex::RegexBuilder::new(&params.pattern)
            .case_insensitive(!params.case_sensitive)
            .build()
            .map_err(|e| ToolError::InvalidInput(format!("invalid regex: {e}")))?;

        let mut matches = Vec::new();
        let mut truncated = false;
        let mut stack = vec![PathBuf::from(&params.path)];
        'walk: while let Some(dir) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            let mut entries: Vec<_> = entries.flatten().collect();
            entries.sort_by_key(std::fs::DirEntry::file_name);
            for entry in entries {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                if path.is_dir() {
                    if !SKIPPED_DIRS.contains(&name.as_str()) && !name.starts_with('.') {
                        stack.push(path);
                    }
                    continue;
                }
                if let Some(types) = &params.file_types {
                    let ext = path
                        .extension()
                        .map_or_else(String::new, |e| e.to_string_lossy().into_owned());
                    if !types.iter().any(|t| t.trim_start_matches('.') == ext) {
                        continue;
                    }
                }
                let Ok(content) = std::fs::read_to_string(&path) else {
                    continue;
                };
                for (index, line) in content.lines().enumerate() {
                    if regex.is_match(line) {
                        if matches.len() >= params.max_results {
                            truncated = true;
                            break 'walk;
                        }
                        matches.push(json!({
                            "file": path.display().to_string(),
                            "line_number": index + 1,
                            "line": line.trim_end(),
                        }));
                    }
                }
            }
        }
        Ok(json!({
            "pattern": params.pattern,
            "matches": matches,
            "count": matches.len(),
            "truncated": truncated,
        }))
    }))
}

fn git_status_tool() -> ToolDescriptor {
    ToolDescriptor::new(
        "codomyrmex.git_status",
        "Get git repository status",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "default": "."},
            },
        }),
    )
    .with_category("git")
    .with_source("codomyrmex.tools")
    .with_handler(make_handler(|args, _ctx| async move {
        let params: GitStatusArgs = serde_json::from_value(args)?;
        let output = run_git(&params.path, &["status", "--porcelain", "--branch"]).await?;
        let clean = output.lines().filter(|l| !l.starts_with("##")).count() == 0;
        Ok(json!({
            "path": params.path,
            "output": output,
            "clean": clean,
        }))
    }))
}

fn git_diff_tool() -> ToolDescriptor {
    ToolDescriptor::new(
        "codomyrmex.git_diff",
        "Get git diff for changes",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "default": "."},
                "staged": {"type": "boolean", "default": false},
            },
        }),
    )
    .with_category("git")
    .with_source("codomyrmex.tools")
    .with_handler(make_handler(|args, _ctx| async move {
        let params: GitDiffArgs = serde_json::from_value(args)?;
        let diff_args: &[&str] = if params.staged {
            &["diff", "--cached"]
        } else {
            &["diff"]
        };
        let output = run_git(&params.path, diff_args).await?;
        Ok(json!({
            "path": params.path,
            "staged": params.staged,
            "diff": output,
        }))
    }))
}

fn run_command_tool() -> ToolDescriptor {
    ToolDescriptor::new(
        "codomyrmex.run_command",
        "Execute a shell command",
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Command to execute"},
                "cwd": {"type": "string", "default": "."},
                "timeout": {"type": "integer", "default": 30},
            },
            "required": ["command"],
        }),
    )
    .with_category("shell")
    .with_trust(TrustClass::Destructive)
    .with_source("codomyrmex.tools")
    .with_handler(make_handler(|args, _ctx| async move {
        let params: RunCommandArgs = serde_json::from_value(args)?;
        let deadline = Duration::from_secs(params.timeout);
        let child = Command::new("sh")
            .arg("-c")
            .arg(&params.command)
            .current_dir(&params.cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(deadline, child).await.map_err(|_| {
            ToolError::Execution(format!("command timed out after {}s", params.timeout))
        })??;

        Ok(json!({
            "returncode": output.status.code(),
            "stdout": tail(&String::from_utf8_lossy(&output.stdout), 2000),
            "stderr": tail(&String::from_utf8_lossy(&output.stderr), 1000),
        }))
    }))
}

fn json_query_tool() -> ToolDescriptor {
    ToolDescriptor::new(
        "codomyrmex.json_query",
        "Read and optionally query a JSON file via dot-notation",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "JSON file path"},
                "query": {"type": "string", "description": "Dot-notation path"},
            },
            "required": ["path"],
        }),
    )
    .with_category("data")
    .with_source("codomyrmex.tools")
    .with_handler(make_handler(|args, _ctx| async move {
        let params: JsonQueryArgs = serde_json::from_value(args)?;
        let raw = tokio::fs::read_to_string(&params.path)
            .await
            .map_err(|_| ToolError::NotFound(format!("file not found: {}", params.path)))?;
        let document: Value = serde_json::from_str(&raw)
            .map_err(|e| ToolError::InvalidInput(format!("invalid JSON in {}: {e}", params.path)))?;

        let value = match &params.query {
            Some(query) => query_dotted(&document, query).ok_or_else(|| {
                ToolError::NotFound(format!("query path {query:?} not found in document"))
            })?,
            None => document,
        };
        Ok(json!({"path": params.path, "value": value}))
    }))
}

fn checksum_file_tool() -> ToolDescriptor {
    ToolDescriptor::new(
        "codomyrmex.checksum_file",
        "Calculate file checksum (sha256, sha1)",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path"},
                "algorithm": {"type": "string", "default": "sha256"},
            },
            "required": ["path"],
        }),
    )
    .with_category("data")
    .with_source("codomyrmex.tools")
    .with_handler(make_handler(|args, _ctx| async move {
        let params: ChecksumArgs = serde_json::from_value(args)?;
        let bytes = tokio::fs::read(&params.path)
            .await
            .map_err(|_| ToolError::NotFound(format!("file not found: {}", params.path)))?;
        let digest = match params.algorithm.as_str() {
            "sha256" => hex::encode(sha2::Sha256::digest(&bytes)),
            "sha1" => hex::encode(sha1::Sha1::digest(&bytes)),
            "md5" => {
                return Err(ToolError::InvalidInput(
                    "md5 is not supported (weak digest); use sha256 or sha1".to_owned(),
                ))
            }
            other => {
                return Err(ToolError::InvalidInput(format!(
                    "unsupported algorithm {other:?}; use sha256 or sha1"
                )))
            }
        };
        Ok(json!({
            "path": params.path,
            "algorithm": params.algorithm,
            "digest": digest,
            "size_bytes": bytes.len(),
        }))
    }))
}

fn run_tests_tool() -> ToolDescriptor {
    ToolDescriptor::new(
        "codomyrmex.run_tests",
        "Run the test suite for a specific module or the whole project",
        json!({
            "type": "object",
            "properties": {
                "module": {"type": "string", "description": "Module name to test (optional)"},
                "verbose": {"type": "boolean", "default": false},
            },
        }),
    )
    .with_category("testing")
    .with_trust(TrustClass::Mutating)
    .with_source("codomyrmex.tools")
    .with_timeout(TEST_RUN_TIMEOUT)
    .with_handler(make_handler(|args, _ctx| async move {
        let params: RunTestsArgs = serde_json::from_value(args)?;
        let mut command = Command::new("cargo");
        command.arg("test");
        if let Some(module) = &params.module {
            command.arg(module);
        }
        if params.verbose {
            command.args(["--", "--nocapture"]);
        }
        command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(TEST_RUN_TIMEOUT, command.output())
            .await
            .map_err(|_| {
                ToolError::Execution(format!(
                    "test execution timed out ({}s limit)",
                    TEST_RUN_TIMEOUT.as_secs()
                ))
            })??;

        Ok(json!({
            "returncode": output.status.code(),
            "passed": output.status.success(),
            "stdout": tail(&String::from_utf8_lossy(&output.stdout), 2000),
            "stderr": tail(&String::from_utf8_lossy(&output.stderr), 1000),
        }))
    }))
}

/// Run a git subcommand, capturing output.
async fn run_git(path: &str, args: &[&str]) -> Result<String, ToolError> {
    if !Path::new(path).is_dir() {
        return Err(ToolError::NotFound(format!("directory not found: {path}")));
    }
    let output = Command::new("git")
        .args(args)
        .current_dir(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(ToolError::Execution(format!(
            "git {} failed: {}",
            args.first().unwrap_or(&""),
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

/// Walk a JSON document by dot-notation path; numeric segments index arrays.
fn query_dotted(document: &Value, query: &str) -> Option<Value> {
    let mut current = document;
    for segment in query.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

/// Keep the last `max_chars` characters of command output.
fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count > max_chars {
        text.chars().skip(count - max_chars).collect()
    } else {
        text.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_query_walks_objects_and_arrays() {
        let doc = json!({"a": {"b": [10, {"c": true}]}});
        assert_eq!(query_dotted(&doc, "a.b.0"), Some(json!(10)));
        assert_eq!(query_dotted(&doc, "a.b.1.c"), Some(json!(true)));
        assert_eq!(query_dotted(&doc, "a.missing"), None);
    }

    #[test]
    fn tail_keeps_suffix() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("ab", 3), "ab");
    }
}
