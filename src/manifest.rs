// ABOUTME: Skill manifest builder summarising the server's tools, resources, and prompts
// ABOUTME: Exposed as the codomyrmex://manifest resource for skill-routing consumers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

//! Skill manifest.
//!
//! A machine-readable summary of everything the server exposes, consumable
//! by skill-routing systems. Static and discovered tools are merged under
//! the later-registration-wins rule the registry already applies.

use crate::registry::ToolRegistry;
use serde_json::{json, Value};
use std::sync::Arc;

/// Build the skill manifest from the current registry state.
#[must_use]
pub fn skill_manifest(registry: &Arc<ToolRegistry>) -> Value {
    let tools: Vec<Value> = registry
        .list_tools()
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "category": tool.category,
                "trust_class": tool.trust_class,
                "input_schema": tool.parameter_schema,
            })
        })
        .collect();

    let resources: Vec<Value> = registry
        .list_resources()
        .iter()
        .map(|resource| {
            json!({
                "uri": resource.uri,
                "name": resource.name,
                "description": resource.description,
            })
        })
        .collect();

    let prompts: Vec<Value> = registry
        .list_prompts()
        .iter()
        .map(|prompt| {
            json!({
                "name": prompt.name,
                "description": prompt.description,
            })
        })
        .collect();

    json!({
        "name": "Codomyrmex",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Modular coding workspace exposing workspace modules for AI-assisted \
                        development, code analysis, testing, and automation.",
        "mcp_server": "codomyrmex-mcp-server",
        "tools": tools,
        "resources": resources,
        "prompts": prompts,
    })
}
