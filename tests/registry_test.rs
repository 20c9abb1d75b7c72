// ABOUTME: Tests for the tool registry: registration, conflicts, ordering, and lookup
// ABOUTME: Validates static/discovered generations, shadowing, categories, and idempotent removal
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use codomyrmex_mcp_server::registry::{
    make_handler, ToolDescriptor, ToolOrigin, ToolRegistry, TrustClass,
};
use serde_json::json;

fn descriptor(name: &str) -> ToolDescriptor {
    ToolDescriptor::new(name, format!("test tool {name}"), json!({"type": "object", "properties": {}}))
        .with_source("codomyrmex.test")
        .with_handler(make_handler(|_args, _ctx| async move { Ok(json!({"ok": true})) }))
}

#[test]
fn register_and_lookup() {
    let registry = ToolRegistry::new();
    registry
        .register(descriptor("codomyrmex.a"), ToolOrigin::Static, false)
        .unwrap();
    let found = registry.lookup("codomyrmex.a").unwrap();
    assert_eq!(found.name, "codomyrmex.a");
    assert!(found.handler.is_some());
}

#[test]
fn second_register_conflicts_and_first_survives() {
    let registry = ToolRegistry::new();
    registry
        .register(
            ToolDescriptor::new("codomyrmex.a", "first", json!({"type": "object"})),
            ToolOrigin::Static,
            false,
        )
        .unwrap();
    let err = registry.register(
        ToolDescriptor::new("codomyrmex.a", "second", json!({"type": "object"})),
        ToolOrigin::Static,
        false,
    );
    assert!(err.is_err());
    assert_eq!(registry.lookup("codomyrmex.a").unwrap().description, "first");
}

#[test]
fn overwrite_replaces() {
    let registry = ToolRegistry::new();
    registry
        .register(
            ToolDescriptor::new("codomyrmex.a", "first", json!({"type": "object"})),
            ToolOrigin::Static,
            false,
        )
        .unwrap();
    registry
        .register(
            ToolDescriptor::new("codomyrmex.a", "second", json!({"type": "object"})),
            ToolOrigin::Static,
            true,
        )
        .unwrap();
    assert_eq!(registry.lookup("codomyrmex.a").unwrap().description, "second");
}

#[test]
fn deregister_is_idempotent() {
    let registry = ToolRegistry::new();
    registry
        .register(descriptor("codomyrmex.a"), ToolOrigin::Static, false)
        .unwrap();
    registry.deregister("codomyrmex.a");
    registry.deregister("codomyrmex.a");
    assert!(registry.lookup("codomyrmex.a").is_none());
}

#[test]
fn list_orders_statics_before_discovered_stably() {
    let registry = ToolRegistry::new();
    registry
        .register(descriptor("codomyrmex.s1"), ToolOrigin::Static, false)
        .unwrap();
    registry
        .register(descriptor("codomyrmex.s2"), ToolOrigin::Static, false)
        .unwrap();
    registry.replace_discovered(vec![descriptor("codomyrmex.d1"), descriptor("codomyrmex.d2")]);

    let names: Vec<String> = registry.list_tools().iter().map(|d| d.name.clone()).collect();
    assert_eq!(
        names,
        vec!["codomyrmex.s1", "codomyrmex.s2", "codomyrmex.d1", "codomyrmex.d2"]
    );
}

#[test]
fn discovered_shadows_static_in_lookup_and_listing() {
    let registry = ToolRegistry::new();
    registry
        .register(
            ToolDescriptor::new("codomyrmex.a", "static variant", json!({"type": "object"})),
            ToolOrigin::Static,
            false,
        )
        .unwrap();
    registry.replace_discovered(vec![ToolDescriptor::new(
        "codomyrmex.a",
        "discovered variant",
        json!({"type": "object"}),
    )]);

    assert_eq!(
        registry.lookup("codomyrmex.a").unwrap().description,
        "discovered variant"
    );
    let listed: Vec<String> = registry
        .list_tools()
        .iter()
        .map(|d| d.description.clone())
        .collect();
    assert_eq!(listed, vec!["discovered variant"]);
    assert_eq!(registry.tool_count(), 1);
}

#[test]
fn rescan_replaces_only_one_module() {
    let registry = ToolRegistry::new();
    registry.replace_discovered(vec![
        descriptor("codomyrmex.alpha.one").with_source("codomyrmex.alpha"),
        descriptor("codomyrmex.beta.one").with_source("codomyrmex.beta"),
    ]);
    registry.replace_module_tools(
        "codomyrmex.alpha",
        vec![descriptor("codomyrmex.alpha.two").with_source("codomyrmex.alpha")],
    );

    assert!(registry.lookup("codomyrmex.alpha.one").is_none());
    assert!(registry.lookup("codomyrmex.alpha.two").is_some());
    assert!(registry.lookup("codomyrmex.beta.one").is_some());
}

#[test]
fn categories_are_distinct_and_sorted() {
    let registry = ToolRegistry::new();
    registry
        .register(
            descriptor("codomyrmex.a").with_category("file"),
            ToolOrigin::Static,
            false,
        )
        .unwrap();
    registry
        .register(
            descriptor("codomyrmex.b").with_category("git"),
            ToolOrigin::Static,
            false,
        )
        .unwrap();
    registry
        .register(
            descriptor("codomyrmex.c").with_category("file"),
            ToolOrigin::Static,
            false,
        )
        .unwrap();

    let categories: Vec<String> = registry.list_categories().into_iter().collect();
    assert_eq!(categories, vec!["file", "git"]);
}

#[test]
fn empty_registry_boundaries() {
    let registry = ToolRegistry::new();
    assert!(registry.list_tools().is_empty());
    assert!(registry.lookup("codomyrmex.anything").is_none());
    assert_eq!(registry.tool_count(), 0);
}

#[test]
fn trust_class_defaults_to_safe() {
    let d = ToolDescriptor::new("codomyrmex.x", "x", json!({"type": "object"}));
    assert_eq!(d.trust_class, TrustClass::Safe);
    assert_eq!(d.category, "general");
}
