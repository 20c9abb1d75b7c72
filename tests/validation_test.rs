// ABOUTME: Tests for the JSON-schema subset validator
// ABOUTME: Covers defaults, required fields, unknown-field rejection, nesting, and arrays
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use codomyrmex_mcp_server::validation::validate_arguments;
use serde_json::json;

fn file_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "path": {"type": "string", "description": "File path"},
            "encoding": {"type": "string", "default": "utf-8"},
            "max_size": {"type": "integer", "default": 1_000_000},
        },
        "required": ["path"],
    })
}

#[test]
fn valid_arguments_pass_with_defaults_materialised() {
    let out = validate_arguments(&file_schema(), json!({"path": "a.txt"})).unwrap();
    assert_eq!(out["path"], json!("a.txt"));
    assert_eq!(out["encoding"], json!("utf-8"));
    assert_eq!(out["max_size"], json!(1_000_000));
}

#[test]
fn explicit_values_win_over_defaults() {
    let out =
        validate_arguments(&file_schema(), json!({"path": "a.txt", "max_size": 10})).unwrap();
    assert_eq!(out["max_size"], json!(10));
}

#[test]
fn missing_required_field_names_the_path() {
    let err = validate_arguments(&file_schema(), json!({})).unwrap_err();
    assert_eq!(err.field, "path");
    assert!(err.message.contains("required"));
}

#[test]
fn type_mismatch_names_the_field() {
    // Spec scenario: {"path": 42} against a string property.
    let err = validate_arguments(&file_schema(), json!({"path": 42})).unwrap_err();
    assert_eq!(err.field, "path");
    assert!(err.message.contains("expected string"));
}

#[test]
fn unknown_fields_rejected_by_default() {
    let err = validate_arguments(&file_schema(), json!({"path": "a", "stray": 1})).unwrap_err();
    assert_eq!(err.field, "stray");
}

#[test]
fn additional_properties_true_admits_unknown_fields() {
    let schema = json!({
        "type": "object",
        "properties": {"kwargs": {"type": "object", "additionalProperties": true}},
    });
    let out = validate_arguments(&schema, json!({"kwargs": {"anything": [1, 2]}})).unwrap();
    assert_eq!(out["kwargs"]["anything"], json!([1, 2]));
}

#[test]
fn nested_object_violations_carry_dotted_paths() {
    let schema = json!({
        "type": "object",
        "properties": {
            "options": {
                "type": "object",
                "properties": {
                    "depth": {"type": "integer"},
                },
            },
        },
    });
    let err =
        validate_arguments(&schema, json!({"options": {"depth": "deep"}})).unwrap_err();
    assert_eq!(err.field, "options.depth");
}

#[test]
fn array_items_validated_with_indices() {
    let schema = json!({
        "type": "object",
        "properties": {
            "file_types": {"type": "array", "items": {"type": "string"}},
        },
    });
    let ok = validate_arguments(&schema, json!({"file_types": ["rs", "py"]}));
    assert!(ok.is_ok());

    let err = validate_arguments(&schema, json!({"file_types": ["rs", 7]})).unwrap_err();
    assert_eq!(err.field, "file_types[1]");
}

#[test]
fn null_arguments_treated_as_empty_object() {
    let schema = json!({"type": "object", "properties": {}});
    let out = validate_arguments(&schema, serde_json::Value::Null).unwrap();
    assert_eq!(out, json!({}));
}

#[test]
fn non_object_arguments_rejected() {
    let schema = json!({"type": "object", "properties": {}});
    let err = validate_arguments(&schema, json!([1, 2, 3])).unwrap_err();
    assert!(err.message.contains("must be an object"));
}

#[test]
fn integer_property_rejects_floats_and_accepts_integers() {
    let schema = json!({
        "type": "object",
        "properties": {"limit": {"type": "integer"}},
    });
    assert!(validate_arguments(&schema, json!({"limit": 20})).is_ok());
    assert!(validate_arguments(&schema, json!({"limit": 2.5})).is_err());
}

#[test]
fn number_property_accepts_both() {
    let schema = json!({
        "type": "object",
        "properties": {"score": {"type": "number"}},
    });
    assert!(validate_arguments(&schema, json!({"score": 2.5})).is_ok());
    assert!(validate_arguments(&schema, json!({"score": 2})).is_ok());
}
