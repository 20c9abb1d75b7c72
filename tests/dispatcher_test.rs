// ABOUTME: Tests for the dispatch pipeline: envelopes, audit records, wrapping, timeouts
// ABOUTME: Drives the full server resources so lazy discovery and trust are exercised together
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use codomyrmex_mcp_server::registry::{make_handler, ToolDescriptor, ToolOrigin};
use codomyrmex_mcp_server::trust::{TrustDecision, TrustLevel};
use common::ApproveAll;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn unknown_tool_returns_envelope_and_audit_record() {
    let res = common::server_resources();
    let session = res.session("s1");

    let out = res
        .dispatcher
        .dispatch("codomyrmex.nonexistent", json!({}), &session)
        .await;

    assert_eq!(out["error"]["code"], json!("UNKNOWN_TOOL"));
    assert_eq!(out["error"]["tool_name"], json!("codomyrmex.nonexistent"));
    assert!(out["error"]["details"]["correlation_id"].is_string());

    let records = res.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].tool_name, "codomyrmex.nonexistent");
    assert_eq!(records[0].trust_decision, TrustDecision::NotEvaluated);
    assert_eq!(records[0].outcome, "UNKNOWN_TOOL");
}

#[tokio::test]
async fn schema_violation_blocks_handler_and_names_field() {
    let res = common::server_resources();
    let session = res.session("s1");

    // Spec scenario: read_file requires path as a string.
    let out = res
        .dispatcher
        .dispatch("codomyrmex.read_file", json!({"path": 42}), &session)
        .await;

    assert_eq!(out["error"]["code"], json!("VALIDATION_ERROR"));
    assert_eq!(out["error"]["details"]["field"], json!("path"));

    let records = res.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, "VALIDATION_ERROR");
    assert_eq!(records[0].trust_decision, TrustDecision::NotEvaluated);
}

#[tokio::test]
async fn destructive_denied_at_standard_with_required_level() {
    let res = common::server_resources();
    let session = res.session("s1");

    let out = res
        .dispatcher
        .dispatch(
            "codomyrmex.obsidian.delete_note",
            json!({"vault_path": "/tmp/vault", "note_path": "a.md"}),
            &session,
        )
        .await;

    assert_eq!(out["error"]["code"], json!("ACCESS_DENIED"));
    assert_eq!(out["error"]["details"]["required"], json!("ELEVATED"));

    // Audit record exists even though no handler ran.
    let records = res.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].trust_decision, TrustDecision::Denied);
    assert_eq!(records[0].outcome, "ACCESS_DENIED");
}

#[tokio::test]
async fn successful_dispatch_emits_exactly_one_ok_record() {
    let res = common::server_resources();
    let session = res.session("s1");

    let out = res
        .dispatcher
        .dispatch("codomyrmex.list_modules", json!({}), &session)
        .await;

    assert!(out["modules"].is_array());
    let records = res.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, "ok");
    assert_eq!(records[0].trust_decision, TrustDecision::Allowed);
    assert!(!records[0].arguments_fingerprint.is_empty());
    assert!(!records[0].correlation_id.is_empty());
}

#[tokio::test]
async fn non_mapping_result_wrapped_under_result_key() {
    let res = common::server_resources();
    res.registry
        .register(
            ToolDescriptor::new(
                "codomyrmex.test.scalar",
                "returns a bare number",
                json!({"type": "object", "properties": {}}),
            )
            .with_handler(make_handler(|_args, _ctx| async move { Ok(json!(42)) })),
            ToolOrigin::Static,
            false,
        )
        .unwrap();

    let session = res.session("s1");
    let out = res
        .dispatcher
        .dispatch("codomyrmex.test.scalar", json!({}), &session)
        .await;
    assert_eq!(out, json!({"result": 42}));
}

#[tokio::test]
async fn defaults_visible_to_handler() {
    let res = common::server_resources();
    res.registry
        .register(
            ToolDescriptor::new(
                "codomyrmex.test.echo_args",
                "echoes its arguments",
                json!({
                    "type": "object",
                    "properties": {
                        "limit": {"type": "integer", "default": 20},
                    },
                }),
            )
            .with_handler(make_handler(|args, _ctx| async move {
                Ok(json!({"received": args}))
            })),
            ToolOrigin::Static,
            false,
        )
        .unwrap();

    let session = res.session("s1");
    let out = res
        .dispatcher
        .dispatch("codomyrmex.test.echo_args", json!({}), &session)
        .await;
    assert_eq!(out["received"]["limit"], json!(20));
}

#[tokio::test]
async fn timeout_produces_timeout_envelope_and_audit_outcome() {
    let res = common::server_resources();
    res.registry
        .register(
            ToolDescriptor::new(
                "codomyrmex.test.slow",
                "sleeps past its deadline",
                json!({"type": "object", "properties": {}}),
            )
            .with_timeout(Duration::from_millis(50))
            .with_handler(make_handler(|_args, _ctx| async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(json!({"done": true}))
            })),
            ToolOrigin::Static,
            false,
        )
        .unwrap();

    let session = res.session("s1");
    let out = res
        .dispatcher
        .dispatch("codomyrmex.test.slow", json!({}), &session)
        .await;

    assert_eq!(out["error"]["code"], json!("TIMEOUT"));
    let records = res.audit.records();
    assert_eq!(records.last().unwrap().outcome, "TIMEOUT");
}

#[tokio::test]
async fn proxy_reports_target_faults_in_result() {
    let res = common::server_resources();
    let session = res.session("s1");
    session.set_level(TrustLevel::Elevated);

    // demo.fail raises; the proxy reports it inside the result mapping.
    let out = res
        .dispatcher
        .dispatch(
            "codomyrmex.call_module_function",
            json!({"function": "demo.fail"}),
            &session,
        )
        .await;
    assert!(out["error"]
        .as_str()
        .unwrap()
        .contains("intentional demo failure"));
}

#[tokio::test]
async fn coerced_return_flagged_in_audit() {
    let res = common::server_resources();
    let session = res.session("s1");
    session.set_level(TrustLevel::Elevated);

    let out = res
        .dispatcher
        .dispatch(
            "codomyrmex.call_module_function",
            json!({"function": "demo.handle"}),
            &session,
        )
        .await;

    assert_eq!(out["result"], json!("ModuleHandle(codomyrmex.demo)"));
    let records = res.audit.records();
    let last = records.last().unwrap();
    assert_eq!(
        last.details.as_ref().unwrap()["coerced"],
        json!(true)
    );
}

#[tokio::test]
async fn every_dispatch_writes_exactly_one_record() {
    let res = common::server_resources();
    let session = res.session("s1");
    session.set_level(TrustLevel::Elevated);
    session.set_confirmation(Arc::new(ApproveAll));

    let calls = [
        ("codomyrmex.list_modules", json!({})),
        ("codomyrmex.nonexistent", json!({})),
        ("codomyrmex.read_file", json!({"path": 42})),
        ("codomyrmex.pai_status", json!({})),
    ];
    for (name, args) in calls {
        res.dispatcher.dispatch(name, args, &session).await;
    }
    assert_eq!(res.audit.records().len(), 4);
}
