// ABOUTME: Tests for the trust gateway: policy table, exceptions, confirmation, deadlines
// ABOUTME: Exercises authorize and run directly against purpose-built descriptors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use codomyrmex_mcp_server::dispatch::CallContext;
use codomyrmex_mcp_server::errors::McpErrorCode;
use codomyrmex_mcp_server::registry::{make_handler, ToolDescriptor, TrustClass};
use codomyrmex_mcp_server::trust::{
    required_level, TrustContext, TrustGateway, TrustLevel,
};
use common::{ApproveAll, DenyAll};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn tool_with_class(class: TrustClass) -> ToolDescriptor {
    ToolDescriptor::new(
        "codomyrmex.test.tool",
        "gateway test tool",
        json!({"type": "object", "properties": {}}),
    )
    .with_trust(class)
    .with_source("codomyrmex.test")
    .with_handler(make_handler(|_args, _ctx| async move { Ok(json!({"ok": true})) }))
}

fn gateway() -> TrustGateway {
    TrustGateway::new(Duration::from_secs(5))
}

#[test]
fn policy_table_required_levels() {
    assert_eq!(required_level(TrustClass::Safe), TrustLevel::Untrusted);
    assert_eq!(required_level(TrustClass::Mutating), TrustLevel::Standard);
    assert_eq!(required_level(TrustClass::Destructive), TrustLevel::Elevated);
    assert_eq!(required_level(TrustClass::System), TrustLevel::Full);
}

#[tokio::test]
async fn safe_tools_allowed_even_untrusted() {
    let ctx = TrustContext::new("s", TrustLevel::Untrusted);
    let result = gateway()
        .authorize(&tool_with_class(TrustClass::Safe), &json!({}), &ctx)
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn mutating_needs_standard() {
    let gw = gateway();
    let tool = tool_with_class(TrustClass::Mutating);

    let untrusted = TrustContext::new("s", TrustLevel::Untrusted);
    let denial = gw.authorize(&tool, &json!({}), &untrusted).await.unwrap_err();
    assert_eq!(denial.code, McpErrorCode::AccessDenied);
    assert_eq!(denial.details.unwrap()["required"], json!("STANDARD"));

    let standard = TrustContext::new("s", TrustLevel::Standard);
    assert!(gw.authorize(&tool, &json!({}), &standard).await.is_ok());
}

#[tokio::test]
async fn system_tools_are_full_only() {
    let gw = gateway();
    let tool = tool_with_class(TrustClass::System);

    let elevated = TrustContext::new("s", TrustLevel::Elevated);
    let denial = gw.authorize(&tool, &json!({}), &elevated).await.unwrap_err();
    assert_eq!(denial.details.unwrap()["required"], json!("FULL"));

    let full = TrustContext::new("s", TrustLevel::Full);
    assert!(gw.authorize(&tool, &json!({}), &full).await.is_ok());
}

#[tokio::test]
async fn destructive_requires_confirmation_channel() {
    let gw = gateway();
    let tool = tool_with_class(TrustClass::Destructive);

    // Elevated but no confirmation channel installed.
    let ctx = TrustContext::new("s", TrustLevel::Elevated);
    let denial = gw.authorize(&tool, &json!({}), &ctx).await.unwrap_err();
    assert_eq!(denial.code, McpErrorCode::AccessDenied);
    assert_eq!(denial.details.unwrap()["confirmation"], json!("unavailable"));

    // Confirmation refused.
    ctx.set_confirmation(Arc::new(DenyAll));
    let denial = gw.authorize(&tool, &json!({}), &ctx).await.unwrap_err();
    assert_eq!(denial.details.unwrap()["confirmation"], json!("refused"));

    // Confirmation granted.
    ctx.set_confirmation(Arc::new(ApproveAll));
    assert!(gw.authorize(&tool, &json!({}), &ctx).await.is_ok());
}

#[tokio::test]
async fn destructive_below_elevated_denied_before_confirmation() {
    let gw = gateway();
    let tool = tool_with_class(TrustClass::Destructive);
    let ctx = TrustContext::new("s", TrustLevel::Standard);
    ctx.set_confirmation(Arc::new(ApproveAll));

    let denial = gw.authorize(&tool, &json!({}), &ctx).await.unwrap_err();
    assert_eq!(denial.details.unwrap()["required"], json!("ELEVATED"));
}

#[tokio::test]
async fn granted_exception_bypasses_class_once_elevated() {
    let gw = gateway();
    let tool = tool_with_class(TrustClass::System);

    // Exception without elevation does nothing.
    let standard = TrustContext::new("s", TrustLevel::Standard);
    standard.grant_exception("codomyrmex.test.tool");
    assert!(gw.authorize(&tool, &json!({}), &standard).await.is_err());

    // Exception plus ELEVATED bypasses the FULL requirement.
    let elevated = TrustContext::new("s", TrustLevel::Elevated);
    elevated.grant_exception("codomyrmex.test.tool");
    assert!(gw.authorize(&tool, &json!({}), &elevated).await.is_ok());
}

#[tokio::test]
async fn required_level_override_is_stricter_than_class() {
    let gw = gateway();
    let tool = tool_with_class(TrustClass::Mutating).with_required_level(TrustLevel::Elevated);

    let standard = TrustContext::new("s", TrustLevel::Standard);
    let denial = gw.authorize(&tool, &json!({}), &standard).await.unwrap_err();
    assert_eq!(denial.details.unwrap()["required"], json!("ELEVATED"));

    let elevated = TrustContext::new("s", TrustLevel::Elevated);
    assert!(gw.authorize(&tool, &json!({}), &elevated).await.is_ok());
}

#[tokio::test]
async fn deadline_exceedance_returns_timeout_and_sets_cancel_flag() {
    let gw = gateway();
    let slow = ToolDescriptor::new(
        "codomyrmex.test.slow",
        "sleeps past its deadline",
        json!({"type": "object", "properties": {}}),
    )
    .with_timeout(Duration::from_millis(50))
    .with_handler(make_handler(|_args, ctx| async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        // Cooperative handlers would check ctx between steps.
        let _ = ctx.is_cancelled();
        Ok(json!({"finished": true}))
    }));

    let call = CallContext::new("corr-1");
    let started = std::time::Instant::now();
    let result = gw.run(&Arc::new(slow), json!({}), &call).await;

    let envelope = result.unwrap_err();
    assert_eq!(envelope.code, McpErrorCode::Timeout);
    assert!(call.is_cancelled());
    // Returned at the deadline, not after the handler's 30 s sleep.
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn handler_fault_becomes_execution_error_with_module_hint() {
    let gw = gateway();
    let failing = ToolDescriptor::new(
        "codomyrmex.test.fail",
        "always raises",
        json!({"type": "object", "properties": {}}),
    )
    .with_source("codomyrmex.test")
    .with_handler(make_handler(|_args, _ctx| async move {
        Err(codomyrmex_mcp_server::errors::ToolError::Execution(
            "boom".to_owned(),
        ))
    }));

    let call = CallContext::new("corr-2");
    let envelope = gw.run(&Arc::new(failing), json!({}), &call).await.unwrap_err();
    assert_eq!(envelope.code, McpErrorCode::ExecutionError);
    assert_eq!(envelope.details.unwrap()["module"], json!("codomyrmex.test"));
}

#[tokio::test]
async fn descriptor_without_handler_is_internal_error() {
    let gw = gateway();
    let inert = ToolDescriptor::new(
        "codomyrmex.test.inert",
        "descriptor-only entry",
        json!({"type": "object", "properties": {}}),
    );
    let call = CallContext::new("corr-3");
    let envelope = gw.run(&Arc::new(inert), json!({}), &call).await.unwrap_err();
    assert_eq!(envelope.code, McpErrorCode::InternalError);
}

#[test]
fn trust_level_parsing() {
    assert_eq!("standard".parse::<TrustLevel>().unwrap(), TrustLevel::Standard);
    assert_eq!("ELEVATED".parse::<TrustLevel>().unwrap(), TrustLevel::Elevated);
    assert!("root".parse::<TrustLevel>().is_err());
    assert!(TrustLevel::Untrusted < TrustLevel::Standard);
    assert!(TrustLevel::Elevated < TrustLevel::Full);
}
