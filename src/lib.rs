// ABOUTME: Main library entry point for the Codomyrmex MCP tool plane
// ABOUTME: Exposes discovery, registry, trust gateway, dispatch, and the MCP transports
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

#![deny(unsafe_code)]

//! # Codomyrmex MCP Server
//!
//! The MCP tool plane of the Codomyrmex coding workspace: the subsystem that
//! discovers, registers, dispatches, and governs tool invocations on behalf
//! of remote agents.
//!
//! ## Architecture
//!
//! - **Registry**: name→descriptor map for tools, resources, and prompts
//! - **Discovery**: TTL-cached scans over the module namespace with
//!   single-flight stampede protection
//! - **Trust gateway**: per-tool trust classes checked against session trust
//!   levels, with audit records and per-call deadlines
//! - **Dispatcher**: the `call_tool` pipeline with schema validation,
//!   correlation ids, and uniform error envelopes
//! - **Proxy**: reflective access to every workspace module by dotted path
//! - **Transports**: newline-delimited JSON-RPC over stdio, and HTTP
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use codomyrmex_mcp_server::config::ServerConfig;
//! use codomyrmex_mcp_server::mcp::resources::ServerResources;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     let resources = ServerResources::new(config);
//!     resources.warm_up().await;
//!     println!("{} tools registered", resources.registry.tool_count());
//! }
//! ```

/// Server configuration and the environment contract
pub mod config;

/// Tool discovery engine with TTL cache and scan metrics
pub mod discovery;

/// Dispatch pipeline, correlation scope, and state machine
pub mod dispatch;

/// Closed error taxonomy and structured envelopes
pub mod errors;

/// Unified JSON-RPC 2.0 foundation
pub mod jsonrpc;

/// Production logging and structured output
pub mod logging;

/// Skill manifest builder
pub mod manifest;

/// Model Context Protocol server implementation
pub mod mcp;

/// Module namespace: the reflective surface behind discovery and the proxy
pub mod namespace;

/// Built-in prompt templates and rendering
pub mod prompts;

/// Universal module proxy tools
pub mod proxy;

/// Tool, resource, and prompt registry
pub mod registry;

/// Static core tools (file, git, shell, data, testing)
pub mod tools;

/// Trust gateway, trust contexts, and the audit log
pub mod trust;

/// JSON-schema subset validation for tool parameters
pub mod validation;
