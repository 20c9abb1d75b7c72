// ABOUTME: Model Context Protocol server implementation modules
// ABOUTME: Protocol handlers, request processing, shared resources, transports, lifecycle
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

//! MCP server shell: protocol handlers, request routing, shared resources,
//! and the stdio/HTTP transports.

/// HTTP transport shell
pub mod http_transport;
/// MCP protocol message handlers
pub mod protocol;
/// Request validation and method routing
pub mod request_processor;
/// Shared server state and built-in resources
pub mod resources;
/// Transport coordination and graceful shutdown
pub mod server_lifecycle;
