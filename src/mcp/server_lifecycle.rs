// ABOUTME: Server lifecycle: stdio transport loop, transport coordination, and graceful shutdown
// ABOUTME: Tracks in-flight dispatches and drains them up to a grace window before aborting
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

//! # Server Lifecycle
//!
//! Coordinates the transports. Stdio speaks newline-delimited JSON-RPC (one
//! message per line) and serialises calls in arrival order; HTTP serves
//! concurrent requests. On shutdown both transports stop accepting, in-flight
//! dispatches drain up to the grace window, and whatever remains is
//! abandoned.
//!
//! A transport-level parse error on stdio closes the session after a final
//! INTERNAL_ERROR frame.

use super::http_transport;
use super::request_processor::McpRequestProcessor;
use super::resources::ServerResources;
use crate::config::SHUTDOWN_GRACE;
use crate::jsonrpc::{error_codes, JsonRpcRequest, JsonRpcResponse};
use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

/// Which transports to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// stdin/stdout only
    Stdio,
    /// HTTP only
    Http,
    /// Both transports concurrently
    Both,
}

impl std::str::FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            "both" => Ok(Self::Both),
            other => Err(format!("unknown transport {other:?} (expected stdio|http|both)")),
        }
    }
}

/// Why the server stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// All transports finished (e.g. stdio hit EOF)
    Completed,
    /// SIGINT received
    Interrupted,
}

/// Shared counter of dispatches currently executing.
#[derive(Clone, Default)]
pub struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    /// Track one request; the guard decrements on drop.
    #[must_use]
    pub fn begin(&self) -> InFlightGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(Arc::clone(&self.0))
    }

    /// Requests currently executing.
    #[must_use]
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Wait for in-flight requests to finish, up to the grace window.
    /// Returns the number still running when the window closed.
    pub async fn drain(&self) -> usize {
        let started = Instant::now();
        while self.count() > 0 && started.elapsed() < SHUTDOWN_GRACE {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        self.count()
    }
}

/// Drop guard for one in-flight request.
pub struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Manages server startup, transport coordination, and shutdown.
pub struct ServerLifecycle {
    resources: Arc<ServerResources>,
    in_flight: InFlight,
}

impl ServerLifecycle {
    /// Create a lifecycle manager over shared resources.
    #[must_use]
    pub fn new(resources: Arc<ServerResources>) -> Self {
        Self {
            resources,
            in_flight: InFlight::default(),
        }
    }

    /// Run the selected transports until they finish or SIGINT arrives, then
    /// drain in-flight work.
    ///
    /// # Errors
    /// Returns an error if a transport fails to start.
    pub async fn serve(&self, mode: TransportMode) -> Result<ShutdownReason> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut stdio_handle = None;
        if matches!(mode, TransportMode::Stdio | TransportMode::Both) {
            let resources = Arc::clone(&self.resources);
            let in_flight = self.in_flight.clone();
            let rx = shutdown_rx.clone();
            stdio_handle = Some(tokio::spawn(async move {
                if let Err(e) = run_stdio_transport(resources, in_flight, rx).await {
                    warn!("stdio transport failed: {e}");
                }
            }));
        }

        let mut http_handle = None;
        if matches!(mode, TransportMode::Http | TransportMode::Both) {
            let resources = Arc::clone(&self.resources);
            let in_flight = self.in_flight.clone();
            let rx = shutdown_rx.clone();
            let port = self.resources.config.http_port;
            http_handle = Some(tokio::spawn(async move {
                if let Err(e) = http_transport::serve(resources, in_flight, port, rx).await {
                    warn!("HTTP transport failed: {e}");
                }
            }));
        }

        let reason = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("SIGINT received, shutting down");
                ShutdownReason::Interrupted
            }
            () = wait_transports(&mut stdio_handle, &mut http_handle) => {
                info!("all transports completed");
                ShutdownReason::Completed
            }
        };

        let _ = shutdown_tx.send(true);
        let leftover = self.in_flight.drain().await;
        if leftover > 0 {
            warn!(leftover, "grace window closed with dispatches still running");
        }
        if let Some(handle) = stdio_handle {
            handle.abort();
        }
        if let Some(handle) = http_handle {
            handle.abort();
        }

        Ok(reason)
    }
}

/// Wait until every started transport task has finished.
async fn wait_transports(
    stdio: &mut Option<tokio::task::JoinHandle<()>>,
    http: &mut Option<tokio::task::JoinHandle<()>>,
) {
    if let Some(handle) = stdio {
        let _ = handle.await;
    }
    if let Some(handle) = http {
        let _ = handle.await;
    }
    // No transports selected: park until the signal arm fires.
    if stdio.is_none() && http.is_none() {
        std::future::pending::<()>().await;
    }
}

/// Run the stdio transport: newline-delimited JSON-RPC over stdin/stdout.
/// Requests are processed in arrival order; one trust session spans the
/// whole connection.
async fn run_stdio_transport(
    resources: Arc<ServerResources>,
    in_flight: InFlight,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let session_id = format!("stdio-{}", Uuid::new_v4());
    resources.session(&session_id);
    let processor = McpRequestProcessor::new(Arc::clone(&resources), session_id.clone());
    info!(session_id = %session_id, "MCP stdio transport ready - listening on stdin/stdout");

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let stdout = Arc::new(tokio::sync::Mutex::new(tokio::io::stdout()));

    loop {
        let line = tokio::select! {
            _ = shutdown.changed() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break; // EOF: client disconnected
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<JsonRpcRequest>(&line) {
            Ok(request) => {
                let _guard = in_flight.begin();
                if let Some(response) = processor.handle_request(request).await {
                    write_response_to_stdout(&response, &stdout).await?;
                }
            }
            Err(e) => {
                // Parse errors are unrecoverable framing faults: emit one
                // final INTERNAL_ERROR frame and close the session.
                warn!(error = %e, "unparseable MCP frame, closing session");
                let response = JsonRpcResponse::error(
                    None,
                    error_codes::INTERNAL_ERROR,
                    format!("Unparseable request frame: {e}"),
                );
                write_response_to_stdout(&response, &stdout).await?;
                break;
            }
        }
    }

    resources.drop_session(&session_id);
    info!(session_id = %session_id, "stdio transport closed");
    Ok(())
}

/// Write one response frame to stdout.
///
/// # Errors
/// Returns an error if serialization or I/O fails.
pub async fn write_response_to_stdout(
    response: &JsonRpcResponse,
    stdout: &Arc<tokio::sync::Mutex<tokio::io::Stdout>>,
) -> Result<()> {
    let response_json = serde_json::to_string(response)?;
    let mut stdout_lock = stdout.lock().await;
    stdout_lock.write_all(response_json.as_bytes()).await?;
    stdout_lock.write_all(b"\n").await?;
    stdout_lock.flush().await?;
    drop(stdout_lock);
    Ok(())
}
