// ABOUTME: Server binary: config loading, logging, warm-up, transport startup, exit codes
// ABOUTME: Exit codes: 0 clean shutdown, 1 fatal init error, 2 invalid config, 130 interrupted
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Codomyrmex Contributors

#![deny(unsafe_code)]

//! # Codomyrmex MCP Server Binary
//!
//! Starts the MCP tool plane with stdio and/or HTTP transports.

use anyhow::Result;
use clap::Parser;
use codomyrmex_mcp_server::{
    config::ServerConfig,
    logging,
    mcp::{
        resources::ServerResources,
        server_lifecycle::{ServerLifecycle, ShutdownReason, TransportMode},
    },
};
use tracing::{error, info};

/// Exit code for invalid configuration.
const EXIT_INVALID_CONFIG: i32 = 2;
/// Exit code for SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "codomyrmex-mcp-server")]
#[command(about = "Codomyrmex MCP tool plane - workspace tools for AI agents")]
struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Transport selection: stdio, http, or both
    #[arg(long, default_value = "both")]
    transport: TransportMode,

    /// Skip the eager discovery scan at startup
    #[arg(long)]
    no_warm_up: bool,
}

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    let args = Args::parse();

    if let Err(e) = logging::init_from_env() {
        eprintln!("logging initialization failed: {e}");
        return 1;
    }

    let config = match setup_configuration(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {e}");
            return EXIT_INVALID_CONFIG;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to start runtime: {e}");
            return 1;
        }
    };

    match runtime.block_on(serve(config, &args)) {
        Ok(ShutdownReason::Completed) => {
            info!("clean shutdown");
            0
        }
        Ok(ShutdownReason::Interrupted) => {
            info!("interrupted");
            EXIT_INTERRUPTED
        }
        Err(e) => {
            error!("server error: {e}");
            1
        }
    }
}

/// Load configuration from the environment and apply CLI overrides.
fn setup_configuration(args: &Args) -> Result<ServerConfig, codomyrmex_mcp_server::config::ConfigError> {
    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if args.no_warm_up {
        config.warm_up = false;
    }
    info!("{}", config.summary());
    Ok(config)
}

/// Bootstrap resources and run the transports to completion.
async fn serve(config: ServerConfig, args: &Args) -> Result<ShutdownReason> {
    let warm_up = config.warm_up;
    let resources = ServerResources::new(config);
    info!(
        tools = resources.registry.tool_count(),
        resources = resources.registry.list_resources().len(),
        prompts = resources.registry.list_prompts().len(),
        "server resources initialized"
    );

    if warm_up {
        resources.warm_up().await;
    }

    let lifecycle = ServerLifecycle::new(resources);
    lifecycle.serve(args.transport).await
}
