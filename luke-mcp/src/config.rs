//! MCP server configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use luke_core::default_discovery_path;

/// Default time to wait for a bridge reply, in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Command-line arguments for luke-mcp.
#[derive(Debug, Clone, Parser)]
#[command(name = "luke-mcp")]
#[command(about = "MCP drawing tools for Luke canvas documents")]
#[command(version)]
pub struct CliArgs {
    /// Discovery file the bridge publishes its port in
    #[arg(long, env = "LUKE_DISCOVERY_FILE")]
    pub discovery_file: Option<PathBuf>,

    /// Connect to this port instead of reading the discovery file
    #[arg(long, env = "LUKE_BRIDGE_PORT")]
    pub port: Option<u16>,

    /// How long to wait for each bridge reply in milliseconds
    #[arg(long, env = "LUKE_REQUEST_TIMEOUT_MS", default_value_t = DEFAULT_REQUEST_TIMEOUT_MS)]
    pub request_timeout_ms: u64,
}

/// How to reach the bridge.
#[derive(Debug, Clone)]
pub struct McpConfig {
    /// Discovery file location.
    pub discovery_file: PathBuf,
    /// Fixed bridge port; skips discovery when set.
    pub port: Option<u16>,
    /// Time allowed for connecting and for each reply.
    pub request_timeout: Duration,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            discovery_file: default_discovery_path(),
            port: None,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

impl From<CliArgs> for McpConfig {
    fn from(args: CliArgs) -> Self {
        Self {
            discovery_file: args.discovery_file.unwrap_or_else(default_discovery_path),
            port: args.port,
            request_timeout: Duration::from_millis(args.request_timeout_ms),
        }
    }
}
