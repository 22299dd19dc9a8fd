//! Bridge configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use luke_core::default_discovery_path;

use crate::validation::MAX_WS_MESSAGE_SIZE;

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default debounce for file change notifications, in milliseconds.
pub const DEFAULT_WATCH_DEBOUNCE_MS: u64 = 50;

/// Command-line arguments for luke-bridge.
#[derive(Debug, Clone, Parser)]
#[command(name = "luke-bridge")]
#[command(about = "Local control bridge for Luke canvas documents")]
#[command(version)]
pub struct CliArgs {
    /// Loopback address to bind
    #[arg(long, env = "LUKE_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to bind (0 picks a free port)
    #[arg(long, env = "LUKE_PORT", default_value = "0")]
    pub port: u16,

    /// Where to publish the listening port
    #[arg(long, env = "LUKE_DISCOVERY_FILE")]
    pub discovery_file: Option<PathBuf>,

    /// Do not watch open documents for external changes
    #[arg(long, env = "LUKE_NO_WATCH")]
    pub no_watch: bool,

    /// Debounce for external change notifications in milliseconds
    #[arg(long, env = "LUKE_WATCH_DEBOUNCE_MS", default_value_t = DEFAULT_WATCH_DEBOUNCE_MS)]
    pub watch_debounce_ms: u64,

    /// Largest accepted WebSocket message in bytes
    #[arg(long, env = "LUKE_MAX_MESSAGE_BYTES", default_value_t = MAX_WS_MESSAGE_SIZE)]
    pub max_message_bytes: usize,
}

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Loopback host to bind.
    pub host: String,
    /// Port to bind; 0 lets the OS choose.
    pub port: u16,
    /// Discovery file location.
    pub discovery_file: PathBuf,
    /// Watch open documents for external changes.
    pub watch_files: bool,
    /// Quiet period before acting on change notifications.
    pub watch_debounce: Duration,
    /// Largest accepted WebSocket message in bytes.
    pub max_message_bytes: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 0,
            discovery_file: default_discovery_path(),
            watch_files: true,
            watch_debounce: Duration::from_millis(DEFAULT_WATCH_DEBOUNCE_MS),
            max_message_bytes: MAX_WS_MESSAGE_SIZE,
        }
    }
}

impl From<CliArgs> for BridgeConfig {
    fn from(args: CliArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            discovery_file: args.discovery_file.unwrap_or_else(default_discovery_path),
            watch_files: !args.no_watch,
            watch_debounce: Duration::from_millis(args.watch_debounce_ms),
            max_message_bytes: args.max_message_bytes,
        }
    }
}
