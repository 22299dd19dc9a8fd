//! # Luke MCP
//!
//! MCP server on stdio. Reads one JSON-RPC message per line from stdin and
//! writes replies to stdout; logs go to stderr.

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use luke_mcp::{CliArgs, McpConfig, McpServer};

/// Initialize structured tracing on stderr with optional JSON format.
///
/// Set `RUST_LOG` to control log levels (default: info,luke_mcp=debug).
/// Set `RUST_LOG_FORMAT=json` for JSON output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,luke_mcp=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true);

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = McpConfig::from(CliArgs::parse());
    tracing::info!(
        "Luke MCP server ready (discovery file {})",
        config.discovery_file.display()
    );
    let server = McpServer::from_config(&config);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = server.handle_message(&line).await {
            let mut out = serde_json::to_vec(&response)?;
            out.push(b'\n');
            stdout.write_all(&out).await?;
            stdout.flush().await?;
        }
    }

    tracing::info!("stdin closed, exiting");
    Ok(())
}
