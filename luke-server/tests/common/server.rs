//! Test server harness for integration tests.
//!
//! Spins up a real bridge on an ephemeral port with its own discovery file
//! and document directory, for testing with WebSocket and HTTP clients.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use luke_server::{Bridge, BridgeConfig, SessionManager};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// A test bridge instance with its scratch directory.
pub struct TestServer {
    bridge: Bridge,
    dir: TempDir,
    docs: PathBuf,
}

impl TestServer {
    /// Start a bridge that watches documents for external changes.
    ///
    /// # Panics
    ///
    /// Panics if the scratch directory or the server cannot be set up.
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Start a bridge after adjusting its configuration.
    ///
    /// # Panics
    ///
    /// Panics if the scratch directory or the server cannot be set up.
    pub async fn start_with(adjust: impl FnOnce(&mut BridgeConfig)) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let docs = dir.path().join("docs");
        std::fs::create_dir(&docs).expect("create docs dir");
        let docs = docs.canonicalize().expect("canonical docs dir");

        let mut config = BridgeConfig {
            discovery_file: dir.path().join("port.txt"),
            watch_debounce: Duration::from_millis(20),
            ..BridgeConfig::default()
        };
        adjust(&mut config);

        let bridge = Bridge::start(config, None).await.expect("bridge start");
        Self { bridge, dir, docs }
    }

    /// Get the server's socket address.
    #[allow(dead_code)]
    pub fn addr(&self) -> SocketAddr {
        self.bridge.addr()
    }

    /// Controller WebSocket URL.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/", self.bridge.addr())
    }

    /// Rendering-surface WebSocket URL for `path`.
    #[allow(dead_code)]
    pub fn surface_url(&self, path: &Path) -> String {
        format!(
            "ws://{}/surface?file_path={}",
            self.bridge.addr(),
            percent_encode(&path.to_string_lossy())
        )
    }

    /// Path of a document inside the scratch directory.
    pub fn doc(&self, name: &str) -> PathBuf {
        self.docs.join(name)
    }

    /// Same as [`Self::doc`], as a string for command payloads.
    pub fn doc_str(&self, name: &str) -> String {
        self.doc(name).to_string_lossy().into_owned()
    }

    /// The discovery file written by this server.
    #[allow(dead_code)]
    pub fn discovery_file(&self) -> PathBuf {
        self.dir.path().join("port.txt")
    }

    /// The bound port.
    #[allow(dead_code)]
    pub fn port(&self) -> u16 {
        self.bridge.port()
    }

    /// Access the session manager (for test assertions).
    #[allow(dead_code)]
    pub fn sessions(&self) -> &SessionManager {
        self.bridge.sessions()
    }

    /// Issue a plain HTTP GET and return the status code and body.
    #[allow(dead_code)]
    pub async fn http_get(&self, route: &str) -> (u16, String) {
        let mut stream = TcpStream::connect(self.bridge.addr())
            .await
            .expect("tcp connect");
        let request =
            format!("GET {route} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream
            .write_all(request.as_bytes())
            .await
            .expect("write request");

        let mut raw = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut raw))
            .await
            .expect("response timeout")
            .expect("read response");
        let raw = String::from_utf8_lossy(&raw).into_owned();

        let status = raw
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .expect("status code");
        let body = raw
            .split_once("\r\n\r\n")
            .map(|(_, body)| body.to_string())
            .unwrap_or_default();
        (status, body)
    }

    /// Gracefully shut down the server.
    pub async fn shutdown(self) {
        self.bridge.shutdown().await;
    }

    /// Shut down but keep the scratch directory alive for inspection.
    #[allow(dead_code)]
    pub async fn shutdown_keeping_files(self) -> TempDir {
        self.bridge.shutdown().await;
        self.dir
    }
}

fn percent_encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}
