//! Health check endpoints.
//!
//! - `/health/live` - Liveness check (the process is up)
//! - `/health/ready` - Readiness check (the session manager answers)
//! - `/health` - Same as readiness

use std::time::Duration;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;

/// How long readiness waits for the session manager.
const READINESS_TIMEOUT: Duration = Duration::from_secs(2);

/// Health status response.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Overall status: "healthy" or "unhealthy"
    pub status: &'static str,
    /// Server version
    pub version: &'static str,
    /// Individual component checks
    pub checks: HealthChecks,
}

/// Individual health checks.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Session manager accessible
    pub session_manager: bool,
    /// Number of open document sessions
    pub open_sessions: usize,
    /// Active document path, if any
    pub active_document: Option<String>,
}

/// Liveness check - is the server running?
#[tracing::instrument(name = "liveness_check")]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness check - can the server take commands?
///
/// Fails if the session manager stays locked for longer than a couple of
/// seconds, which means a command is stuck on storage.
#[tracing::instrument(name = "readiness_check", skip(state))]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let snapshot = tokio::time::timeout(READINESS_TIMEOUT, async {
        let open = state.sessions.open_paths().await.len();
        let active = state.sessions.active_path().await;
        (open, active)
    })
    .await;

    let (session_ok, open_sessions, active_document) = match snapshot {
        Ok((open, active)) => (true, open, active.map(|p| p.to_string_lossy().into_owned())),
        Err(_) => (false, 0, None),
    };

    let status = HealthStatus {
        status: if session_ok { "healthy" } else { "unhealthy" },
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks {
            session_manager: session_ok,
            open_sessions,
            active_document,
        },
    };

    let code = if session_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(status))
}
