//! Health check HTTP server for production monitoring
//!
//! Exposes the probe verdict and gate state to dashboards, the
//! order-execution subsystem, and process supervision (systemd/launchd),
//! plus a Prometheus metrics endpoint. Strictly read-only: every request
//! recomputes from the SSOT artifacts and nothing is ever written.

use crate::error::{QuantGateError, Result};
use crate::gate::AutoTradingGate;
use crate::health::{GlobalStatus, HealthValidator};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared state for the health server
pub struct ServerState {
    pub validator: HealthValidator,
    pub gate: AutoTradingGate,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(validator: HealthValidator, gate: AutoTradingGate) -> Self {
        Self {
            validator,
            gate,
            started_at: Utc::now(),
        }
    }
}

/// Health check server
pub struct HealthServer {
    state: Arc<ServerState>,
    port: u16,
}

impl HealthServer {
    pub fn new(state: Arc<ServerState>, port: u16) -> Self {
        Self { state, port }
    }

    pub fn router(state: Arc<ServerState>) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/healthz", get(liveness_handler))
            .route("/readyz", get(readiness_handler))
            .route("/status", get(status_handler))
            .route("/metrics", get(metrics_handler))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Start the health server
    pub async fn run(&self) -> Result<()> {
        let app = Self::router(Arc::clone(&self.state));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting health server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .await
            .map_err(|e| QuantGateError::Internal(format!("Health server error: {e}")))?;

        Ok(())
    }
}

/// Full probe verdict; 503 on RED so supervisors can act on status alone
async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let health = state.validator.validate();
    let status_code = match health.global_status {
        GlobalStatus::Green => StatusCode::OK,
        GlobalStatus::Red => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

/// Liveness probe - is the process alive?
async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe - is the system safe to trade?
async fn readiness_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let health = state.validator.validate();
    if health.safe_to_trade {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Gate state merged with a fresh health recomputation
async fn status_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    match state.gate.status() {
        Ok(status) => (StatusCode::OK, Json(serde_json::json!(status))).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

/// Prometheus metrics endpoint
async fn metrics_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let health = state.validator.validate();
    let gate_enabled = state
        .gate
        .load_state()
        .map(|s| u8::from(s.enabled))
        .unwrap_or(0);
    let uptime = (Utc::now() - state.started_at).num_seconds();

    let mut metrics = format!(
        r#"# HELP quantgate_up Aggregate verdict (1=GREEN, 0=RED)
# TYPE quantgate_up gauge
quantgate_up {}

# HELP quantgate_uptime_seconds Control plane uptime in seconds
# TYPE quantgate_uptime_seconds counter
quantgate_uptime_seconds {}

# HELP quantgate_green_count Passing probes out of 7
# TYPE quantgate_green_count gauge
quantgate_green_count {}

# HELP quantgate_safe_to_trade Safe-to-trade verdict
# TYPE quantgate_safe_to_trade gauge
quantgate_safe_to_trade {}

# HELP quantgate_auto_trading_enabled Gate state
# TYPE quantgate_auto_trading_enabled gauge
quantgate_auto_trading_enabled {}

# HELP quantgate_probe_up Individual probe pass/fail
# TYPE quantgate_probe_up gauge
"#,
        u8::from(health.is_green()),
        uptime,
        health.green_count,
        u8::from(health.safe_to_trade),
        gate_enabled,
    );

    for probe in &health.probe_results {
        metrics.push_str(&format!(
            "quantgate_probe_up{{probe=\"{}\"}} {}\n",
            probe.probe_name,
            u8::from(probe.passed)
        ));
    }

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; charset=utf-8",
        )],
        metrics,
    )
}
