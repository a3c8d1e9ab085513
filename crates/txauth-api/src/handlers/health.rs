//! Health check and metrics handlers
//!
//! Author: hephaex@gmail.com

use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use utoipa::ToSchema;

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub name: String,
}

/// Liveness probe - basic health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
    })
}

/// Readiness response
#[derive(Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: ReadinessChecks,
}

#[derive(Serialize, ToSchema)]
pub struct ReadinessChecks {
    /// Storage backend in use ("postgres" or "memory")
    pub store_backend: String,
    /// Whether sessions survive a restart
    pub persistent: bool,
}

/// Readiness probe
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = ReadinessResponse),
        (status = 503, description = "Service not ready", body = ReadinessResponse)
    )
)]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let is_ready = state.is_ready();

    let response = ReadinessResponse {
        ready: is_ready,
        checks: ReadinessChecks {
            store_backend: state.store_backend.clone(),
            persistent: state.store_backend != "memory",
        },
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// JSON metrics response
#[derive(Serialize)]
pub struct MetricsResponse {
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub requests_per_second: f64,
    pub login_success: u64,
    pub login_failure: u64,
    pub gate_rejections: u64,
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.uptime_secs();
    let total_requests = state.get_request_count();
    let rps = if uptime > 0 {
        total_requests as f64 / uptime as f64
    } else {
        0.0
    };
    let counters = &state.auth_counters;

    Json(MetricsResponse {
        uptime_seconds: uptime,
        total_requests,
        requests_per_second: rps,
        login_success: counters.login_success.load(Ordering::Relaxed),
        login_failure: counters.login_failure.load(Ordering::Relaxed),
        gate_rejections: counters.gate_rejections.load(Ordering::Relaxed),
    })
}

fn push_metric(output: &mut String, name: &str, kind: &str, help: &str, value: impl std::fmt::Display) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {kind}");
    let _ = writeln!(output, "{name} {value}\n");
}

/// Prometheus-compatible metrics endpoint
pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let counters = &state.auth_counters;
    let mut output = String::new();

    push_metric(
        &mut output,
        "txauth_uptime_seconds",
        "gauge",
        "Time since server start",
        state.uptime_secs(),
    );
    push_metric(
        &mut output,
        "txauth_requests_total",
        "counter",
        "Total number of HTTP requests",
        state.get_request_count(),
    );
    push_metric(
        &mut output,
        "txauth_login_success_total",
        "counter",
        "Successful sign-ins",
        counters.login_success.load(Ordering::Relaxed),
    );
    push_metric(
        &mut output,
        "txauth_login_failure_total",
        "counter",
        "Sign-ins rejected for bad credentials",
        counters.login_failure.load(Ordering::Relaxed),
    );
    push_metric(
        &mut output,
        "txauth_gate_rejections_total",
        "counter",
        "Requests rejected by the authorization gate",
        counters.gate_rejections.load(Ordering::Relaxed),
    );

    let _ = writeln!(output, "# HELP txauth_build_info Build information");
    let _ = writeln!(output, "# TYPE txauth_build_info gauge");
    let _ = writeln!(
        output,
        "txauth_build_info{{version=\"{}\",store=\"{}\"}} 1\n",
        env!("CARGO_PKG_VERSION"),
        state.store_backend
    );

    let metrics = state.metrics.read().await;

    output.push_str("# HELP txauth_http_requests_total HTTP requests by endpoint and status\n");
    output.push_str("# TYPE txauth_http_requests_total counter\n");
    for (endpoint, endpoint_metrics) in metrics.iter() {
        for (status, count) in &endpoint_metrics.status_counts {
            let _ = writeln!(
                output,
                "txauth_http_requests_total{{endpoint=\"{endpoint}\",status=\"{status}\"}} {count}"
            );
        }
    }
    output.push('\n');

    output.push_str("# HELP txauth_http_request_duration_seconds HTTP request latency\n");
    output.push_str("# TYPE txauth_http_request_duration_seconds summary\n");
    for (endpoint, endpoint_metrics) in metrics.iter() {
        let sum_s = endpoint_metrics.total_latency_us as f64 / 1_000_000.0;
        let _ = writeln!(
            output,
            "txauth_http_request_duration_seconds_sum{{endpoint=\"{endpoint}\"}} {sum_s:.6}"
        );
        let _ = writeln!(
            output,
            "txauth_http_request_duration_seconds_count{{endpoint=\"{endpoint}\"}} {}",
            endpoint_metrics.latency_count
        );
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}
