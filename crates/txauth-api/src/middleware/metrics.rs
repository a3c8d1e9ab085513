//! Metrics tracking middleware
//!
//! Records request count, latency and status code per route template.
//!
//! Author: hephaex@gmail.com

use crate::state::AppState;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

/// Bucket for requests that matched no route
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

/// Reads [`MatchedPath`], so it has to be added with `Router::layer`
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let endpoint = endpoint_label(&request);

    let response = next.run(request).await;

    let latency_us = start.elapsed().as_micros() as u64;
    let status = response.status().as_u16();
    state.record_request(endpoint, status, latency_us).await;

    response
}

/// Route template such as `/api/v1/users/:user`, never the raw path
fn endpoint_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ENDPOINT.to_string())
}
