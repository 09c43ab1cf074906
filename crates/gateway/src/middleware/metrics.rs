//! Request metrics middleware

use axum::{extract::Request, middleware::Next, response::Response};
use litgraph_common::metrics::RequestMetrics;

/// Record count and latency for every request
pub async fn track_requests(request: Request, next: Next) -> Response {
    let metrics = RequestMetrics::start(request.method().as_str(), request.uri().path());
    let response = next.run(request).await;
    metrics.finish(response.status().as_u16());
    response
}
