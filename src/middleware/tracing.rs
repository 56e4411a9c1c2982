use std::time::Duration;

use tracing::info;

use super::Middleware;
use crate::dispatcher::{EngineRequest, EngineResponse};

/// Correlation middleware: echoes the request's correlation id back on the
/// `x-request-id` response header and emits one access-log line per request.
///
/// The per-request span itself is opened by [`crate::context::RequestContext`]
/// when the request enters the service; this middleware only closes the loop
/// toward the caller.
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn after(&self, request: &EngineRequest, response: &mut EngineResponse, latency: Duration) {
        response.set_header("x-request-id", request.context.request_id().to_string());
        info!(
            request_id = %request.context.request_id(),
            method = %request.method,
            path = %request.path,
            operation_id = %request.operation_id,
            status = response.status,
            latency_ms = latency.as_millis() as u64,
            "request complete"
        );
    }
}
