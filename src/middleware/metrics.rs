use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use super::Middleware;
use crate::dispatcher::{EngineRequest, EngineResponse};

/// Middleware collecting the counters behind the `/metrics` endpoint.
///
/// Tracks request counts, latency, coroutine stack usage, and authentication
/// rejections. All counters use atomic operations for thread-safe updates
/// without locks; this middleware is passive and never blocks a request.
pub struct MetricsMiddleware {
    request_count: AtomicUsize,
    total_latency_ns: AtomicU64,
    stack_size: AtomicUsize,
    used_stack: AtomicUsize,
    reserved_requests: AtomicUsize,
    auth_failures: AtomicUsize,
}

impl Default for MetricsMiddleware {
    fn default() -> Self {
        Self {
            request_count: AtomicUsize::new(0),
            total_latency_ns: AtomicU64::new(0),
            stack_size: AtomicUsize::new(0),
            used_stack: AtomicUsize::new(0),
            reserved_requests: AtomicUsize::new(0),
            auth_failures: AtomicUsize::new(0),
        }
    }
}

impl MetricsMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of dispatched requests.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Mean processing time across all dispatched requests, zero before the
    /// first one completes.
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    /// Coroutine stack metrics as `(configured_size, peak_used)`.
    #[must_use]
    pub fn stack_usage(&self) -> (usize, usize) {
        (
            self.stack_size.load(Ordering::Relaxed),
            self.used_stack.load(Ordering::Relaxed),
        )
    }

    /// Count one request served by a reserved endpoint (`/healthcheck`,
    /// `/metrics`) that bypasses dispatch.
    pub fn inc_reserved_request(&self) {
        self.reserved_requests.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn reserved_request_count(&self) -> usize {
        self.reserved_requests.load(Ordering::Relaxed)
    }

    /// Total number of requests the auth resolver turned away.
    #[must_use]
    pub fn auth_failures(&self) -> usize {
        self.auth_failures.load(Ordering::Relaxed)
    }
}

impl Middleware for MetricsMiddleware {
    fn before(&self, _request: &EngineRequest) -> Option<EngineResponse> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn after(&self, _request: &EngineRequest, response: &mut EngineResponse, latency: Duration) {
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        if response.status == 401 {
            self.auth_failures.fetch_add(1, Ordering::Relaxed);
        }
        // record stack metrics for the current coroutine when available
        if may::coroutine::is_coroutine() {
            let co = may::coroutine::current();
            self.stack_size.store(co.stack_size(), Ordering::Relaxed);
            // may does not expose actual stack usage
            self.used_stack.store(0, Ordering::Relaxed);
        } else {
            self.stack_size
                .store(may::config().get_stack_size(), Ordering::Relaxed);
            self.used_stack.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::dispatcher::HeaderVec;
    use crate::ids::RequestId;
    use crate::negotiate::ResponseFormat;
    use crate::server::ParamVec;
    use http::Method;

    fn request() -> EngineRequest {
        EngineRequest {
            context: RequestContext::new(RequestId::new(), "GET", "/pets"),
            method: Method::GET,
            path: "/pets".to_string(),
            operation_id: "list_pets".to_string(),
            path_params: ParamVec::new(),
            query_params: ParamVec::new(),
            headers: HeaderVec::new(),
            body: None,
            principal: None,
        }
    }

    #[test]
    fn counts_requests_latency_and_auth_failures() {
        let metrics = MetricsMiddleware::new();
        let request = request();

        assert!(metrics.before(&request).is_none());
        let mut ok = EngineResponse::new(200, ResponseFormat::Json);
        metrics.after(&request, &mut ok, Duration::from_millis(10));

        assert!(metrics.before(&request).is_none());
        let mut denied = EngineResponse::error(401, "bad credentials");
        metrics.after(&request, &mut denied, Duration::from_millis(30));

        assert_eq!(metrics.request_count(), 2);
        assert_eq!(metrics.auth_failures(), 1);
        assert_eq!(metrics.average_latency(), Duration::from_millis(20));
    }

    #[test]
    fn average_latency_is_zero_without_traffic() {
        let metrics = MetricsMiddleware::new();
        assert_eq!(metrics.average_latency(), Duration::from_nanos(0));
    }
}
