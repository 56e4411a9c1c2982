use super::request::{parse_request, ParsedRequest};
use super::response::{write_engine_response, write_json_error};
use super::router::Router;
use crate::context::RequestContext;
use crate::dispatcher::{Dispatcher, EngineRequest};
use crate::ids::RequestId;
use crate::middleware::MetricsMiddleware;
use http::Method;
use may_minihttp::{HttpService, Request, Response};
use std::io;
use std::sync::Arc;
use tracing::error;

/// The transport-facing service: routes parsed requests into the dispatcher
/// and writes the shaped responses back out.
///
/// Everything inside is immutable once the server starts; clones share the
/// same route table and pipeline set.
#[derive(Clone)]
pub struct AppService {
    router: Arc<Router>,
    dispatcher: Arc<Dispatcher>,
    metrics: Option<Arc<MetricsMiddleware>>,
}

impl AppService {
    #[must_use]
    pub fn new(router: Arc<Router>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            router,
            dispatcher,
            metrics: None,
        }
    }

    /// Expose the given middleware's counters at `GET /metrics`.
    pub fn set_metrics_middleware(&mut self, metrics: Arc<MetricsMiddleware>) {
        self.metrics = Some(metrics);
    }

    /// The mounted route table.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }
}

/// Metrics endpoint returning Prometheus text format statistics.
pub fn metrics_endpoint(res: &mut Response, metrics: &MetricsMiddleware) -> io::Result<()> {
    let (stack_size, used_stack) = metrics.stack_usage();
    let body = format!(
        "# HELP switchboard_requests_total Total number of dispatched requests\n\
         # TYPE switchboard_requests_total counter\n\
         switchboard_requests_total {}\n\
         # HELP switchboard_request_latency_seconds Average request latency in seconds\n\
         # TYPE switchboard_request_latency_seconds gauge\n\
         switchboard_request_latency_seconds {}\n\
         # HELP switchboard_auth_failures_total Requests rejected by the auth resolver\n\
         # TYPE switchboard_auth_failures_total counter\n\
         switchboard_auth_failures_total {}\n\
         # HELP switchboard_coroutine_stack_bytes Configured coroutine stack size\n\
         # TYPE switchboard_coroutine_stack_bytes gauge\n\
         switchboard_coroutine_stack_bytes {}\n\
         # HELP switchboard_coroutine_stack_used_bytes Coroutine stack bytes used\n\
         # TYPE switchboard_coroutine_stack_used_bytes gauge\n\
         switchboard_coroutine_stack_used_bytes {}\n",
        metrics.request_count(),
        metrics.average_latency().as_secs_f64(),
        metrics.auth_failures(),
        stack_size,
        used_stack
    );
    res.status_code(200, "OK");
    res.header("Content-Type: text/plain");
    res.body_vec(body.into_bytes());
    Ok(())
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let ParsedRequest {
            method,
            path,
            headers,
            query_params,
            body,
        } = parse_request(req);

        if method == "GET" && path == "/metrics" {
            if let Some(metrics) = &self.metrics {
                metrics.inc_reserved_request();
                return metrics_endpoint(res, metrics);
            }
            write_json_error(
                res,
                404,
                serde_json::json!({"error": "Not Found", "method": method, "path": path}),
            );
            return Ok(());
        }

        let Ok(parsed_method) = method.parse::<Method>() else {
            write_json_error(
                res,
                404,
                serde_json::json!({"error": "Not Found", "method": method, "path": path}),
            );
            return Ok(());
        };

        let Some(route_match) = self.router.route(&parsed_method, &path) else {
            write_json_error(
                res,
                404,
                serde_json::json!({"error": "Not Found", "method": method, "path": path}),
            );
            return Ok(());
        };

        let endpoint = route_match.endpoint;
        let request_id = RequestId::from_header_or_new(
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("x-request-id"))
                .map(|(_, v)| v.as_str()),
        );
        let context = RequestContext::new(request_id, &method, &path);

        let request = EngineRequest {
            context,
            method: parsed_method,
            path: endpoint.path.clone(),
            operation_id: endpoint.operation_id.clone(),
            path_params: route_match.path_params,
            query_params,
            headers,
            body,
            principal: None,
        };

        match self.dispatcher.dispatch(request) {
            Some(response) => write_engine_response(res, &response),
            None => {
                // Routed but unmounted: builder bug, not a caller error.
                error!(
                    operation_id = %endpoint.operation_id,
                    method = %method,
                    path = %path,
                    "routed operation has no pipeline"
                );
                write_json_error(
                    res,
                    500,
                    serde_json::json!({
                        "error": "operation is not mounted",
                        "method": method,
                        "path": path
                    }),
                );
            }
        }
        Ok(())
    }
}
