use std::time::Duration;

use super::Middleware;
use crate::dispatcher::{EngineRequest, EngineResponse};

/// Middleware stamping hardening headers onto every response.
///
/// Covers the browser-facing basics: MIME sniffing and framing are both
/// disabled by default. Additional fixed headers can be appended at
/// construction.
pub struct SecurityHeadersMiddleware {
    headers: Vec<(&'static str, String)>,
}

impl Default for SecurityHeadersMiddleware {
    /// Default header set:
    /// - `X-Content-Type-Options: nosniff`
    /// - `X-Frame-Options: DENY`
    fn default() -> Self {
        Self {
            headers: vec![
                ("X-Content-Type-Options", "nosniff".to_string()),
                ("X-Frame-Options", "DENY".to_string()),
            ],
        }
    }
}

impl SecurityHeadersMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one more fixed header to the stamped set.
    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

impl Middleware for SecurityHeadersMiddleware {
    fn after(&self, _request: &EngineRequest, response: &mut EngineResponse, _latency: Duration) {
        for (name, value) in &self.headers {
            response.set_header(name, value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiate::ResponseFormat;

    #[test]
    fn default_set_covers_sniffing_and_framing() {
        let middleware = SecurityHeadersMiddleware::new();
        let mut response = EngineResponse::new(200, ResponseFormat::Json);
        middleware.after(&request(), &mut response, Duration::ZERO);
        assert_eq!(response.header("x-content-type-options"), Some("nosniff"));
        assert_eq!(response.header("x-frame-options"), Some("DENY"));
    }

    #[test]
    fn extra_headers_are_stamped_too() {
        let middleware =
            SecurityHeadersMiddleware::new().with_header("Strict-Transport-Security", "max-age=63072000");
        let mut response = EngineResponse::new(204, ResponseFormat::Json);
        middleware.after(&request(), &mut response, Duration::ZERO);
        assert_eq!(
            response.header("strict-transport-security"),
            Some("max-age=63072000")
        );
    }

    fn request() -> EngineRequest {
        use crate::context::RequestContext;
        use crate::dispatcher::HeaderVec;
        use crate::ids::RequestId;
        use crate::server::ParamVec;
        EngineRequest {
            context: RequestContext::new(RequestId::new(), "GET", "/x"),
            method: http::Method::GET,
            path: "/x".to_string(),
            operation_id: "x".to_string(),
            path_params: ParamVec::new(),
            query_params: ParamVec::new(),
            headers: HeaderVec::new(),
            body: None,
            principal: None,
        }
    }
}
