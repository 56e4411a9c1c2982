//! Per-request context: correlation id plus the request-scoped tracing span.
//!
//! The context is built once when a request enters the service and passed
//! explicitly through dispatch, binding, and into handlers via the
//! ambient-context binding. There is no thread-local or global request state;
//! a context can never leak across concurrently scheduled requests.

use crate::ids::RequestId;
use tracing::{info_span, Span};

/// Explicit request-scoped context handle.
///
/// Cloning is cheap (the span is reference counted, the id is an `Arc<str>`);
/// every clone refers to the same single request.
#[derive(Clone, Debug)]
pub struct RequestContext {
    request_id: RequestId,
    span: Span,
}

impl RequestContext {
    /// Build the context for one inbound request.
    ///
    /// Opens the `request` span carrying the correlation id, method, and path;
    /// all engine logging for this request happens inside it.
    pub fn new(request_id: RequestId, method: &str, path: &str) -> Self {
        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %method,
            path = %path
        );
        Self { request_id, span }
    }

    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Enter the request span for the current scope.
    #[must_use]
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_request_id() {
        let ctx = RequestContext::new(RequestId::from_header_or_new(Some("abc")), "GET", "/x");
        let clone = ctx.clone();
        assert_eq!(ctx.request_id(), clone.request_id());
        assert_eq!(clone.request_id().as_str(), "abc");
    }
}
