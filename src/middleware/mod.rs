mod core;
mod metrics;
mod security_headers;
mod tracing;

pub use core::Middleware;
pub use metrics::MetricsMiddleware;
pub use security_headers::SecurityHeadersMiddleware;
pub use tracing::TracingMiddleware;
