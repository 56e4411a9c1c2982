use crate::dispatcher::Reply;
use crate::endpoint::{Controller, EndpointMeta};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::warn;

/// One named readiness probe aggregated by [`HealthController`].
///
/// Names must be unique per server; the aggregate report keys check results
/// by name.
pub trait Healthcheck: Send + Sync {
    fn name(&self) -> &str;

    /// Run the probe. `Ok` contributes the value under `result`; `Err`
    /// marks the whole service unhealthy and contributes the message under
    /// `error`.
    fn check(&self) -> anyhow::Result<Value>;
}

/// Aggregates registered [`Healthcheck`]s under `GET /healthcheck`.
///
/// Responds 200 when every check passes and 500 when any fails, with a
/// report of the form
/// `{"checks": {<name>: {"healthy": bool, ...}}, "healthy": bool}`.
/// Registered by the server builder unless healthchecks are disabled.
#[derive(Default)]
pub struct HealthController {
    checks: Vec<Arc<dyn Healthcheck>>,
}

impl HealthController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a probe to the aggregate. Chainable.
    #[must_use]
    pub fn check(mut self, check: Arc<dyn Healthcheck>) -> Self {
        self.checks.push(check);
        self
    }

    /// Run every probe and fold the results into (status, report).
    fn aggregate(checks: &[Arc<dyn Healthcheck>]) -> (u16, Value) {
        let mut healthy = true;
        let mut report = Map::new();
        for check in checks {
            let entry = match check.check() {
                Ok(result) => json!({ "healthy": true, "result": result }),
                Err(err) => {
                    healthy = false;
                    warn!(check = check.name(), error = %err, "healthcheck failed");
                    json!({ "error": err.to_string(), "healthy": false })
                }
            };
            report.insert(check.name().to_string(), entry);
        }
        let status = if healthy { 200 } else { 500 };
        (
            status,
            json!({ "checks": Value::Object(report), "healthy": healthy }),
        )
    }
}

impl Controller for HealthController {
    fn mount_path(&self) -> &str {
        "/healthcheck"
    }

    fn endpoints(self: Arc<Self>) -> Vec<EndpointMeta> {
        let controller = Arc::clone(&self);
        vec![EndpointMeta::get("healthcheck", "")
            .reply()
            .handler(move |args| {
                let reply: Reply = args.reply(0)?;
                let (status, report) = Self::aggregate(&controller.checks);
                reply.status(status).send(report);
                Ok(None)
            })]
    }
}
