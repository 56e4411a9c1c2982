use crate::auth::AuthSpec;
use crate::endpoint::{Controller, EndpointBuilder, EndpointMeta};
use crate::telemetry::LogHandle;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Construction options for [`AdminController`].
#[derive(Clone, Default)]
pub struct AdminOptions {
    /// Auth requirement stamped on every admin endpoint. `None` leaves the
    /// endpoints open, which is only sensible behind a trusted network.
    pub auth: Option<AuthSpec>,
}

impl AdminOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn auth(mut self, spec: AuthSpec) -> Self {
        self.auth = Some(spec);
        self
    }
}

/// Runtime management endpoints under `/admin`.
///
/// `PUT /admin/logging/level/:level` swaps the active log filter through the
/// [`LogHandle`]; an unknown level name is a 400. `GET /admin/logging/level`
/// reports the current filter directive.
pub struct AdminController {
    options: AdminOptions,
    log: LogHandle,
}

impl AdminController {
    #[must_use]
    pub fn new(log: LogHandle, options: AdminOptions) -> Self {
        Self { options, log }
    }

    fn protect(&self, builder: EndpointBuilder) -> EndpointBuilder {
        match &self.options.auth {
            Some(spec) => builder.auth(spec.clone()),
            None => builder,
        }
    }
}

impl Controller for AdminController {
    fn mount_path(&self) -> &str {
        "/admin"
    }

    fn endpoints(self: Arc<Self>) -> Vec<EndpointMeta> {
        let set_handle = self.log.clone();
        let get_handle = self.log.clone();

        let set_level = self
            .protect(EndpointMeta::put("set_logging_level", "/logging/level/:level"))
            .path_param("level")
            .handler(move |args| {
                let level = args.text(0)?;
                set_handle.set_level(level)?;
                info!(%level, "logging level changed");
                Ok(None)
            });

        let get_level = self
            .protect(EndpointMeta::get("get_logging_level", "/logging/level"))
            .handler(move |_args| {
                let level = get_handle.current()?;
                Ok(Some(json!({ "level": level })))
            });

        vec![set_level, get_level]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{build, LogFormat};

    fn handle() -> LogHandle {
        let (_subscriber, handle) = build("info", LogFormat::Pretty);
        handle
    }

    #[test]
    fn endpoints_are_mounted_under_admin() {
        let controller = Arc::new(AdminController::new(handle(), AdminOptions::new()));
        assert_eq!(controller.mount_path(), "/admin");
        let endpoints = Arc::clone(&controller).endpoints();
        let paths: Vec<&str> = endpoints.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["/logging/level/:level", "/logging/level"]);
        assert!(endpoints.iter().all(|e| e.auth.is_none()));
    }

    #[test]
    fn auth_requirement_is_stamped_on_every_endpoint() {
        let options = AdminOptions::new().auth(AuthSpec::provider("jwt"));
        let controller = Arc::new(AdminController::new(handle(), options));
        let endpoints = controller.endpoints();
        assert!(endpoints
            .iter()
            .all(|e| e.auth == Some(AuthSpec::provider("jwt"))));
    }
}
