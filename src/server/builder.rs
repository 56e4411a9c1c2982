use super::http_server::{HttpServer, ServerHandle};
use super::router::{template_placeholders, Router};
use super::service::AppService;
use crate::auth::{AuthProvider, AuthProviders};
use crate::config::RuntimeConfig;
use crate::controllers::{AdminController, AdminOptions, HealthController, Healthcheck};
use crate::dispatcher::Dispatcher;
use crate::endpoint::{collect_endpoints, Controller, EndpointMeta, ParamSource};
use crate::error::MountError;
use crate::middleware::{
    MetricsMiddleware, Middleware, SecurityHeadersMiddleware, TracingMiddleware,
};
use crate::telemetry::LogHandle;
use anyhow::Context as _;
use std::net::ToSocketAddrs;
use std::sync::Arc;
use tracing::info;

/// Composition root for a complete service.
///
/// Collects controllers, auth providers, healthchecks and middleware, then
/// validates and mounts everything in one step. All configuration mistakes
/// (unknown auth provider names, path bindings without a matching template
/// placeholder, duplicate operation ids) surface as [`MountError`] from
/// [`ServerBuilder::build`] instead of per-request failures.
///
/// ```no_run
/// use std::sync::Arc;
/// use switchboard::server::ServerBuilder;
/// # use switchboard::endpoint::{Controller, EndpointMeta};
/// # struct CrewController;
/// # impl Controller for CrewController {
/// #     fn endpoints(self: Arc<Self>) -> Vec<EndpointMeta> { Vec::new() }
/// # }
///
/// # fn main() -> anyhow::Result<()> {
/// let handle = ServerBuilder::new()
///     .controller(Arc::new(CrewController))
///     .start("127.0.0.1:8080")?;
/// handle.wait_ready()?;
/// # Ok(())
/// # }
/// ```
pub struct ServerBuilder {
    controllers: Vec<Arc<dyn Controller>>,
    providers: Vec<Arc<dyn AuthProvider>>,
    middlewares: Vec<Arc<dyn Middleware>>,
    healthchecks: Vec<Arc<dyn Healthcheck>>,
    healthcheck: bool,
    metrics: bool,
    admin: Option<(LogHandle, AdminOptions)>,
    runtime: RuntimeConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::with_config(&RuntimeConfig::from_env())
    }
}

impl ServerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: &RuntimeConfig) -> Self {
        Self {
            controllers: Vec::new(),
            providers: Vec::new(),
            middlewares: Vec::new(),
            healthchecks: Vec::new(),
            healthcheck: true,
            metrics: true,
            admin: None,
            runtime: *config,
        }
    }

    /// Register a controller. Endpoints mount in registration order.
    #[must_use]
    pub fn controller(mut self, controller: Arc<dyn Controller>) -> Self {
        self.controllers.push(controller);
        self
    }

    /// Register a named auth provider. Registration errors (duplicate
    /// names) surface from [`ServerBuilder::build`].
    #[must_use]
    pub fn auth_provider(mut self, provider: Arc<dyn AuthProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Append a middleware after the bundled set.
    #[must_use]
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Add a probe to the aggregated `/healthcheck` report.
    #[must_use]
    pub fn healthcheck(mut self, check: Arc<dyn Healthcheck>) -> Self {
        self.healthchecks.push(check);
        self
    }

    /// Skip the `/healthcheck` controller entirely.
    #[must_use]
    pub fn without_healthcheck(mut self) -> Self {
        self.healthcheck = false;
        self
    }

    /// Skip the `/metrics` endpoint and its middleware.
    #[must_use]
    pub fn without_metrics(mut self) -> Self {
        self.metrics = false;
        self
    }

    /// Mount the admin controller; the handle feeds its log-level endpoints.
    #[must_use]
    pub fn admin(mut self, log: LogHandle, options: AdminOptions) -> Self {
        self.admin = Some((log, options));
        self
    }

    /// Validate and mount everything into a ready-to-serve [`AppService`].
    ///
    /// # Errors
    ///
    /// Any [`MountError`]: duplicate provider names, an endpoint naming an
    /// unregistered provider, an invalid path template, a path binding with
    /// no matching placeholder, or a duplicate operation id.
    pub fn build(self) -> Result<AppService, MountError> {
        let mut providers = AuthProviders::new();
        for provider in self.providers {
            providers.register(provider)?;
        }

        let mut controllers = self.controllers;
        if self.healthcheck {
            let mut health = HealthController::new();
            for check in self.healthchecks {
                health = health.check(check);
            }
            controllers.push(Arc::new(health));
        }
        if let Some((log, options)) = self.admin {
            controllers.push(Arc::new(AdminController::new(log, options)));
        }

        let mut router = Router::new();
        let mut dispatcher = Dispatcher::with_config(&self.runtime);
        for endpoint in collect_endpoints(&controllers) {
            validate_path_bindings(&endpoint)?;
            let endpoint_auth = match &endpoint.auth {
                Some(spec) => Some(providers.resolve(spec)?),
                None => None,
            };
            let endpoint = Arc::new(endpoint);
            router.add(Arc::clone(&endpoint))?;
            // SAFETY: mount spawns the pipeline coroutine; the handler and
            // middleware chain are Send + 'static and never TLS-dependent.
            unsafe {
                dispatcher.mount(endpoint, endpoint_auth)?;
            }
        }

        let metrics = self.metrics.then(|| Arc::new(MetricsMiddleware::new()));
        if let Some(metrics) = &metrics {
            dispatcher.add_middleware(Arc::clone(metrics) as Arc<dyn Middleware>);
        }
        dispatcher.add_middleware(Arc::new(TracingMiddleware));
        dispatcher.add_middleware(Arc::new(SecurityHeadersMiddleware::new()));
        for middleware in self.middlewares {
            dispatcher.add_middleware(middleware);
        }

        for (method, path) in router.registered() {
            info!(%method, path, "mounted");
        }

        let mut service = AppService::new(Arc::new(router), Arc::new(dispatcher));
        if let Some(metrics) = metrics {
            service.set_metrics_middleware(metrics);
        }
        Ok(service)
    }

    /// Build and start serving on `addr`.
    ///
    /// # Errors
    ///
    /// Mount-time validation failures and listener errors.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> anyhow::Result<ServerHandle> {
        // sizes the transport's own I/O coroutines; pipeline coroutines get
        // their stack from the dispatcher config
        may::config().set_stack_size(self.runtime.stack_size);
        let service = self.build()?;
        let handle = HttpServer(service)
            .start(addr)
            .context("failed to start http server")?;
        Ok(handle)
    }
}

/// Every declared path binding needs a placeholder of the same name, or the
/// binder would 400 on every single request to the endpoint.
fn validate_path_bindings(endpoint: &EndpointMeta) -> Result<(), MountError> {
    let placeholders = template_placeholders(&endpoint.path);
    for param in &endpoint.params {
        if param.source != ParamSource::Path {
            continue;
        }
        let name = param.name.as_deref().unwrap_or_default();
        if !placeholders.contains(&name) {
            return Err(MountError::BadTemplate {
                operation: endpoint.operation_id.clone(),
                template: endpoint.path.clone(),
                reason: format!("path binding <{name}> has no matching placeholder"),
            });
        }
    }
    Ok(())
}
