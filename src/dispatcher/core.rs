use crate::auth::{self, AuthOutcome, AuthRequest, EndpointAuth, Principal};
use crate::binder;
use crate::config::RuntimeConfig;
use crate::context::RequestContext;
use crate::endpoint::EndpointMeta;
use crate::error::{handler_error_status, AuthFailure, BindError, MountError};
use crate::middleware::Middleware;
use crate::negotiate::{negotiate, ResponseFormat};
use crate::server::ParamVec;
use http::Method;
use may::coroutine;
use may::sync::mpsc;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Maximum inline headers before heap allocation. Most requests carry fewer.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage for the hot path.
///
/// Header names use `Arc<str>` because they repeat across requests
/// (Content-Type, Authorization, ...) and cloning one is an atomic
/// increment rather than a copy; values are per-request and stay `String`.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// One in-flight request as the pipelines see it.
///
/// Built by the transport from the matched route, then enriched inside the
/// pipeline: the auth resolver writes `principal` before the request is
/// shared with the handler.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// Correlation id and request-scoped span.
    pub context: RequestContext,
    /// HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The matched path template, placeholders intact.
    pub path: String,
    /// Operation id of the endpoint this request resolved to.
    pub operation_id: String,
    /// Path parameters extracted from the URL (stack-allocated for ≤8 params)
    pub path_params: ParamVec,
    /// Query string parameters (stack-allocated for ≤8 params)
    pub query_params: ParamVec,
    /// HTTP headers (stack-allocated for ≤16 headers)
    pub headers: HeaderVec,
    /// Request body parsed as JSON (if present)
    pub body: Option<Value>,
    /// Authenticated caller, attached by the resolver on success.
    pub principal: Option<Principal>,
}

impl EngineRequest {
    /// Get a path parameter by name.
    ///
    /// Uses "last write wins" semantics: if duplicate parameter names exist
    /// at different path depths (e.g., `/org/:id/user/:id`), returns the
    /// last occurrence.
    #[inline]
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name.
    ///
    /// Uses "last write wins" semantics: `?limit=10&limit=20` yields `20`.
    #[inline]
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a header by name (case-insensitive per RFC 7230).
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What a pipeline hands back for one request.
#[derive(Debug, Clone)]
pub struct EngineResponse {
    /// HTTP status code (200, 404, 500, etc.)
    pub status: u16,
    /// Response headers (stack-allocated for ≤16 headers)
    pub headers: HeaderVec,
    /// Result value to serialize; `None` sends an empty body.
    pub body: Option<Value>,
    /// Negotiated serialization format for `body`.
    pub format: ResponseFormat,
}

impl EngineResponse {
    #[must_use]
    pub fn new(status: u16, format: ResponseFormat) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body: None,
            format,
        }
    }

    /// Error response with an `{"error": message}` body, always JSON.
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body: Some(serde_json::json!({ "error": message })),
            format: ResponseFormat::Json,
        }
    }

    /// 401 with the resolver's verdict as a `{"reason": ...}` body, always JSON.
    #[must_use]
    pub fn unauthorized(failure: &AuthFailure) -> Self {
        Self {
            status: 401,
            headers: HeaderVec::new(),
            body: Some(failure.body()),
            format: ResponseFormat::Json,
        }
    }

    /// Get a header by name (case-insensitive).
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header.
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// Media type the body serializes as.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    /// Serialize the body with the negotiated format.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error when the value cannot be rendered.
    pub fn serialize_body(&self) -> anyhow::Result<Option<String>> {
        match &self.body {
            None => Ok(None),
            Some(value) => Ok(Some(self.format.serialize(value)?)),
        }
    }
}

#[derive(Debug, Default)]
struct ReplyState {
    status: Option<u16>,
    headers: HeaderVec,
    body: Option<Value>,
    sent: bool,
}

/// Direct response handle for handlers that bind a reply parameter.
///
/// Interior-mutable and cheap to clone; the pipeline reads the final state
/// once the handler returns. An explicitly sent body wins over the handler's
/// return value, an explicit status wins over the defaults (200 with a
/// value, 204 without).
#[derive(Debug, Clone, Default)]
pub struct Reply {
    state: Arc<Mutex<ReplyState>>,
}

impl Reply {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response status. Chainable.
    pub fn status(&self, code: u16) -> &Self {
        if let Ok(mut state) = self.state.lock() {
            state.status = Some(code);
        }
        self
    }

    /// Add or replace a response header. Chainable.
    pub fn header(&self, name: &str, value: impl Into<String>) -> &Self {
        if let Ok(mut state) = self.state.lock() {
            state.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
            state.headers.push((Arc::from(name), value.into()));
        }
        self
    }

    /// Send an explicit body, bypassing the return-value path. Last send
    /// wins when called more than once.
    pub fn send(&self, body: Value) {
        if let Ok(mut state) = self.state.lock() {
            state.body = Some(body);
            state.sent = true;
        }
    }

    fn take_state(&self) -> ReplyState {
        self.state
            .lock()
            .map(|mut state| std::mem::take(&mut *state))
            .unwrap_or_default()
    }
}

/// Verdict of one pipeline run: a shaped response, or an uncaught handler
/// error left for the dispatcher's error mapping.
pub type PipelineResult = Result<EngineResponse, anyhow::Error>;

/// One unit of work for a pipeline coroutine.
pub struct EngineJob {
    pub request: EngineRequest,
    /// Channel for sending the result back to the dispatcher.
    pub reply_tx: mpsc::Sender<PipelineResult>,
}

/// Channel sender feeding one endpoint's pipeline coroutine.
pub type PipelineSender = mpsc::Sender<EngineJob>;

/// Routes requests to mounted endpoint pipelines.
///
/// One coroutine per endpoint, keyed by operation id, each consuming jobs
/// from its channel. Middleware wraps every dispatch in registration order.
/// The pipeline set is fixed once the server starts; there is no runtime
/// re-mounting.
#[derive(Clone)]
pub struct Dispatcher {
    pipelines: HashMap<String, PipelineSender>,
    middlewares: Vec<Arc<dyn Middleware>>,
    stack_size: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Create an empty dispatcher with the stack size from the environment.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&RuntimeConfig::from_env())
    }

    #[must_use]
    pub fn with_config(config: &RuntimeConfig) -> Self {
        Dispatcher {
            pipelines: HashMap::new(),
            middlewares: Vec::new(),
            stack_size: config.stack_size,
        }
    }

    /// Add middleware to the dispatch path.
    ///
    /// Middleware executes in the order it's added, before and after every
    /// dispatched request.
    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    #[must_use]
    pub fn has_operation(&self, operation_id: &str) -> bool {
        self.pipelines.contains_key(operation_id)
    }

    /// Mount one endpoint: spawn its pipeline coroutine and register the
    /// feeding channel under the operation id.
    ///
    /// Pipeline panics are caught and converted to error results, so one
    /// crashing handler cannot take the coroutine down.
    ///
    /// # Safety
    ///
    /// This function is marked unsafe because it calls
    /// `may::coroutine::Builder::spawn()`, which is unsafe in the `may`
    /// runtime. The unsafety comes from the coroutine runtime's
    /// requirements, not from this function's logic. The caller must ensure
    /// the May runtime is configured before mounting (see `may::config()`).
    ///
    /// # Errors
    ///
    /// `MountError::DuplicateOperation` when the operation id is already
    /// taken.
    pub unsafe fn mount(
        &mut self,
        endpoint: Arc<EndpointMeta>,
        endpoint_auth: Option<EndpointAuth>,
    ) -> Result<(), MountError> {
        let operation_id = endpoint.operation_id.clone();
        if self.pipelines.contains_key(&operation_id) {
            return Err(MountError::DuplicateOperation(operation_id));
        }

        let (tx, rx) = mpsc::channel::<EngineJob>();
        let stack_size = self.stack_size;
        let coroutine_op = operation_id.clone();

        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the
        // may runtime. The closure is Send + 'static and owns the endpoint
        // and auth chain; every failure is reported through the reply
        // channel, never by unwinding out of the coroutine.
        let spawned = unsafe {
            coroutine::Builder::new()
                .stack_size(stack_size)
                .spawn(move || {
                    debug!(
                        operation_id = %coroutine_op,
                        stack_size,
                        "pipeline coroutine start"
                    );
                    for job in rx.iter() {
                        let EngineJob { request, reply_tx } = job;
                        let request_id = request.context.request_id().clone();
                        let started = Instant::now();

                        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(
                            || run_pipeline(&endpoint, endpoint_auth.as_ref(), request),
                        ));
                        let result = match outcome {
                            Ok(result) => result,
                            Err(panic) => {
                                let panic_message = format!("{panic:?}");
                                let backtrace = std::backtrace::Backtrace::capture();
                                error!(
                                    request_id = %request_id,
                                    operation_id = %coroutine_op,
                                    panic_message = %panic_message,
                                    backtrace = %backtrace,
                                    "handler panicked"
                                );
                                Err(anyhow::anyhow!("handler panicked: {panic_message}"))
                            }
                        };

                        debug!(
                            request_id = %request_id,
                            operation_id = %coroutine_op,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "pipeline run complete"
                        );
                        // A dropped receiver means the requester went away;
                        // nothing left to tell it.
                        let _ = reply_tx.send(result);
                    }
                })
        };

        if let Err(err) = spawned {
            // Resource exhaustion: log and skip the endpoint rather than
            // crash the whole mount sequence.
            error!(
                operation_id = %operation_id,
                error = %err,
                stack_size,
                "failed to spawn pipeline coroutine"
            );
            return Ok(());
        }

        info!(
            operation_id = %operation_id,
            total_pipelines = self.pipelines.len() + 1,
            "endpoint mounted"
        );
        self.pipelines.insert(operation_id, tx);
        Ok(())
    }

    /// Dispatch a request to its endpoint pipeline and wait for the
    /// response (coroutine-blocking).
    ///
    /// Uncaught handler errors come back here and are mapped to a status
    /// and `{"error": ...}` body; a `ServiceError` in the chain supplies
    /// the status, anything else is a 500. Returns `None` when no pipeline
    /// is mounted under the request's operation id.
    #[must_use]
    pub fn dispatch(&self, request: EngineRequest) -> Option<EngineResponse> {
        let Some(tx) = self.pipelines.get(&request.operation_id) else {
            error!(
                operation_id = %request.operation_id,
                mounted_pipelines = self.pipelines.len(),
                "no pipeline for operation"
            );
            return None;
        };

        let mut early_response: Option<EngineResponse> = None;
        for middleware in &self.middlewares {
            if early_response.is_none() {
                early_response = middleware.before(&request);
            }
        }

        let (mut response, latency) = if let Some(response) = early_response {
            (response, Duration::ZERO)
        } else {
            let request_id = request.context.request_id().clone();
            info!(
                request_id = %request_id,
                operation_id = %request.operation_id,
                method = %request.method,
                path = %request.path,
                "dispatching request"
            );
            let started = Instant::now();
            let (reply_tx, reply_rx) = mpsc::channel();
            if tx
                .send(EngineJob {
                    request: request.clone(),
                    reply_tx,
                })
                .is_err()
            {
                error!(
                    request_id = %request_id,
                    operation_id = %request.operation_id,
                    "pipeline channel closed"
                );
                return Some(EngineResponse::error(
                    503,
                    &format!("operation <{}> is not responding", request.operation_id),
                ));
            }
            match reply_rx.recv() {
                Ok(Ok(response)) => {
                    info!(
                        request_id = %request_id,
                        operation_id = %request.operation_id,
                        status = response.status,
                        latency_ms = started.elapsed().as_millis() as u64,
                        "response ready"
                    );
                    (response, started.elapsed())
                }
                Ok(Err(err)) => {
                    let status = handler_error_status(&err);
                    warn!(
                        request_id = %request_id,
                        operation_id = %request.operation_id,
                        status,
                        error = %err,
                        "handler returned an error"
                    );
                    (
                        EngineResponse::error(status, &err.to_string()),
                        started.elapsed(),
                    )
                }
                Err(_) => {
                    // Coroutine gone mid-request, most likely resource
                    // exhaustion. 503 instead of dropping the connection.
                    error!(
                        request_id = %request_id,
                        operation_id = %request.operation_id,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "pipeline dropped the reply channel"
                    );
                    return Some(EngineResponse::error(
                        503,
                        &format!("operation <{}> is not responding", request.operation_id),
                    ));
                }
            }
        };

        for middleware in &self.middlewares {
            middleware.after(&request, &mut response, latency);
        }
        Some(response)
    }
}

/// One request through one endpoint: authenticate, negotiate, bind, invoke,
/// shape. Auth and binding failures become responses here; handler errors
/// pass through for the dispatcher to map.
fn run_pipeline(
    endpoint: &EndpointMeta,
    endpoint_auth: Option<&EndpointAuth>,
    mut request: EngineRequest,
) -> PipelineResult {
    let span = request.context.span().clone();
    let _guard = span.enter();

    match auth::authenticate(endpoint_auth, &AuthRequest::new(&request.headers)) {
        AuthOutcome::Passthrough => {}
        AuthOutcome::Success(principal) => {
            debug!(login = %principal.login_name(), "principal attached");
            request.principal = Some(principal);
        }
        AuthOutcome::Unauthorized(failure) => {
            info!(reason = %failure, "request unauthorized");
            return Ok(EngineResponse::unauthorized(&failure));
        }
    }

    let format = negotiate(request.header("accept"));

    let request = Arc::new(request);
    let reply = Reply::new();
    let args = match binder::bind(endpoint, &request, &reply) {
        Ok(args) => args,
        Err(err) => {
            info!(error = %err, "parameter binding failed");
            return Ok(EngineResponse::error(400, &err.to_string()));
        }
    };

    let result = match (endpoint.handler)(args) {
        Ok(result) => result,
        Err(err) => match err.downcast_ref::<BindError>() {
            // Body deserialization happens in the handler adapter, but a
            // shape mismatch is still a binding failure, not a handler
            // error.
            Some(bind_err) => {
                info!(error = %bind_err, "parameter binding failed");
                return Ok(EngineResponse::error(400, &bind_err.to_string()));
            }
            None => return Err(err),
        },
    };

    Ok(shape_response(endpoint, &request, &reply, result, format))
}

/// Apply the response contract: an explicitly sent reply wins, an absent
/// result with an untouched reply is a 204, otherwise the returned value
/// (through the selected view transform, when one is named) with the
/// explicit or default 200 status.
fn shape_response(
    endpoint: &EndpointMeta,
    request: &EngineRequest,
    reply: &Reply,
    result: Option<Value>,
    format: ResponseFormat,
) -> EngineResponse {
    let state = reply.take_state();
    if state.sent {
        return EngineResponse {
            status: state.status.unwrap_or(200),
            headers: state.headers,
            body: state.body,
            format,
        };
    }
    match result {
        None => EngineResponse {
            status: 204,
            headers: state.headers,
            body: None,
            format,
        },
        Some(value) => {
            let value = match request
                .query_param("view")
                .and_then(|name| endpoint.view(name))
            {
                Some(view) => view(value),
                None => value,
            };
            EngineResponse {
                status: state.status.unwrap_or(200),
                headers: state.headers,
                body: Some(value),
                format,
            }
        }
    }
}
