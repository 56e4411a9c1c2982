use crate::auth::AuthSpec;
use crate::binder::CallArgs;
use http::Method;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Where one handler argument comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    /// Named value from the resolved path-template match.
    Path,
    /// Named value from the query string, coerced to the declared type.
    Query,
    /// The whole query string parsed as a filter/sort/pagination object.
    Search,
    /// The buffered JSON request body, deserialized by the handler adapter.
    Body,
    /// Shared handle to the live request.
    Request,
    /// Shared handle to the mutable reply.
    Reply,
    /// The principal attached by the authentication resolver, if any.
    Principal,
    /// The per-request context (correlation id + tracing span).
    Context,
}

/// Declared value type for query-parameter coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamType {
    #[default]
    Text,
    Integer,
    Float,
    Boolean,
    /// JSON-encoded value in the parameter, deserialized as-is.
    Structured,
}

impl ParamType {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ParamType::Text => "text",
            ParamType::Integer => "integer",
            ParamType::Float => "float",
            ParamType::Boolean => "boolean",
            ParamType::Structured => "structured",
        }
    }
}

/// One handler argument declaration.
///
/// Declaration order is invocation order: the binder produces exactly one
/// value per `ParamMeta`, in sequence.
#[derive(Debug, Clone)]
pub struct ParamMeta {
    pub source: ParamSource,
    /// Required for `Path` and `Query` sources.
    pub name: Option<String>,
    pub ty: ParamType,
    /// Declared body type name, documentation only.
    pub type_name: Option<&'static str>,
    pub description: Option<String>,
}

impl ParamMeta {
    pub fn path(name: impl Into<String>) -> Self {
        Self {
            source: ParamSource::Path,
            name: Some(name.into()),
            ty: ParamType::Text,
            type_name: None,
            description: None,
        }
    }

    pub fn query(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            source: ParamSource::Query,
            name: Some(name.into()),
            ty,
            type_name: None,
            description: None,
        }
    }

    #[must_use]
    pub fn search() -> Self {
        Self::bare(ParamSource::Search)
    }

    #[must_use]
    pub fn body<T>() -> Self {
        let mut meta = Self::bare(ParamSource::Body);
        meta.type_name = Some(std::any::type_name::<T>());
        meta
    }

    #[must_use]
    pub fn request() -> Self {
        Self::bare(ParamSource::Request)
    }

    #[must_use]
    pub fn reply() -> Self {
        Self::bare(ParamSource::Reply)
    }

    #[must_use]
    pub fn principal() -> Self {
        Self::bare(ParamSource::Principal)
    }

    #[must_use]
    pub fn context() -> Self {
        Self::bare(ParamSource::Context)
    }

    /// Attach a free-text description (documentation only).
    #[must_use]
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn bare(source: ParamSource) -> Self {
        Self {
            source,
            name: None,
            ty: ParamType::Text,
            type_name: None,
            description: None,
        }
    }
}

/// Transform applied to a handler result when the request selects a named
/// alternate view (`?view=<name>`).
pub type ViewFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Adapter closure invoking the controller method with the bound arguments.
///
/// Returns `Ok(None)` for no-content results. Errors that downcast to
/// [`crate::error::BindError`] are treated as binding failures (400); all
/// other errors propagate to the transport's error mapping.
pub type HandlerFn = Arc<dyn Fn(CallArgs) -> anyhow::Result<Option<Value>> + Send + Sync>;

/// One routable operation, built once at startup and immutable thereafter.
///
/// The path is the controller's mount path joined with the declared fragment
/// (see [`crate::endpoint::join_paths`]); the operation id doubles as the
/// dispatch key, so it must be unique across the whole endpoint list.
#[derive(Clone)]
pub struct EndpointMeta {
    pub method: Method,
    pub path: String,
    pub operation_id: String,
    pub params: Vec<ParamMeta>,
    pub auth: Option<AuthSpec>,
    pub views: Vec<(String, ViewFn)>,
    pub handler: HandlerFn,
}

impl EndpointMeta {
    pub fn get(operation_id: impl Into<String>, path: impl Into<String>) -> EndpointBuilder {
        EndpointBuilder::new(Method::GET, operation_id, path)
    }

    pub fn post(operation_id: impl Into<String>, path: impl Into<String>) -> EndpointBuilder {
        EndpointBuilder::new(Method::POST, operation_id, path)
    }

    pub fn put(operation_id: impl Into<String>, path: impl Into<String>) -> EndpointBuilder {
        EndpointBuilder::new(Method::PUT, operation_id, path)
    }

    pub fn patch(operation_id: impl Into<String>, path: impl Into<String>) -> EndpointBuilder {
        EndpointBuilder::new(Method::PATCH, operation_id, path)
    }

    pub fn delete(operation_id: impl Into<String>, path: impl Into<String>) -> EndpointBuilder {
        EndpointBuilder::new(Method::DELETE, operation_id, path)
    }

    /// Look up a declared view transform by name.
    #[must_use]
    pub fn view(&self, name: &str) -> Option<&ViewFn> {
        self.views
            .iter()
            .find(|(view_name, _)| view_name == name)
            .map(|(_, transform)| transform)
    }
}

impl fmt::Debug for EndpointMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointMeta")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("operation_id", &self.operation_id)
            .field("params", &self.params)
            .field("auth", &self.auth)
            .field("views", &self.views.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Builder for [`EndpointMeta`]; finalized by [`EndpointBuilder::handler`].
pub struct EndpointBuilder {
    method: Method,
    path: String,
    operation_id: String,
    params: Vec<ParamMeta>,
    auth: Option<AuthSpec>,
    views: Vec<(String, ViewFn)>,
}

impl EndpointBuilder {
    fn new(method: Method, operation_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            operation_id: operation_id.into(),
            params: Vec::new(),
            auth: None,
            views: Vec::new(),
        }
    }

    /// Append a fully specified parameter declaration.
    #[must_use]
    pub fn param(mut self, meta: ParamMeta) -> Self {
        self.params.push(meta);
        self
    }

    #[must_use]
    pub fn path_param(self, name: impl Into<String>) -> Self {
        self.param(ParamMeta::path(name))
    }

    #[must_use]
    pub fn query_param(self, name: impl Into<String>, ty: ParamType) -> Self {
        self.param(ParamMeta::query(name, ty))
    }

    #[must_use]
    pub fn search(self) -> Self {
        self.param(ParamMeta::search())
    }

    #[must_use]
    pub fn body<T>(self) -> Self {
        self.param(ParamMeta::body::<T>())
    }

    #[must_use]
    pub fn request(self) -> Self {
        self.param(ParamMeta::request())
    }

    #[must_use]
    pub fn reply(self) -> Self {
        self.param(ParamMeta::reply())
    }

    #[must_use]
    pub fn principal(self) -> Self {
        self.param(ParamMeta::principal())
    }

    #[must_use]
    pub fn context(self) -> Self {
        self.param(ParamMeta::context())
    }

    /// Declare the auth requirement for this endpoint.
    #[must_use]
    pub fn auth(mut self, spec: AuthSpec) -> Self {
        self.auth = Some(spec);
        self
    }

    /// Declare a named alternate view transform.
    #[must_use]
    pub fn view(
        mut self,
        name: impl Into<String>,
        transform: impl Fn(Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.views.push((name.into(), Arc::new(transform)));
        self
    }

    /// Attach the handler adapter and finish the descriptor.
    pub fn handler(
        self,
        handler: impl Fn(CallArgs) -> anyhow::Result<Option<Value>> + Send + Sync + 'static,
    ) -> EndpointMeta {
        EndpointMeta {
            method: self.method,
            path: self.path,
            operation_id: self.operation_id,
            params: self.params,
            auth: self.auth,
            views: self.views,
            handler: Arc::new(handler),
        }
    }
}
