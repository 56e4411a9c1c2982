use crate::endpoint::EndpointMeta;
use crate::error::MountError;
use http::Method;
use regex::Regex;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum number of path/query parameters before heap allocation.
/// Most REST APIs have ≤4 path params (e.g., `/users/:id/posts/:post_id`).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names use `Arc<str>` because they come from the static route table
/// (known at mount time) and cloning one is an atomic increment rather than
/// a string copy; values are per-request data from the URL and stay `String`.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Result of matching a request line against the route table.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub endpoint: Arc<EndpointMeta>,
    /// Placeholder values in template order.
    pub path_params: ParamVec,
}

struct Route {
    method: Method,
    regex: Regex,
    param_names: Vec<Arc<str>>,
    endpoint: Arc<EndpointMeta>,
}

/// Request router over `:name` path templates.
///
/// Templates compile to anchored regexes at mount time; matching scans the
/// table in registration order and the first hit wins, so overlapping
/// templates resolve to whichever endpoint was declared first. The table is
/// fixed once the server starts.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Compile one endpoint's template into the table.
    ///
    /// # Errors
    ///
    /// `MountError::BadTemplate` for an empty placeholder name or a
    /// placeholder name that is not an identifier.
    pub fn add(&mut self, endpoint: Arc<EndpointMeta>) -> Result<(), MountError> {
        let (regex, param_names) = compile_template(&endpoint.operation_id, &endpoint.path)?;
        debug!(
            operation_id = %endpoint.operation_id,
            method = %endpoint.method,
            template = %endpoint.path,
            "route added"
        );
        self.routes.push(Route {
            method: endpoint.method.clone(),
            regex,
            param_names,
            endpoint,
        });
        Ok(())
    }

    /// Match a request line against the table, first hit wins.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        for route in &self.routes {
            if route.method != *method {
                continue;
            }
            let Some(captures) = route.regex.captures(path) else {
                continue;
            };
            let mut path_params = ParamVec::new();
            for (i, name) in route.param_names.iter().enumerate() {
                if let Some(value) = captures.get(i + 1) {
                    path_params.push((Arc::clone(name), value.as_str().to_string()));
                }
            }
            info!(
                method = %method,
                path = %path,
                operation_id = %route.endpoint.operation_id,
                template = %route.endpoint.path,
                "route matched"
            );
            return Some(RouteMatch {
                endpoint: Arc::clone(&route.endpoint),
                path_params,
            });
        }
        warn!(method = %method, path = %path, "no route matched");
        None
    }

    /// Registered `(method, template)` pairs in registration order.
    #[must_use]
    pub fn registered(&self) -> Vec<(Method, String)> {
        self.routes
            .iter()
            .map(|r| (r.method.clone(), r.endpoint.path.clone()))
            .collect()
    }
}

/// Compile a `:name` path template to an anchored regex plus the ordered
/// placeholder names.
///
/// An empty template (endpoint mounted at the root with no fragment) matches
/// `/` exactly. Literal segments are regex-escaped, so templates may contain
/// characters that happen to be regex metacharacters.
fn compile_template(
    operation_id: &str,
    template: &str,
) -> Result<(Regex, Vec<Arc<str>>), MountError> {
    let bad = |reason: &str| MountError::BadTemplate {
        operation: operation_id.to_string(),
        template: template.to_string(),
        reason: reason.to_string(),
    };

    if template.is_empty() || template == "/" {
        let regex = Regex::new(r"^/$").map_err(|e| bad(&e.to_string()))?;
        return Ok((regex, Vec::new()));
    }

    let mut pattern = String::with_capacity(template.len() + 8);
    pattern.push('^');
    let mut param_names: Vec<Arc<str>> = Vec::new();

    for segment in template.split('/') {
        if segment.is_empty() {
            continue;
        }
        if let Some(name) = segment.strip_prefix(':') {
            if name.is_empty() {
                return Err(bad("placeholder has no name"));
            }
            if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(bad(&format!("placeholder <{name}> is not an identifier")));
            }
            pattern.push_str("/([^/]+)");
            param_names.push(Arc::from(name));
        } else {
            pattern.push('/');
            pattern.push_str(&regex::escape(segment));
        }
    }

    pattern.push('$');
    let regex = Regex::new(&pattern).map_err(|e| bad(&e.to_string()))?;
    Ok((regex, param_names))
}

/// Placeholder names declared by a template, in order. Used by mount-time
/// validation to cross-check declared path bindings.
#[must_use]
pub fn template_placeholders(template: &str) -> Vec<&str> {
    template
        .split('/')
        .filter_map(|segment| segment.strip_prefix(':'))
        .filter(|name| !name.is_empty())
        .collect()
}
