//! # Error Module
//!
//! Error taxonomy for the dispatch engine.
//!
//! Binding and authentication failures are terminal at the dispatch boundary:
//! they are converted straight into 400/401 responses and never reach the
//! controller method. Controller methods return `anyhow::Error`; the transport
//! maps those to a status via [`ServiceError`] downcast (explicit status,
//! default 500). Nothing in this engine retries; every failure is decided
//! exactly once per request.

use serde_json::{json, Value};
use thiserror::Error;

/// Failure to produce one declared handler argument from the request.
///
/// Always surfaced as HTTP 400. The message names the offending parameter and
/// its coercion problem.
#[derive(Debug, Error)]
pub enum BindError {
    /// The path template match does not contain the declared placeholder.
    #[error("missing path parameter <{0}>")]
    MissingPathParam(String),
    /// A handler adapter required a parameter the request never supplied.
    #[error("missing required parameter <{0}>")]
    MissingParam(String),
    /// A query parameter value could not be coerced to its declared type.
    #[error("cannot coerce parameter <{name}> value <{value}> to {expected}")]
    Coerce {
        name: String,
        expected: &'static str,
        value: String,
    },
    /// The request body does not deserialize into the declared type.
    #[error("cannot deserialize request body as {type_name}: {source}")]
    Body {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// A handler adapter asked for an argument the binder never produced.
    /// Registration bug, not a caller error, but still decided per request.
    #[error("handler argument {index} is not a {expected}")]
    ArgumentKind { index: usize, expected: &'static str },
    #[error(transparent)]
    Query(#[from] QueryParseError),
}

/// Malformed filter/sort/pagination expression in the search micro-language.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryParseError {
    /// `field[regex]=value` without `/pattern/flags` delimiters.
    #[error("cannot parse regex <{value}> for parameter <{field}>")]
    RegexDelimiters { field: String, value: String },
    /// The pattern or its flags do not compile.
    #[error("<{value}> is not a valid regex for parameter <{field}>")]
    RegexCompile { field: String, value: String },
    #[error("filter operator <{op}> is unknown")]
    UnknownOperator { op: String },
    #[error("sort direction <{dir}> is unknown, only <ASC> and <DESC> are allowed")]
    UnknownDirection { dir: String },
    #[error("<{value}> is not a valid {param} value")]
    InvalidPagination {
        param: &'static str,
        value: String,
    },
}

/// Terminal UNAUTHORIZED outcome of the authentication resolver.
///
/// Carries everything needed for the 401 body: either the ordered
/// per-provider rejection map, or the role-mismatch reason.
#[derive(Debug, Clone)]
pub enum AuthFailure {
    /// Every declared provider rejected the credential. Pairs are in
    /// declaration order: `(provider name, its error message)`.
    Rejected(Vec<(String, String)>),
    /// A provider accepted the credential but the principal lacks the
    /// required role(s).
    RoleDenied {
        provider: String,
        login: String,
        required: Vec<String>,
    },
}

impl AuthFailure {
    /// The `reason` value of the 401 JSON body: an object mapping provider
    /// names to messages, or a single role-mismatch string.
    #[must_use]
    pub fn reason(&self) -> Value {
        match self {
            AuthFailure::Rejected(errors) => {
                let mut map = serde_json::Map::new();
                for (provider, message) in errors {
                    map.insert(provider.clone(), Value::String(message.clone()));
                }
                Value::Object(map)
            }
            AuthFailure::RoleDenied {
                login, required, ..
            } => Value::String(format!(
                "user <{login}> does not have any of the required roles <{}>",
                required.join(", ")
            )),
        }
    }

    /// Full 401 body, `{"reason": <string|object>}`.
    #[must_use]
    pub fn body(&self) -> Value {
        json!({ "reason": self.reason() })
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthFailure::Rejected(errors) => {
                write!(f, "no provider accepted the credential:")?;
                for (provider, message) in errors {
                    write!(f, " {provider}: {message};")?;
                }
                Ok(())
            }
            AuthFailure::RoleDenied { .. } => match self.reason() {
                Value::String(s) => f.write_str(&s),
                _ => f.write_str("role denied"),
            },
        }
    }
}

impl std::error::Error for AuthFailure {}

/// Startup composition error raised while mounting endpoints.
///
/// Mount errors are fatal by design: a misdeclared endpoint must stop the
/// process before it serves a single request.
#[derive(Debug, Error)]
pub enum MountError {
    #[error("auth provider <{0}> is not registered")]
    UnknownAuthProvider(String),
    #[error("auth provider <{0}> is already registered")]
    DuplicateAuthProvider(String),
    #[error("endpoint <{operation}> declares an invalid path template <{template}>: {reason}")]
    BadTemplate {
        operation: String,
        template: String,
        reason: String,
    },
    #[error("operation id <{0}> is declared by more than one endpoint")]
    DuplicateOperation(String),
}

/// Status-carrying business error for controller methods.
///
/// Controllers return `anyhow::Error`; wrapping a `ServiceError` lets the
/// transport map the failure to an explicit status instead of the default
/// 500. The cause chain is preserved for logging.
#[derive(Debug)]
pub struct ServiceError {
    status: u16,
    message: String,
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ServiceError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            cause: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    #[must_use]
    pub fn caused_by(
        mut self,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        self.cause = Some(cause.into());
        self
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Status an opaque handler error maps to at the transport boundary.
///
/// A [`ServiceError`] anywhere in the chain supplies the status; anything
/// else is a 500.
#[must_use]
pub fn handler_error_status(err: &anyhow::Error) -> u16 {
    err.downcast_ref::<ServiceError>()
        .map_or(500, ServiceError::status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_reason_is_provider_map() {
        let failure = AuthFailure::Rejected(vec![
            ("jwt".to_string(), "unable to decode token".to_string()),
            ("basic".to_string(), "bad credentials".to_string()),
        ]);
        let reason = failure.reason();
        assert_eq!(reason["jwt"], "unable to decode token");
        assert_eq!(reason["basic"], "bad credentials");
        assert_eq!(failure.body()["reason"]["basic"], "bad credentials");
    }

    #[test]
    fn role_denied_reason_is_string() {
        let failure = AuthFailure::RoleDenied {
            provider: "jwt".to_string(),
            login: "henry781".to_string(),
            required: vec!["admin".to_string()],
        };
        let reason = failure.reason();
        assert_eq!(
            reason,
            Value::String("user <henry781> does not have any of the required roles <admin>".into())
        );
    }

    #[test]
    fn service_error_status_via_downcast() {
        let err = anyhow::Error::new(ServiceError::bad_request("level <verbose> is unknown"));
        assert_eq!(handler_error_status(&err), 400);
        let plain = anyhow::anyhow!("boom");
        assert_eq!(handler_error_status(&plain), 500);
    }

    #[test]
    fn service_error_preserves_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = ServiceError::internal("storage failure").caused_by(io);
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "storage failure");
    }
}
