use super::SearchQuery;
use crate::auth::Principal;
use crate::context::RequestContext;
use crate::dispatcher::{EngineRequest, Reply};
use crate::endpoint::{EndpointMeta, ParamMeta, ParamSource, ParamType};
use crate::error::BindError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// One bound handler argument.
#[derive(Debug, Clone)]
pub enum BoundParam {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// JSON value from a `Structured` query parameter.
    Json(Value),
    /// Declared query parameter the request did not supply.
    Absent,
    Search(SearchQuery),
    /// Buffered request body; `None` when the request carried none.
    Body(Option<Value>),
    Request(Arc<EngineRequest>),
    Reply(Reply),
    Principal(Option<Principal>),
    Context(RequestContext),
}

/// The ordered argument list handed to a handler adapter.
///
/// One entry per declared binding, in declaration order. Adapters pull values
/// positionally through the typed accessors; a `Reply`/`Request` accessor
/// clones a shared handle, everything else borrows.
#[derive(Debug)]
pub struct CallArgs {
    values: Vec<(Option<String>, BoundParam)>,
}

impl CallArgs {
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn text(&self, index: usize) -> Result<&str, BindError> {
        match self.get(index, "text")? {
            BoundParam::Text(value) => Ok(value),
            BoundParam::Absent => Err(self.missing(index)),
            _ => Err(self.kind_error(index, "text")),
        }
    }

    pub fn opt_text(&self, index: usize) -> Result<Option<&str>, BindError> {
        match self.get(index, "text")? {
            BoundParam::Text(value) => Ok(Some(value)),
            BoundParam::Absent => Ok(None),
            _ => Err(self.kind_error(index, "text")),
        }
    }

    pub fn integer(&self, index: usize) -> Result<i64, BindError> {
        match self.get(index, "integer")? {
            BoundParam::Integer(value) => Ok(*value),
            BoundParam::Absent => Err(self.missing(index)),
            _ => Err(self.kind_error(index, "integer")),
        }
    }

    pub fn opt_integer(&self, index: usize) -> Result<Option<i64>, BindError> {
        match self.get(index, "integer")? {
            BoundParam::Integer(value) => Ok(Some(*value)),
            BoundParam::Absent => Ok(None),
            _ => Err(self.kind_error(index, "integer")),
        }
    }

    pub fn float(&self, index: usize) -> Result<f64, BindError> {
        match self.get(index, "float")? {
            BoundParam::Float(value) => Ok(*value),
            BoundParam::Absent => Err(self.missing(index)),
            _ => Err(self.kind_error(index, "float")),
        }
    }

    pub fn boolean(&self, index: usize) -> Result<bool, BindError> {
        match self.get(index, "boolean")? {
            BoundParam::Boolean(value) => Ok(*value),
            BoundParam::Absent => Err(self.missing(index)),
            _ => Err(self.kind_error(index, "boolean")),
        }
    }

    pub fn opt_boolean(&self, index: usize) -> Result<Option<bool>, BindError> {
        match self.get(index, "boolean")? {
            BoundParam::Boolean(value) => Ok(Some(*value)),
            BoundParam::Absent => Ok(None),
            _ => Err(self.kind_error(index, "boolean")),
        }
    }

    pub fn structured(&self, index: usize) -> Result<&Value, BindError> {
        match self.get(index, "structured")? {
            BoundParam::Json(value) => Ok(value),
            BoundParam::Absent => Err(self.missing(index)),
            _ => Err(self.kind_error(index, "structured")),
        }
    }

    pub fn search(&self, index: usize) -> Result<&SearchQuery, BindError> {
        match self.get(index, "search")? {
            BoundParam::Search(query) => Ok(query),
            _ => Err(self.kind_error(index, "search")),
        }
    }

    /// Deserialize the request body into the declared type.
    ///
    /// An absent body deserializes from JSON null, so optional bodies want
    /// `T = Option<…>`.
    pub fn body<T: DeserializeOwned>(&self, index: usize) -> Result<T, BindError> {
        let raw = match self.get(index, "body")? {
            BoundParam::Body(raw) => raw.clone().unwrap_or(Value::Null),
            _ => return Err(self.kind_error(index, "body")),
        };
        serde_json::from_value(raw).map_err(|source| BindError::Body {
            type_name: std::any::type_name::<T>(),
            source,
        })
    }

    pub fn request(&self, index: usize) -> Result<Arc<EngineRequest>, BindError> {
        match self.get(index, "request")? {
            BoundParam::Request(request) => Ok(Arc::clone(request)),
            _ => Err(self.kind_error(index, "request")),
        }
    }

    pub fn reply(&self, index: usize) -> Result<Reply, BindError> {
        match self.get(index, "reply")? {
            BoundParam::Reply(reply) => Ok(reply.clone()),
            _ => Err(self.kind_error(index, "reply")),
        }
    }

    pub fn principal(&self, index: usize) -> Result<Option<&Principal>, BindError> {
        match self.get(index, "principal")? {
            BoundParam::Principal(principal) => Ok(principal.as_ref()),
            _ => Err(self.kind_error(index, "principal")),
        }
    }

    pub fn context(&self, index: usize) -> Result<&RequestContext, BindError> {
        match self.get(index, "context")? {
            BoundParam::Context(context) => Ok(context),
            _ => Err(self.kind_error(index, "context")),
        }
    }

    fn get(&self, index: usize, expected: &'static str) -> Result<&BoundParam, BindError> {
        self.values
            .get(index)
            .map(|(_, value)| value)
            .ok_or(BindError::ArgumentKind { index, expected })
    }

    fn kind_error(&self, index: usize, expected: &'static str) -> BindError {
        BindError::ArgumentKind { index, expected }
    }

    fn missing(&self, index: usize) -> BindError {
        let name = self
            .values
            .get(index)
            .and_then(|(name, _)| name.clone())
            .unwrap_or_default();
        BindError::MissingParam(name)
    }
}

/// Produce the ordered argument list for one invocation.
///
/// Synchronous and allocation-light: everything reads already-buffered
/// request data. The first failing binding aborts with its error; the
/// controller method never sees a partially bound call.
pub fn bind(
    endpoint: &EndpointMeta,
    request: &Arc<EngineRequest>,
    reply: &Reply,
) -> Result<CallArgs, BindError> {
    let mut values = Vec::with_capacity(endpoint.params.len());
    for meta in &endpoint.params {
        values.push((meta.name.clone(), bind_one(meta, request, reply)?));
    }
    Ok(CallArgs { values })
}

fn bind_one(
    meta: &ParamMeta,
    request: &Arc<EngineRequest>,
    reply: &Reply,
) -> Result<BoundParam, BindError> {
    match meta.source {
        ParamSource::Path => {
            let name = meta.name.as_deref().unwrap_or_default();
            request
                .path_param(name)
                .map(|value| BoundParam::Text(value.to_string()))
                .ok_or_else(|| BindError::MissingPathParam(name.to_string()))
        }
        ParamSource::Query => {
            let name = meta.name.as_deref().unwrap_or_default();
            match request.query_param(name) {
                None => Ok(BoundParam::Absent),
                Some(raw) => coerce(name, meta.ty, raw),
            }
        }
        ParamSource::Search => Ok(BoundParam::Search(SearchQuery::parse(
            &request.query_params,
        )?)),
        ParamSource::Body => Ok(BoundParam::Body(request.body.clone())),
        ParamSource::Request => Ok(BoundParam::Request(Arc::clone(request))),
        ParamSource::Reply => Ok(BoundParam::Reply(reply.clone())),
        ParamSource::Principal => Ok(BoundParam::Principal(request.principal.clone())),
        ParamSource::Context => Ok(BoundParam::Context(request.context.clone())),
    }
}

/// Coerce one present query value to its declared type.
fn coerce(name: &str, ty: ParamType, raw: &str) -> Result<BoundParam, BindError> {
    let coerce_err = |expected: &'static str| BindError::Coerce {
        name: name.to_string(),
        expected,
        value: raw.to_string(),
    };
    match ty {
        ParamType::Text => Ok(BoundParam::Text(raw.to_string())),
        ParamType::Integer => raw
            .parse::<i64>()
            .map(BoundParam::Integer)
            .map_err(|_| coerce_err("integer")),
        ParamType::Float => raw
            .parse::<f64>()
            .map(BoundParam::Float)
            .map_err(|_| coerce_err("float")),
        ParamType::Boolean => match raw {
            "true" => Ok(BoundParam::Boolean(true)),
            "false" => Ok(BoundParam::Boolean(false)),
            _ => Err(coerce_err("boolean")),
        },
        ParamType::Structured => serde_json::from_str::<Value>(raw)
            .map(BoundParam::Json)
            .map_err(|_| coerce_err("structured")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_coercion_is_literal_only() {
        assert!(matches!(
            coerce("flag", ParamType::Boolean, "true"),
            Ok(BoundParam::Boolean(true))
        ));
        assert!(matches!(
            coerce("flag", ParamType::Boolean, "false"),
            Ok(BoundParam::Boolean(false))
        ));
        let err = coerce("flag", ParamType::Boolean, "TRUE").unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot coerce parameter <flag> value <TRUE> to boolean"
        );
    }

    #[test]
    fn numeric_coercion() {
        assert!(matches!(
            coerce("port", ParamType::Integer, "8080"),
            Ok(BoundParam::Integer(8080))
        ));
        assert!(coerce("port", ParamType::Integer, "80a").is_err());
        assert!(matches!(
            coerce("ratio", ParamType::Float, "0.5"),
            Ok(BoundParam::Float(_))
        ));
    }

    #[test]
    fn structured_coercion_parses_json() {
        match coerce("embed", ParamType::Structured, r#"{"a":1}"#) {
            Ok(BoundParam::Json(value)) => assert_eq!(value["a"], 1),
            other => panic!("expected json value, got {other:?}"),
        }
        assert!(coerce("embed", ParamType::Structured, "{broken").is_err());
    }
}
