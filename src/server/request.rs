use super::router::ParamVec;
use crate::dispatcher::HeaderVec;
use may_minihttp::Request;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info};

/// Parsed HTTP request data used by `AppService`.
///
/// Header names are lowercased on the way in; query parameters keep their
/// wire order, duplicates included, so downstream last-write-wins reads and
/// the search micro-language both see what the caller actually sent.
#[derive(Debug)]
pub struct ParsedRequest {
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request path with the query string stripped
    pub path: String,
    /// HTTP headers (lowercase names, stack-allocated for ≤16 headers)
    pub headers: HeaderVec,
    /// Query string parameters in wire order (stack-allocated for ≤8 params)
    pub query_params: ParamVec,
    /// Request body parsed as JSON (if present and well-formed)
    pub body: Option<serde_json::Value>,
}

/// Parse query string parameters from a URL path.
///
/// Extracts everything after the `?` character and URL-decodes names and
/// values. Duplicate names are kept in order.
#[must_use]
pub fn parse_query_params(path: &str) -> ParamVec {
    let Some(pos) = path.find('?') else {
        return ParamVec::new();
    };
    url::form_urlencoded::parse(path[pos + 1..].as_bytes())
        .map(|(k, v)| (Arc::from(k.as_ref()), v.to_string()))
        .collect()
}

/// Extract method, path, headers, query parameters, and JSON body from a raw
/// `may_minihttp::Request`.
pub fn parse_request(req: Request) -> ParsedRequest {
    let method = req.method().to_string();
    let raw_path = req.path().to_string();
    let path = raw_path.split('?').next().unwrap_or("/").to_string();

    let headers: HeaderVec = req
        .headers()
        .iter()
        .map(|h| {
            (
                Arc::from(h.name.to_ascii_lowercase().as_str()),
                String::from_utf8_lossy(h.value).to_string(),
            )
        })
        .collect();

    debug!(
        header_count = headers.len(),
        size_bytes = headers.iter().map(|(k, v)| k.len() + v.len()).sum::<usize>(),
        "headers extracted"
    );

    let query_params = parse_query_params(&raw_path);
    debug!(param_count = query_params.len(), "query params parsed");

    let body = {
        let mut body_str = String::new();
        match req.body().read_to_string(&mut body_str) {
            Ok(size) if size > 0 => {
                debug!(body_size_bytes = size, "request body read");
                serde_json::from_str::<serde_json::Value>(&body_str).ok()
            }
            _ => None,
        }
    };

    info!(
        method = %method,
        path = %path,
        header_count = headers.len(),
        has_body = body.is_some(),
        "request parsed"
    );

    ParsedRequest {
        method,
        path,
        headers,
        query_params,
        body,
    }
}
