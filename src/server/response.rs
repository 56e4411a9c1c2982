use crate::dispatcher::EngineResponse;
use may_minihttp::Response;
use serde_json::Value;

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "OK",
    }
}

// may_minihttp headers are full `Name: value` lines with a 'static lifetime;
// dynamic values go through Box::leak.
fn write_header(res: &mut Response, name: &str, value: &str) {
    let line = format!("{name}: {value}").into_boxed_str();
    res.header(Box::leak(line));
}

/// Write a shaped engine response to the wire: status, carried headers, the
/// negotiated content type, and the serialized body.
pub fn write_engine_response(res: &mut Response, response: &EngineResponse) {
    res.status_code(response.status as usize, status_reason(response.status));
    for (name, value) in &response.headers {
        write_header(res, name, value);
    }
    match response.serialize_body() {
        Ok(Some(text)) => {
            write_header(res, "Content-Type", response.content_type());
            res.body_vec(text.into_bytes());
        }
        Ok(None) => {
            res.body_vec(Vec::new());
        }
        Err(err) => {
            res.status_code(500, status_reason(500));
            write_header(res, "Content-Type", "application/json");
            res.body_vec(
                serde_json::json!({ "error": format!("response serialization failed: {err}") })
                    .to_string()
                    .into_bytes(),
            );
        }
    }
}

/// Write a transport-level JSON error (404, 500) outside the dispatch path.
pub fn write_json_error(res: &mut Response, status: u16, body: Value) {
    res.status_code(status as usize, status_reason(status));
    res.header("Content-Type: application/json");
    res.body_vec(body.to_string().into_bytes());
}
