//! Integration tests for the HTTP server and request processing pipeline
//!
//! # Test Coverage
//!
//! This module tests the complete HTTP stack end to end:
//! - Server startup and lifecycle management
//! - Request routing and JSON 404s
//! - Parameter binding failures surfacing as 400s
//! - Response shaping: explicit replies, 201/204, view transforms
//! - Content negotiation between JSON and YAML
//! - Search micro-language (filter, sort, pagination)
//! - Panic containment inside pipeline coroutines
//!
//! # Test Strategy
//!
//! A small roster API defined in this file is the test subject. Every test
//! boots its own server on a random loopback port and talks to it over a
//! raw TCP socket, so assertions cover exactly what hits the wire:
//! status line, headers, and serialized body.
//!
//! # Test Fixtures
//!
//! - `RosterTestServer`: RAII fixture, stops the server on drop
//! - `RosterController`: in-file controller with list/get/create/delete
//!   endpoints plus deliberately failing ones

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use switchboard::binder::{FilterOp, SearchQuery, SortDirection};
use switchboard::server::ServerHandle;
use switchboard::{Controller, EndpointMeta, ServerBuilder, ServiceError};

use tracing_util::TestTracing;
mod common;
use common::http::{header, parse_response, raw_request, send_request};
use common::test_server;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Pilot {
    name: String,
    station: String,
    #[serde(default)]
    flight_hours: u64,
}

/// Test subject: a mutable pilot roster under `/v1/roster`.
///
/// Static fragments are declared before `/:name` because the route table
/// matches in declaration order.
struct RosterController {
    roster: Mutex<Vec<Pilot>>,
}

impl Default for RosterController {
    fn default() -> Self {
        let seed = [
            ("ripley", "bridge", 12400),
            ("kane", "navigation", 8300),
            ("lambert", "engineering", 5100),
            ("parker", "engineering", 6200),
        ];
        Self {
            roster: Mutex::new(
                seed.into_iter()
                    .map(|(name, station, flight_hours)| Pilot {
                        name: name.to_string(),
                        station: station.to_string(),
                        flight_hours,
                    })
                    .collect(),
            ),
        }
    }
}

fn field_text(pilot: &Pilot, field: &str) -> String {
    match field {
        "name" => pilot.name.clone(),
        "station" => pilot.station.clone(),
        "flight_hours" => pilot.flight_hours.to_string(),
        _ => String::new(),
    }
}

fn matches_filters(pilot: &Pilot, search: &SearchQuery) -> bool {
    search.filters().iter().all(|(field, op)| {
        let value = field_text(pilot, field);
        match op {
            FilterOp::Eq(expected) => value == *expected,
            FilterOp::Regex(regex) => regex.is_match(&value),
        }
    })
}

fn summary_view(value: Value) -> Value {
    json!({ "name": value["name"], "station": value["station"] })
}

impl Controller for RosterController {
    fn mount_path(&self) -> &str {
        "/v1/roster"
    }

    fn endpoints(self: Arc<Self>) -> Vec<EndpointMeta> {
        let list = Arc::clone(&self);
        let create = Arc::clone(&self);
        let get = Arc::clone(&self);
        let delete = Arc::clone(&self);
        vec![
            EndpointMeta::get("list_pilots", "")
                .search()
                .view("summary", |value| match value {
                    Value::Array(items) => {
                        Value::Array(items.into_iter().map(summary_view).collect())
                    }
                    other => other,
                })
                .handler(move |args| {
                    let search = args.search(0)?;
                    let mut pilots: Vec<Pilot> = list
                        .roster
                        .lock()
                        .unwrap()
                        .iter()
                        .filter(|pilot| matches_filters(pilot, search))
                        .cloned()
                        .collect();
                    for (field, direction) in search.sort().iter().rev() {
                        pilots.sort_by(|a, b| {
                            let ordering = field_text(a, field).cmp(&field_text(b, field));
                            match direction {
                                SortDirection::Asc => ordering,
                                SortDirection::Desc => ordering.reverse(),
                            }
                        });
                    }
                    let offset = search.offset().unwrap_or(0) as usize;
                    let limit = search.limit().map_or(usize::MAX, |l| l as usize);
                    let page: Vec<Pilot> = pilots.into_iter().skip(offset).take(limit).collect();
                    Ok(Some(serde_json::to_value(page)?))
                }),
            EndpointMeta::post("create_pilot", "")
                .body::<Pilot>()
                .reply()
                .handler(move |args| {
                    let pilot: Pilot = args.body(0)?;
                    let reply = args.reply(1)?;
                    create.roster.lock().unwrap().push(pilot.clone());
                    reply.status(201);
                    Ok(Some(serde_json::to_value(pilot)?))
                }),
            EndpointMeta::get("roster_status", "/status")
                .reply()
                .handler(|args| {
                    let reply = args.reply(0)?;
                    reply.header("x-roster-mode", "standby");
                    Ok(None)
                }),
            EndpointMeta::get("broken_scanner", "/broken").handler(|_args| {
                panic!("scanner offline");
            }),
            EndpointMeta::get("maintenance", "/maintenance").handler(|_args| {
                Err(ServiceError::new(503, "maintenance window").into())
            }),
            EndpointMeta::get("get_pilot", "/:name")
                .path_param("name")
                .view("summary", summary_view)
                .handler(move |args| {
                    let name = args.text(0)?;
                    let roster = get.roster.lock().unwrap();
                    let pilot = roster
                        .iter()
                        .find(|pilot| pilot.name == name)
                        .ok_or_else(|| ServiceError::not_found(format!("pilot <{name}> is unknown")))?;
                    Ok(Some(serde_json::to_value(pilot)?))
                }),
            EndpointMeta::delete("delete_pilot", "/:name")
                .path_param("name")
                .handler(move |args| {
                    let name = args.text(0)?;
                    let mut roster = delete.roster.lock().unwrap();
                    let before = roster.len();
                    roster.retain(|pilot| pilot.name != name);
                    if roster.len() == before {
                        return Err(
                            ServiceError::not_found(format!("pilot <{name}> is unknown")).into()
                        );
                    }
                    Ok(None)
                }),
        ]
    }
}

/// Test fixture with automatic setup and teardown using RAII.
///
/// Implements Drop so the server coroutine is cancelled even when the test
/// body panics mid-assertion.
struct RosterTestServer {
    _tracing: TestTracing,
    handle: Option<ServerHandle>,
    addr: SocketAddr,
}

impl RosterTestServer {
    fn new() -> Self {
        test_server::setup_may_runtime();
        let tracing = TestTracing::init();
        let addr = test_server::free_addr();
        let handle = ServerBuilder::new()
            .controller(Arc::new(RosterController::default()))
            .start(addr)
            .unwrap();
        handle.wait_ready().unwrap();
        Self {
            _tracing: tracing,
            handle: Some(handle),
            addr,
        }
    }

    fn send(&self, req: &str) -> (u16, Vec<(String, String)>, String) {
        parse_response(&send_request(&self.addr, req))
    }

    fn get(&self, target: &str) -> (u16, Vec<(String, String)>, String) {
        self.send(&raw_request("GET", target, &[], None))
    }
}

impl Drop for RosterTestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

fn body_json(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}

#[test]
fn test_get_pilot_returns_json_with_standard_headers() {
    let server = RosterTestServer::new();
    let (status, headers, body) = server.get("/v1/roster/ripley");
    assert_eq!(status, 200);
    assert_eq!(header(&headers, "content-type"), Some("application/json"));
    assert_eq!(header(&headers, "x-content-type-options"), Some("nosniff"));
    assert_eq!(header(&headers, "x-frame-options"), Some("DENY"));
    assert!(!header(&headers, "x-request-id").unwrap().is_empty());
    let pilot = body_json(&body);
    assert_eq!(pilot["station"], "bridge");
    assert_eq!(pilot["flight_hours"], 12400);
}

#[test]
fn test_inbound_request_id_is_reused() {
    let server = RosterTestServer::new();
    let req = raw_request(
        "GET",
        "/v1/roster/ripley",
        &[("x-request-id", "flight-77")],
        None,
    );
    let (status, headers, _) = server.send(&req);
    assert_eq!(status, 200);
    assert_eq!(header(&headers, "x-request-id"), Some("flight-77"));
}

#[test]
fn test_unknown_route_is_a_json_404() {
    let server = RosterTestServer::new();
    let (status, headers, body) = server.get("/v1/nowhere");
    assert_eq!(status, 404);
    assert_eq!(header(&headers, "content-type"), Some("application/json"));
    let body = body_json(&body);
    assert_eq!(body["error"], "Not Found");
    assert_eq!(body["method"], "GET");
    assert_eq!(body["path"], "/v1/nowhere");
}

#[test]
fn test_unknown_pilot_maps_service_error_to_404() {
    let server = RosterTestServer::new();
    let (status, _, body) = server.get("/v1/roster/jones");
    assert_eq!(status, 404);
    assert_eq!(body_json(&body)["error"], "pilot <jones> is unknown");
}

#[test]
fn test_create_returns_201_with_the_created_body() {
    let server = RosterTestServer::new();
    let req = raw_request(
        "POST",
        "/v1/roster",
        &[],
        Some(r#"{"name":"vasquez","station":"weapons"}"#),
    );
    let (status, _, body) = server.send(&req);
    assert_eq!(status, 201);
    let created = body_json(&body);
    assert_eq!(created["name"], "vasquez");
    assert_eq!(created["flight_hours"], 0);

    let (status, _, _) = server.get("/v1/roster/vasquez");
    assert_eq!(status, 200);
}

#[test]
fn test_delete_returns_204_with_an_empty_body() {
    let server = RosterTestServer::new();
    let (status, _, body) = server.send(&raw_request("DELETE", "/v1/roster/kane", &[], None));
    assert_eq!(status, 204);
    assert!(body.is_empty());

    let (status, _, _) = server.get("/v1/roster/kane");
    assert_eq!(status, 404);
}

#[test]
fn test_body_shape_mismatch_is_a_400() {
    let server = RosterTestServer::new();
    let req = raw_request("POST", "/v1/roster", &[], Some(r#"{"station":true}"#));
    let (status, _, body) = server.send(&req);
    assert_eq!(status, 400);
    let message = body_json(&body)["error"].as_str().unwrap().to_string();
    assert!(
        message.starts_with("cannot deserialize request body"),
        "unexpected message: {message}"
    );
}

#[test]
fn test_yaml_accept_is_honored() {
    let server = RosterTestServer::new();
    let req = raw_request(
        "GET",
        "/v1/roster/ripley",
        &[("Accept", "application/x-yaml")],
        None,
    );
    let (status, headers, body) = server.send(&req);
    assert_eq!(status, 200);
    assert_eq!(header(&headers, "content-type"), Some("application/x-yaml"));
    let pilot: Value = serde_yaml::from_str(&body).unwrap();
    assert_eq!(pilot["name"], "ripley");
}

#[test]
fn test_unsupported_accept_falls_back_to_json() {
    let server = RosterTestServer::new();
    let req = raw_request("GET", "/v1/roster/ripley", &[("Accept", "text/html")], None);
    let (status, headers, _) = server.send(&req);
    assert_eq!(status, 200);
    assert_eq!(header(&headers, "content-type"), Some("application/json"));
}

#[test]
fn test_view_parameter_reshapes_the_body() {
    let server = RosterTestServer::new();
    let (status, _, body) = server.get("/v1/roster/ripley?view=summary");
    assert_eq!(status, 200);
    let pilot = body_json(&body);
    assert_eq!(pilot["name"], "ripley");
    assert_eq!(pilot["station"], "bridge");
    assert!(pilot.get("flight_hours").is_none());
}

#[test]
fn test_unknown_view_leaves_the_body_untouched() {
    let server = RosterTestServer::new();
    let (status, _, body) = server.get("/v1/roster/ripley?view=ghost");
    assert_eq!(status, 200);
    assert_eq!(body_json(&body)["flight_hours"], 12400);
}

#[test]
fn test_list_view_applies_per_element() {
    let server = RosterTestServer::new();
    let (status, _, body) = server.get("/v1/roster?view=summary");
    assert_eq!(status, 200);
    let pilots = body_json(&body);
    let first = &pilots.as_array().unwrap()[0];
    assert!(first.get("flight_hours").is_none());
}

#[test]
fn test_search_filters_sorts_and_pages() {
    let server = RosterTestServer::new();

    let (status, _, body) =
        server.get("/v1/roster?filter=station=engineering&sort=name=ASC");
    assert_eq!(status, 200);
    let pilots = body_json(&body);
    let names: Vec<&str> = pilots
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["lambert", "parker"]);

    let (_, _, body) =
        server.get("/v1/roster?filter=station=engineering&sort=name=ASC&offset=1&limit=1");
    let page = body_json(&body);
    assert_eq!(page.as_array().unwrap().len(), 1);
    assert_eq!(page[0]["name"], "parker");
}

#[test]
fn test_regex_filter_matches_prefixes() {
    let server = RosterTestServer::new();
    let (status, _, body) = server.get("/v1/roster?filter=name[regex]=/^k/");
    assert_eq!(status, 200);
    let pilots = body_json(&body);
    assert_eq!(pilots.as_array().unwrap().len(), 1);
    assert_eq!(pilots[0]["name"], "kane");
}

#[test]
fn test_malformed_filter_is_a_400() {
    let server = RosterTestServer::new();
    let (status, _, body) = server.get("/v1/roster?filter=name[near]=k");
    assert_eq!(status, 400);
    assert_eq!(body_json(&body)["error"], "filter operator <near> is unknown");
}

#[test]
fn test_reply_only_endpoint_is_a_204_with_headers() {
    let server = RosterTestServer::new();
    let (status, headers, body) = server.get("/v1/roster/status");
    assert_eq!(status, 204);
    assert_eq!(header(&headers, "x-roster-mode"), Some("standby"));
    assert!(body.is_empty());
}

#[test]
fn test_service_error_status_is_honored() {
    let server = RosterTestServer::new();
    let (status, _, body) = server.get("/v1/roster/maintenance");
    assert_eq!(status, 503);
    assert_eq!(body_json(&body)["error"], "maintenance window");
}

#[test]
fn test_panicking_handler_is_contained() {
    let server = RosterTestServer::new();
    let (status, _, body) = server.get("/v1/roster/broken");
    assert_eq!(status, 500);
    let message = body_json(&body)["error"].as_str().unwrap().to_string();
    assert!(
        message.starts_with("handler panicked"),
        "unexpected message: {message}"
    );

    // the pipeline coroutine survives the panic
    let (status, _, _) = server.get("/v1/roster/ripley");
    assert_eq!(status, 200);
}

#[test]
fn test_healthcheck_is_mounted_by_default() {
    let server = RosterTestServer::new();
    let (status, _, body) = server.get("/healthcheck");
    assert_eq!(status, 200);
    assert_eq!(body_json(&body)["healthy"], true);
}
