//! Integration tests for the bundled healthcheck endpoint
//!
//! # Test Coverage
//!
//! - Trivial health with no registered checks
//! - Per-check result reporting
//! - One failing check flipping the endpoint to 500
//! - The `without_healthcheck` builder switch

use anyhow::anyhow;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use switchboard::controllers::Healthcheck;
use switchboard::server::ServerHandle;
use switchboard::ServerBuilder;

use tracing_util::TestTracing;
mod common;
use common::http::{parse_response, raw_request, send_request};
use common::test_server;

struct SteadyCheck;

impl Healthcheck for SteadyCheck {
    fn name(&self) -> &str {
        "deck_pressure"
    }

    fn check(&self) -> anyhow::Result<Value> {
        Ok(json!({ "kpa": 101.3 }))
    }
}

struct LeakingCheck;

impl Healthcheck for LeakingCheck {
    fn name(&self) -> &str {
        "reactor"
    }

    fn check(&self) -> anyhow::Result<Value> {
        Err(anyhow!("coolant leak"))
    }
}

struct HealthTestServer {
    _tracing: TestTracing,
    handle: Option<ServerHandle>,
    addr: SocketAddr,
}

impl HealthTestServer {
    fn start(builder: ServerBuilder) -> Self {
        test_server::setup_may_runtime();
        let tracing = TestTracing::init();
        let addr = test_server::free_addr();
        let handle = builder.start(addr).unwrap();
        handle.wait_ready().unwrap();
        Self {
            _tracing: tracing,
            handle: Some(handle),
            addr,
        }
    }

    fn healthcheck(&self) -> (u16, String) {
        let raw = send_request(&self.addr, &raw_request("GET", "/healthcheck", &[], None));
        let (status, _, body) = parse_response(&raw);
        (status, body)
    }
}

impl Drop for HealthTestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

#[test]
fn test_no_checks_is_trivially_healthy() {
    let server = HealthTestServer::start(ServerBuilder::new());
    let (status, body) = server.healthcheck();
    assert_eq!(status, 200);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body, json!({ "checks": {}, "healthy": true }));
}

#[test]
fn test_passing_checks_report_their_results() {
    let server = HealthTestServer::start(ServerBuilder::new().healthcheck(Arc::new(SteadyCheck)));
    let (status, body) = server.healthcheck();
    assert_eq!(status, 200);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["healthy"], true);
    assert_eq!(body["checks"]["deck_pressure"]["healthy"], true);
    assert_eq!(body["checks"]["deck_pressure"]["result"]["kpa"], 101.3);
}

#[test]
fn test_one_failing_check_flips_the_status() {
    let server = HealthTestServer::start(
        ServerBuilder::new()
            .healthcheck(Arc::new(SteadyCheck))
            .healthcheck(Arc::new(LeakingCheck)),
    );
    let (status, body) = server.healthcheck();
    assert_eq!(status, 500);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["healthy"], false);
    assert_eq!(body["checks"]["reactor"]["healthy"], false);
    assert_eq!(body["checks"]["reactor"]["error"], "coolant leak");
    // the passing check still reports alongside the failed one
    assert_eq!(body["checks"]["deck_pressure"]["healthy"], true);
}

#[test]
fn test_healthcheck_can_be_disabled() {
    let server = HealthTestServer::start(ServerBuilder::new().without_healthcheck());
    let (status, body) = server.healthcheck();
    assert_eq!(status, 404);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["error"], "Not Found");
}
