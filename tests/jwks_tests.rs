//! Integration tests for remote JWKS key resolution
//!
//! # Test Coverage
//!
//! - Key lookup by `kid` against a fetched JWKS document
//! - Rejection paths: unknown `kid`, token without a `kid`
//! - HTTPS enforcement for non-loopback JWKS hosts
//!
//! # Test Strategy
//!
//! A `tiny_http` server on a random loopback port plays the identity
//! provider and serves a JWKS document with a symmetric `oct` key, so test
//! tokens can be minted with plain HS256 and no certificate fixtures. The
//! loopback host also exercises the deliberate `http://127.0.0.1` carve-out
//! in the HTTPS rule.

use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use switchboard::auth::{AuthSpec, JwtAuthProvider};
use switchboard::server::ServerHandle;
use switchboard::{Controller, EndpointMeta, ServerBuilder, ServiceError};

use tracing_util::TestTracing;
mod common;
use common::http::{parse_response, raw_request, send_request};
use common::test_server;

const SECRET: &str = "jwks-test-secret";

struct HatchController;

impl Controller for HatchController {
    fn mount_path(&self) -> &str {
        "/hatch"
    }

    fn endpoints(self: Arc<Self>) -> Vec<EndpointMeta> {
        vec![EndpointMeta::get("open_hatch", "")
            .auth(AuthSpec::provider("jwt"))
            .principal()
            .handler(|args| {
                let principal = args
                    .principal(0)?
                    .ok_or_else(|| ServiceError::internal("principal not attached"))?;
                Ok(Some(json!({ "opened_by": principal.login_name() })))
            })]
    }
}

/// Serve one fixed JWKS document from a background thread.
fn serve_jwks(document: Value) -> (Arc<tiny_http::Server>, String) {
    let server = Arc::new(tiny_http::Server::http("127.0.0.1:0").unwrap());
    let uri = format!("http://{}/keys", server.server_addr().to_ip().unwrap());
    let body = document.to_string();
    let worker = Arc::clone(&server);
    thread::spawn(move || {
        for request in worker.incoming_requests() {
            let response = tiny_http::Response::from_string(body.clone()).with_header(
                "Content-Type: application/json"
                    .parse::<tiny_http::Header>()
                    .unwrap(),
            );
            let _ = request.respond(response);
        }
    });
    (server, uri)
}

fn hmac_jwks() -> Value {
    json!({
        "keys": [{
            "kid": "k1",
            "kty": "oct",
            "alg": "HS256",
            "k": URL_SAFE_NO_PAD.encode(SECRET),
        }]
    })
}

struct JwksTestServer {
    _tracing: TestTracing,
    jwks: Arc<tiny_http::Server>,
    handle: Option<ServerHandle>,
    addr: SocketAddr,
}

impl JwksTestServer {
    fn new() -> Self {
        test_server::setup_may_runtime();
        let tracing = TestTracing::init();
        let (jwks, uri) = serve_jwks(hmac_jwks());
        let provider = JwtAuthProvider::builder("hatch")
            .jwks_uri(uri)
            .build()
            .unwrap();
        let addr = test_server::free_addr();
        let handle = ServerBuilder::new()
            .auth_provider(Arc::new(provider))
            .controller(Arc::new(HatchController))
            .start(addr)
            .unwrap();
        handle.wait_ready().unwrap();
        Self {
            _tracing: tracing,
            jwks,
            handle: Some(handle),
            addr,
        }
    }

    fn get(&self, token: &str) -> (u16, Value) {
        let req = raw_request(
            "GET",
            "/hatch",
            &[("Authorization", &format!("Bearer {token}"))],
            None,
        );
        let (status, _, body) = parse_response(&send_request(&self.addr, &req));
        (status, serde_json::from_str(&body).unwrap())
    }
}

impl Drop for JwksTestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
        self.jwks.unblock();
    }
}

fn mint_token(kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = kid.map(str::to_string);
    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
        + 3600;
    let claims = json!({ "exp": exp, "preferred_username": "ripley" });
    encode(&header, &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

#[test]
fn test_token_signed_by_a_jwks_key_is_accepted() {
    let server = JwksTestServer::new();
    let (status, body) = server.get(&mint_token(Some("k1")));
    assert_eq!(status, 200);
    assert_eq!(body["opened_by"], "ripley");
}

#[test]
fn test_unknown_kid_is_rejected() {
    let server = JwksTestServer::new();
    let (status, body) = server.get(&mint_token(Some("ghost")));
    assert_eq!(status, 401);
    assert_eq!(body["reason"]["jwt"], "key <ghost> not found in JWKS");
}

#[test]
fn test_token_without_a_kid_is_rejected() {
    let server = JwksTestServer::new();
    let (status, body) = server.get(&mint_token(None));
    assert_eq!(status, 401);
    assert_eq!(body["reason"]["jwt"], "token header has no key id");
}

#[test]
fn test_https_is_enforced_for_remote_hosts() {
    let err = JwtAuthProvider::builder("hatch")
        .jwks_uri("http://idp.example.test/keys")
        .build()
        .unwrap_err();
    assert!(
        err.to_string().contains("must use https"),
        "unexpected error: {err}"
    );
}
