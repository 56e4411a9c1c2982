//! # Switchboard
//!
//! **Switchboard** is a coroutine-powered HTTP request-dispatch engine for Rust: controllers
//! declare their endpoints as data, and the engine owns everything between the socket and the
//! controller method: routing, authentication, parameter binding, content negotiation and
//! response shaping.
//!
//! ## Overview
//!
//! Instead of hand-wiring extractors per route, a controller describes each operation once as an
//! [`endpoint::EndpointMeta`]: verb, path template, the ordered list of parameter bindings, an
//! optional authentication requirement and optional named view transforms. The engine assembles
//! the descriptors at startup, validates them, and serves requests over the `may` coroutine
//! runtime with one pipeline coroutine per endpoint.
//!
//! ## Architecture
//!
//! The library is organized into these modules:
//!
//! - **[`endpoint`]** - Endpoint descriptors, the builder API and the controller registry
//! - **[`server`]** - HTTP transport on `may_minihttp`, the path-template router and the
//!   composition-root [`server::ServerBuilder`]
//! - **[`dispatcher`]** - Coroutine-based pipeline dispatch and response shaping
//! - **[`binder`]** - Declared-parameter extraction and coercion, search-query parsing
//! - **[`auth`]** - Multi-provider authentication (Basic, JWT/JWKS, custom providers)
//! - **[`negotiate`]** - Accept-header content negotiation (JSON, YAML)
//! - **[`middleware`]** - Pluggable middleware (metrics, security headers, tracing)
//! - **[`controllers`]** - Bundled healthcheck and admin controllers
//! - **[`telemetry`]** - Structured logging with runtime-reloadable level
//! - **[`config`]** - Environment and YAML application configuration
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as HttpServer<br/>(may_minihttp)
//!     participant Router as Router
//!     participant Dispatcher as Dispatcher
//!     participant Pipeline as Pipeline<br/>(Coroutine)
//!     participant Handler as Controller Method
//!
//!     Client->>Server: HTTP Request<br/>GET /v1/crew/ripley
//!     Server->>Server: Parse HTTP<br/>(headers, body, query)
//!     Server->>Router: route(GET, "/v1/crew/ripley")
//!     Router->>Router: Test templates in<br/>registration order
//!
//!     alt No Route Match
//!         Router-->>Client: 404 Not Found
//!     end
//!
//!     Router-->>Server: RouteMatch<br/>(operation, path params)
//!     Server->>Dispatcher: dispatch(request)
//!     Dispatcher->>Dispatcher: Middleware before()
//!     Dispatcher->>Pipeline: Send via channel
//!
//!     Note over Pipeline: One coroutine<br/>per endpoint
//!     Pipeline->>Pipeline: Authenticate<br/>(providers in order)
//!
//!     alt No Provider Accepts
//!         Pipeline-->>Client: 401 {"reason": ...}
//!     end
//!
//!     Pipeline->>Pipeline: Negotiate Accept<br/>(JSON | YAML)
//!     Pipeline->>Pipeline: Bind declared params
//!
//!     alt Binding Fails
//!         Pipeline-->>Client: 400 {"error": ...}
//!     end
//!
//!     Pipeline->>Handler: Invoke with CallArgs
//!     Handler-->>Pipeline: Ok(Some(value)) | Ok(None) | Err
//!     Pipeline->>Pipeline: Shape response<br/>(reply state, views, 204)
//!     Pipeline-->>Dispatcher: EngineResponse
//!     Dispatcher->>Dispatcher: Middleware after()
//!     Dispatcher-->>Server: Response
//!     Server-->>Client: Serialized response<br/>+ x-request-id
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use switchboard::endpoint::{Controller, EndpointMeta};
//! use switchboard::server::ServerBuilder;
//!
//! struct CrewController;
//!
//! impl Controller for CrewController {
//!     fn mount_path(&self) -> &str {
//!         "/v1/crew"
//!     }
//!
//!     fn endpoints(self: Arc<Self>) -> Vec<EndpointMeta> {
//!         vec![EndpointMeta::get("get_crew_member", "/:name")
//!             .path_param("name")
//!             .handler(|args| {
//!                 let name = args.text(0)?;
//!                 Ok(Some(json!({ "name": name, "station": "bridge" })))
//!             })]
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let handle = ServerBuilder::new()
//!         .controller(Arc::new(CrewController))
//!         .start("0.0.0.0:8080")?;
//!     handle.wait_ready()?;
//!     handle.join().ok();
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Declarative endpoints**: routing, binding and auth requirements live in one descriptor
//! - **Coroutine-powered**: one lightweight `may` coroutine per endpoint, channel dispatch
//! - **Multi-provider auth**: Basic and JWT (PEM, HMAC or JWKS) out of the box, trait for more
//! - **Typed bindings**: path, query, body, search-query, reply, principal and context sources
//! - **Content negotiation**: JSON and YAML from the same handler result
//! - **Operational endpoints**: aggregated `/healthcheck`, Prometheus-text `/metrics`,
//!   runtime log-level control under `/admin`
//!
//! ## Runtime Considerations
//!
//! Switchboard uses the `may` coroutine runtime, not tokio or async-std. This means:
//!
//! - Controller methods run in coroutines (lightweight threads); keep them blocking-friendly
//! - Pipeline stack size is configurable via the `SWITCHBOARD_STACK_SIZE` environment variable
//! - The runtime is incompatible with tokio-based libraries without bridging
//! - A panicking handler poisons nothing: panics are caught per request and mapped to 500

pub mod auth;
pub mod binder;
pub mod config;
pub mod context;
pub mod controllers;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod ids;
pub mod middleware;
pub mod negotiate;
pub mod server;
pub mod telemetry;

pub use auth::{AuthOptions, AuthProvider, AuthProviders, AuthSpec, Principal};
pub use binder::CallArgs;
pub use context::RequestContext;
pub use dispatcher::{Dispatcher, EngineRequest, EngineResponse, Reply};
pub use endpoint::{Controller, EndpointMeta};
pub use error::{BindError, MountError, ServiceError};
pub use ids::RequestId;
pub use server::{AppService, ServerBuilder, ServerHandle};
