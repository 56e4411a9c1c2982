//! # HTTP Server
//!
//! The transport layer: a coroutine-based HTTP server
//! ([may_minihttp](https://github.com/Xudong-Huang/may_minihttp)) wrapped
//! behind [`HttpServer`]/[`ServerHandle`], the [`Router`] matching verb +
//! path against mounted templates, and [`AppService`] gluing parse → route →
//! dispatch → write together. [`ServerBuilder`] is the composition root
//! that validates and mounts a whole service in one step.

pub mod builder;
pub mod http_server;
pub mod request;
pub mod response;
pub mod router;
pub mod service;

pub use builder::ServerBuilder;
pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_query_params, parse_request, ParsedRequest};
pub use response::{write_engine_response, write_json_error};
pub use router::{ParamVec, RouteMatch, Router, MAX_INLINE_PARAMS};
pub use service::{metrics_endpoint, AppService};
