//! # Dispatcher Module
//!
//! Coroutine-based request dispatch: one pipeline coroutine per mounted
//! endpoint, fed over channels and keyed by operation id.
//!
//! ## Overview
//!
//! The dispatcher is the heart of the engine's concurrent request handling.
//! It:
//! - Spawns one pipeline coroutine per endpoint at mount time
//! - Routes resolved requests to their pipeline via MPSC channels
//! - Maps uncaught handler errors to status-coded `{"error": ...}` bodies
//! - Provides panic recovery so a crashing handler cannot kill its pipeline
//!
//! ## Architecture
//!
//! The engine uses the `may` coroutine runtime for efficient concurrency:
//!
//! - Each endpoint runs in its own coroutine (lightweight thread)
//! - Requests are sent to pipelines via MPSC channels
//! - Pipelines answer on a per-request one-shot channel
//! - Stack size is configurable via the `SWITCHBOARD_STACK_SIZE` environment
//!   variable
//!
//! ## Pipeline Flow
//!
//! Each dispatched request runs the same sequence inside its endpoint's
//! coroutine:
//!
//! 1. Authentication: the endpoint's provider chain is tried in declaration
//!    order; a rejection short-circuits to a 401
//! 2. Content negotiation: the `Accept` header picks JSON or YAML for the
//!    eventual response body
//! 3. Binding: declared parameters are pulled from the request and coerced;
//!    a failure short-circuits to a 400
//! 4. Invocation: the handler adapter runs with the bound arguments
//! 5. Shaping: the returned value, the [`Reply`] state, and the negotiated
//!    format combine into the final [`EngineResponse`]
//!
//! ## Error Handling
//!
//! - Requests for unmounted operations return `None` (the transport's 404)
//! - Handler errors map to a status via the `ServiceError` chain, 500 when
//!   none is found
//! - Pipeline panics are caught and surface as 500 responses
//! - A closed pipeline channel yields a 503 instead of a dropped connection

mod core;

pub use core::{
    Dispatcher, EngineJob, EngineRequest, EngineResponse, HeaderVec, PipelineResult,
    PipelineSender, Reply, MAX_INLINE_HEADERS,
};
