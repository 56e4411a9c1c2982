use std::time::Duration;

use crate::dispatcher::{EngineRequest, EngineResponse};

pub trait Middleware: Send + Sync {
    /// Runs before dispatch; returning a response short-circuits the pipeline.
    fn before(&self, _request: &EngineRequest) -> Option<EngineResponse> {
        None
    }
    /// Runs after dispatch with the response and the measured latency.
    fn after(&self, _request: &EngineRequest, _response: &mut EngineResponse, _latency: Duration) {}
}
