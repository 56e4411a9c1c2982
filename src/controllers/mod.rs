//! # Bundled Controllers
//!
//! Operational endpoints every service wants but nobody wants to rewrite:
//!
//! - [`HealthController`] - aggregated readiness report at `/healthcheck`,
//!   fed by registered [`Healthcheck`] probes
//! - [`AdminController`] - runtime log-level management at `/admin`
//!
//! Both are plain [`Controller`](crate::endpoint::Controller)
//! implementations; the server builder registers them by default (health)
//! or on request (admin).

mod admin;
mod health;

pub use admin::{AdminController, AdminOptions};
pub use health::{HealthController, Healthcheck};
