//! # Telemetry Module
//!
//! Structured logging setup on `tracing` + `tracing-subscriber`.
//!
//! The subscriber stack is a registry with a reloadable [`EnvFilter`] under a
//! fmt layer (pretty for terminals, JSON for log shippers). The reload handle
//! is exposed as [`LogHandle`] so the running process can change its log level
//! at runtime; that is the capability behind `PUT /admin/logging/level/:level`.
//!
//! `RUST_LOG` wins over the configured default level at startup; after that,
//! [`LogHandle::set_level`] replaces the whole filter.

use crate::error::ServiceError;
use serde::Deserialize;
use tracing::Subscriber;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::{fmt, reload, EnvFilter, Layer, Registry};

/// Log level names accepted by the runtime level endpoint.
pub const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

type FilterStack = Layered<reload::Layer<EnvFilter, Registry>, Registry>;

/// Handle to the live log filter.
///
/// Cheap to clone; every clone controls the same subscriber. Works whether or
/// not the subscriber was installed globally, which keeps it testable.
#[derive(Clone)]
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogHandle {
    /// Swap the filter for the given level.
    ///
    /// Level names are matched case-insensitively against [`LEVELS`].
    ///
    /// # Errors
    ///
    /// `ServiceError` 400 `"level <x> is unknown"` for anything that is not a
    /// level name; 500 if the subscriber was torn down under us.
    pub fn set_level(&self, level: &str) -> Result<(), ServiceError> {
        let normalized = level.to_ascii_lowercase();
        if !LEVELS.contains(&normalized.as_str()) {
            return Err(ServiceError::bad_request(format!(
                "level <{level}> is unknown"
            )));
        }
        let filter = EnvFilter::try_new(&normalized)
            .map_err(|e| ServiceError::internal("cannot build log filter").caused_by(e))?;
        self.handle
            .reload(filter)
            .map_err(|e| ServiceError::internal("cannot reload log filter").caused_by(e))
    }

    /// Render the currently active filter directives.
    pub fn current(&self) -> Result<String, ServiceError> {
        self.handle
            .with_current(|filter| filter.to_string())
            .map_err(|e| ServiceError::internal("cannot read log filter").caused_by(e))
    }
}

/// Build the subscriber stack without installing it.
///
/// `RUST_LOG` takes precedence over `default_level`.
pub fn build(
    default_level: &str,
    format: LogFormat,
) -> (impl Subscriber + Send + Sync, LogHandle) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let (filter_layer, handle) = reload::Layer::<EnvFilter, Registry>::new(filter);
    let fmt_layer: Box<dyn Layer<FilterStack> + Send + Sync> = match format {
        LogFormat::Json => Box::new(fmt::layer().json()),
        LogFormat::Pretty => Box::new(fmt::layer()),
    };
    let subscriber = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer);
    (subscriber, LogHandle { handle })
}

/// Install the global subscriber and return the level handle.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init(default_level: &str, format: LogFormat) -> anyhow::Result<LogHandle> {
    let (subscriber, handle) = build(default_level, format);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(handle)
}
