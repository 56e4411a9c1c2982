//! # Configuration Module
//!
//! Two layers of configuration, loaded once at startup:
//!
//! - [`RuntimeConfig`] - environment-variable tuning of the coroutine
//!   runtime. `SWITCHBOARD_STACK_SIZE` sets the per-coroutine stack size in
//!   bytes, accepting decimal (`16384`) or hex (`0x4000`); default `0x4000`.
//!   Memory cost is `stack_size * concurrent coroutines`, so tune it to your
//!   handler depth rather than leaving a 1 MB default everywhere.
//! - [`AppConfig`] - YAML application config (serde_yaml): bind address, log
//!   level/format, and the static material for the bundled auth providers
//!   (basic user table, JWT key source). The composition root reads it and
//!   wires providers explicitly; nothing in the engine reads files at request
//!   time.

use crate::telemetry::LogFormat;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;

const DEFAULT_STACK_SIZE: usize = 0x4000;

/// Runtime tuning loaded from environment variables.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for pipeline coroutines in bytes (default 16 KB / 0x4000).
    pub stack_size: usize,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let stack_size = parse_stack_size(env::var("SWITCHBOARD_STACK_SIZE").ok().as_deref());
        RuntimeConfig { stack_size }
    }
}

/// Parse a stack size value, decimal or `0x`-prefixed hex.
///
/// Unparsable values fall back to the default rather than failing startup.
fn parse_stack_size(value: Option<&str>) -> usize {
    match value {
        Some(val) => {
            if let Some(hex) = val.strip_prefix("0x") {
                usize::from_str_radix(hex, 16).unwrap_or(DEFAULT_STACK_SIZE)
            } else {
                val.parse().unwrap_or(DEFAULT_STACK_SIZE)
            }
        }
        None => DEFAULT_STACK_SIZE,
    }
}

/// Application configuration, deserialized from YAML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub log: LogConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Load from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&raw)
    }

    /// Parse from a YAML string.
    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address, e.g. `0.0.0.0:8080`.
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default level directive when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Static material for the bundled auth providers.
///
/// A section left out disables that provider in the composition root.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub basic: Option<BasicAuthConfig>,
    pub jwt: Option<JwtAuthConfig>,
}

/// User table for the basic provider: login → password and roles.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BasicAuthConfig {
    pub users: HashMap<String, BasicUserConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasicUserConfig {
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Key source and claim mapping for the bearer JWT provider.
///
/// Exactly one of `certificate` (RSA public key PEM), `secret` (HMAC), or
/// `jwks_uri` must be present; the provider constructor enforces that.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JwtAuthConfig {
    /// Application name whose `resource_access.<application>.roles` claim
    /// carries the caller's roles.
    pub application: String,
    pub certificate: Option<String>,
    pub secret: Option<String>,
    pub jwks_uri: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}
