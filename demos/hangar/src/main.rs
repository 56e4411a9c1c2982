use clap::Parser;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use switchboard::auth::{BasicAuthProvider, JwtAuthProvider};
use switchboard::config::AppConfig;
use switchboard::controllers::{AdminOptions, Healthcheck};
use switchboard::server::ServerBuilder;
use switchboard::telemetry;
use tracing::{info, warn};

mod controllers;

use controllers::{CrewController, FleetController};

/// Flight-ops demo service on switchboard
#[derive(Parser)]
#[command(name = "hangar")]
#[command(about = "Flight-ops demo service on switchboard", long_about = None)]
struct Cli {
    /// Address and port to bind the server to (overrides the config file)
    #[arg(long)]
    addr: Option<String>,

    /// Path to the YAML application config
    #[arg(long)]
    config: Option<PathBuf>,
}

struct DeckPressure;

impl Healthcheck for DeckPressure {
    fn name(&self) -> &str {
        "deck_pressure"
    }

    fn check(&self) -> anyhow::Result<Value> {
        Ok(json!({ "kpa": 101.3 }))
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::from_yaml_file(path)?,
        None => AppConfig::default(),
    };
    let log = telemetry::init(&config.log.level, config.log.format)?;

    let mut builder = ServerBuilder::new()
        .controller(Arc::new(CrewController::new()))
        .healthcheck(Arc::new(DeckPressure))
        .admin(log.clone(), AdminOptions::new());

    if let Some(basic) = &config.auth.basic {
        builder = builder.auth_provider(Arc::new(BasicAuthProvider::from_config(basic)));
    }
    if let Some(jwt) = &config.auth.jwt {
        builder = builder.auth_provider(Arc::new(JwtAuthProvider::from_config(jwt)?));
    }

    // fleet endpoints declare both providers, so they need both configured
    if config.auth.basic.is_some() && config.auth.jwt.is_some() {
        builder = builder.controller(Arc::new(FleetController));
    } else {
        warn!("jwt + basic auth not configured, fleet endpoints disabled");
    }

    let addr = cli.addr.unwrap_or(config.server.addr);
    let handle = builder.start(&addr)?;
    handle.wait_ready()?;
    info!(%addr, "hangar ready");
    handle.join().ok();
    Ok(())
}
