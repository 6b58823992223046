//! bait daemon - phishing risk triage over HTTP
//!
//! Loads config, wires the stage backends and serves the analysis routes.

use anyhow::Result;
use baitd::config::Config;
use baitd::server::{self, AppState};
use std::env;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .init();

    let config = Config::load();

    if env::args().any(|arg| arg == "--print-config") {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    info!(target: "baitd", "starting {}", env!("CARGO_PKG_VERSION"));
    info!(
        target: "baitd",
        "ambiguity {}, concurrent evidence {}",
        config.sequencer.ambiguity, config.sequencer.concurrent_evidence
    );

    let state = AppState::from_config(&config)?;
    server::run(state, &config).await
}
