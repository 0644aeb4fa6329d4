//! Signal engine service: binary entrypoint.
//! Loads the engine config, installs tracing and the Prometheus recorder,
//! then serves the HTTP API.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crypto_trend_signals::api::{create_router, AppState};
use crypto_trend_signals::config::{engine::resolve_config_path, EngineConfig, HotReloadConfig};
use crypto_trend_signals::metrics::Metrics;

const ENV_ADDR: &str = "SIGNALS_ADDR";
const DEFAULT_ADDR: &str = "127.0.0.1:8000";

/// Compact logs by default; `SIGNALS_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("crypto_trend_signals=info,signals=info,warn"));

    let json = std::env::var("SIGNALS_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; a missing file is not an error.
    let _ = dotenvy::dotenv();
    init_tracing();

    let path = resolve_config_path()?;
    let cfg = EngineConfig::load_default().context("loading engine config")?;
    cfg.validate().context("engine config is invalid")?;
    info!(
        path = ?path,
        weights = ?cfg.weights,
        parallel = cfg.batch.parallel,
        "engine config loaded"
    );

    let metrics = Metrics::init(&cfg)?;
    let hot = Arc::new(HotReloadConfig::with_initial(path.as_deref(), cfg));

    let app = create_router(AppState::new(hot)).merge(metrics.router());

    let addr: SocketAddr = std::env::var(ENV_ADDR)
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()
        .with_context(|| format!("{ENV_ADDR} is not a socket address"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
