mod handlers;
mod metrics;
mod routes;

use anyhow::{Context, Result};
use arbiter_common::catalog::ProblemCatalog;
use arbiter_common::config::Settings;
use arbiter_engine::Engine;
use axum::Router;
use prometheus::Registry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::metrics::{Metrics, REGISTRY};

pub struct AppState {
    pub engine: Engine,
    pub catalog: ProblemCatalog,
    pub metrics: Metrics,
    pub registry: Registry,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // LOG_FORMAT=json switches to one JSON object per line
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining executions");
    state.engine.close();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Arbiter API booting...");

    let settings = Settings::from_env().context("Invalid ARBITER_* configuration")?;

    let catalog = ProblemCatalog::load_from_file(&settings.problems_path)
        .with_context(|| format!("Failed to load problems from {}", settings.problems_path.display()))?;
    info!(problems = catalog.len(), path = %settings.problems_path.display(), "Problem catalog loaded");

    let engine = Engine::from_settings(&settings)?;
    let languages: Vec<String> = engine
        .toolchains()
        .list_languages()
        .iter()
        .map(|l| l.to_string())
        .collect();
    info!(languages = ?languages, "Toolchains configured");

    let registry = REGISTRY.clone();
    let metrics = Metrics::register(&registry).context("Failed to register metrics")?;

    let state = Arc::new(AppState {
        engine,
        catalog,
        metrics,
        registry,
    });

    let app = Router::new()
        .merge(routes::routes())
        .with_state(state.clone());

    let listener = TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", settings.bind_addr))?;

    info!("HTTP server listening on {}", settings.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .context("Server error")?;

    info!("Arbiter API stopped");
    Ok(())
}
