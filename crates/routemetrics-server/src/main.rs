//! routemetrics demo server.
//!
//! - Demo routes: /v1/users/:id, /v1/files/*path, POST /v1/echo
//! - Prometheus scrape endpoint (default /metrics)
//! - Liveness / readiness probes

use tracing_subscriber::{fmt, EnvFilter};

use routemetrics_core::error::{Result, RouteMetricsError};
use routemetrics_server::{app_state::AppState, config, router};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, kind = e.kind().as_str(), "routemetrics-server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = config::resolve_path(
        std::env::args().nth(1),
        std::env::var(config::PATH_ENV).ok(),
    );
    let cfg = config::load_from_file(&path)?;
    let listen = cfg.server.listen_addr()?;
    tracing::info!(%path, "config loaded");

    let state = AppState::new(cfg);
    let app = router::build_router(state.clone())?;

    tracing::info!(%listen, "routemetrics-server starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| RouteMetricsError::Internal(format!("bind {listen} failed: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .map_err(|e| RouteMetricsError::Internal(format!("server failed: {e}")))?;

    tracing::info!("routemetrics-server stopped");
    Ok(())
}

async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
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
    state.set_draining();
    tracing::info!("signal received, starting graceful shutdown");
}
