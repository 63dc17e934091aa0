//! Inbound HTTP surface.
//!
//! | Route | Purpose |
//! |---|---|
//! | `GET /` | liveness |
//! | `POST /run_scraper` | dispatch the configured workflow and resolve its run |
//! | `GET /latest_run_id` | most recently resolved run |
//! | `GET /status/:run_id` | run status, soft-failing to `unknown` |
//! | `POST /cancel/:run_id` | request cancellation |
//!
//! A `run_id` of `.` or `..` is answered with 400 on both run routes.

mod handlers;

use crate::engine::RunCorrelator;
use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;

pub fn router(correlator: Arc<RunCorrelator>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/run_scraper", post(handlers::trigger_run))
        .route("/latest_run_id", get(handlers::latest_run_id))
        .route("/status/:run_id", get(handlers::run_status))
        .route("/cancel/:run_id", post(handlers::cancel_run))
        .with_state(correlator)
}

/// Bind `addr` and serve until Ctrl-C or SIGTERM.
pub async fn serve(correlator: Arc<RunCorrelator>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    let cfg = correlator.config();
    tracing::info!(
        %addr,
        repository = cfg.repository.as_deref().unwrap_or("-"),
        workflow = cfg.workflow.as_deref().unwrap_or("-"),
        ref_name = %cfg.ref_name,
        token_configured = cfg.token.is_some(),
        "starting workflow relay"
    );

    axum::serve(listener, router(correlator))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("workflow relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => futures::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = futures::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
