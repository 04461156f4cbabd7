//! HTTP ingress for tracker webhooks.
//!
//! Deliveries are always acknowledged with `200 ok`. Bad bodies and dispatch
//! failures are only logged.

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use super::Dispatcher;

pub fn build_router(dispatcher: Dispatcher) -> Router {
    Router::new()
        .route("/", post(webhook_handler))
        .route("/webhook", post(webhook_handler))
        .route("/healthz", get(health_handler))
        .with_state(dispatcher)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn webhook_handler(
    State(dispatcher): State<Dispatcher>,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "ignoring malformed webhook body");
            return (StatusCode::OK, "ok");
        }
    };
    match dispatcher.dispatch(payload).await {
        Ok(Some(kind)) => info!(kind = %kind, "webhook handled"),
        Ok(None) => {}
        Err(e) => error!(error = %e, "webhook dispatch failed"),
    }
    (StatusCode::OK, "ok")
}

/// Serve webhooks on `listen` until Ctrl-C.
pub async fn serve(listen: &str, dispatcher: Dispatcher) -> Result<()> {
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind webhook listener on {listen}"))?;
    let addr = listener
        .local_addr()
        .context("Failed to get listener address")?;
    info!(%addr, "webhook server listening");

    axum::serve(listener, build_router(dispatcher))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down webhook server");
        })
        .await
        .context("Webhook server failed")
}
