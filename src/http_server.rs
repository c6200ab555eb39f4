//! HTTP surface for inbound PostRun webhooks.
//!
//! One POST route on the configured path. Signature verification runs
//! against the raw body before any JSON parsing; once a request is
//! authenticated it is always acknowledged with `200 {"status":"ok"}`,
//! whatever its payload looks like.

use crate::config::PostRunConfig;
use crate::dispatch::{self, EventSender};
use crate::verification;
use anyhow::Context;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub const SIGNATURE_HEADER: &str = "x-postrun-signature";
pub const TIMESTAMP_HEADER: &str = "x-postrun-timestamp";
pub const EVENT_TYPE_HEADER: &str = "x-postrun-event";

/// Shared per-process state; nothing here mutates across requests.
pub struct AppState {
    pub config: PostRunConfig,
    pub event_tx: EventSender,
}

/// Build the router. The webhook route is only registered when a signing
/// secret is configured; without one the path stays unreachable.
pub fn router(state: Arc<AppState>) -> Router {
    let mut router: Router<Arc<AppState>> = Router::new();
    if state.config.webhook_enabled() {
        router = router.route(&state.config.webhook.path, post(handle_webhook));
    }
    router.with_state(state)
}

/// Bind and serve until the listener fails.
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = state.config.listen_addr.clone();
    let path = state.config.webhook.path.clone();
    let app = router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, %path, "postrun webhook server listening");

    axum::serve(listener, app).await.context("HTTP server error")
}

async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = header_str(&headers, SIGNATURE_HEADER);
    let timestamp = header_str(&headers, TIMESTAMP_HEADER);
    let secret = state.config.webhook.secret.as_deref().unwrap_or("");

    if let Err(e) = verification::verify(
        &body,
        signature,
        timestamp,
        secret,
        state.config.webhook.tolerance_secs,
    ) {
        warn!(error = %e, "rejected PostRun webhook");
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": e.to_string() })))
            .into_response();
    }

    // Authenticated from here on: a body that fails to parse degrades to an
    // empty payload rather than failing the request.
    let payload: Value = serde_json::from_slice(&body)
        .unwrap_or_else(|_| Value::Object(Default::default()));

    let event_type = header_str(&headers, EVENT_TYPE_HEADER);
    dispatch::dispatch(event_type, &payload, &state.event_tx);

    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
