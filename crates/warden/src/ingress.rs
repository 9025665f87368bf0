// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook ingress: the loopback HTTP server supervised sessions POST their
//! lifecycle events to.
//!
//! The ingress never raises to the caller: apart from an unknown agent id
//! (404) every accepted request is answered 200 with a receipt, even when
//! the supervisor drops the event downstream. Dispatch is synchronous — the
//! handler awaits the supervisor before responding, so a hook's curl call
//! returns only after the event has been fully considered.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::event::normalize;
use crate::supervisor::Supervisor;

/// A running ingress server.
pub struct IngressServer {
    pub addr: SocketAddr,
    pub handle: JoinHandle<()>,
}

/// Build the ingress router.
pub fn build_router(supervisor: Arc<Supervisor>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/hooks", post(hook_echo))
        .route("/api/hooks/{agent_id}", post(hook))
        .layer(TraceLayer::new_for_http())
        .with_state(supervisor)
}

/// Bind `127.0.0.1:{port}` and serve until the supervisor shuts down.
///
/// Binding to the loopback interface is the only caller authentication.
pub async fn serve(supervisor: Arc<Supervisor>) -> anyhow::Result<IngressServer> {
    let listener =
        tokio::net::TcpListener::bind(("127.0.0.1", supervisor.port())).await?;
    let addr = listener.local_addr()?;
    let shutdown = supervisor.shutdown_token();
    let router = build_router(supervisor);

    info!(%addr, "hook ingress listening");
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await;
    });
    Ok(IngressServer { addr, handle })
}

/// `GET /api/health`
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Parse a hook body as JSON, falling back to wrapping raw text.
fn parse_body(body: &Bytes) -> Value {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(other) => json!({ "raw": other }),
        Err(_) => json!({ "raw": String::from_utf8_lossy(body) }),
    }
}

/// `POST /api/hooks/{agent_id}` — normalize and dispatch one hook event.
async fn hook(
    State(supervisor): State<Arc<Supervisor>>,
    Path(agent_id): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    if supervisor.store().get(&agent_id).await.is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown agent: {agent_id}") })),
        )
            .into_response();
    }

    let payload = parse_body(&body);
    let event = normalize(&agent_id, &payload);
    let receipt = json!({
        "status": "received",
        "agent_id": agent_id,
        "event_type": event.event_type.as_str(),
        "received_at": event.received_at.to_rfc3339(),
    });

    // Synchronous dispatch: downstream filtering/drops do not change the
    // receipt, only a missing agent does (handled above).
    supervisor.handle_hook_event(event).await;

    Json(receipt).into_response()
}

/// `POST /api/hooks` — diagnostic echo, never dispatched.
async fn hook_echo(body: Bytes) -> impl IntoResponse {
    let payload = parse_body(&body);
    Json(json!({ "status": "echo", "payload": payload }))
}

#[cfg(test)]
#[path = "ingress_tests.rs"]
mod tests;
