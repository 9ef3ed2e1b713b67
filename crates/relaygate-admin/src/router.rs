//! Admin routes: a small read-mostly surface plus a websocket tail of the
//! event stream. The admin UI itself (editing `PROVIDERS_CONFIG`, generating
//! snapshots) is out of scope — these routes exist so it has something to
//! read.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use relaygate_core::auth::require_admin;
use relaygate_core::AppState;
use tokio::select;

#[derive(Clone)]
pub struct AdminState {
    pub app: Arc<AppState>,
}

pub fn router(app: Arc<AppState>) -> Router {
    let state = AdminState { app };
    Router::new()
        .route("/health", get(health))
        .route("/snapshot", get(get_snapshot))
        .route("/providers", get(list_providers))
        .route("/providers/{name}/credentials", get(list_provider_credentials))
        .route("/egress", get(list_egress))
        .route("/events/ws", get(events_ws))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth))
        .with_state(state)
}

async fn admin_auth(
    State(state): State<AdminState>,
    headers: HeaderMap,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let snapshot = state.app.snapshot.load_full();
    require_admin(&snapshot, &headers).map_err(|_| StatusCode::UNAUTHORIZED)?;
    Ok(next.run(req).await)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "ok": true })))
}

async fn get_snapshot(State(state): State<AdminState>) -> impl IntoResponse {
    let snapshot = state.app.snapshot.load_full();
    Json(serde_json::json!({
        "default_provider": snapshot.default_provider,
        "max_failures": snapshot.max_failures,
        "max_retries": snapshot.max_retries,
        "timeout_seconds": snapshot.timeout_seconds,
        "proxy_auto_check_enabled": snapshot.proxy_auto_check_enabled,
        "filtered_models": snapshot.filtered_models,
        "provider_count": snapshot.providers.len(),
    }))
}

async fn list_providers(State(state): State<AdminState>) -> impl IntoResponse {
    let snapshot = state.app.snapshot.load_full();
    let providers: Vec<_> = snapshot
        .providers
        .iter()
        .map(|p| {
            serde_json::json!({
                "name": p.name,
                "path": p.path,
                "base_url": p.base_url,
                "enabled": p.enabled,
                "credential_count": p.api_keys.len(),
            })
        })
        .collect();
    Json(serde_json::json!({ "providers": providers }))
}

async fn list_provider_credentials(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let Some(pool) = state.app.provider_pool(&name) else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "provider_not_found" })),
        )
            .into_response();
    };

    let credentials: Vec<_> = pool
        .credentials
        .snapshot()
        .into_iter()
        .map(|record| {
            serde_json::json!({
                "digest": relaygate_pool::credential_digest(&record.value),
                "consecutive_failures": record.consecutive_failures,
                "disabled_since": record.disabled_since,
                "bound_egress": record.bound_egress,
            })
        })
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "credentials": credentials }))).into_response()
}

async fn list_egress(State(state): State<AdminState>) -> impl IntoResponse {
    let egress: Vec<_> = state
        .app
        .egress
        .snapshot()
        .into_iter()
        .map(|record| {
            serde_json::json!({
                "uri": record.uri,
                "consecutive_failures": record.consecutive_failures,
                "disabled_since": record.disabled_since,
            })
        })
        .collect();
    Json(serde_json::json!({ "egress": egress }))
}

async fn events_ws(ws: WebSocketUpgrade, State(state): State<AdminState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_events_ws(socket, state.app.clone()))
}

async fn handle_events_ws(mut socket: WebSocket, app: Arc<AppState>) {
    let mut rx = app.events.subscribe();
    loop {
        select! {
            msg = socket.recv() => {
                if msg.is_none() {
                    break;
                }
            }
            evt = rx.recv() => {
                let Ok(evt) = evt else {
                    break;
                };
                if let Ok(text) = serde_json::to_string(&evt)
                    && socket.send(Message::Text(text.into())).await.is_err()
                {
                    break;
                }
            }
        }
    }
}
