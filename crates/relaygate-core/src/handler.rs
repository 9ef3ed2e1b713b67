//! Inbound HTTP surface (§6): one axum handler for every client-facing path.
//! Auth Gate -> Provider Registry -> Dispatcher, with the `/v1/models`
//! filtered-models post-processing from S6 layered on top of the otherwise
//! verbatim response passthrough.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::stream;
use relaygate_pool::{resolve, ProxyError};

use crate::auth::require_token;
use crate::dispatcher::{self, InboundRequest};
use crate::error::ApiError;
use crate::state::AppState;
use crate::upstream_client::ResponseBody;

pub async fn proxy_handler(State(state): State<Arc<AppState>>, req: Request) -> Response {
    match handle(state, req).await {
        Ok(resp) => resp,
        Err(err) => ApiError(err).into_response(),
    }
}

async fn handle(state: Arc<AppState>, req: Request) -> Result<Response, ProxyError> {
    let snapshot = state.snapshot.load_full();
    require_token(&snapshot, req.headers())?;

    let (parts, body) = req.into_parts();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(str::to_string);
    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();

    let (provider, remaining_path, _surface) = resolve(&snapshot, &path)?;
    let pool = state
        .provider_pool(&provider.name)
        .ok_or(ProxyError::ProviderNotFound)?;

    let is_models_list = parts.method == http::Method::GET
        && (remaining_path == "/v1/models" || remaining_path == "/v1/models/");

    let inbound = InboundRequest {
        method: parts.method.clone(),
        headers: parts.headers.clone(),
        query,
        body: body_bytes,
    };

    let dispatched = dispatcher::dispatch(
        &snapshot,
        &pool,
        &state.egress,
        state.upstream.as_ref(),
        &state.events,
        &remaining_path,
        inbound,
    )
    .await?;

    if is_models_list && (200..300).contains(&dispatched.status) {
        return Ok(filter_models_response(dispatched, &snapshot.filtered_models).await);
    }

    Ok(response_from_dispatch(dispatched))
}

fn response_from_dispatch(dispatched: dispatcher::DispatchResponse) -> Response {
    let status = http::StatusCode::from_u16(dispatched.status).unwrap_or(http::StatusCode::BAD_GATEWAY);
    let body = match dispatched.body {
        ResponseBody::Bytes(bytes) => Body::from(bytes),
        ResponseBody::Stream(rx) => {
            let stream = stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|chunk| (Ok::<_, std::io::Error>(chunk), rx))
            });
            Body::from_stream(stream)
        }
    };
    let mut response = Response::builder().status(status);
    if let Some(headers) = response.headers_mut() {
        *headers = dispatched.headers;
    }
    response.body(body).unwrap_or_else(|_| Response::new(Body::empty()))
}

/// `/v1/models` entries whose `id` is in `filtered_models` are dropped
/// before forwarding (S6). Requires buffering the full body once; the
/// model list is small and never streamed in practice.
async fn filter_models_response(
    dispatched: dispatcher::DispatchResponse,
    filtered: &std::collections::HashSet<String>,
) -> Response {
    let status = http::StatusCode::from_u16(dispatched.status).unwrap_or(http::StatusCode::OK);
    let headers = dispatched.headers;

    let bytes = match dispatched.body {
        ResponseBody::Bytes(bytes) => bytes,
        ResponseBody::Stream(mut rx) => {
            let mut buf = Vec::new();
            while let Some(chunk) = rx.recv().await {
                buf.extend_from_slice(&chunk);
            }
            Bytes::from(buf)
        }
    };

    let filtered_body = match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(mut value) => {
            if let Some(data) = value.get_mut("data").and_then(|d| d.as_array_mut()) {
                data.retain(|entry| {
                    entry
                        .get("id")
                        .and_then(|id| id.as_str())
                        .is_none_or(|id| !filtered.contains(id))
                });
            }
            serde_json::to_vec(&value).unwrap_or_else(|_| bytes.to_vec())
        }
        Err(_) => bytes.to_vec(),
    };

    let mut response = Response::builder().status(status);
    if let Some(h) = response.headers_mut() {
        *h = headers;
    }
    response
        .body(Body::from(filtered_body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
