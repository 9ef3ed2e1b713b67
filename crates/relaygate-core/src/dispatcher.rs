//! Dispatcher (§4.4): resolves a provider, rotates credential × egress on
//! retryable failure, and streams the committed response back untouched.

use std::time::Instant;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use relaygate_config::{ConfigSnapshot, ProviderSpec};
use relaygate_pool::{
    classify_status, credential_digest, now_millis, CredentialOutcome, EgressOutcome, Event,
    EventHub, ErrorRecord, ProxyError, RequestRecord,
};
use tracing::warn;

use crate::state::ProviderPool;
use crate::upstream_client::{ResponseBody, UpstreamClient, UpstreamRequest, UpstreamResponse};

pub struct InboundRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub query: Option<String>,
    pub body: Bytes,
}

pub struct DispatchResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

/// `dispatch(http_request) -> http_response_stream` (§4.4).
pub async fn dispatch(
    snapshot: &ConfigSnapshot,
    provider_pool: &ProviderPool,
    egress_pool: &relaygate_pool::EgressPool,
    upstream: &dyn UpstreamClient,
    events: &EventHub,
    remaining_path: &str,
    inbound: InboundRequest,
) -> Result<DispatchResponse, ProxyError> {
    let provider = &provider_pool.spec;
    let max_retries = provider.max_retries.unwrap_or(snapshot.max_retries);
    let attempts = max_retries.saturating_add(1);

    let mut last_status: Option<u16> = None;
    let mut last_message = String::new();

    for _attempt in 0..attempts {
        let Some(credential) = provider_pool.credentials.acquire() else {
            return Err(ProxyError::NoCredentials);
        };
        let egress = egress_pool.acquire();

        let target_url = build_target_url(provider, remaining_path, inbound.query.as_deref());
        let headers = build_outbound_headers(provider, &credential.value, &inbound.headers);

        let started = Instant::now();
        let req = UpstreamRequest {
            method: inbound.method.clone(),
            url: target_url,
            headers,
            body: inbound.body.clone(),
        };

        let sent = upstream.send(&egress.uri, req).await;

        match sent {
            Ok(resp) => {
                let outcome = classify_status(resp.status);
                match outcome {
                    relaygate_pool::Outcome::Success => {
                        provider_pool.credentials.release(&credential.value, CredentialOutcome::Success);
                        egress_pool.release(&egress.uri, EgressOutcome::Success);
                        emit_request(events, &provider.name, resp.status, started);
                        return Ok(to_dispatch_response(resp));
                    }
                    relaygate_pool::Outcome::FatalClient => {
                        // Credential and egress are fine; the client sent something the
                        // upstream rejects outright. No retry (§4.4.d).
                        provider_pool.credentials.release(&credential.value, CredentialOutcome::Success);
                        egress_pool.release(&egress.uri, EgressOutcome::Success);
                        emit_request(events, &provider.name, resp.status, started);
                        return Ok(to_dispatch_response(resp));
                    }
                    relaygate_pool::Outcome::AuthFailure => {
                        provider_pool.credentials.release(&credential.value, CredentialOutcome::AuthFailure);
                        egress_pool.release(&egress.uri, EgressOutcome::Success);
                        last_status = Some(resp.status);
                        last_message = format!("auth failure from {}", provider.name);
                        emit_error(events, provider, &credential.value, &egress.uri, Some(resp.status), &last_message);
                    }
                    relaygate_pool::Outcome::Transient => {
                        provider_pool.credentials.release(&credential.value, CredentialOutcome::TransientFailure);
                        egress_pool.release(&egress.uri, EgressOutcome::TransientFailure);
                        last_status = Some(resp.status);
                        last_message = format!("transient upstream status {}", resp.status);
                        emit_error(events, provider, &credential.value, &egress.uri, Some(resp.status), &last_message);
                    }
                }
            }
            Err(err) => {
                provider_pool.credentials.release(&credential.value, CredentialOutcome::TransientFailure);
                egress_pool.release(&egress.uri, EgressOutcome::TransientFailure);
                last_status = None;
                last_message = err.0;
                emit_error(events, provider, &credential.value, &egress.uri, None, &last_message);
                warn!(event = "upstream_transport_error", provider = %provider.name, error = %last_message);
            }
        }
    }

    Err(ProxyError::AllUpstreamsFailed {
        last_status,
        last_message,
    })
}

fn build_target_url(provider: &ProviderSpec, remaining_path: &str, query: Option<&str>) -> String {
    let base = provider.base_url.trim_end_matches('/');
    let mut url = format!("{base}{remaining_path}");
    if let Some(query) = query {
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }
    }
    url
}

/// Header policy (§4.4.d): drop inbound `Authorization`/`Cookie`, set the
/// credential, then merge `custom_headers` (provider wins on conflict).
fn build_outbound_headers(provider: &ProviderSpec, credential: &str, inbound: &HeaderMap) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for (name, value) in inbound.iter() {
        if name == http::header::AUTHORIZATION || name == http::header::COOKIE || name == http::header::HOST {
            continue;
        }
        if let Ok(v) = value.to_str() {
            out.push((name.as_str().to_string(), v.to_string()));
        }
    }
    out.push(("Authorization".to_string(), format!("Bearer {credential}")));
    for (k, v) in &provider.custom_headers {
        out.retain(|(existing, _)| !existing.eq_ignore_ascii_case(k));
        out.push((k.clone(), v.clone()));
    }
    out
}

fn to_dispatch_response(resp: UpstreamResponse) -> DispatchResponse {
    let mut headers = HeaderMap::new();
    for (k, v) in resp.headers {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(k), HeaderValue::from_str(&v)) {
            headers.insert(name, value);
        }
    }
    DispatchResponse {
        status: resp.status,
        headers,
        body: resp.body,
    }
}

fn emit_request(events: &EventHub, provider: &str, status: u16, started: Instant) {
    events.emit(Event::Request(RequestRecord {
        provider: provider.to_string(),
        model: None,
        status,
        latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        timestamp_ms: now_millis(),
    }));
}

fn emit_error(
    events: &EventHub,
    provider: &ProviderSpec,
    credential: &str,
    egress: &str,
    status: Option<u16>,
    message: &str,
) {
    events.emit(Event::Error(ErrorRecord {
        provider: provider.name.clone(),
        credential_digest: credential_digest(credential),
        egress: egress.to_string(),
        status,
        message: message.to_string(),
        request_body: None,
        timestamp_ms: now_millis(),
    }));
}
