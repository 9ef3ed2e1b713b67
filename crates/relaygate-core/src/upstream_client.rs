//! Outbound HTTP to providers (§4.4 steps c–e): a per-key `wreq::Client`
//! cache and a stream-via-mpsc-channel response bridge. One cached client
//! per egress the Dispatcher acquires, keyed by egress URI (`DIRECT`
//! included).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use relaygate_pool::DIRECT;
use wreq::{Client, Method, Proxy};

#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: http::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

pub enum ResponseBody {
    Bytes(Bytes),
    Stream(tokio::sync::mpsc::Receiver<Bytes>),
}

pub struct UpstreamResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
}

#[derive(Debug, thiserror::Error)]
#[error("upstream transport error: {0}")]
pub struct UpstreamError(pub String);

#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(&self, egress: &str, req: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError>;
}

#[derive(Debug, Clone)]
pub struct UpstreamClientConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub stream_idle_timeout: Duration,
}

impl Default for UpstreamClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(120),
            stream_idle_timeout: Duration::from_secs(30),
        }
    }
}

pub struct WreqUpstreamClient {
    config: UpstreamClientConfig,
    clients: Mutex<HashMap<String, Client>>,
}

impl WreqUpstreamClient {
    pub fn new(config: UpstreamClientConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client_for_egress(&self, egress: &str) -> Result<Client, UpstreamError> {
        let mut guard = self
            .clients
            .lock()
            .map_err(|_| UpstreamError("upstream client cache lock poisoned".to_string()))?;
        if let Some(client) = guard.get(egress) {
            return Ok(client.clone());
        }
        let client = build_client(&self.config, egress).map_err(|e| UpstreamError(e.to_string()))?;
        guard.insert(egress.to_string(), client.clone());
        Ok(client)
    }
}

fn build_client(config: &UpstreamClientConfig, egress: &str) -> Result<Client, wreq::Error> {
    let mut builder = Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .read_timeout(config.stream_idle_timeout);
    if egress != DIRECT {
        builder = builder.proxy(Proxy::all(egress)?);
    }
    builder.build()
}

#[async_trait]
impl UpstreamClient for WreqUpstreamClient {
    async fn send(&self, egress: &str, req: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        let client = self.client_for_egress(egress)?;
        let method = wreq_method(&req.method);
        let mut builder = client.request(method, &req.url);
        for (k, v) in &req.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }
        if !req.body.is_empty() {
            builder = builder.body(req.body.clone());
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| UpstreamError(e.to_string()))?;
        convert_response(resp, self.config.stream_idle_timeout).await
    }
}

fn wreq_method(method: &http::Method) -> Method {
    Method::from_bytes(method.as_str().as_bytes()).unwrap_or(Method::GET)
}

async fn convert_response(
    resp: wreq::Response,
    stream_idle_timeout: Duration,
) -> Result<UpstreamResponse, UpstreamError> {
    let status = resp.status().as_u16();
    let headers = headers_from_wreq(resp.headers());

    let (tx, rx) = tokio::sync::mpsc::channel::<Bytes>(16);
    tokio::spawn(async move {
        let mut stream = resp.bytes_stream();
        loop {
            let next = tokio::time::timeout(stream_idle_timeout, stream.next()).await;
            let item = match next {
                Ok(item) => item,
                Err(_) => break,
            };
            let Some(item) = item else {
                break;
            };
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(_) => break,
            };
            if tx.send(chunk).await.is_err() {
                break;
            }
        }
    });

    Ok(UpstreamResponse {
        status,
        headers,
        body: ResponseBody::Stream(rx),
    })
}

fn headers_from_wreq(map: &wreq::header::HeaderMap) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for (k, v) in map {
        if let Ok(s) = v.to_str() {
            out.push((k.as_str().to_string(), s.to_string()));
        }
    }
    out
}
