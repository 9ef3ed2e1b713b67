//! Observability Sink (§4.7): a non-blocking fan-out of structured records
//! over a broadcast channel, with best-effort sinks spawned off the hot
//! path so a slow persistence layer never stalls the dispatcher.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub provider: String,
    pub credential_digest: String,
    pub egress: String,
    pub status: Option<u16>,
    pub message: String,
    pub request_body: Option<String>,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub provider: String,
    pub model: Option<String>,
    pub status: u16,
    pub latency_ms: u64,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Error(ErrorRecord),
    Request(RequestRecord),
    CredentialDisabled { provider: String, credential_digest: String },
    CredentialReenabled { provider: String, credential_digest: String },
    EgressDisabled { uri: String },
    EgressReenabled { uri: String },
}

/// An external persistence collaborator for events (§1: "assumed to be ...
/// two append-only log tables behind an async interface"). Implementations
/// must not block the caller for long; the hub already runs them off-thread.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn write(&self, event: Event);
}

/// Broadcast hub feeding zero or more sinks. Enqueue never blocks: a full
/// broadcast channel silently drops the oldest unread event for slow
/// subscribers (e.g. an admin websocket), while registered sinks each get
/// their own bounded queue via `tokio::spawn`.
pub struct EventHub {
    tx: broadcast::Sender<Event>,
    sinks: tokio::sync::RwLock<Vec<Arc<dyn EventSink>>>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Arc::new(Self {
            tx,
            sinks: tokio::sync::RwLock::new(Vec::new()),
        })
    }

    pub async fn add_sink(&self, sink: Arc<dyn EventSink>) {
        self.sinks.write().await.push(sink);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Non-blocking enqueue (§4.7, §5 suspension point (f)). `send` on a
    /// broadcast channel never awaits; it's safe to call directly from the
    /// dispatcher's hot path.
    pub fn emit(self: &Arc<Self>, event: Event) {
        let _ = self.tx.send(event.clone());
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            let sinks = hub.sinks.read().await;
            for sink in sinks.iter() {
                sink.write(event.clone()).await;
            }
        });
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Short, non-reversible stand-in for a credential in logs (never the
/// plaintext value).
pub fn credential_digest(value: &str) -> String {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in value.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{hash:016x}")
}
