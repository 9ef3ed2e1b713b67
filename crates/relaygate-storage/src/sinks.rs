//! `EventSink` implementation persisting `Event::Error`/`Event::Request` into
//! the log tables (§4.7). Best-effort: a failed write is logged and dropped,
//! never retried or propagated — `EventHub::emit` already runs sinks off the
//! dispatcher's hot path.

use std::sync::Arc;

use relaygate_pool::{Event, EventSink};
use tracing::warn;

use crate::storage::{ErrorLogEntry, RequestLogEntry, Storage};

pub struct DbSink {
    storage: Arc<dyn Storage>,
}

impl DbSink {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait::async_trait]
impl EventSink for DbSink {
    async fn write(&self, event: Event) {
        let result = match event {
            Event::Error(record) => {
                self.storage
                    .append_error_log(&ErrorLogEntry {
                        at: millis_to_offset(record.timestamp_ms),
                        provider: record.provider,
                        credential_digest: record.credential_digest,
                        egress: record.egress,
                        status: record.status,
                        message: record.message,
                        request_body: record.request_body,
                    })
                    .await
            }
            Event::Request(record) => {
                self.storage
                    .append_request_log(&RequestLogEntry {
                        at: millis_to_offset(record.timestamp_ms),
                        provider: record.provider,
                        model: record.model,
                        status: record.status,
                        latency_ms: record.latency_ms,
                    })
                    .await
            }
            // Credential/egress lifecycle transitions are operational signal,
            // not request-shaped log rows; nothing to persist here.
            Event::CredentialDisabled { .. }
            | Event::CredentialReenabled { .. }
            | Event::EgressDisabled { .. }
            | Event::EgressReenabled { .. } => return,
        };
        if let Err(err) = result {
            warn!(event = "event_sink_write_failed", error = %err);
        }
    }
}

fn millis_to_offset(millis: u64) -> time::OffsetDateTime {
    time::OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .unwrap_or(time::OffsetDateTime::UNIX_EPOCH)
}
