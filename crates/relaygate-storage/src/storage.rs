//! Persistence as an external collaborator (§1): a key-value settings table
//! plus two append-only log tables behind an async interface, narrowed to
//! what the core actually needs — runtime reads never hit the DB, only
//! `ConfigSnapshot::from_raw` reads from the in-memory result of
//! `load_settings`.

use std::collections::HashMap;

use sea_orm::DbErr;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Db(#[from] DbErr),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone)]
pub struct ErrorLogEntry {
    pub at: time::OffsetDateTime,
    pub provider: String,
    pub credential_digest: String,
    pub egress: String,
    pub status: Option<u16>,
    pub message: String,
    pub request_body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RequestLogEntry {
    pub at: time::OffsetDateTime,
    pub provider: String,
    pub model: Option<String>,
    pub status: u16,
    pub latency_ms: u64,
}

#[derive(Debug, Default, Clone)]
pub struct LogQueryFilter {
    pub provider: Option<String>,
    pub limit: usize,
}

/// Runtime reads must NOT hit the DB; config is loaded once at bootstrap via
/// `load_settings` and thereafter only read from the in-memory snapshot.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    async fn sync(&self) -> StorageResult<()>;

    /// The full flat key→string map backing `RawConfig::from_flat_map`.
    async fn load_settings(&self) -> StorageResult<HashMap<String, String>>;

    async fn set_setting(&self, key: &str, value: &str) -> StorageResult<()>;

    async fn append_error_log(&self, entry: &ErrorLogEntry) -> StorageResult<()>;

    async fn append_request_log(&self, entry: &RequestLogEntry) -> StorageResult<()>;

    async fn query_error_log(&self, filter: LogQueryFilter) -> StorageResult<Vec<ErrorLogEntry>>;

    async fn query_request_log(
        &self,
        filter: LogQueryFilter,
    ) -> StorageResult<Vec<RequestLogEntry>>;
}
