//! Persistence for settings and logs (§1, §4.7): a key-value settings table
//! plus two append-only log tables, and an `EventSink` that drains the
//! Observability Sink into them.

pub mod db;
pub mod entities;
pub mod seaorm_storage;
pub mod sinks;
pub mod storage;

pub use seaorm_storage::SeaOrmStorage;
pub use sinks::DbSink;
pub use storage::{
    ErrorLogEntry, LogQueryFilter, RequestLogEntry, Storage, StorageError, StorageResult,
};
