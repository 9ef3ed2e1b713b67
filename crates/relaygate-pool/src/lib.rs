//! Credential Pool, Egress Pool, Provider Registry, Health Prober and
//! Observability Sink (§4.2–§4.5, §4.7): the concurrency-safe state the
//! Dispatcher reads and the background probers mutate.

pub mod credential;
pub mod egress;
pub mod errors;
pub mod events;
pub mod health;
pub mod registry;

pub use credential::{CredentialOutcome, CredentialPool, CredentialRecord};
pub use egress::{DIRECT, EgressOutcome, EgressPool, EgressRecord};
pub use errors::{ProxyError, classify_status, Outcome};
pub use events::{credential_digest, now_millis, ErrorRecord, Event, EventHub, EventSink, RequestRecord};
pub use registry::{Surface, resolve};
