//! Proxy core: Auth Gate, Dispatcher, runtime state and the HTTP surface
//! that wires them together (§3–§7). `relaygate-pool` owns the Credential
//! Pool, Egress Pool, Provider Registry and Health Prober; this crate owns
//! everything that turns an inbound HTTP request into a dispatched one.

pub mod auth;
pub mod bootstrap;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod health_probe;
pub mod state;
pub mod upstream_client;

pub use bootstrap::{bootstrap, Bootstrap, CliArgs};
pub use error::ApiError;
pub use handler::proxy_handler;
pub use state::AppState;
pub use upstream_client::{UpstreamClient, UpstreamClientConfig, WreqUpstreamClient};
