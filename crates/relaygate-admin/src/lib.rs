//! Admin surface (§1: "administrative browser UI ... interfaces only"):
//! a read-mostly view over the running `AppState` plus an events feed,
//! gated by `relaygate_core::auth::require_admin`.

pub mod router;

pub use router::router;
