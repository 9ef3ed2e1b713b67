//! Health Prober (§4.5): two independent periodic tasks — credential
//! re-enable and egress probe — that mutate the same pools the Dispatcher
//! reads from, coordinating only through pool-internal locks.
//!
//! Unlike a min-heap-plus-`Notify` scheme that wakes exactly at a known
//! deadline, both tasks here poll on a fixed interval and re-validate
//! against a live upstream, since re-enablement depends on an actual probe
//! succeeding, not a timer alone.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::credential::CredentialPool;
use crate::egress::{DIRECT, EgressOutcome, EgressPool};
use crate::events::{Event, EventHub, credential_digest, now_millis};

/// Debounce before a disabled credential is eligible for a re-enable probe
/// (suggested by §4.5: 1 minute).
pub const CREDENTIAL_DEBOUNCE_MS: u64 = 60_000;

#[async_trait]
pub trait CredentialProbe: Send + Sync {
    /// Issue the lightweight upstream check for one credential. `true` means
    /// the upstream answered 2xx.
    async fn probe(&self, base_url: &str, credential: &str, test_model: &str) -> bool;
}

#[async_trait]
pub trait EgressProbe: Send + Sync {
    async fn probe(&self, egress_uri: &str, check_url: &str, timeout: Duration) -> bool;
}

/// Per-provider credential re-enable task (§4.5). Polls on `interval`;
/// probes only disabled credentials whose `disabled_since` is older than
/// [`CREDENTIAL_DEBOUNCE_MS`], and never probes the same credential twice
/// concurrently.
pub fn spawn_credential_prober(
    provider_name: String,
    pool: Arc<CredentialPool>,
    base_url: String,
    test_model: String,
    probe: Arc<dyn CredentialProbe>,
    events: Arc<EventHub>,
    interval: Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let in_flight: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));
        loop {
            ticker.tick().await;
            let now = now_millis();
            let candidates = pool.disabled_candidates();
            for record in candidates {
                let Some(disabled_since) = record.disabled_since else {
                    continue;
                };
                if now.saturating_sub(disabled_since) < CREDENTIAL_DEBOUNCE_MS {
                    continue;
                }
                let mut guard = in_flight.lock().unwrap();
                if !guard.insert(record.value.clone()) {
                    continue; // already probing this one
                }
                drop(guard);

                let pool = Arc::clone(&pool);
                let probe = Arc::clone(&probe);
                let events = Arc::clone(&events);
                let in_flight = Arc::clone(&in_flight);
                let provider_name = provider_name.clone();
                let base_url = base_url.clone();
                let test_model = test_model.clone();
                tokio::spawn(async move {
                    let ok = probe.probe(&base_url, &record.value, &test_model).await;
                    if ok {
                        pool.reenable(&record.value);
                        info!(
                            event = "credential_reenabled",
                            provider = %provider_name,
                            credential = %credential_digest(&record.value),
                        );
                        events.emit(Event::CredentialReenabled {
                            provider: provider_name.clone(),
                            credential_digest: credential_digest(&record.value),
                        });
                    } else {
                        warn!(
                            event = "credential_probe_failed",
                            provider = %provider_name,
                            credential = %credential_digest(&record.value),
                        );
                        pool.release(&record.value, crate::credential::CredentialOutcome::TransientFailure);
                    }
                    in_flight.lock().unwrap().remove(&record.value);
                });
            }
        }
    });
}

/// Global egress probe task (§4.5), guarded by `enabled`. Disabling an
/// egress runs `on_disable` against every credential pool (the
/// "unbind on disable" rule, §4.3).
pub fn spawn_egress_prober(
    pool: Arc<EgressPool>,
    check_url: String,
    timeout: Duration,
    enabled: bool,
    probe: Arc<dyn EgressProbe>,
    events: Arc<EventHub>,
    interval: Duration,
    on_disable: Arc<dyn Fn(&str) + Send + Sync>,
) {
    if !enabled {
        return;
    }
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            for record in pool.snapshot() {
                if record.uri == DIRECT {
                    continue;
                }
                let ok = probe.probe(&record.uri, &check_url, timeout).await;
                if ok {
                    pool.release(&record.uri, EgressOutcome::Success);
                    if record.disabled_since.is_some() {
                        events.emit(Event::EgressReenabled { uri: record.uri.clone() });
                    }
                } else {
                    pool.release(&record.uri, EgressOutcome::TransientFailure);
                    let newly_disabled = pool
                        .snapshot()
                        .into_iter()
                        .find(|r| r.uri == record.uri)
                        .is_some_and(|r| r.disabled_since.is_some());
                    if newly_disabled {
                        on_disable(&record.uri);
                        warn!(event = "egress_disabled", uri = %record.uri);
                        events.emit(Event::EgressDisabled { uri: record.uri.clone() });
                    }
                }
            }
        }
    });
}
