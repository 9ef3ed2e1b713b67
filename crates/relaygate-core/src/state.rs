//! Runtime state (§3, §5): `current_snapshot` and `pools_by_provider` are
//! each read-mostly and swapped under a single lock held only for the
//! pointer swap; everything else (pool internals) has its own lock.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use relaygate_config::{ConfigSnapshot, ProviderSpec};
use relaygate_pool::{CredentialPool, EgressPool, EventHub};
use relaygate_storage::Storage;

use crate::upstream_client::UpstreamClient;

pub struct ProviderPool {
    pub spec: ProviderSpec,
    pub credentials: Arc<CredentialPool>,
}

pub struct AppState {
    pub snapshot: ArcSwap<ConfigSnapshot>,
    pub provider_pools: ArcSwap<HashMap<String, Arc<ProviderPool>>>,
    pub egress: Arc<EgressPool>,
    pub events: Arc<EventHub>,
    pub upstream: Arc<dyn UpstreamClient>,
    pub storage: Arc<dyn Storage>,
}

impl AppState {
    pub fn new(
        snapshot: ConfigSnapshot,
        upstream: Arc<dyn UpstreamClient>,
        storage: Arc<dyn Storage>,
        events: Arc<EventHub>,
    ) -> Arc<Self> {
        let egress = Arc::new(EgressPool::new(&snapshot.proxies, snapshot.proxy_max_failures));
        let pools = build_provider_pools(&snapshot, None);
        Arc::new(Self {
            snapshot: ArcSwap::from_pointee(snapshot),
            provider_pools: ArcSwap::from_pointee(pools),
            egress,
            events,
            upstream,
            storage,
        })
    }

    /// Publish a reconfigured snapshot (§9: versioned snapshot with atomic
    /// pointer swap). Existing credential pools are reused and merged
    /// in-place by provider name so counters survive for unchanged
    /// credentials (§3); the egress pool is reloaded the same way.
    pub fn reload(&self, snapshot: ConfigSnapshot) {
        let previous = self.provider_pools.load();
        let next = build_provider_pools(&snapshot, Some(&previous));
        self.egress.reload(&snapshot.proxies);
        self.provider_pools.store(Arc::new(next));
        self.snapshot.store(Arc::new(snapshot));
    }

    pub fn provider_pool(&self, name: &str) -> Option<Arc<ProviderPool>> {
        self.provider_pools.load().get(name).cloned()
    }
}

fn build_provider_pools(
    snapshot: &ConfigSnapshot,
    previous: Option<&HashMap<String, Arc<ProviderPool>>>,
) -> HashMap<String, Arc<ProviderPool>> {
    snapshot
        .providers
        .iter()
        .map(|spec| {
            let max_failures = spec.max_failures.unwrap_or(snapshot.max_failures);
            let credentials = match previous.and_then(|p| p.get(&spec.name)) {
                Some(existing) => {
                    existing.credentials.reload(&spec.api_keys);
                    Arc::clone(&existing.credentials)
                }
                None => Arc::new(CredentialPool::new(&spec.name, &spec.api_keys, max_failures)),
            };
            (
                spec.name.clone(),
                Arc::new(ProviderPool {
                    spec: spec.clone(),
                    credentials,
                }),
            )
        })
        .collect()
}
