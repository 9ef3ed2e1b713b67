//! Upstream-facing probes used by the Health Prober (§4.5). A thin wrapper
//! around a bare `wreq::Client`, grounded in `upstream_client::build_client`
//! but without the per-egress cache since probes run on a slow interval.

use std::time::Duration;

use async_trait::async_trait;
use relaygate_pool::health::{CredentialProbe, EgressProbe};
use relaygate_pool::DIRECT;
use wreq::{Client, Proxy};

pub struct WreqHealthProbe {
    client: Client,
}

impl WreqHealthProbe {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for WreqHealthProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialProbe for WreqHealthProbe {
    /// A lightweight `GET {base_url}/models/{test_model}` with the
    /// credential as a bearer token; 2xx means the credential still works.
    async fn probe(&self, base_url: &str, credential: &str, test_model: &str) -> bool {
        let url = format!("{}/models/{test_model}", base_url.trim_end_matches('/'));
        let sent = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {credential}"))
            .timeout(Duration::from_secs(10))
            .send()
            .await;
        sent.map(|resp| resp.status().is_success()).unwrap_or(false)
    }
}

#[async_trait]
impl EgressProbe for WreqHealthProbe {
    async fn probe(&self, egress_uri: &str, check_url: &str, timeout: Duration) -> bool {
        let client = if egress_uri == DIRECT {
            self.client.clone()
        } else {
            match Proxy::all(egress_uri).and_then(|proxy| Client::builder().proxy(proxy).build()) {
                Ok(client) => client,
                Err(_) => return false,
            }
        };
        let sent = client.get(check_url).timeout(timeout).send().await;
        sent.map(|resp| resp.status().is_success()).unwrap_or(false)
    }
}
