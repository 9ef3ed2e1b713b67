//! Startup (§6): CLI/env > DB settings merge, storage connect+sync, initial
//! snapshot build, `AppState` construction and health-prober spawning.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use relaygate_config::{ConfigSnapshot, RawConfig};
use relaygate_pool::health::{spawn_credential_prober, spawn_egress_prober};
use relaygate_pool::EventHub;
use relaygate_storage::{DbSink, SeaOrmStorage, Storage};

use crate::health_probe::WreqHealthProbe;
use crate::state::AppState;
use crate::upstream_client::{UpstreamClientConfig, WreqUpstreamClient};

/// Credential re-enable polling interval, independent of the egress check
/// interval. Chosen as a fixed cadence comfortably above the debounce.
const CREDENTIAL_PROBE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Parser)]
#[command(name = "relaygate", version, about = "Multi-provider LLM reverse proxy")]
pub struct CliArgs {
    /// Database DSN (settings, error log, request log).
    #[arg(long, env = "RELAYGATE_DSN")]
    pub dsn: Option<String>,

    /// Bind host.
    #[arg(long, env = "RELAYGATE_HOST")]
    pub host: Option<String>,

    /// Bind port.
    #[arg(long, env = "RELAYGATE_PORT")]
    pub port: Option<String>,

    /// Admin token (plaintext). Overrides `AUTH_TOKEN` in the DB when set.
    #[arg(long, env = "RELAYGATE_AUTH_TOKEN")]
    pub auth_token: Option<String>,
}

pub struct Bootstrap {
    pub storage: Arc<SeaOrmStorage>,
    pub state: Arc<AppState>,
    pub host: String,
    pub port: u16,
}

pub async fn bootstrap_from_env() -> anyhow::Result<Bootstrap> {
    let args = CliArgs::parse();
    bootstrap(args).await
}

pub async fn bootstrap(args: CliArgs) -> anyhow::Result<Bootstrap> {
    let dsn = sanitize_dsn_value(args.dsn.clone());
    let host = sanitize_optional_env_value(args.host.clone()).unwrap_or_else(|| "0.0.0.0".to_string());
    let port = parse_u16_env_value(args.port.clone(), "RELAYGATE_PORT")?.unwrap_or(8080);

    ensure_sqlite_parent_dir(&dsn)?;

    let storage = Arc::new(SeaOrmStorage::connect(&dsn).await.context("connect storage")?);
    storage.sync().await.context("schema sync")?;

    let mut settings = storage.load_settings().await.context("load settings")?;
    if let Some(token) = sanitize_optional_env_value(args.auth_token.clone()) {
        settings.insert("AUTH_TOKEN".to_string(), token.clone());
        storage
            .set_setting("AUTH_TOKEN", &token)
            .await
            .context("persist auth token")?;
    }

    let raw = RawConfig::from_flat_map(&settings);
    let snapshot = ConfigSnapshot::from_raw(&raw).context("validate config snapshot")?;

    let events = EventHub::new(1024);
    events.add_sink(Arc::new(DbSink::new(storage.clone()))).await;

    let upstream = Arc::new(WreqUpstreamClient::new(upstream_config(&snapshot)));
    let state = AppState::new(snapshot, upstream, storage.clone(), events);
    spawn_probers(&state);

    Ok(Bootstrap {
        storage,
        state,
        host,
        port,
    })
}

/// Start the Health Prober (§4.5): one credential-reenable task per
/// provider, plus a single global egress probe that unbinds every
/// credential pool's affinity to a proxy it just disabled.
fn spawn_probers(state: &Arc<AppState>) {
    let probe = Arc::new(WreqHealthProbe::new());
    let snapshot = state.snapshot.load_full();

    for provider in &snapshot.providers {
        let Some(pool) = state.provider_pool(&provider.name) else {
            continue;
        };
        let test_model = provider
            .test_model
            .clone()
            .unwrap_or_else(|| snapshot.test_model.clone());
        spawn_credential_prober(
            provider.name.clone(),
            pool.credentials.clone(),
            provider.base_url.clone(),
            test_model,
            probe.clone(),
            state.events.clone(),
            CREDENTIAL_PROBE_INTERVAL,
        );
    }

    let state_for_unbind = state.clone();
    let on_disable: Arc<dyn Fn(&str) + Send + Sync> = Arc::new(move |uri: &str| {
        for pool in state_for_unbind.provider_pools.load().values() {
            pool.credentials.unbind_egress(uri);
        }
    });

    spawn_egress_prober(
        state.egress.clone(),
        snapshot.proxy_check_url.clone(),
        Duration::from_secs(snapshot.proxy_check_timeout_seconds),
        snapshot.proxy_auto_check_enabled,
        probe,
        state.events.clone(),
        Duration::from_secs(snapshot.proxy_check_interval_seconds),
        on_disable,
    );
}

fn upstream_config(snapshot: &ConfigSnapshot) -> UpstreamClientConfig {
    UpstreamClientConfig {
        request_timeout: Duration::from_secs(snapshot.timeout_seconds),
        ..UpstreamClientConfig::default()
    }
}

fn sanitize_optional_env_value(value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_string();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with("${") && trimmed.ends_with('}') {
        return None;
    }
    Some(trimmed)
}

fn sanitize_dsn_value(value: Option<String>) -> String {
    sanitize_optional_env_value(value).unwrap_or_else(default_dsn)
}

fn default_dsn() -> String {
    if let Some(data_dir) = sanitize_optional_env_value(std::env::var("RELAYGATE_DATA_DIR").ok()) {
        let dir = data_dir.trim_end_matches('/');
        return format!("sqlite://{dir}/relaygate.db?mode=rwc");
    }
    "sqlite://relaygate.db?mode=rwc".to_string()
}

fn ensure_sqlite_parent_dir(dsn: &str) -> anyhow::Result<()> {
    let Some(db_path) = sqlite_file_path_from_dsn(dsn) else {
        return Ok(());
    };
    let Some(parent) = db_path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create sqlite parent dir {}", parent.display()))?;
    Ok(())
}

fn sqlite_file_path_from_dsn(dsn: &str) -> Option<PathBuf> {
    let rest = dsn.strip_prefix("sqlite:")?;
    let path_part = rest.split(['?', '#']).next()?.trim();
    if path_part.is_empty() {
        return None;
    }
    let mut normalized = path_part;
    if let Some(stripped) = normalized.strip_prefix("//") {
        normalized = stripped;
    }
    if normalized.to_ascii_lowercase() == ":memory:" {
        return None;
    }
    Some(PathBuf::from(normalized))
}

fn parse_u16_env_value(value: Option<String>, env_name: &str) -> anyhow::Result<Option<u16>> {
    let Some(raw) = sanitize_optional_env_value(value) else {
        return Ok(None);
    };
    let parsed = raw
        .parse::<u16>()
        .with_context(|| format!("invalid {env_name} value: {raw}"))?;
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::sqlite_file_path_from_dsn;

    #[test]
    fn sqlite_dsn_resolves_relative_path() {
        let path = sqlite_file_path_from_dsn("sqlite://relaygate.db?mode=rwc").unwrap();
        assert_eq!(path.to_string_lossy(), "relaygate.db");
    }

    #[test]
    fn sqlite_dsn_resolves_absolute_path() {
        let path = sqlite_file_path_from_dsn("sqlite://app/data/relaygate.db?mode=rwc").unwrap();
        assert_eq!(path.to_string_lossy(), "/app/data/relaygate.db");
    }

    #[test]
    fn sqlite_memory_dsn_is_ignored() {
        assert!(sqlite_file_path_from_dsn("sqlite::memory:").is_none());
        assert!(sqlite_file_path_from_dsn("sqlite://:memory:").is_none());
    }
}
