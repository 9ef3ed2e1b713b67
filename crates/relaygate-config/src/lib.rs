//! The Config Store's data model: an immutable, versioned [`ConfigSnapshot`]
//! plus the flat key/value surface it is parsed from (§6).
//!
//! Nothing in this crate touches I/O. Persistence, env seeding and admin
//! edits all funnel through [`RawConfig`] and [`ConfigSnapshot::from_raw`];
//! everything downstream only ever sees a validated, immutable snapshot.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

mod provider;
mod raw;

pub use provider::ProviderSpec;
pub use raw::RawConfig;

/// Failures during `ConfigSnapshot` validation. A snapshot that fails to
/// validate is rejected without replacing the published one (§9: "Dynamic
/// JSON provider list -> validated typed snapshot").
#[derive(Debug, thiserror::Error)]
pub enum ConfigInvalid {
    #[error("missing required config field: {0}")]
    MissingField(&'static str),
    #[error("PROVIDERS_CONFIG is not valid JSON: {0}")]
    InvalidProvidersJson(serde_json::Error),
    #[error("duplicate provider name: {0}")]
    DuplicateProviderName(String),
    #[error("provider {name}: path {path:?} must match [a-z0-9-]+")]
    InvalidProviderPath { name: String, path: String },
    #[error("provider {name}: base_url must be an absolute http(s) URL")]
    InvalidBaseUrl { name: String },
    #[error("default_provider {0:?} does not name a configured provider")]
    UnknownDefaultProvider(String),
    #[error("allowed_tokens must not be empty")]
    EmptyAllowedTokens,
}

/// Immutable, versioned bundle of every tunable the running process needs.
///
/// Published via `ArcSwap` by the Config Store; once built, a `ConfigSnapshot`
/// is never mutated in place — reconfiguration always means building a new
/// one and swapping the pointer (§3, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub allowed_tokens: HashSet<String>,
    pub auth_token: String,
    pub default_provider: String,
    pub providers: Vec<ProviderSpec>,
    pub max_failures: u32,
    pub max_retries: u32,
    pub timeout_seconds: u64,
    pub test_model: String,
    pub proxies: Vec<String>,
    pub proxy_auto_check_enabled: bool,
    pub proxy_check_interval_seconds: u64,
    pub proxy_max_failures: u32,
    pub proxy_check_url: String,
    pub proxy_check_timeout_seconds: u64,
    pub filtered_models: HashSet<String>,
    pub error_log_record_request_body: bool,
}

impl ConfigSnapshot {
    /// Parse and validate the flat key/value config surface (§6) into a
    /// snapshot. Never mutates `raw`; rejects instead of repairing.
    pub fn from_raw(raw: &RawConfig) -> Result<Self, ConfigInvalid> {
        let allowed_tokens: HashSet<String> = raw.allowed_tokens()?;
        if allowed_tokens.is_empty() {
            return Err(ConfigInvalid::EmptyAllowedTokens);
        }
        let auth_token = raw
            .auth_token
            .clone()
            .or_else(|| allowed_tokens.iter().next().cloned())
            .ok_or(ConfigInvalid::MissingField("auth_token"))?;

        let mut providers = raw.providers()?;
        // Flat BASE_URL/API_KEYS pair defines the implicit "default" provider
        // when PROVIDERS_CONFIG omits it.
        if !providers.iter().any(|p| p.name == "default")
            && let (Some(base_url), Some(api_keys)) = (&raw.base_url, &raw.api_keys)
        {
            providers.push(ProviderSpec {
                name: "default".to_string(),
                path: "default".to_string(),
                base_url: base_url.clone(),
                api_keys: api_keys.clone(),
                model_request_key: None,
                custom_headers: HashMap::new(),
                timeout_seconds: None,
                max_failures: None,
                max_retries: None,
                test_model: None,
                tools_code_execution_enabled: false,
                enabled: true,
            });
        }

        let mut seen = HashSet::with_capacity(providers.len());
        for p in &providers {
            if !seen.insert(p.name.clone()) {
                return Err(ConfigInvalid::DuplicateProviderName(p.name.clone()));
            }
            if !is_path_token(&p.path) {
                return Err(ConfigInvalid::InvalidProviderPath {
                    name: p.name.clone(),
                    path: p.path.clone(),
                });
            }
            if !is_absolute_http_url(&p.base_url) {
                return Err(ConfigInvalid::InvalidBaseUrl {
                    name: p.name.clone(),
                });
            }
        }

        let default_provider = raw
            .default_provider
            .clone()
            .unwrap_or_else(|| "default".to_string());
        if !providers.iter().any(|p| p.name == default_provider) {
            return Err(ConfigInvalid::UnknownDefaultProvider(default_provider));
        }

        Ok(Self {
            allowed_tokens,
            auth_token,
            default_provider,
            providers,
            max_failures: raw.max_failures.unwrap_or(3),
            max_retries: raw.max_retries.unwrap_or(2),
            timeout_seconds: raw.timeout_seconds.unwrap_or(120),
            test_model: raw.test_model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string()),
            proxies: raw.proxies(),
            proxy_auto_check_enabled: raw.proxy_auto_check_enabled.unwrap_or(false),
            proxy_check_interval_seconds: raw.proxy_check_interval_seconds.unwrap_or(60),
            proxy_max_failures: raw.proxy_max_failures.unwrap_or(3),
            proxy_check_url: raw
                .proxy_check_url
                .clone()
                .unwrap_or_else(|| "https://www.google.com/generate_204".to_string()),
            proxy_check_timeout_seconds: raw.proxy_check_timeout_seconds.unwrap_or(5),
            filtered_models: raw.filtered_models(),
            error_log_record_request_body: raw.error_log_record_request_body.unwrap_or(false),
        })
    }

    pub fn provider_by_path(&self, path: &str) -> Option<&ProviderSpec> {
        self.providers.iter().find(|p| p.path == path)
    }

    pub fn provider_by_name(&self, name: &str) -> Option<&ProviderSpec> {
        self.providers.iter().find(|p| p.name == name)
    }
}

fn is_path_token(path: &str) -> bool {
    !path.is_empty()
        && path
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

fn is_absolute_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_raw() -> RawConfig {
        RawConfig {
            allowed_tokens: Some("tk".to_string()),
            auth_token: None,
            default_provider: None,
            providers_config: None,
            base_url: Some("https://u/v1".to_string()),
            api_keys: Some(vec!["sk-A".to_string()]),
            ..RawConfig::default()
        }
    }

    #[test]
    fn implicit_default_provider_from_flat_keys() {
        let snapshot = ConfigSnapshot::from_raw(&minimal_raw()).unwrap();
        assert_eq!(snapshot.default_provider, "default");
        assert_eq!(snapshot.providers.len(), 1);
        assert_eq!(snapshot.providers[0].api_keys, vec!["sk-A".to_string()]);
    }

    #[test]
    fn empty_allowed_tokens_rejected() {
        let mut raw = minimal_raw();
        raw.allowed_tokens = Some(String::new());
        assert!(matches!(
            ConfigSnapshot::from_raw(&raw),
            Err(ConfigInvalid::EmptyAllowedTokens)
        ));
    }

    #[test]
    fn unknown_default_provider_rejected() {
        let mut raw = minimal_raw();
        raw.default_provider = Some("nope".to_string());
        assert!(matches!(
            ConfigSnapshot::from_raw(&raw),
            Err(ConfigInvalid::UnknownDefaultProvider(_))
        ));
    }

    #[test]
    fn duplicate_provider_names_rejected() {
        let mut raw = minimal_raw();
        raw.providers_config = Some(
            serde_json::json!([
                {"name": "default", "path": "a", "base_url": "https://a/v1", "api_keys": ["k"]},
                {"name": "default", "path": "b", "base_url": "https://b/v1", "api_keys": ["k"]},
            ])
            .to_string(),
        );
        assert!(matches!(
            ConfigSnapshot::from_raw(&raw),
            Err(ConfigInvalid::DuplicateProviderName(_))
        ));
    }

    #[test]
    fn invalid_path_rejected() {
        let mut raw = minimal_raw();
        raw.providers_config = Some(
            serde_json::json!([
                {"name": "bad", "path": "Not Valid", "base_url": "https://a/v1", "api_keys": ["k"]},
            ])
            .to_string(),
        );
        assert!(matches!(
            ConfigSnapshot::from_raw(&raw),
            Err(ConfigInvalid::InvalidProviderPath { .. })
        ));
    }
}
