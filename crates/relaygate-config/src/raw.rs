use std::collections::{HashMap, HashSet};

use crate::{ConfigInvalid, ProviderSpec};

/// A draft snapshot collected from the flat key/value config surface (§6)
/// before validation. Mirrors the persisted keys 1:1: `PROVIDERS_CONFIG`,
/// `DEFAULT_PROVIDER`, `API_KEYS`, `ALLOWED_TOKENS`, `BASE_URL`, etc.
#[derive(Debug, Clone, Default)]
pub struct RawConfig {
    pub allowed_tokens: Option<String>,
    pub auth_token: Option<String>,
    pub default_provider: Option<String>,
    /// Raw `PROVIDERS_CONFIG` JSON text, when present and non-empty it takes
    /// precedence over `base_url`/`api_keys` for its named providers.
    pub providers_config: Option<String>,
    pub base_url: Option<String>,
    pub api_keys: Option<Vec<String>>,
    pub max_failures: Option<u32>,
    pub max_retries: Option<u32>,
    pub timeout_seconds: Option<u64>,
    pub test_model: Option<String>,
    pub proxies: Option<String>,
    pub proxy_auto_check_enabled: Option<bool>,
    pub proxy_check_interval_seconds: Option<u64>,
    pub proxy_max_failures: Option<u32>,
    pub proxy_check_url: Option<String>,
    pub proxy_check_timeout_seconds: Option<u64>,
    pub filtered_models: Option<String>,
    pub error_log_record_request_body: Option<bool>,
}

impl RawConfig {
    /// Build a draft from the flat `key -> string` mapping read from the
    /// settings store or the environment (§6). Unknown keys are ignored.
    pub fn from_flat_map(map: &HashMap<String, String>) -> Self {
        Self {
            allowed_tokens: map.get("ALLOWED_TOKENS").cloned(),
            auth_token: map.get("AUTH_TOKEN").cloned(),
            default_provider: map.get("DEFAULT_PROVIDER").cloned(),
            providers_config: map.get("PROVIDERS_CONFIG").cloned(),
            base_url: map.get("BASE_URL").cloned(),
            api_keys: map
                .get("API_KEYS")
                .map(|raw| serde_json::from_str::<Vec<String>>(raw).unwrap_or_default()),
            max_failures: map.get("MAX_FAILURES").and_then(|v| v.parse().ok()),
            max_retries: map.get("MAX_RETRIES").and_then(|v| v.parse().ok()),
            timeout_seconds: map.get("TIMEOUT_SECONDS").and_then(|v| v.parse().ok()),
            test_model: map.get("TEST_MODEL").cloned(),
            proxies: map.get("PROXIES").cloned(),
            proxy_auto_check_enabled: map
                .get("PROXY_AUTO_CHECK_ENABLED")
                .and_then(|v| v.parse().ok()),
            proxy_check_interval_seconds: map
                .get("PROXY_CHECK_INTERVAL")
                .and_then(|v| v.parse().ok()),
            proxy_max_failures: map.get("PROXY_MAX_FAILURES").and_then(|v| v.parse().ok()),
            proxy_check_url: map.get("PROXY_CHECK_URL").cloned(),
            proxy_check_timeout_seconds: map
                .get("PROXY_CHECK_TIMEOUT")
                .and_then(|v| v.parse().ok()),
            filtered_models: map.get("FILTERED_MODELS").cloned(),
            error_log_record_request_body: map
                .get("ERROR_LOG_RECORD_REQUEST_BODY")
                .and_then(|v| v.parse().ok()),
        }
    }

    pub(crate) fn allowed_tokens(&self) -> Result<HashSet<String>, ConfigInvalid> {
        Ok(comma_list(self.allowed_tokens.as_deref()).into_iter().collect())
    }

    pub(crate) fn providers(&self) -> Result<Vec<ProviderSpec>, ConfigInvalid> {
        match self.providers_config.as_deref() {
            None => Ok(Vec::new()),
            Some(raw) if raw.trim().is_empty() => Ok(Vec::new()),
            Some(raw) => {
                serde_json::from_str(raw).map_err(ConfigInvalid::InvalidProvidersJson)
            }
        }
    }

    pub(crate) fn proxies(&self) -> Vec<String> {
        comma_list(self.proxies.as_deref())
    }

    pub(crate) fn filtered_models(&self) -> HashSet<String> {
        comma_list(self.filtered_models.as_deref()).into_iter().collect()
    }
}

fn comma_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
