use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A named upstream API endpoint with its own credential pool and policy
/// (§3). Providers are pure data — the dispatcher forwards identically
/// shaped bodies to whichever one a request resolves to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,
    /// Path segment used for routing, e.g. `deepseek`. Must match `[a-z0-9-]+`.
    pub path: String,
    /// Absolute `http(s)` URL. No assumption about a trailing `/v1`.
    pub base_url: String,
    pub api_keys: Vec<String>,
    /// If set and present in the pool, `/v1/models` requests always use
    /// this credential rather than the rotating one.
    pub model_request_key: Option<String>,
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,
    pub timeout_seconds: Option<u64>,
    pub max_failures: Option<u32>,
    pub max_retries: Option<u32>,
    pub test_model: Option<String>,
    #[serde(default)]
    pub tools_code_execution_enabled: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}
