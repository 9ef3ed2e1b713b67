//! Provider Registry (§4.1): maps an inbound URL path to a provider, its
//! remaining path, and the client-facing "surface" it arrived through.

use relaygate_config::{ConfigSnapshot, ProviderSpec};

use crate::errors::ProxyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Native,
    Hf,
    Openai,
}

/// Deterministic, exhaustive path normalization (§4.1).
///
/// 1. Strip one leading `/hf` or `/openai` prefix; remember as `surface`.
/// 2. If what remains starts with `/v1/`, select `default_provider`.
/// 3. Otherwise the first path segment names a provider by `path`.
/// 4. Unknown provider -> `ProviderNotFound`.
/// 5. Disabled provider -> `ProviderDisabled`.
pub fn resolve<'a>(
    snapshot: &'a ConfigSnapshot,
    url_path: &str,
) -> Result<(&'a ProviderSpec, String, Surface), ProxyError> {
    let (surface, rest) = strip_surface(url_path);

    let (provider_name, remaining_path) = if rest.starts_with("/v1/") || rest == "/v1" {
        (snapshot.default_provider.clone(), rest.to_string())
    } else {
        let trimmed = rest.trim_start_matches('/');
        let (segment, after) = match trimmed.split_once('/') {
            Some((seg, rest)) => (seg, format!("/{rest}")),
            None => (trimmed, String::new()),
        };
        let provider = snapshot
            .provider_by_path(segment)
            .ok_or(ProxyError::ProviderNotFound)?;
        (provider.name.clone(), after)
    };

    let provider = snapshot
        .provider_by_name(&provider_name)
        .ok_or(ProxyError::ProviderNotFound)?;
    if !provider.enabled {
        return Err(ProxyError::ProviderDisabled);
    }

    Ok((provider, remaining_path, surface))
}

fn strip_surface(path: &str) -> (Surface, &str) {
    if let Some(rest) = path.strip_prefix("/hf") {
        (Surface::Hf, rest)
    } else if let Some(rest) = path.strip_prefix("/openai") {
        (Surface::Openai, rest)
    } else {
        (Surface::Native, path)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use relaygate_config::RawConfig;

    use super::*;

    fn snapshot_with(providers_json: &str, default_provider: &str) -> ConfigSnapshot {
        let mut map = HashMap::new();
        map.insert("ALLOWED_TOKENS".to_string(), "tk".to_string());
        map.insert("PROVIDERS_CONFIG".to_string(), providers_json.to_string());
        map.insert("DEFAULT_PROVIDER".to_string(), default_provider.to_string());
        ConfigSnapshot::from_raw(&RawConfig::from_flat_map(&map)).unwrap()
    }

    fn multi_provider_snapshot() -> ConfigSnapshot {
        snapshot_with(
            r#"[
                {"name":"openai","path":"openai","base_url":"https://o/v1","api_keys":["k"]},
                {"name":"deepseek","path":"deepseek","base_url":"https://d/v1","api_keys":["k"]}
            ]"#,
            "openai",
        )
    }

    #[test]
    fn bare_v1_path_selects_default_provider() {
        let snapshot = multi_provider_snapshot();
        let (provider, remaining, surface) = resolve(&snapshot, "/v1/chat/completions").unwrap();
        assert_eq!(provider.name, "openai");
        assert_eq!(remaining, "/v1/chat/completions");
        assert_eq!(surface, Surface::Native);
    }

    #[test]
    fn provider_path_segment_routes_explicitly() {
        let snapshot = multi_provider_snapshot();
        let (provider, remaining, _) = resolve(&snapshot, "/deepseek/v1/chat/completions").unwrap();
        assert_eq!(provider.name, "deepseek");
        assert_eq!(remaining, "/v1/chat/completions");
    }

    #[test]
    fn openai_surface_prefix_then_default_provider_for_bare_v1() {
        // S4 / §9: `/openai/v1/...` consumes the surface prefix first, then
        // falls back to default-provider resolution for the bare `/v1/...`.
        let snapshot = multi_provider_snapshot();
        let (provider, remaining, surface) = resolve(&snapshot, "/openai/v1/chat/completions").unwrap();
        assert_eq!(provider.name, "openai");
        assert_eq!(remaining, "/v1/chat/completions");
        assert_eq!(surface, Surface::Openai);
    }

    #[test]
    fn unknown_provider_segment_is_not_found() {
        let snapshot = multi_provider_snapshot();
        assert!(matches!(
            resolve(&snapshot, "/nope/v1/chat/completions"),
            Err(ProxyError::ProviderNotFound)
        ));
    }

    #[test]
    fn disabled_provider_is_rejected() {
        let mut snapshot = multi_provider_snapshot();
        snapshot.providers[0].enabled = false;
        assert!(matches!(
            resolve(&snapshot, "/openai/v1/chat/completions"),
            Err(ProxyError::ProviderDisabled)
        ));
    }
}
