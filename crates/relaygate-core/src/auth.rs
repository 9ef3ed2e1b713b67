//! Auth Gate (§4.6): bearer/cookie membership against `allowed_tokens`;
//! admin routes additionally require equality to `auth_token`. A stateless
//! check against the current `ConfigSnapshot` rather than a DB-backed key
//! table.

use http::HeaderMap;
use relaygate_config::ConfigSnapshot;
use relaygate_pool::ProxyError;

pub fn require_token(snapshot: &ConfigSnapshot, headers: &HeaderMap) -> Result<String, ProxyError> {
    let token = extract_token(headers).ok_or(ProxyError::Unauthorized)?;
    if snapshot.allowed_tokens.contains(&token) {
        Ok(token)
    } else {
        Err(ProxyError::Unauthorized)
    }
}

pub fn require_admin(snapshot: &ConfigSnapshot, headers: &HeaderMap) -> Result<(), ProxyError> {
    let token = require_token(snapshot, headers)?;
    if token == snapshot.auth_token {
        Ok(())
    } else {
        Err(ProxyError::Forbidden)
    }
}

fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(http::header::AUTHORIZATION)
        && let Ok(value) = value.to_str()
    {
        let trimmed = value.trim();
        if let Some(token) = trimmed.strip_prefix("Bearer ").or(trimmed.strip_prefix("bearer ")) {
            return Some(token.trim().to_string());
        }
    }
    cookie_value(headers, "auth_token")
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie_header = headers.get(http::header::COOKIE)?.to_str().ok()?;
    cookie_header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then(|| v.trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use relaygate_config::RawConfig;

    use super::*;

    fn snapshot(tokens: &str) -> ConfigSnapshot {
        let mut map = HashMap::new();
        map.insert("ALLOWED_TOKENS".to_string(), tokens.to_string());
        map.insert("BASE_URL".to_string(), "https://u/v1".to_string());
        map.insert("API_KEYS".to_string(), r#"["sk-A"]"#.to_string());
        ConfigSnapshot::from_raw(&RawConfig::from_flat_map(&map)).unwrap()
    }

    #[test]
    fn bearer_token_in_allowed_set_is_accepted() {
        let snapshot = snapshot("tk1,tk2");
        let mut headers = HeaderMap::new();
        headers.insert(http::header::AUTHORIZATION, "Bearer tk2".parse().unwrap());
        assert_eq!(require_token(&snapshot, &headers).unwrap(), "tk2");
    }

    #[test]
    fn unknown_token_is_unauthorized() {
        let snapshot = snapshot("tk1");
        let mut headers = HeaderMap::new();
        headers.insert(http::header::AUTHORIZATION, "Bearer nope".parse().unwrap());
        assert!(matches!(
            require_token(&snapshot, &headers),
            Err(ProxyError::Unauthorized)
        ));
    }

    #[test]
    fn admin_requires_auth_token_equality() {
        let snapshot = snapshot("tk1,tk2");
        let mut headers = HeaderMap::new();
        headers.insert(http::header::AUTHORIZATION, "Bearer tk2".parse().unwrap());
        assert!(matches!(require_admin(&snapshot, &headers), Err(ProxyError::Forbidden)));

        headers.insert(http::header::AUTHORIZATION, "Bearer tk1".parse().unwrap());
        assert!(require_admin(&snapshot, &headers).is_ok());
    }
}
