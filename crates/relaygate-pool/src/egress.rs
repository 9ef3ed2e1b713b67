//! Pool of outbound network egresses (HTTP/SOCKS5 proxies) plus the `DIRECT`
//! sentinel (§4.3). Symmetric to [`crate::credential::CredentialPool`] except
//! `DIRECT` can never be disabled.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Sentinel identifying "no proxy, connect directly" (§3, §4.3).
pub const DIRECT: &str = "DIRECT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EgressOutcome {
    Success,
    TransientFailure,
}

#[derive(Debug, Clone)]
pub struct EgressRecord {
    pub uri: String,
    pub consecutive_failures: u32,
    pub disabled_since: Option<u64>,
}

impl EgressRecord {
    pub fn is_direct(&self) -> bool {
        self.uri == DIRECT
    }

    pub fn is_enabled(&self) -> bool {
        self.is_direct() || self.disabled_since.is_none()
    }
}

struct Inner {
    records: Vec<EgressRecord>,
    cursor: usize,
}

pub struct EgressPool {
    max_failures: u32,
    inner: Mutex<Inner>,
}

impl EgressPool {
    pub fn new(proxies: &[String], max_failures: u32) -> Self {
        let mut records = vec![EgressRecord {
            uri: DIRECT.to_string(),
            consecutive_failures: 0,
            disabled_since: None,
        }];
        records.extend(proxies.iter().map(|uri| EgressRecord {
            uri: uri.clone(),
            consecutive_failures: 0,
            disabled_since: None,
        }));
        Self {
            max_failures,
            inner: Mutex::new(Inner { records, cursor: 0 }),
        }
    }

    /// Next enabled egress after the cursor (`DIRECT` is always a candidate).
    pub fn acquire(&self) -> EgressRecord {
        let mut inner = self.inner.lock().unwrap();
        let n = inner.records.len();
        let start = inner.cursor % n;
        for step in 0..n {
            let idx = (start + step) % n;
            if inner.records[idx].is_enabled() {
                inner.cursor = (idx + 1) % n;
                return inner.records[idx].clone();
            }
        }
        // Unreachable in practice: DIRECT is always enabled.
        inner.records[0].clone()
    }

    pub fn release(&self, uri: &str, outcome: EgressOutcome) {
        let mut inner = self.inner.lock().unwrap();
        let max_failures = self.max_failures;
        let Some(record) = inner.records.iter_mut().find(|r| r.uri == uri) else {
            return;
        };
        if record.is_direct() {
            return;
        }
        match outcome {
            EgressOutcome::Success => record.consecutive_failures = 0,
            EgressOutcome::TransientFailure => {
                record.consecutive_failures = (record.consecutive_failures + 1).min(max_failures);
            }
        }
        if record.consecutive_failures >= max_failures && record.disabled_since.is_none() {
            record.disabled_since = Some(now_millis());
        }
    }

    /// Disable an egress directly (used by the probe task, §4.5). Returns
    /// `true` if this call transitioned it from enabled to disabled, so the
    /// caller knows whether to run the unbind-on-disable rule.
    pub fn disable(&self, uri: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let Some(record) = inner.records.iter_mut().find(|r| r.uri == uri) else {
            return false;
        };
        if record.is_direct() || record.disabled_since.is_some() {
            return false;
        }
        record.disabled_since = Some(now_millis());
        record.consecutive_failures = self.max_failures;
        true
    }

    pub fn reenable(&self, uri: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner.records.iter_mut().find(|r| r.uri == uri) {
            record.consecutive_failures = 0;
            record.disabled_since = None;
        }
    }

    pub fn reload(&self, proxies: &[String]) {
        let mut inner = self.inner.lock().unwrap();
        let cursor_uri = inner
            .records
            .get(inner.cursor % inner.records.len().max(1))
            .map(|r| r.uri.clone());

        let mut next = vec![EgressRecord {
            uri: DIRECT.to_string(),
            consecutive_failures: 0,
            disabled_since: None,
        }];
        for uri in proxies {
            if let Some(existing) = inner.records.iter().find(|r| &r.uri == uri) {
                next.push(existing.clone());
            } else {
                next.push(EgressRecord {
                    uri: uri.clone(),
                    consecutive_failures: 0,
                    disabled_since: None,
                });
            }
        }

        let new_cursor = cursor_uri
            .and_then(|u| next.iter().position(|r| r.uri == u))
            .unwrap_or(0);
        inner.records = next;
        inner.cursor = new_cursor;
    }

    pub fn snapshot(&self) -> Vec<EgressRecord> {
        self.inner.lock().unwrap().records.clone()
    }

    pub fn enabled_uris(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| r.uri != DIRECT)
            .map(|r| r.uri.clone())
            .collect()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_is_never_disabled() {
        let pool = EgressPool::new(&[], 1);
        pool.release(DIRECT, EgressOutcome::TransientFailure);
        assert!(pool.acquire().is_enabled());
    }

    #[test]
    fn proxy_disables_after_threshold() {
        let pool = EgressPool::new(&["http://p1".to_string()], 1);
        assert!(pool.disable("http://p1"));
        let enabled: Vec<_> = (0..4).map(|_| pool.acquire().uri).collect();
        assert!(enabled.iter().all(|u| u == DIRECT));
    }

    #[test]
    fn disable_is_idempotent_signal() {
        let pool = EgressPool::new(&["http://p1".to_string()], 1);
        assert!(pool.disable("http://p1"));
        assert!(!pool.disable("http://p1"));
    }
}
