//! Per-provider rotating credential pool (§4.2).
//!
//! One mutex guards the cursor, the record list and every per-record
//! counter together, so a single critical section both picks and marks a
//! credential. Rotation is strict insertion-order round robin rather than
//! weighted-random selection.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Outcome of a completed upstream attempt, fed back via `release` (§4.2, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOutcome {
    Success,
    TransientFailure,
    AuthFailure,
    /// The credential itself is structurally invalid; disable immediately.
    FatalFailure,
}

/// A single credential and its health bookkeeping (§3).
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub value: String,
    pub provider_name: String,
    pub consecutive_failures: u32,
    /// Unix millis; `None` means enabled.
    pub disabled_since: Option<u64>,
    pub bound_egress: Option<String>,
}

impl CredentialRecord {
    pub fn is_enabled(&self) -> bool {
        self.disabled_since.is_none()
    }
}

struct Inner {
    records: Vec<CredentialRecord>,
    cursor: usize,
}

/// Thread-safe, per-provider pool of credentials (§4.2).
pub struct CredentialPool {
    provider_name: String,
    max_failures: u32,
    inner: Mutex<Inner>,
}

impl CredentialPool {
    pub fn new(provider_name: impl Into<String>, values: &[String], max_failures: u32) -> Self {
        let provider_name = provider_name.into();
        let records = values
            .iter()
            .map(|value| CredentialRecord {
                value: value.clone(),
                provider_name: provider_name.clone(),
                consecutive_failures: 0,
                disabled_since: None,
                bound_egress: None,
            })
            .collect();
        Self {
            provider_name,
            max_failures,
            inner: Mutex::new(Inner { records, cursor: 0 }),
        }
    }

    /// Next enabled credential after the cursor; advances the cursor past it
    /// (§4.2). `None` if every credential is disabled or the pool is empty.
    pub fn acquire(&self) -> Option<CredentialRecord> {
        let mut inner = self.inner.lock().unwrap();
        let n = inner.records.len();
        if n == 0 {
            return None;
        }
        let start = inner.cursor % n;
        for step in 0..n {
            let idx = (start + step) % n;
            if inner.records[idx].is_enabled() {
                inner.cursor = (idx + 1) % n;
                return Some(inner.records[idx].clone());
            }
        }
        None
    }

    /// `/v1/models` may pin to a designated credential instead of rotating
    /// (§4.2). Falls back to `acquire` when unset, absent or disabled.
    pub fn model_request_credential(&self, model_request_key: Option<&str>) -> Option<CredentialRecord> {
        if let Some(key) = model_request_key {
            let inner = self.inner.lock().unwrap();
            if let Some(record) = inner
                .records
                .iter()
                .find(|r| r.value == key && r.is_enabled())
            {
                return Some(record.clone());
            }
        }
        self.acquire()
    }

    /// Record the outcome of an attempt; disables the credential once
    /// `consecutive_failures` reaches `max_failures` (I1).
    pub fn release(&self, value: &str, outcome: CredentialOutcome) {
        let mut inner = self.inner.lock().unwrap();
        let max_failures = self.max_failures;
        let Some(record) = inner.records.iter_mut().find(|r| r.value == value) else {
            return;
        };
        match outcome {
            CredentialOutcome::Success => {
                record.consecutive_failures = 0;
            }
            CredentialOutcome::TransientFailure | CredentialOutcome::AuthFailure => {
                record.consecutive_failures = (record.consecutive_failures + 1).min(max_failures);
            }
            CredentialOutcome::FatalFailure => {
                record.consecutive_failures = max_failures;
            }
        }
        if record.consecutive_failures >= max_failures && record.disabled_since.is_none() {
            record.disabled_since = Some(now_millis());
        }
    }

    /// Prober entry point: zero counters and re-enable (I5, §4.5).
    pub fn reenable(&self, value: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner.records.iter_mut().find(|r| r.value == value) {
            record.consecutive_failures = 0;
            record.disabled_since = None;
        }
    }

    /// Clear a credential's egress affinity (the "unbind on disable" rule, §4.3).
    pub fn unbind_egress(&self, egress_uri: &str) {
        let mut inner = self.inner.lock().unwrap();
        for record in inner.records.iter_mut() {
            if record.bound_egress.as_deref() == Some(egress_uri) {
                record.bound_egress = None;
            }
        }
    }

    pub fn bind_egress(&self, value: &str, egress_uri: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner.records.iter_mut().find(|r| r.value == value) {
            record.bound_egress = Some(egress_uri.to_string());
        }
    }

    /// Merge in a reconfigured credential list. Preserves counters for
    /// values that survive, appends new ones, drops removed ones, and
    /// preserves the cursor by value identity when possible (§3, §4.2).
    pub fn reload(&self, values: &[String]) {
        let mut inner = self.inner.lock().unwrap();
        let cursor_value = inner
            .records
            .get(inner.cursor % inner.records.len().max(1))
            .map(|r| r.value.clone());

        let mut next = Vec::with_capacity(values.len());
        for value in values {
            if let Some(existing) = inner.records.iter().find(|r| &r.value == value) {
                next.push(existing.clone());
            } else {
                next.push(CredentialRecord {
                    value: value.clone(),
                    provider_name: self.provider_name.clone(),
                    consecutive_failures: 0,
                    disabled_since: None,
                    bound_egress: None,
                });
            }
        }

        let new_cursor = cursor_value
            .and_then(|v| next.iter().position(|r| r.value == v))
            .unwrap_or(0);
        inner.records = next;
        inner.cursor = new_cursor;
    }

    pub fn snapshot(&self) -> Vec<CredentialRecord> {
        self.inner.lock().unwrap().records.clone()
    }

    pub fn disabled_candidates(&self) -> Vec<CredentialRecord> {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| !r.is_enabled())
            .cloned()
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

    fn vals(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn round_robin_rotates_through_enabled_entries() {
        let pool = CredentialPool::new("p", &vals(&["a", "b", "c"]), 3);
        let first = pool.acquire().unwrap().value;
        let second = pool.acquire().unwrap().value;
        let third = pool.acquire().unwrap().value;
        let fourth = pool.acquire().unwrap().value;
        assert_eq!([first.as_str(), second.as_str(), third.as_str()], ["a", "b", "c"]);
        assert_eq!(fourth, "a");
    }

    #[test]
    fn threshold_disables_and_cursor_skips_it() {
        let pool = CredentialPool::new("p", &vals(&["a", "b"]), 1);
        pool.release("a", CredentialOutcome::TransientFailure);
        assert!(pool.snapshot().iter().find(|r| r.value == "a").unwrap().disabled_since.is_some());
        // cursor must now only ever return "b".
        for _ in 0..3 {
            assert_eq!(pool.acquire().unwrap().value, "b");
        }
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let pool = CredentialPool::new("p", &vals(&["a"]), 3);
        pool.release("a", CredentialOutcome::TransientFailure);
        pool.release("a", CredentialOutcome::Success);
        assert_eq!(pool.snapshot()[0].consecutive_failures, 0);
    }

    #[test]
    fn all_disabled_yields_empty() {
        let pool = CredentialPool::new("p", &vals(&["a"]), 1);
        pool.release("a", CredentialOutcome::FatalFailure);
        assert!(pool.acquire().is_none());
    }

    #[test]
    fn reenable_clears_counters_and_disabled_since() {
        let pool = CredentialPool::new("p", &vals(&["a"]), 1);
        pool.release("a", CredentialOutcome::FatalFailure);
        pool.reenable("a");
        let record = pool.snapshot().into_iter().next().unwrap();
        assert_eq!(record.consecutive_failures, 0);
        assert!(record.disabled_since.is_none());
    }

    #[test]
    fn reload_preserves_counters_by_value_identity() {
        let pool = CredentialPool::new("p", &vals(&["a", "b"]), 3);
        pool.release("a", CredentialOutcome::TransientFailure);
        pool.reload(&vals(&["a", "c"]));
        let records = pool.snapshot();
        assert_eq!(records.iter().find(|r| r.value == "a").unwrap().consecutive_failures, 1);
        assert_eq!(records.iter().find(|r| r.value == "c").unwrap().consecutive_failures, 0);
        assert!(records.iter().all(|r| r.value != "b"));
    }

    #[test]
    fn unbind_on_disable_clears_bound_egress() {
        let pool = CredentialPool::new("p", &vals(&["a"]), 3);
        pool.bind_egress("a", "http://proxy1");
        pool.unbind_egress("http://proxy1");
        assert!(pool.snapshot()[0].bound_egress.is_none());
    }
}
