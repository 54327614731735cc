//! Shared fetch health for the /health endpoint.
//! Updated by the session runner on every fetch completion.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Default)]
pub struct HealthState {
    pub fetches_ok: AtomicU64,
    pub fetches_failed: AtomicU64,
    /// Failures since the last success.
    pub consecutive_failures: AtomicU64,
    /// Nanosecond timestamp of the last successful fetch (0 = none).
    pub last_success_ns: AtomicU64,
    /// Nanosecond timestamp of the last failed fetch (0 = none).
    pub last_failure_ns: AtomicU64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub fetches_ok: u64,
    pub fetches_failed: u64,
    pub consecutive_failures: u64,
    pub last_success_ns: Option<u64>,
    pub last_failure_ns: Option<u64>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, at_ns: u64) {
        self.fetches_ok.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.last_success_ns.store(at_ns, Ordering::Relaxed);
    }

    pub fn record_failure(&self, at_ns: u64) {
        self.fetches_failed.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        self.last_failure_ns.store(at_ns, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let nonzero = |v: u64| (v != 0).then_some(v);
        HealthSnapshot {
            fetches_ok: self.fetches_ok.load(Ordering::Relaxed),
            fetches_failed: self.fetches_failed.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            last_success_ns: nonzero(self.last_success_ns.load(Ordering::Relaxed)),
            last_failure_ns: nonzero(self.last_failure_ns.load(Ordering::Relaxed)),
        }
    }
}
