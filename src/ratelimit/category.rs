//! A named group of per-client counters sharing one window and quota.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::client::ClientKey;
use super::counter::{check_and_use, Admission, CounterEntry};

/// Counters for every client key seen within one window length.
///
/// A single lock guards the whole map. Critical sections are one hash lookup
/// for checks and one `retain` pass for the sweep.
pub struct RateLimitCategory {
    name: String,
    window: Duration,
    quota: u64,
    entries: Mutex<HashMap<ClientKey, CounterEntry>>,
}

impl RateLimitCategory {
    /// Create a category. A quota of zero disables it.
    pub fn new(name: impl Into<String>, window: Duration, quota: u64) -> Self {
        Self {
            name: name.into(),
            window,
            quota,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn quota(&self) -> u64 {
        self.quota
    }

    pub fn is_enabled(&self) -> bool {
        self.quota > 0
    }

    /// Check and count a request from `key` at the current instant.
    pub fn check_and_use(&self, key: &ClientKey) -> Admission {
        self.check_and_use_at(key, Instant::now())
    }

    /// Check and count a request from `key` at `now`.
    pub fn check_and_use_at(&self, key: &ClientKey, now: Instant) -> Admission {
        if !self.is_enabled() {
            return Admission::Admitted;
        }

        let mut entries = self.entries.lock();
        let mut slot = entries.get(key).copied();
        let admission = check_and_use(&mut slot, self.window, self.quota, now);
        if let Some(entry) = slot {
            entries.insert(key.clone(), entry);
        }
        drop(entries);

        trace!(
            category = %self.name,
            client = %key,
            admitted = admission.is_admitted(),
            "Checked rate limit category"
        );

        admission
    }

    /// Current count for `key`, if the key has a live window at `now`.
    pub fn count_at(&self, key: &ClientKey, now: Instant) -> Option<u64> {
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|entry| !entry.is_elapsed(self.window, now))
            .map(|entry| entry.count)
    }

    /// Remove every entry whose window has fully elapsed.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let window = self.window;
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_elapsed(window, now));
        let removed = before - entries.len();
        drop(entries);

        if removed > 0 {
            debug!(category = %self.name, removed = removed, "Swept stale counters");
        }
        removed
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Number of client keys currently tracked.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all counters.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl std::fmt::Debug for RateLimitCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitCategory")
            .field("name", &self.name)
            .field("window", &self.window)
            .field("quota", &self.quota)
            .field("tracked", &self.len())
            .finish()
    }
}
