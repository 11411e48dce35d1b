//! Fixed-window counter for a single client key.

use std::time::{Duration, Instant};

/// Outcome of a check-and-use call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request may proceed
    Admitted,
    /// The window is exhausted; the caller may retry once `retry_after` has passed
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }

    /// Retry hint in whole seconds, rounded up. `None` when admitted.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Admission::Admitted => None,
            Admission::Denied { retry_after } => Some(ceil_secs(*retry_after)),
        }
    }
}

/// Per-key counter state inside a category.
///
/// The counter resets wholesale once `window_start + window` has passed, so a
/// client can get up to twice the quota through around a window boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterEntry {
    /// When the current window started
    pub window_start: Instant,
    /// Requests admitted in the current window
    pub count: u64,
}

impl CounterEntry {
    /// Start a new window at `now` holding one admitted request.
    pub fn start(now: Instant) -> Self {
        Self {
            window_start: now,
            count: 1,
        }
    }

    /// Whether the window has fully elapsed at `now`.
    ///
    /// A window whose end is not representable never elapses.
    pub fn is_elapsed(&self, window: Duration, now: Instant) -> bool {
        self.window_start
            .checked_add(window)
            .is_some_and(|end| end <= now)
    }

    /// Time left in the current window at `now`.
    pub fn remaining(&self, window: Duration, now: Instant) -> Duration {
        match self.window_start.checked_add(window) {
            Some(end) => end.saturating_duration_since(now),
            None => window.saturating_sub(now.saturating_duration_since(self.window_start)),
        }
    }
}

/// Apply one check-and-use step to the entry slot of a key.
///
/// `slot` is `None` for a key seen for the first time. A quota of zero admits
/// without touching the slot.
pub fn check_and_use(
    slot: &mut Option<CounterEntry>,
    window: Duration,
    quota: u64,
    now: Instant,
) -> Admission {
    if quota == 0 {
        return Admission::Admitted;
    }

    match slot {
        Some(entry) if !entry.is_elapsed(window, now) => {
            if entry.count < quota {
                entry.count += 1;
                Admission::Admitted
            } else {
                Admission::Denied {
                    retry_after: entry.remaining(window, now),
                }
            }
        }
        _ => {
            *slot = Some(CounterEntry::start(now));
            Admission::Admitted
        }
    }
}

/// Round a duration up to whole seconds, never below one.
pub(crate) fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration
        .as_secs()
        .saturating_add(u64::from(duration.subsec_nanos() > 0));
    secs.max(1)
}
