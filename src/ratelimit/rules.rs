//! Rate limit rules: which windows and quotas apply to each action.
//!
//! Every action carries an explicit ordered list of windows. All of them must
//! admit a request for the action to proceed, which composes burst control
//! (short windows) with sustained control (long windows).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{GuardError, Result};

/// Five minutes, the shortest standard window.
pub const FIVE_MINUTES: u64 = 5 * 60;
/// Fifteen minutes.
pub const FIFTEEN_MINUTES: u64 = 15 * 60;
/// One hour, the longest standard window.
pub const ONE_HOUR: u64 = 60 * 60;

/// Longest accepted window, one year.
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * ONE_HOUR;

/// A logical action subject to admission control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Creating a paste
    PasteNew,
    /// Reading a paste
    PasteGet,
}

impl Action {
    /// All actions, in a stable order.
    pub const ALL: [Action; 2] = [Action::PasteNew, Action::PasteGet];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::PasteNew => "paste_new",
            Action::PasteGet => "paste_get",
        }
    }

    /// Parse an action name such as `"paste_new"`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == name)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single window: at most `quota` requests per `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRule {
    /// Window length in seconds
    pub window_secs: u64,
    /// Requests allowed per window; 0 disables the window
    pub quota: u64,
}

impl WindowRule {
    pub fn new(window_secs: u64, quota: u64) -> Self {
        Self { window_secs, quota }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Human readable window name, e.g. `5m` or `1h`.
    pub fn label(&self) -> String {
        let secs = self.window_secs;
        if secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

/// The windows configured for one action.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionLimits {
    #[serde(default)]
    pub windows: Vec<WindowRule>,
}

impl ActionLimits {
    pub fn new(windows: Vec<WindowRule>) -> Self {
        Self { windows }
    }

    /// The standard "per 5 minutes / per 15 minutes / per 1 hour" triple.
    pub fn per_5m_15m_1h(per_5m: u64, per_15m: u64, per_1h: u64) -> Self {
        Self::new(vec![
            WindowRule::new(FIVE_MINUTES, per_5m),
            WindowRule::new(FIFTEEN_MINUTES, per_15m),
            WindowRule::new(ONE_HOUR, per_1h),
        ])
    }

    /// Windows sorted by increasing length, which is the evaluation order.
    pub fn ordered(&self) -> Vec<WindowRule> {
        let mut windows = self.windows.clone();
        windows.sort_by_key(|rule| rule.window_secs);
        windows
    }

    /// Reject windows that are empty or longer than `MAX_WINDOW_SECS`.
    pub fn validate(&self, action: Action) -> Result<()> {
        for rule in &self.windows {
            if rule.window_secs == 0 || rule.window_secs > MAX_WINDOW_SECS {
                return Err(GuardError::Config(format!(
                    "{}: window length must be between 1 and {} seconds, got {} (quota {})",
                    action, MAX_WINDOW_SECS, rule.window_secs, rule.quota
                )));
            }
        }
        Ok(())
    }
}
