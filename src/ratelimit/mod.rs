//! Rate limiting logic and state management.

mod category;
mod client;
mod counter;
mod limiter;
mod rules;

pub use category::RateLimitCategory;
pub use client::ClientKey;
pub use counter::{check_and_use, Admission, CounterEntry};
pub use limiter::{RateLimitSystem, RateLimiter, SweepHandle};
pub use rules::{
    Action, ActionLimits, WindowRule, FIFTEEN_MINUTES, FIVE_MINUTES, MAX_WINDOW_SECS, ONE_HOUR,
};
