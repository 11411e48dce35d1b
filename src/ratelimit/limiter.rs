//! Multi-window admission control.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use super::category::RateLimitCategory;
use super::client::ClientKey;
use super::counter::Admission;
use super::rules::{Action, ActionLimits};
use crate::config::RateLimitingConfig;
use crate::error::{GuardError, Result};

/// Lower bound for the sweep period.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// The categories guarding one action, in increasing window order.
#[derive(Debug)]
pub struct RateLimitSystem {
    name: String,
    categories: Vec<RateLimitCategory>,
}

impl RateLimitSystem {
    /// Build a system from the configured windows of an action.
    pub fn new(name: impl Into<String>, limits: &ActionLimits) -> Self {
        let name = name.into();
        let categories = limits
            .ordered()
            .into_iter()
            .map(|rule| {
                RateLimitCategory::new(format!("{}/{}", name, rule.label()), rule.window(), rule.quota)
            })
            .collect();

        Self { name, categories }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn categories(&self) -> &[RateLimitCategory] {
        &self.categories
    }

    /// Admit or deny a request from `client` at the current instant.
    pub fn admit(&self, client: &ClientKey) -> Admission {
        self.admit_at(client, Instant::now())
    }

    /// Admit or deny a request from `client` at `now`.
    ///
    /// Windows are evaluated shortest first. The first denial stops the
    /// evaluation, so longer windows are not counted for a denied request.
    pub fn admit_at(&self, client: &ClientKey, now: Instant) -> Admission {
        for category in &self.categories {
            let admission = category.check_and_use_at(client, now);
            if !admission.is_admitted() {
                debug!(
                    system = %self.name,
                    category = %category.name(),
                    client = %client,
                    retry_after_secs = admission.retry_after_secs(),
                    "Rate limit exceeded"
                );
                return admission;
            }
        }
        Admission::Admitted
    }

    /// Sweep stale counters from every category at `now`.
    pub fn sweep_at(&self, now: Instant) -> usize {
        self.categories.iter().map(|c| c.sweep_at(now)).sum()
    }

    /// Shortest enabled window, if any category is enabled.
    pub fn shortest_window(&self) -> Option<Duration> {
        self.categories
            .iter()
            .filter(|c| c.is_enabled())
            .map(|c| c.window())
            .min()
    }

    /// Number of tracked (category, client key) pairs.
    pub fn tracked(&self) -> usize {
        self.categories.iter().map(|c| c.len()).sum()
    }
}

/// Admission control for every action, shared across request handlers.
///
/// Instantiate once at start-up, share behind an `Arc`, and keep the
/// `SweepHandle` returned by `spawn_sweeper` alive for the life of the service.
#[derive(Debug)]
pub struct RateLimiter {
    systems: HashMap<Action, RateLimitSystem>,
    sweep_interval: Option<Duration>,
}

impl RateLimiter {
    /// Create a rate limiter from configuration.
    pub fn new(config: &RateLimitingConfig) -> Self {
        let mut systems = HashMap::new();
        systems.insert(
            Action::PasteNew,
            RateLimitSystem::new(Action::PasteNew.as_str(), &config.paste_new),
        );
        systems.insert(
            Action::PasteGet,
            RateLimitSystem::new(Action::PasteGet.as_str(), &config.paste_get),
        );

        Self {
            systems,
            sweep_interval: config.sweep_interval_secs.map(Duration::from_secs),
        }
    }

    /// A rate limiter that admits everything.
    pub fn disabled() -> Self {
        Self::new(&RateLimitingConfig {
            paste_new: ActionLimits::default(),
            paste_get: ActionLimits::default(),
            sweep_interval_secs: None,
        })
    }

    pub fn system(&self, action: Action) -> Option<&RateLimitSystem> {
        self.systems.get(&action)
    }

    /// Admission decision for `action` from `client`.
    pub fn admit(&self, action: Action, client: &ClientKey) -> Admission {
        self.admit_at(action, client, Instant::now())
    }

    pub fn admit_at(&self, action: Action, client: &ClientKey, now: Instant) -> Admission {
        trace!(action = %action, client = %client, "Checking admission");
        match self.systems.get(&action) {
            Some(system) => system.admit_at(client, now),
            None => Admission::Admitted,
        }
    }

    /// Like `admit`, with a denial turned into `TooManyRequests`.
    pub fn check(&self, action: Action, client: &ClientKey) -> Result<()> {
        self.check_at(action, client, Instant::now())
    }

    pub fn check_at(&self, action: Action, client: &ClientKey, now: Instant) -> Result<()> {
        match self.admit_at(action, client, now) {
            Admission::Admitted => Ok(()),
            denied => Err(GuardError::TooManyRequests {
                retry_after_secs: denied.retry_after_secs().unwrap_or(1),
            }),
        }
    }

    /// Sweep every system at `now`, returning the number of entries removed.
    pub fn sweep_at(&self, now: Instant) -> usize {
        Action::ALL
            .iter()
            .filter_map(|action| self.systems.get(action))
            .map(|system| system.sweep_at(now))
            .sum()
    }

    /// Number of tracked (category, client key) pairs across all actions.
    pub fn tracked(&self) -> usize {
        self.systems.values().map(RateLimitSystem::tracked).sum()
    }

    /// How often the background sweep runs.
    ///
    /// Defaults to the shortest enabled window and is never longer than it.
    /// `None` when every window is disabled and there is nothing to sweep.
    pub fn sweep_interval(&self) -> Option<Duration> {
        let shortest = self
            .systems
            .values()
            .filter_map(RateLimitSystem::shortest_window)
            .min()?;

        let interval = match self.sweep_interval {
            Some(configured) => configured.min(shortest),
            None => shortest,
        };
        Some(interval.max(MIN_SWEEP_INTERVAL))
    }

    /// Spawn the background sweep task.
    ///
    /// The task runs until the returned handle is shut down or dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweepHandle {
        let Some(interval) = self.sweep_interval() else {
            info!("All rate limit windows disabled, sweeper not started");
            return SweepHandle { task: None };
        };

        let limiter = Arc::clone(self);
        info!(interval_secs = interval.as_secs(), "Starting rate limit sweeper");

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let mut removed = 0;
                for action in Action::ALL {
                    let Some(system) = limiter.systems.get(&action) else {
                        continue;
                    };
                    for category in system.categories() {
                        removed += category.sweep();
                        tokio::task::yield_now().await;
                    }
                }
                debug!(removed = removed, tracked = limiter.tracked(), "Rate limit sweep done");
            }
        });

        SweepHandle::new(task)
    }
}

/// Owner of a background task; cancels it on shutdown or drop.
#[derive(Debug)]
pub struct SweepHandle {
    task: Option<JoinHandle<()>>,
}

impl SweepHandle {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// Whether a task is running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancel the task and wait for it to stop.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
