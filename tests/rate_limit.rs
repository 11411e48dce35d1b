use std::sync::Arc;
use std::time::{Duration, Instant};

use pasteguard::config::RateLimitingConfig;
use pasteguard::error::GuardError;
use pasteguard::ratelimit::{
    Action, ActionLimits, Admission, ClientKey, RateLimitCategory, RateLimitSystem, RateLimiter,
    WindowRule, FIVE_MINUTES,
};
use tokio_test::{assert_err, assert_ok};

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[test]
fn test_two_per_five_minutes() {
    let category = RateLimitCategory::new("paste_new/5m", secs(FIVE_MINUTES), 2);
    let client = ClientKey::new("10.0.0.1");
    let t0 = Instant::now();

    assert_eq!(category.check_and_use_at(&client, t0), Admission::Admitted);
    assert_eq!(category.check_and_use_at(&client, t0 + secs(1)), Admission::Admitted);

    let denied = category.check_and_use_at(&client, t0 + secs(2));
    assert_eq!(
        denied,
        Admission::Denied {
            retry_after: secs(298)
        }
    );
    assert_eq!(denied.retry_after_secs(), Some(298));

    assert_eq!(category.check_and_use_at(&client, t0 + secs(301)), Admission::Admitted);
    assert_eq!(category.count_at(&client, t0 + secs(301)), Some(1));
}

#[test]
fn test_zero_quota_always_admits() {
    let category = RateLimitCategory::new("paste_get/5m", secs(FIVE_MINUTES), 0);
    let client = ClientKey::new("10.0.0.1");
    let now = Instant::now();

    for _ in 0..1000 {
        assert!(category.check_and_use_at(&client, now).is_admitted());
    }
    assert!(category.is_empty());
}

#[test]
fn test_retry_after_stays_within_window() {
    let window = secs(60);
    let category = RateLimitCategory::new("paste_new/1m", window, 1);
    let client = ClientKey::new("10.0.0.1");
    let t0 = Instant::now();

    category.check_and_use_at(&client, t0);
    for offset_ms in [0u64, 1, 999, 30_000, 59_999] {
        let admission = category.check_and_use_at(&client, t0 + Duration::from_millis(offset_ms));
        match admission {
            Admission::Denied { retry_after } => {
                assert!(retry_after > Duration::ZERO);
                assert!(retry_after <= window);
            }
            Admission::Admitted => panic!("admitted at +{}ms", offset_ms),
        }
        let hint = admission.retry_after_secs().unwrap();
        assert!((1..=60).contains(&hint));
    }
}

#[test]
fn test_double_burst_at_boundary() {
    let category = RateLimitCategory::new("paste_new/10s", secs(10), 3);
    let client = ClientKey::new("10.0.0.1");
    let t0 = Instant::now();

    // Quota used at the very end of the first window
    let late = t0 + Duration::from_millis(9_900);
    category.check_and_use_at(&client, t0);
    for _ in 0..2 {
        assert!(category.check_and_use_at(&client, late).is_admitted());
    }
    assert!(!category.check_and_use_at(&client, late).is_admitted());

    // And again right after the reset
    let reset = t0 + secs(10);
    for _ in 0..3 {
        assert!(category.check_and_use_at(&client, reset).is_admitted());
    }
    assert!(!category.check_and_use_at(&client, reset).is_admitted());
}

#[test]
fn test_clients_are_independent() {
    let category = RateLimitCategory::new("paste_new/5m", secs(FIVE_MINUTES), 1);
    let now = Instant::now();
    let a = ClientKey::new("10.0.0.1");
    let b = ClientKey::new("10.0.0.2");

    assert!(category.check_and_use_at(&a, now).is_admitted());
    assert!(!category.check_and_use_at(&a, now).is_admitted());
    assert!(category.check_and_use_at(&b, now).is_admitted());
}

#[test]
fn test_system_denies_on_longer_window() {
    let limits = ActionLimits::new(vec![WindowRule::new(10, 5), WindowRule::new(60, 2)]);
    let system = RateLimitSystem::new("paste_new", &limits);
    let client = ClientKey::new("10.0.0.1");
    let t0 = Instant::now();

    assert!(system.admit_at(&client, t0).is_admitted());
    assert!(system.admit_at(&client, t0).is_admitted());

    let denied = system.admit_at(&client, t0 + secs(1));
    assert_eq!(denied.retry_after_secs(), Some(59));

    // The short window has reset but the long one has not
    assert!(!system.admit_at(&client, t0 + secs(20)).is_admitted());
    assert!(system.admit_at(&client, t0 + secs(60)).is_admitted());
}

#[test]
fn test_sweep_drops_only_elapsed_counters() {
    let limits = ActionLimits::per_5m_15m_1h(15, 30, 40);
    let system = RateLimitSystem::new("paste_new", &limits);
    let t0 = Instant::now();

    system.admit_at(&ClientKey::new("10.0.0.1"), t0);
    system.admit_at(&ClientKey::new("10.0.0.2"), t0 + secs(600));
    assert_eq!(system.tracked(), 6);

    // At t0+16m: both 5m counters and the 15m counter of .1 are stale
    assert_eq!(system.sweep_at(t0 + secs(16 * 60)), 3);
    assert_eq!(system.tracked(), 3);

    assert_eq!(system.sweep_at(t0 + secs(3 * 3600)), 3);
    assert_eq!(system.tracked(), 0);
}

#[test]
fn test_limiter_check_maps_denial() {
    let config = RateLimitingConfig {
        paste_new: ActionLimits::per_5m_15m_1h(2, 0, 0),
        paste_get: ActionLimits::per_5m_15m_1h(0, 0, 0),
        sweep_interval_secs: None,
    };
    let limiter = RateLimiter::new(&config);
    let client = ClientKey::new("10.0.0.1");
    let t0 = Instant::now();

    assert_ok!(limiter.check_at(Action::PasteNew, &client, t0));
    assert_ok!(limiter.check_at(Action::PasteNew, &client, t0 + secs(1)));
    let err = assert_err!(limiter.check_at(Action::PasteNew, &client, t0 + secs(2)));
    assert!(matches!(err, GuardError::TooManyRequests { retry_after_secs: 298 }));
    assert_eq!(err.http_status(), 429);

    // Reads are unlimited and independent of creates
    for _ in 0..100 {
        assert_ok!(limiter.check_at(Action::PasteGet, &client, t0 + secs(2)));
    }
}

#[tokio::test]
async fn test_concurrent_admissions_respect_quota() {
    let category = Arc::new(RateLimitCategory::new("paste_new/5m", secs(FIVE_MINUTES), 10));
    let client = ClientKey::new("10.0.0.1");

    let tasks = (0..50).map(|_| {
        let category = Arc::clone(&category);
        let client = client.clone();
        tokio::spawn(async move { category.check_and_use(&client).is_admitted() })
    });
    let results = futures::future::join_all(tasks).await;

    let admitted = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();
    assert_eq!(admitted, 10);
}

#[tokio::test]
async fn test_sweeper_lifecycle() {
    let config = RateLimitingConfig {
        paste_new: ActionLimits::new(vec![WindowRule::new(1, 5)]),
        paste_get: ActionLimits::per_5m_15m_1h(0, 0, 0),
        sweep_interval_secs: Some(60),
    };
    let limiter = Arc::new(RateLimiter::new(&config));
    assert_eq!(limiter.sweep_interval(), Some(secs(1)));

    limiter.admit(Action::PasteNew, &ClientKey::new("10.0.0.1"));
    assert_eq!(limiter.tracked(), 1);

    let handle = limiter.spawn_sweeper();
    assert!(handle.is_running());
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(limiter.tracked(), 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_no_sweeper_when_everything_disabled() {
    let limiter = Arc::new(RateLimiter::disabled());
    assert_eq!(limiter.sweep_interval(), None);

    let handle = limiter.spawn_sweeper();
    assert!(!handle.is_running());
}
