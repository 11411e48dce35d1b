//! Paste service: admission control composed with the paste lifecycle.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::PasteConfig;
use crate::error::{GuardError, Result};
use crate::paste::{unix_now, CreatedPaste, PasteDraft, PasteStore, PasteView};
use crate::ratelimit::{Action, ClientKey, RateLimiter};

/// How many ids are generated for one paste before a collision is reported.
pub const MAX_ID_ATTEMPTS: usize = 3;

/// Entry point for request handlers.
///
/// Every create and read first passes the action's rate limit for the client,
/// then goes to the store.
#[derive(Debug, Clone)]
pub struct PasteService {
    limiter: Arc<RateLimiter>,
    store: PasteStore,
    limits: PasteConfig,
}

impl PasteService {
    pub fn new(limiter: Arc<RateLimiter>, store: PasteStore, limits: PasteConfig) -> Self {
        Self {
            limiter,
            store,
            limits,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn store(&self) -> &PasteStore {
        &self.store
    }

    /// Create a paste on behalf of `client`.
    #[instrument(skip(self, draft), fields(client = %client))]
    pub async fn create(&self, client: &ClientKey, draft: PasteDraft) -> Result<CreatedPaste> {
        self.limiter.check(Action::PasteNew, client)?;

        let new = draft.validate(&self.limits, unix_now())?;

        let mut attempt = 1;
        loop {
            match self.store.add(new.clone()).await {
                Err(GuardError::DuplicateId(id)) if attempt < MAX_ID_ATTEMPTS => {
                    warn!(id = %id, attempt = attempt, "Paste id collision, regenerating");
                    attempt += 1;
                }
                Ok(created) => {
                    info!(id = %created.id, one_use = new.one_use, "Paste created");
                    return Ok(created);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Open a paste on behalf of `client`.
    ///
    /// A one-use paste is shown redacted unless `confirm` is set. A confirmed
    /// open deletes the paste in the same step it is read, so the body goes to
    /// the first confirmer only and everyone after gets `NotFound`.
    ///
    /// The confirmation is a flag supplied by the client, not a capability:
    /// anyone who knows the id can confirm.
    #[instrument(skip(self), fields(client = %client))]
    pub async fn open(&self, client: &ClientKey, id: &str, confirm: bool) -> Result<PasteView> {
        self.limiter.check(Action::PasteGet, client)?;

        if id.is_empty() {
            return Err(GuardError::BadRequest("paste id is required".to_string()));
        }

        let paste = self.store.get(id).await?;
        if !paste.one_use {
            return Ok(PasteView::Full(paste));
        }

        if !confirm {
            debug!(id = %id, "One-use paste awaiting confirmation");
            return Ok(PasteView::Redacted { id: paste.id });
        }

        let paste = self.store.consume(id).await?;
        info!(id = %id, "One-use paste disclosed and deleted");
        Ok(PasteView::Full(paste))
    }

    /// Delete a paste by id.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id).await
    }

    /// Delete every expired paste.
    pub async fn purge_expired(&self) -> Result<u64> {
        self.store.delete_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitingConfig;
    use crate::paste::{MemoryPasteBackend, NewPaste, Paste, PasteBackend};
    use crate::ratelimit::ActionLimits;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn service_with(limits: RateLimitingConfig, backend: Arc<dyn PasteBackend>) -> PasteService {
        PasteService::new(
            Arc::new(RateLimiter::new(&limits)),
            PasteStore::new(backend),
            PasteConfig::default(),
        )
    }

    fn service() -> PasteService {
        service_with(
            RateLimitingConfig::default(),
            Arc::new(MemoryPasteBackend::new()),
        )
    }

    fn client() -> ClientKey {
        ClientKey::new("10.0.0.1")
    }

    #[tokio::test]
    async fn test_create_and_open() {
        let service = service();
        let created = service
            .create(&client(), PasteDraft::with_body("hi"))
            .await
            .unwrap();

        let view = service.open(&client(), &created.id, false).await.unwrap();
        match view {
            PasteView::Full(paste) => {
                assert_eq!(paste.body, "hi");
                assert_eq!(paste.syntax, "plaintext");
            }
            other => panic!("expected full view, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_one_use_peek_then_confirm() {
        let service = service();
        let draft = PasteDraft {
            one_use: true,
            ..PasteDraft::with_body("secret")
        };
        let created = service.create(&client(), draft).await.unwrap();

        let peek = service.open(&client(), &created.id, false).await.unwrap();
        assert_eq!(peek, PasteView::Redacted { id: created.id.clone() });

        // Peeking does not consume
        let peek = service.open(&client(), &created.id, false).await.unwrap();
        assert!(peek.is_redacted());

        let confirmed = service.open(&client(), &created.id, true).await.unwrap();
        assert_eq!(confirmed.into_paste().body, "secret");

        let again = service.open(&client(), &created.id, true).await;
        assert!(matches!(again, Err(GuardError::NotFound)));
        let again = service.open(&client(), &created.id, false).await;
        assert!(matches!(again, Err(GuardError::NotFound)));
    }

    #[tokio::test]
    async fn test_confirm_flag_ignored_for_regular_paste() {
        let service = service();
        let created = service
            .create(&client(), PasteDraft::with_body("kept"))
            .await
            .unwrap();

        for _ in 0..3 {
            let view = service.open(&client(), &created.id, true).await.unwrap();
            assert!(!view.is_redacted());
        }
    }

    #[tokio::test]
    async fn test_concurrent_confirmers_get_body_once() {
        let service = service();
        let draft = PasteDraft {
            one_use: true,
            ..PasteDraft::with_body("secret")
        };
        let created = service.create(&client(), draft).await.unwrap();

        let opens = (0..8).map(|i| {
            let service = service.clone();
            let id = created.id.clone();
            tokio::spawn(async move {
                let client = ClientKey::new(format!("10.0.1.{}", i));
                service.open(&client, &id, true).await
            })
        });
        let results = futures::future::join_all(opens).await;

        let disclosed = results
            .into_iter()
            .map(|r| r.unwrap())
            .filter(|r| matches!(r, Ok(PasteView::Full(_))))
            .count();
        assert_eq!(disclosed, 1);
    }

    #[tokio::test]
    async fn test_create_rate_limited() {
        let limits = RateLimitingConfig {
            paste_new: ActionLimits::per_5m_15m_1h(2, 0, 0),
            ..RateLimitingConfig::default()
        };
        let service = service_with(limits, Arc::new(MemoryPasteBackend::new()));

        service.create(&client(), PasteDraft::with_body("1")).await.unwrap();
        service.create(&client(), PasteDraft::with_body("2")).await.unwrap();
        let err = service
            .create(&client(), PasteDraft::with_body("3"))
            .await
            .unwrap_err();

        let retry_after = err.retry_after_secs().unwrap();
        assert!(retry_after > 0 && retry_after <= 300);
        assert_eq!(err.http_status(), 429);

        // Another client is unaffected
        let other = ClientKey::new("10.0.0.2");
        assert!(service.create(&other, PasteDraft::with_body("4")).await.is_ok());
    }

    #[tokio::test]
    async fn test_denied_create_stores_nothing() {
        let limits = RateLimitingConfig {
            paste_new: ActionLimits::per_5m_15m_1h(1, 0, 0),
            ..RateLimitingConfig::default()
        };
        let service = service_with(limits, Arc::new(MemoryPasteBackend::new()));

        service.create(&client(), PasteDraft::with_body("1")).await.unwrap();
        assert!(service.create(&client(), PasteDraft::with_body("2")).await.is_err());
        assert_eq!(service.store().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_open_rate_limited_before_lookup() {
        let limits = RateLimitingConfig {
            paste_get: ActionLimits::per_5m_15m_1h(1, 0, 0),
            ..RateLimitingConfig::default()
        };
        let service = service_with(limits, Arc::new(MemoryPasteBackend::new()));

        assert!(matches!(
            service.open(&client(), "missing1", false).await,
            Err(GuardError::NotFound)
        ));
        assert!(matches!(
            service.open(&client(), "missing1", false).await,
            Err(GuardError::TooManyRequests { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_id_rejected() {
        let service = service();
        assert!(matches!(
            service.open(&client(), "", false).await,
            Err(GuardError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_draft_rejected() {
        let service = service();
        let err = service
            .create(&client(), PasteDraft::default())
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    /// Rejects the first `collisions` inserts as duplicates.
    struct CollidingBackend {
        inner: MemoryPasteBackend,
        collisions: usize,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl PasteBackend for CollidingBackend {
        async fn insert(&self, paste: &Paste) -> Result<()> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) < self.collisions {
                return Err(GuardError::DuplicateId(paste.id.clone()));
            }
            self.inner.insert(paste).await
        }

        async fn fetch(&self, id: &str) -> Result<Option<Paste>> {
            self.inner.fetch(id).await
        }

        async fn remove(&self, id: &str) -> Result<bool> {
            self.inner.remove(id).await
        }

        async fn take(&self, id: &str) -> Result<Option<Paste>> {
            self.inner.take(id).await
        }

        async fn remove_expired(&self, now: i64) -> Result<u64> {
            self.inner.remove_expired(now).await
        }

        async fn count(&self) -> Result<u64> {
            self.inner.count().await
        }
    }

    fn colliding(collisions: usize) -> Arc<CollidingBackend> {
        Arc::new(CollidingBackend {
            inner: MemoryPasteBackend::new(),
            collisions,
            attempts: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_id_collision_is_retried() {
        let backend = colliding(MAX_ID_ATTEMPTS - 1);
        let service = service_with(RateLimitingConfig::default(), backend.clone());

        let created = service.create(&client(), PasteDraft::with_body("x")).await;
        assert!(created.is_ok());
        assert_eq!(backend.attempts.load(Ordering::SeqCst), MAX_ID_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_persistent_collision_surfaces() {
        let backend = colliding(usize::MAX);
        let service = service_with(RateLimitingConfig::default(), backend.clone());

        let err = service
            .create(&client(), PasteDraft::with_body("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::DuplicateId(_)));
        assert_eq!(backend.attempts.load(Ordering::SeqCst), MAX_ID_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let service = service();
        service
            .store()
            .add(NewPaste {
                body: "old".into(),
                delete_time: unix_now() - 30,
                ..NewPaste::default()
            })
            .await
            .unwrap();

        assert_eq!(service.purge_expired().await.unwrap(), 1);
    }
}
