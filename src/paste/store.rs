//! Paste lifecycle: creation, lazy expiration, deletion and consumption.

use std::sync::Arc;

use tracing::{debug, info};

use super::backend::PasteBackend;
use super::model::{CreatedPaste, NewPaste, Paste};
use super::token::{self, PASTE_ID_LENGTH};
use crate::error::{GuardError, Result};

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Paste store over a storage backend.
///
/// Expired pastes are unreadable as soon as their `delete_time` passes: `get`
/// and `consume` check expiry themselves and never depend on the bulk sweep.
#[derive(Clone)]
pub struct PasteStore {
    backend: Arc<dyn PasteBackend>,
}

impl PasteStore {
    pub fn new(backend: Arc<dyn PasteBackend>) -> Self {
        Self { backend }
    }

    /// Store a new paste under a freshly generated id.
    ///
    /// A negative `delete_time` is stored as 0 (never expires). An id
    /// collision surfaces as `DuplicateId`; nothing is overwritten.
    pub async fn add(&self, new: NewPaste) -> Result<CreatedPaste> {
        let id = token::generate(PASTE_ID_LENGTH)?;
        let paste = Paste::from_new(id, unix_now(), new);

        self.backend.insert(&paste).await?;

        debug!(
            id = %paste.id,
            delete_time = paste.delete_time,
            one_use = paste.one_use,
            "Paste stored"
        );
        Ok(CreatedPaste::from(&paste))
    }

    /// Fetch a paste, deleting it instead if it has expired.
    pub async fn get(&self, id: &str) -> Result<Paste> {
        let paste = self.backend.fetch(id).await?.ok_or(GuardError::NotFound)?;

        if paste.is_expired_at(unix_now()) {
            // A concurrent reader may already have removed it
            let removed = self.backend.remove(id).await?;
            debug!(id = %id, removed = removed, "Expired paste removed on read");
            return Err(GuardError::NotFound);
        }

        Ok(paste)
    }

    /// Delete a paste by id.
    pub async fn delete(&self, id: &str) -> Result<()> {
        if self.backend.remove(id).await? {
            debug!(id = %id, "Paste deleted");
            Ok(())
        } else {
            Err(GuardError::NotFound)
        }
    }

    /// Atomically read and delete a paste.
    ///
    /// Of several concurrent callers at most one gets the record; the rest
    /// get `NotFound`. An expired record is removed and reported as `NotFound`.
    pub async fn consume(&self, id: &str) -> Result<Paste> {
        let paste = self.backend.take(id).await?.ok_or(GuardError::NotFound)?;

        if paste.is_expired_at(unix_now()) {
            return Err(GuardError::NotFound);
        }

        debug!(id = %id, "Paste consumed");
        Ok(paste)
    }

    /// Delete every expired paste. Returns the number removed.
    pub async fn delete_expired(&self) -> Result<u64> {
        let removed = self.backend.remove_expired(unix_now()).await?;
        if removed > 0 {
            info!(removed = removed, "Deleted expired pastes");
        }
        Ok(removed)
    }

    /// Number of stored pastes, expired ones included until swept.
    pub async fn count(&self) -> Result<u64> {
        self.backend.count().await
    }
}

impl std::fmt::Debug for PasteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasteStore").finish_non_exhaustive()
    }
}
