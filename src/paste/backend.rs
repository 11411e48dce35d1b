//! Storage backend trait for paste records.

use async_trait::async_trait;

use super::model::Paste;
use crate::error::Result;

/// Trait for paste storage implementations.
///
/// This abstracts over the in-process store and relational databases so the
/// paste store works with either. Every method is atomic at the row level.
#[async_trait]
pub trait PasteBackend: Send + Sync {
    /// Insert a new record. Fails with `DuplicateId` if the id exists; an
    /// existing record is never overwritten.
    async fn insert(&self, paste: &Paste) -> Result<()>;

    /// Fetch a record by id.
    async fn fetch(&self, id: &str) -> Result<Option<Paste>>;

    /// Delete a record by id. Returns whether a row was removed.
    async fn remove(&self, id: &str) -> Result<bool>;

    /// Delete a record and return it in one step. Of several concurrent
    /// callers at most one receives the record.
    async fn take(&self, id: &str) -> Result<Option<Paste>>;

    /// Delete every record with `0 < delete_time < now`. Returns the count.
    async fn remove_expired(&self, now: i64) -> Result<u64>;

    /// Number of stored records.
    async fn count(&self) -> Result<u64>;
}
