//! In-process paste storage.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::backend::PasteBackend;
use super::model::Paste;
use crate::error::{GuardError, Result};

/// Paste storage held in a map. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryPasteBackend {
    pastes: RwLock<HashMap<String, Paste>>,
}

impl MemoryPasteBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PasteBackend for MemoryPasteBackend {
    async fn insert(&self, paste: &Paste) -> Result<()> {
        let mut pastes = self.pastes.write();
        if pastes.contains_key(&paste.id) {
            return Err(GuardError::DuplicateId(paste.id.clone()));
        }
        pastes.insert(paste.id.clone(), paste.clone());
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<Paste>> {
        Ok(self.pastes.read().get(id).cloned())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.pastes.write().remove(id).is_some())
    }

    async fn take(&self, id: &str) -> Result<Option<Paste>> {
        Ok(self.pastes.write().remove(id))
    }

    async fn remove_expired(&self, now: i64) -> Result<u64> {
        let mut pastes = self.pastes.write();
        let before = pastes.len();
        pastes.retain(|_, paste| !paste.is_expired_at(now));
        Ok((before - pastes.len()) as u64)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.pastes.read().len() as u64)
    }
}
