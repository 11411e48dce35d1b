//! Background jobs and startup wiring.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{StorageBackend, StorageConfig};
use crate::error::Result;
use crate::paste::{MemoryPasteBackend, PasteBackend, PasteStore, SqlitePasteBackend};
use crate::ratelimit::SweepHandle;

/// Build the storage backend named in `config`.
pub async fn build_backend(config: &StorageConfig) -> Result<Arc<dyn PasteBackend>> {
    match config.backend {
        StorageBackend::Memory => {
            info!("Using in-memory paste storage");
            Ok(Arc::new(MemoryPasteBackend::new()))
        }
        StorageBackend::Sqlite => {
            let backend =
                SqlitePasteBackend::connect(&config.database_url, config.max_connections).await?;
            Ok(Arc::new(backend))
        }
    }
}

/// Spawn the job that deletes expired pastes every `period`.
///
/// The first pass runs one period after start. A failed pass is logged and
/// retried on the next tick.
pub fn spawn_expiry_job(store: PasteStore, period: Duration) -> SweepHandle {
    info!(period_secs = period.as_secs(), "Starting expired paste cleanup");

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.delete_expired().await {
                Ok(removed) => debug!(removed = removed, "Expired paste cleanup done"),
                Err(e) => warn!(error = %e, "Expired paste cleanup failed"),
            }
        }
    });

    SweepHandle::new(task)
}
