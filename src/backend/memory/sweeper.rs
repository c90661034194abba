//! Expiry Sweep Task
//!
//! Background task that periodically drops expired entries from a memory store.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::MemoryStore;

/// Spawns a task that sweeps `store` every `interval`.
///
/// The task holds only a weak reference and stops on its own once the store
/// has been dropped. The returned handle can abort it sooner.
///
/// Must be called from within a tokio runtime.
pub fn spawn_expiry_sweep(store: Weak<RwLock<MemoryStore>>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Starting memory backend expiry sweep");

        loop {
            tokio::time::sleep(interval).await;

            let Some(store) = store.upgrade() else {
                debug!("Memory store dropped, stopping expiry sweep");
                break;
            };

            let removed = store.write().await.cleanup_expired();
            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    })
}
