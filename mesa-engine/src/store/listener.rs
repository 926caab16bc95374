//! Remote change listener
//!
//! 监听远端变更信号，触发对应集合的重新拉取与合并。

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::EntityStore;

/// Applies remote-origin changes to the store
pub struct SyncListener {
    store: EntityStore,
    shutdown: CancellationToken,
}

impl SyncListener {
    pub fn new(store: EntityStore, shutdown: CancellationToken) -> Self {
        Self { store, shutdown }
    }

    /// Run until shutdown or until the change channel closes
    pub async fn run(self) {
        tracing::info!(terminal_id = %self.store.terminal_id(), "Sync listener started");
        let mut changes = self.store.inner.remote.changes();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Sync listener received shutdown signal");
                    break;
                }
                signal = changes.recv() => match signal {
                    Ok(signal) => {
                        // errors are already reported to sync-error observers
                        if let Err(e) = self.store.refresh(signal.collection).await {
                            tracing::warn!(collection = %signal.collection, error = %e, "Refetch after change signal failed");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Change signals lagged, reloading everything");
                        if let Err(e) = self.store.load_all().await {
                            tracing::warn!(error = %e, "Reload after lag failed");
                        }
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("Change channel closed, sync listener stopping");
                        break;
                    }
                },
            }
        }
    }
}
