//! Background sweep of idle connectors

use std::sync::Weak;
use std::time::Duration;

use storelink_common::Clock;
use storelink_domain::{Result, StoreLinkError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::ConnectorRegistry;

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the periodic eviction worker.
///
/// The worker holds only a weak reference to the registry, so dropping the
/// last registry handle also ends the loop.
pub struct EvictionTask {
    task_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
}

impl EvictionTask {
    pub(crate) fn spawn<C: Clock>(
        registry: Weak<ConnectorRegistry<C>>,
        interval: Duration,
    ) -> Self {
        let cancellation = CancellationToken::new();
        let worker_cancel = cancellation.clone();
        let task_handle = tokio::spawn(async move {
            eviction_worker(registry, interval, worker_cancel).await;
        });

        info!(interval_secs = interval.as_secs(), "Connector eviction task started");
        Self { task_handle: Some(task_handle), cancellation }
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Cancel the worker and wait for it to exit.
    pub async fn stop(&mut self) -> Result<()> {
        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            tokio::time::timeout(STOP_TIMEOUT, handle)
                .await
                .map_err(|_| {
                    StoreLinkError::Internal("Eviction task did not stop within timeout".into())
                })?
                .map_err(|e| StoreLinkError::Internal(format!("Eviction task panicked: {e}")))?;
        }

        info!("Connector eviction task stopped");
        Ok(())
    }
}

impl Drop for EvictionTask {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

async fn eviction_worker<C: Clock>(
    registry: Weak<ConnectorRegistry<C>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Eviction worker cancelled");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                let Some(registry) = registry.upgrade() else {
                    debug!("Registry dropped, eviction worker exiting");
                    break;
                };
                if registry.is_closed() {
                    break;
                }

                let evicted = registry.evict_idle().await;
                if evicted > 0 {
                    debug!(evicted, "Evicted idle connectors");
                }
            }
        }
    }
}
