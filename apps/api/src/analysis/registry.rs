//! Tracks in-flight submissions so HTTP clients can poll their progress.
//!
//! The registry only holds status receivers. A finished submission stays
//! pollable for the retention window and is then released. Abandoning a
//! submission drops its receiver early; the background task keeps running to
//! completion and its result is discarded. A draft left behind that way is
//! only removed by the admin wipe.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::analysis::models::JobContext;
use crate::analysis::orchestrator::{AnalysisOrchestrator, AnalysisStatus};
use crate::storage::FilePayload;

/// Retention used when none is configured.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(15 * 60);

#[derive(Clone)]
pub struct AnalysisRegistry {
    tracked: Arc<RwLock<HashMap<Uuid, watch::Receiver<AnalysisStatus>>>>,
    retention: Duration,
}

impl Default for AnalysisRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl AnalysisRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            tracked: Arc::default(),
            retention,
        }
    }

    /// Starts `orchestrator` in the background and begins tracking it.
    /// Returns the initial status, which carries the submission id.
    pub async fn start(
        &self,
        orchestrator: AnalysisOrchestrator,
        document: Option<FilePayload>,
        context: JobContext,
    ) -> AnalysisStatus {
        let id = orchestrator.id();
        let receiver = orchestrator.subscribe();
        let initial = receiver.borrow().clone();
        self.tracked.write().await.insert(id, receiver);

        let tracked = self.tracked.clone();
        let retention = self.retention;
        tokio::spawn(async move {
            // Failures are already published on the status channel.
            let _ = orchestrator.submit(document, context).await;

            tokio::time::sleep(retention).await;
            if tracked.write().await.remove(&id).is_some() {
                debug!("Analysis {id}: status released after retention");
            }
        });

        initial
    }

    pub async fn status(&self, id: Uuid) -> Option<AnalysisStatus> {
        self.tracked
            .read()
            .await
            .get(&id)
            .map(|receiver| receiver.borrow().clone())
    }

    /// Stops observing a submission. Returns `false` if it was not tracked.
    pub async fn abandon(&self, id: Uuid) -> bool {
        let removed = self.tracked.write().await.remove(&id).is_some();
        if removed {
            info!("Analysis {id} abandoned by caller");
        }
        removed
    }

    /// Waits for a tracked submission to reach a terminal state.
    #[cfg(test)]
    pub async fn wait_terminal(&self, id: Uuid) -> Option<AnalysisStatus> {
        let mut receiver = self.tracked.read().await.get(&id)?.clone();
        let status = receiver.wait_for(|s| s.state.is_terminal()).await.ok()?;
        Some(status.clone())
    }
}
