//! Administrative wipe: removes every uploaded object and every record.
//! Best effort and not atomic.

use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::repository::ResumeRepository;
use crate::errors::AppError;
use crate::storage::ObjectStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WipeReport {
    pub objects_deleted: usize,
    pub objects_failed: usize,
    pub records_deleted: usize,
}

/// Objects are deleted one path at a time; a failed delete is logged and
/// skipped. Records are cleared afterwards.
pub async fn wipe_all(
    store: &dyn ObjectStore,
    repository: &ResumeRepository,
) -> Result<WipeReport, AppError> {
    let paths = store.list().await?;

    let mut objects_deleted = 0;
    let mut objects_failed = 0;
    for path in &paths {
        match store.delete(path).await {
            Ok(()) => objects_deleted += 1,
            Err(e) => {
                warn!("Wipe: could not delete {path}: {e}");
                objects_failed += 1;
            }
        }
    }

    let records_deleted = repository.delete_all().await?;

    info!(
        "Wipe finished: {} objects deleted, {} failed, {} records deleted",
        objects_deleted, objects_failed, records_deleted
    );

    Ok(WipeReport {
        objects_deleted,
        objects_failed,
        records_deleted,
    })
}
