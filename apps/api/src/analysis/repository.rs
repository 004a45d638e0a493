//! `ResumeRecord` persistence on top of the key-value store.
//!
//! Records live under `resume:<id>`. Writes overwrite, so saving the same
//! record twice is harmless; the pipeline relies on that for the draft →
//! final transition.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::analysis::error::{excerpt, EXCERPT_CHARS};
use crate::analysis::models::ResumeRecord;
use crate::kv::{KvError, KvStore};

const KEY_PREFIX: &str = "resume:";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("key-value store error: {0}")]
    Store(#[from] KvError),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The key exists but its value is not a valid record.
    #[error("stored record {id} is malformed ({detail}). Stored value: {excerpt}")]
    Corrupt {
        id: Uuid,
        detail: String,
        excerpt: String,
    },
}

pub fn record_key(id: Uuid) -> String {
    format!("{KEY_PREFIX}{id}")
}

#[derive(Clone)]
pub struct ResumeRepository {
    kv: Arc<dyn KvStore>,
}

impl ResumeRepository {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn save(&self, record: &ResumeRecord) -> Result<(), RepositoryError> {
        let value = serde_json::to_string(record)?;
        self.kv.set(&record_key(record.id), &value).await?;
        Ok(())
    }

    /// `Ok(None)` when no record exists for `id`.
    pub async fn get(&self, id: Uuid) -> Result<Option<ResumeRecord>, RepositoryError> {
        let Some(raw) = self.kv.get(&record_key(id)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| RepositoryError::Corrupt {
                id,
                detail: e.to_string(),
                excerpt: excerpt(&raw, EXCERPT_CHARS),
            })
    }

    /// All records, in no particular order. Entries that fail to decode are
    /// logged and skipped.
    pub async fn list(&self) -> Result<Vec<ResumeRecord>, RepositoryError> {
        let entries = self.kv.list(&format!("{KEY_PREFIX}*"), true).await?;

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(raw) = entry.value else {
                continue;
            };
            match serde_json::from_str::<ResumeRecord>(&raw) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping malformed record at {}: {} ({:?})",
                    entry.key,
                    e,
                    excerpt(&raw, EXCERPT_CHARS)
                ),
            }
        }
        Ok(records)
    }

    /// Deletes every record key. Best effort and not atomic: a failure
    /// part-way leaves the remaining records in place.
    pub async fn delete_all(&self) -> Result<usize, RepositoryError> {
        let entries = self.kv.list(&format!("{KEY_PREFIX}*"), false).await?;
        for entry in &entries {
            self.kv.delete(&entry.key).await?;
        }
        Ok(entries.len())
    }
}
