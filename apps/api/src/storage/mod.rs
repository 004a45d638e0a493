//! Object storage for uploaded resumes and their rendered preview images.
//!
//! The pipeline only sees the `ObjectStore` trait. Production wires in
//! `S3ObjectStore` (AWS or MinIO); tests use the in-memory store.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[cfg(test)]
pub mod memory;

/// Every uploaded object lives under this prefix.
pub const UPLOAD_PREFIX: &str = "uploads/";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A named file payload on its way into (or out of) storage.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl FilePayload {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Location of an object after a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, file: &FilePayload) -> Result<StoredObject, StorageError>;

    /// Returns `Ok(None)` when nothing is stored at `path`.
    async fn read(&self, path: &str) -> Result<Option<Bytes>, StorageError>;

    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// Lists the paths of every uploaded object.
    async fn list(&self) -> Result<Vec<String>, StorageError>;
}

/// Builds a unique storage key for an upload, keeping a readable file name.
pub fn object_key(file_name: &str) -> String {
    let cleaned: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = if cleaned.trim_matches('_').is_empty() {
        "file".to_string()
    } else {
        cleaned
    };
    format!("{UPLOAD_PREFIX}{}/{cleaned}", Uuid::new_v4())
}

/// S3-compatible object store.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Creates the bucket if it does not exist yet. Local MinIO starts empty.
    pub async fn ensure_bucket(&self) -> Result<(), StorageError> {
        match self.client.create_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                info!("Created bucket {}", self.bucket);
                Ok(())
            }
            Err(err) => {
                let already_there = err
                    .as_service_error()
                    .map(|se| se.is_bucket_already_exists() || se.is_bucket_already_owned_by_you())
                    == Some(true);
                if already_there {
                    Ok(())
                } else {
                    Err(StorageError::Backend(format!(
                        "failed to create bucket {}: {err}",
                        self.bucket
                    )))
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(&self, file: &FilePayload) -> Result<StoredObject, StorageError> {
        let key = object_key(&file.name);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(file.bytes.clone()))
            .content_type(&file.content_type)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("S3 upload failed: {e}")))?;

        info!("Uploaded {} bytes to s3://{}/{}", file.bytes.len(), self.bucket, key);
        Ok(StoredObject { path: key })
    }

    async fn read(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                if err.as_service_error().map(|se| se.is_no_such_key()) == Some(true) {
                    return Ok(None);
                }
                return Err(StorageError::Backend(format!("S3 read failed: {err}")));
            }
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(format!("S3 body read failed: {e}")))?;
        Ok(Some(body.into_bytes()))
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("S3 delete failed: {e}")))?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(UPLOAD_PREFIX)
            .into_paginator()
            .send();

        let mut paths = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StorageError::Backend(format!("S3 list failed: {e}")))?;
            paths.extend(
                page.contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );
        }
        Ok(paths)
    }
}
