use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use super::{object_key, FilePayload, ObjectStore, StorageError, StoredObject};

/// In-memory object store for tests. `fail_uploads_named` makes uploads of a
/// given file name fail, to exercise the upload error paths.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Bytes>>,
    fail_uploads_named: Option<String>,
}

impl MemoryObjectStore {
    pub fn failing_uploads_named(name: &str) -> Self {
        Self {
            objects: Mutex::default(),
            fail_uploads_named: Some(name.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, file: &FilePayload) -> Result<StoredObject, StorageError> {
        if self.fail_uploads_named.as_deref() == Some(file.name.as_str()) {
            return Err(StorageError::Backend("bucket unavailable".to_string()));
        }
        let path = object_key(&file.name);
        self.objects
            .lock()
            .unwrap()
            .insert(path.clone(), file.bytes.clone());
        Ok(StoredObject { path })
    }

    async fn read(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
        Ok(self.objects.lock().unwrap().get(path).cloned())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.objects.lock().unwrap().remove(path);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.objects.lock().unwrap().keys().cloned().collect())
    }
}
