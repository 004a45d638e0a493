use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{KvEntry, KvError, KvStore};

/// In-memory key-value store for tests. `fail_writes` turns every `set`
/// into a backend error.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<BTreeMap<String, String>>,
    fail_writes: bool,
}

impl MemoryKvStore {
    pub fn failing_writes() -> Self {
        Self {
            entries: Mutex::default(),
            fail_writes: true,
        }
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        if self.fail_writes {
            return Err(KvError::Backend("store is read-only".to_string()));
        }
        self.insert_raw(key, value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list(&self, pattern: &str, include_values: bool) -> Result<Vec<KvEntry>, KvError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, value)| KvEntry {
                key: key.clone(),
                value: include_values.then(|| value.clone()),
            })
            .collect())
    }
}

/// Glob match supporting `*` only, which is all the key patterns here need.
fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !key.starts_with(first) || key.len() < first.len() + last.len() {
        return false;
    }
    if !key[first.len()..].ends_with(last) {
        return false;
    }

    let mut rest = &key[first.len()..key.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_prefix_pattern() {
        assert!(glob_match("resume:*", "resume:abc"));
        assert!(glob_match("resume:*", "resume:"));
        assert!(!glob_match("resume:*", "session:abc"));
    }

    #[test]
    fn test_glob_exact_and_infix() {
        assert!(glob_match("resume:1", "resume:1"));
        assert!(!glob_match("resume:1", "resume:12"));
        assert!(glob_match("a*c*e", "abcde"));
        assert!(!glob_match("a*c*e", "abde"));
        assert!(!glob_match("ab*ba", "aba"));
    }
}
