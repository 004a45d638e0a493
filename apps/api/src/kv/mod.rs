//! Key-value record storage.
//!
//! `RedisKvStore` prefixes every key with the configured namespace so the
//! service can share a Redis instance; callers work with unprefixed keys.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use thiserror::Error;
use tracing::info;

#[cfg(test)]
pub mod memory;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("key-value backend error: {0}")]
    Backend(String),
}

/// One entry returned by `KvStore::list`. `value` is `None` unless values
/// were requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub key: String,
    pub value: Option<String>,
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError>;

    async fn delete(&self, key: &str) -> Result<(), KvError>;

    /// Lists keys matching a glob `pattern` (`*` wildcards only).
    async fn list(&self, pattern: &str, include_values: bool) -> Result<Vec<KvEntry>, KvError>;
}

#[derive(Clone)]
pub struct RedisKvStore {
    conn: MultiplexedConnection,
    namespace: String,
}

impl RedisKvStore {
    pub async fn connect(client: &redis::Client, namespace: &str) -> Result<Self, KvError> {
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Redis connection established (namespace: {namespace})");
        Ok(Self {
            conn,
            namespace: namespace.to_string(),
        })
    }

    fn full_key(&self, key: &str) -> String {
        namespaced(&self.namespace, key)
    }

    fn strip_namespace<'a>(&self, key: &'a str) -> &'a str {
        strip_namespace(&self.namespace, key)
    }
}

fn namespaced(namespace: &str, key: &str) -> String {
    format!("{namespace}:{key}")
}

/// Keys outside `namespace` come back unchanged.
fn strip_namespace<'a>(namespace: &str, key: &'a str) -> &'a str {
    key.strip_prefix(namespace)
        .and_then(|k| k.strip_prefix(':'))
        .unwrap_or(key)
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.conn.clone();
        Ok(conn.get::<_, Option<String>>(self.full_key(key)).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(self.full_key(key), value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.full_key(key)).await?;
        Ok(())
    }

    async fn list(&self, pattern: &str, include_values: bool) -> Result<Vec<KvEntry>, KvError> {
        let mut conn = self.conn.clone();
        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter = conn
                .scan_match::<_, String>(self.full_key(pattern))
                .await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }
        // SCAN may return a key more than once
        keys.sort();
        keys.dedup();

        let values: Vec<Option<String>> = if include_values && !keys.is_empty() {
            redis::cmd("MGET").arg(&keys).query_async(&mut conn).await?
        } else {
            vec![None; keys.len()]
        };

        if values.len() != keys.len() {
            return Err(KvError::Backend(format!(
                "MGET returned {} values for {} keys",
                values.len(),
                keys.len()
            )));
        }

        Ok(keys
            .iter()
            .zip(values)
            .map(|(key, value)| KvEntry {
                key: self.strip_namespace(key).to_string(),
                value,
            })
            .collect())
    }
}
