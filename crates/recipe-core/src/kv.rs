//! Minimal string key-value store used for the reminder entry.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Remove all `keys`; missing keys are ignored.
    async fn delete(&self, keys: &[&str]) -> Result<()>;
}

/// In-process store for tests and local development.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

#[cfg(feature = "kv")]
pub use redis_store::RedisStore;

#[cfg(feature = "kv")]
mod redis_store {
    use super::KeyValueStore;
    use crate::error::Result;
    use async_trait::async_trait;
    use redis::aio::ConnectionManager;
    use redis::AsyncCommands;
    use tracing::info;

    /// Redis-backed store (Vercel KV, Upstash and friends speak the same protocol).
    #[derive(Clone)]
    pub struct RedisStore {
        connection: ConnectionManager,
    }

    impl RedisStore {
        /// Connect eagerly so a bad `KV_URL` is reported at startup.
        pub async fn connect(url: &str) -> Result<Self> {
            let client = redis::Client::open(url)?;
            let connection = ConnectionManager::new(client).await?;
            info!("Connected to key-value store");
            Ok(Self { connection })
        }
    }

    #[async_trait]
    impl KeyValueStore for RedisStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            let mut con = self.connection.clone();
            let value: Option<String> = con.get(key).await?;
            Ok(value)
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            let mut con = self.connection.clone();
            con.set::<_, _, ()>(key, value).await?;
            Ok(())
        }

        async fn delete(&self, keys: &[&str]) -> Result<()> {
            if keys.is_empty() {
                return Ok(());
            }
            let mut con = self.connection.clone();
            con.del::<_, ()>(keys.to_vec()).await?;
            Ok(())
        }
    }
}
