use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::{KeyStoreBackend, KeyStoreConfig};
use crate::metrics::track_store_operation;
use crate::models::api_key::ApiKey;

/// Remembers a user's verified generation key between sessions.
#[async_trait]
pub trait KeyStore: Send + Sync {
    fn backend_name(&self) -> &'static str;
    async fn get(&self, user_id: &str) -> Result<Option<ApiKey>>;
    async fn put(&self, user_id: &str, key: &ApiKey) -> Result<()>;
    /// `false` when nothing was stored for the user.
    async fn remove(&self, user_id: &str) -> Result<bool>;
    async fn health(&self) -> Result<()>;
}

/// JSON object of user id to key, rewritten on every change.
pub struct FileKeyStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKeyStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<HashMap<String, ApiKey>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("corrupt key file {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", self.path.display())),
        }
    }

    async fn persist(&self, keys: &HashMap<String, ApiKey>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(keys)?)
            .await
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

#[async_trait]
impl KeyStore for FileKeyStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn get(&self, user_id: &str) -> Result<Option<ApiKey>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(user_id))
    }

    async fn put(&self, user_id: &str, key: &ApiKey) -> Result<()> {
        track_store_operation("local", "put_key", async {
            let _guard = self.lock.lock().await;
            let mut keys = self.load().await?;
            keys.insert(user_id.to_string(), key.clone());
            self.persist(&keys).await
        })
        .await
    }

    async fn remove(&self, user_id: &str) -> Result<bool> {
        track_store_operation("local", "remove_key", async {
            let _guard = self.lock.lock().await;
            let mut keys = self.load().await?;
            if keys.remove(user_id).is_none() {
                return Ok(false);
            }
            self.persist(&keys).await?;
            Ok(true)
        })
        .await
    }

    async fn health(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.load().await.map(|_| ())
    }
}

pub struct RedisKeyStore {
    redis: ConnectionManager,
}

impl RedisKeyStore {
    pub async fn connect(uri: &str) -> Result<Self> {
        let client = redis::Client::open(uri).context("Failed to create Redis client")?;

        tracing::info!("Attempting to connect to Redis...");
        let redis = tokio::time::timeout(Duration::from_secs(30), ConnectionManager::new(client))
            .await
            .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        let store = Self { redis };
        tokio::time::timeout(Duration::from_secs(5), store.health())
            .await
            .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");
        Ok(store)
    }

    fn key_for(user_id: &str) -> String {
        format!("api-key:{}", user_id)
    }
}

#[async_trait]
impl KeyStore for RedisKeyStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, user_id: &str) -> Result<Option<ApiKey>> {
        let mut conn = self.redis.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(Self::key_for(user_id))
            .query_async(&mut conn)
            .await
            .context("Failed to read stored API key")?;
        Ok(value.map(ApiKey::new))
    }

    async fn put(&self, user_id: &str, key: &ApiKey) -> Result<()> {
        track_store_operation("redis", "put_key", async {
            let mut conn = self.redis.clone();
            redis::cmd("SET")
                .arg(Self::key_for(user_id))
                .arg(key.expose())
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to store API key")
        })
        .await
    }

    async fn remove(&self, user_id: &str) -> Result<bool> {
        track_store_operation("redis", "remove_key", async {
            let mut conn = self.redis.clone();
            let removed: i64 = redis::cmd("DEL")
                .arg(Self::key_for(user_id))
                .query_async(&mut conn)
                .await
                .context("Failed to remove API key")?;
            Ok(removed > 0)
        })
        .await
    }

    async fn health(&self) -> Result<()> {
        let mut conn = self.redis.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .context("Redis PING failed")
    }
}

pub async fn build_key_store(config: &KeyStoreConfig) -> Result<Arc<dyn KeyStore>> {
    match config.backend {
        KeyStoreBackend::Local => {
            tracing::info!("Using local key store at {}", config.local_path);
            Ok(Arc::new(FileKeyStore::new(&config.local_path)))
        }
        KeyStoreBackend::Redis => {
            let uri = config
                .redis_uri
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("REDIS_URI is required for the redis key store"))?;
            Ok(Arc::new(RedisKeyStore::connect(uri).await?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (FileKeyStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("smartquiz-keys-{}", uuid::Uuid::new_v4()));
        (FileKeyStore::new(dir.join("keys.json")), dir)
    }

    #[tokio::test]
    async fn put_get_remove() {
        let (store, dir) = temp_store();
        let key = ApiKey::new("AIzaSyTestKey1234567890");

        assert!(store.get("alice").await.unwrap().is_none());
        store.put("alice", &key).await.unwrap();
        assert_eq!(store.get("alice").await.unwrap(), Some(key));
        assert!(store.get("bob").await.unwrap().is_none());

        assert!(store.remove("alice").await.unwrap());
        assert!(!store.remove("alice").await.unwrap());
        assert!(store.get("alice").await.unwrap().is_none());

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[test]
    fn redis_keys_are_namespaced() {
        assert_eq!(RedisKeyStore::key_for("u-1"), "api-key:u-1");
    }
}
