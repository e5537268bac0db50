use async_trait::async_trait;
use redis::{Client, aio::ConnectionManager};
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-wide key/value configuration cache.
#[async_trait]
pub trait ConfigCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error>;
    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct RedisService {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisService {
    pub async fn new(config: &crate::config::RedisConfig) -> Result<Self, anyhow::Error> {
        tracing::info!(url = %config.url, "Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        // Use ConnectionManager for automatic reconnection
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }
}

#[async_trait]
impl ConfigCache for RedisService {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read config key {}: {}", key, e))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}

#[derive(Default)]
pub struct MockConfigCache {
    pub entries: Mutex<HashMap<String, String>>,
    pub failing: Mutex<bool>,
}

impl MockConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut flag) = self.failing.lock() {
            *flag = failing;
        }
    }

    fn is_failing(&self) -> bool {
        self.failing.lock().map(|f| *f).unwrap_or(true)
    }
}

#[async_trait]
impl ConfigCache for MockConfigCache {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        if self.is_failing() {
            return Err(anyhow::anyhow!("Config cache unavailable"));
        }
        let entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock cache poisoned: {}", e))?;
        Ok(entries.get(key).cloned())
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        if self.is_failing() {
            return Err(anyhow::anyhow!("Config cache unavailable"));
        }
        Ok(())
    }
}
