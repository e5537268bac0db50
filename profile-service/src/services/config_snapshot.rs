//! Process-wide configuration snapshot and its background refresher.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::redis::ConfigCache;
use crate::models::config_snapshot::{TNC_CONFIG_KEY, USER_READ_ROLES_KEY};
use crate::models::{ConfigSnapshot, Role};

/// Holder of the current snapshot. Readers get an `Arc` that stays valid
/// however often the refresher publishes.
#[derive(Default)]
pub struct SnapshotStore {
    current: RwLock<Arc<ConfigSnapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Arc<ConfigSnapshot> {
        self.current.read().await.clone()
    }

    /// Swap in new contents, returning the new version.
    pub async fn publish(&self, tnc_config: Option<String>, user_read_roles: Vec<Role>) -> u64 {
        let mut guard = self.current.write().await;
        let version = guard.version + 1;
        *guard = Arc::new(ConfigSnapshot {
            version,
            tnc_config,
            user_read_roles,
        });
        version
    }
}

/// Periodically rebuilds the snapshot from the config cache.
pub struct ConfigRefresher {
    cache: Arc<dyn ConfigCache>,
    store: Arc<SnapshotStore>,
    interval: Duration,
}

impl ConfigRefresher {
    pub fn new(cache: Arc<dyn ConfigCache>, store: Arc<SnapshotStore>, interval: Duration) -> Self {
        Self {
            cache,
            store,
            interval,
        }
    }

    /// Read both keys and publish. On a read failure the previous snapshot
    /// stays in place; a malformed role list keeps the previous roles.
    pub async fn refresh_once(&self) -> Result<u64, anyhow::Error> {
        let tnc_config = self.cache.get(TNC_CONFIG_KEY).await?;
        let raw_roles = self.cache.get(USER_READ_ROLES_KEY).await?;

        let user_read_roles = match raw_roles.as_deref().map(serde_json::from_str::<Vec<Role>>) {
            None => Vec::new(),
            Some(Ok(roles)) => roles,
            Some(Err(e)) => {
                tracing::warn!(error = %e, key = USER_READ_ROLES_KEY, "Malformed role list, keeping previous");
                self.store.current().await.user_read_roles.clone()
            }
        };

        Ok(self.store.publish(tnc_config, user_read_roles).await)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                match self.refresh_once().await {
                    Ok(version) => tracing::debug!(version, "Config snapshot refreshed"),
                    Err(e) => tracing::warn!(error = %e, "Config refresh failed, keeping previous snapshot"),
                }
            }
        })
    }
}
