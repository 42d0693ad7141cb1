//! Read-only view of the platform's model-config store.
//!
//! Persistence and CRUD live elsewhere; the core only needs the active
//! configs for a user, freshly read on every top-level call so config edits
//! take effect immediately.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::ModelConfig;
use crate::error::Result;

#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// All active configs owned by `user_id`, in no particular order. The
    /// store is expected to return a consistent snapshot.
    async fn active_configs_for_user(&self, user_id: i64) -> Result<Vec<ModelConfig>>;
}

/// In-memory store backing tests and statically-configured deployments.
#[derive(Default)]
pub struct MemoryConfigStore {
    configs: RwLock<Vec<ModelConfig>>,
}

impl MemoryConfigStore {
    pub fn new(configs: Vec<ModelConfig>) -> Self {
        Self {
            configs: RwLock::new(configs),
        }
    }

    pub async fn insert(&self, config: ModelConfig) {
        self.configs.write().await.push(config);
    }

    /// Replace every config owned by the user, mirroring a config edit.
    pub async fn replace_user_configs(&self, user_id: i64, configs: Vec<ModelConfig>) {
        let mut guard = self.configs.write().await;
        guard.retain(|c| c.user_id != Some(user_id));
        guard.extend(configs);
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn active_configs_for_user(&self, user_id: i64) -> Result<Vec<ModelConfig>> {
        Ok(self
            .configs
            .read()
            .await
            .iter()
            .filter(|c| c.user_id == Some(user_id) && c.is_active)
            .cloned()
            .collect())
    }
}
