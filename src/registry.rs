//! Adapter selection and per-user caching.
//!
//! The registry holds one read-only set of system adapters built at startup
//! and a per-user cache rebuilt wholesale from the config store. Reload
//! swaps an `Arc` under a write lock, so resolvers either see the complete
//! old set or the complete new one, never a half-populated cache.
//!
//! Lookup is structured: exact config-name match, then group lookup, then
//! the flagged default, then a deterministic first (priority descending,
//! config id ascending). No key-string heuristics.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::adapter::ProviderAdapter;
use crate::config::ModelConfig;
use crate::error::{AiError, Result};
use crate::factory::AdapterFactory;
use crate::store::ConfigStore;

/// A live adapter paired with the config it was built from.
#[derive(Clone, Debug)]
pub struct AdapterHandle {
    pub config: Arc<ModelConfig>,
    pub adapter: Arc<dyn ProviderAdapter>,
}

impl AdapterHandle {
    fn build(config: ModelConfig) -> Result<Self> {
        let config = Arc::new(config);
        let adapter = AdapterFactory::build(config.clone())?;
        Ok(Self { config, adapter })
    }
}

/// One owner's adapters (a user's, or the system set), ordered
/// deterministically: priority descending, then config id ascending.
pub struct AdapterSet {
    handles: Vec<AdapterHandle>,
    default_index: Option<usize>,
    group_defaults: HashMap<String, usize>,
}

impl AdapterSet {
    /// Build handles for every config, skipping records that fail validation
    /// or construction (each skip is logged, not fatal — one broken config
    /// must not take down the rest).
    pub fn from_configs(configs: Vec<ModelConfig>) -> Self {
        let mut configs = configs;
        configs.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));

        let mut handles = Vec::with_capacity(configs.len());
        for config in configs {
            let (id, name) = (config.id, config.name.clone());
            match AdapterHandle::build(config) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    tracing::warn!(config_id = id, name = %name, error = %err, "skipping unusable config");
                }
            }
        }

        let default_index = handles.iter().position(|h| h.config.is_default);
        let mut group_defaults = HashMap::new();
        for (index, handle) in handles.iter().enumerate() {
            if handle.config.is_group_default {
                if let Some(group) = &handle.config.group_name {
                    group_defaults.entry(group.clone()).or_insert(index);
                }
            }
        }

        Self {
            handles,
            default_index,
            group_defaults,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.handles
            .iter()
            .map(|h| h.config.name.clone())
            .collect()
    }

    /// Resolve within this set. With a name: exact config-name match
    /// (case-insensitive), then the group of that name (group default
    /// first, then its best-ranked member). Without: the flagged default,
    /// else the first handle in deterministic order.
    fn resolve(&self, requested: Option<&str>) -> Option<&AdapterHandle> {
        match requested {
            Some(name) => {
                if let Some(handle) = self
                    .handles
                    .iter()
                    .find(|h| h.config.name.eq_ignore_ascii_case(name))
                {
                    return Some(handle);
                }
                if let Some(&index) = self.group_defaults.get(name) {
                    return self.handles.get(index);
                }
                self.handles
                    .iter()
                    .find(|h| h.config.group_name.as_deref() == Some(name))
            }
            None => match self.default_index {
                Some(index) => self.handles.get(index),
                None => self.handles.first(),
            },
        }
    }
}

/// System adapters plus the per-user cache.
pub struct AdapterRegistry {
    system: AdapterSet,
    users: RwLock<HashMap<i64, Arc<AdapterSet>>>,
}

impl AdapterRegistry {
    /// Build the system set once at startup. System configs are read-only
    /// afterwards and need no locking.
    pub fn new(system_configs: Vec<ModelConfig>) -> Self {
        Self {
            system: AdapterSet::from_configs(system_configs),
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Replace-all reload of one user's adapters from the store. The new set
    /// is fully built before the lock is taken.
    pub async fn reload_user(&self, user_id: i64, store: &dyn ConfigStore) -> Result<()> {
        let configs = store.active_configs_for_user(user_id).await?;
        tracing::debug!(user_id, count = configs.len(), "reloading user adapters");
        let set = Arc::new(AdapterSet::from_configs(configs));
        self.users.write().await.insert(user_id, set);
        Ok(())
    }

    /// Resolve an adapter for `(requested name, user)`.
    ///
    /// A user's own set takes precedence; with no name, a non-empty user set
    /// always answers (its default or deterministic first), so user
    /// configuration fully overrides system defaults without callers
    /// knowing adapter identifiers. Everything else falls back to the
    /// system set.
    pub async fn resolve(
        &self,
        requested: Option<&str>,
        user_id: Option<i64>,
    ) -> Result<AdapterHandle> {
        let user_set = match user_id {
            Some(id) => self.users.read().await.get(&id).cloned(),
            None => None,
        };

        if let Some(set) = &user_set {
            if let Some(handle) = set.resolve(requested) {
                return Ok(handle.clone());
            }
        }

        if let Some(handle) = self.system.resolve(requested) {
            return Ok(handle.clone());
        }

        let mut available = user_set.map(|set| set.names()).unwrap_or_default();
        available.extend(self.system.names());
        Err(AiError::NoAdapterAvailable {
            requested: requested.map(str::to_string),
            available,
        })
    }

    /// Every adapter name visible to the user (their own first, then the
    /// system's), for diagnostics.
    pub async fn available_names(&self, user_id: Option<i64>) -> Vec<String> {
        let mut names = match user_id {
            Some(id) => self
                .users
                .read()
                .await
                .get(&id)
                .map(|set| set.names())
                .unwrap_or_default(),
            None => Vec::new(),
        };
        names.extend(self.system.names());
        names
    }
}
