//! Per-provider player pools

use super::objects_pool::{ObjectFactory, ObjectsPool, PoolStats};
use crate::player::{Player, PlayerFactory};
use crate::{Error, Result};
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Bounds and recycles player instances, one pool per provider
///
/// A player is owned by at most one caller between `get_player` and
/// `release_player`; the pool never hands out an occupied player.
pub struct PlayersPool {
    factory: Arc<dyn PlayerFactory>,
    /// Maximum live players per provider, `None` for unbounded
    max: Option<usize>,
    pools: Mutex<HashMap<String, Arc<ObjectsPool<dyn Player>>>>,
}

impl PlayersPool {
    pub fn new(factory: Arc<dyn PlayerFactory>, max: Option<usize>) -> Self {
        Self {
            factory,
            max,
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Get a player for `provider`, waiting for a release when the
    /// provider's pool is at its maximum.
    ///
    /// An empty or unsupported provider fails before anything is awaited.
    pub async fn get_player(&self, provider: &str) -> Result<Arc<dyn Player>> {
        let pool = self.pool_for(provider)?;
        pool.acquire().await
    }

    /// Give a player back to the pool of its provider
    pub fn release_player(&self, player: &Arc<dyn Player>) -> Result<()> {
        let provider = player.provider().to_string();
        let pool = self
            .lock()
            .get(&provider)
            .cloned()
            .ok_or_else(|| Error::ForeignObject(format!("no {} player was handed out", provider)))?;
        pool.release(player)
    }

    /// Occupancy of a provider's pool; `None` until the provider is first used
    pub fn stats(&self, provider: &str) -> Option<PoolStats> {
        self.lock().get(provider).map(|pool| pool.stats())
    }

    fn pool_for(&self, provider: &str) -> Result<Arc<ObjectsPool<dyn Player>>> {
        if provider.is_empty() {
            return Err(Error::InvalidInput("provider must not be empty".to_string()));
        }
        if !self.factory.can_create_player(provider) {
            return Err(Error::UnsupportedProvider(provider.to_string()));
        }

        let mut pools = self.lock();
        let pool = pools.entry(provider.to_string()).or_insert_with(|| {
            debug!("Creating {} players pool (max {:?})", provider, self.max);
            let factory = Arc::clone(&self.factory);
            let name = provider.to_string();
            let build: ObjectFactory<dyn Player> = Arc::new(move || {
                let factory = Arc::clone(&factory);
                let name = name.clone();
                async move { factory.new_player(&name).await }.boxed()
            });
            Arc::new(ObjectsPool::new(provider, build, self.max))
        });
        Ok(Arc::clone(pool))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<ObjectsPool<dyn Player>>>> {
        self.pools.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
