//! DRM checker
//!
//! Probes whether a provider would block a video (region or DRM
//! restrictions) without loading it for playback. Uses its own bounded
//! players pool so probes never compete with playback for players.

use crate::player::{DefaultPlayerFactory, DrmReport, Player, PlayerFactory, PlayerOptions};
use crate::pool::{PlayersPool, PoolStats};
use crate::Result;
use mixtube_common::{EngineSettings, Video};
use std::sync::Arc;
use tracing::{debug, error};

pub struct DrmChecker {
    players_pool: PlayersPool,
}

impl DrmChecker {
    /// Checker keeping at most `max_players` players per provider
    pub fn new(factory: Arc<dyn PlayerFactory>, max_players: usize) -> Self {
        Self {
            players_pool: PlayersPool::new(factory, Some(max_players)),
        }
    }

    /// Checker backed by simulated players. Debug media overrides do not
    /// apply to probes.
    pub fn with_simulated_players(settings: &EngineSettings) -> Self {
        let factory = DefaultPlayerFactory::with_simulated(PlayerOptions::default());
        Self::new(Arc::new(factory), settings.drm_max_players)
    }

    pub async fn check_drm(&self, video: &Video) -> Result<DrmReport> {
        let player = self.players_pool.get_player(&video.provider).await?;
        let lease = Lease {
            pool: &self.players_pool,
            player,
        };

        let report = lease.player.check_drm_by_id(&video.id).await?;
        debug!("DRM check of {}: {:?}", video, report);
        Ok(report)
    }

    pub fn stats(&self, provider: &str) -> Option<PoolStats> {
        self.players_pool.stats(provider)
    }
}

/// Returns the player to the pool however the check ends
struct Lease<'a> {
    pool: &'a PlayersPool,
    player: Arc<dyn Player>,
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.pool.release_player(&self.player) {
            error!("Failed to release DRM check player: {}", e);
        }
    }
}
