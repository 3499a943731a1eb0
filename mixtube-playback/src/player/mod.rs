//! Player capability
//!
//! A player wraps one video backend instance (one embedded widget). The
//! engine only drives it through this trait; how a backend renders, fades
//! or talks to its service stays inside the implementation.

pub mod factory;
pub mod simulated;

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub use factory::{DefaultPlayerFactory, PlayerConstructor, PlayerOptions};
pub use simulated::SimulatedPlayer;

/// Outcome of a DRM / region restriction probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrmReport {
    pub playable: bool,
    /// Backend specific reason when not playable
    pub code: Option<String>,
}

impl DrmReport {
    pub fn playable() -> Self {
        Self {
            playable: true,
            code: None,
        }
    }

    pub fn blocked(code: impl Into<String>) -> Self {
        Self {
            playable: false,
            code: Some(code.into()),
        }
    }
}

/// One video backend instance
#[async_trait]
pub trait Player: Send + Sync {
    /// Provider this player belongs to; selects the pool it returns to
    fn provider(&self) -> &str;

    /// Load (cue) a video by its opaque id, without starting it
    async fn load_by_id(&self, id: &str) -> Result<()>;

    /// Start the loaded video from the beginning
    fn play(&self);

    fn pause(&self);

    fn resume(&self);

    /// Stop playback; the player may be reused for another video afterward
    fn stop(&self);

    /// Fade the player in over `duration`; resolves when the fade completes
    async fn fade_in(&self, duration: Duration);

    /// Fade the player out over `duration`; resolves when the fade completes
    async fn fade_out(&self, duration: Duration);

    /// Current playback position
    fn current_time(&self) -> Duration;

    /// Media duration of the loaded video
    fn duration(&self) -> Duration;

    /// Probe whether a video would be blocked, without loading it for playback
    async fn check_drm_by_id(&self, id: &str) -> Result<DrmReport>;
}

/// Builds players for providers
#[async_trait]
pub trait PlayerFactory: Send + Sync {
    fn can_create_player(&self, provider: &str) -> bool;

    /// Construct a ready-to-use player. Construction may be asynchronous
    /// (e.g. waiting for a widget to report readiness).
    async fn new_player(&self, provider: &str) -> Result<Arc<dyn Player>>;
}
