//! Provider → player constructor registry

use super::simulated::{self, SimulatedPlayer};
use super::{Player, PlayerFactory};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use mixtube_common::{EngineSettings, FadeCurve, MediaQuality};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Options every constructed player receives
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerOptions {
    /// Caps the media duration reported by the player (testing aid)
    pub media_duration: Option<Duration>,
    pub media_quality: MediaQuality,
    pub fade_curve: FadeCurve,
}

impl PlayerOptions {
    /// Options for playback players, honoring the debug overrides
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            media_duration: settings.debug.media_duration(),
            media_quality: settings.debug.media_quality,
            fade_curve: settings.fade_curve,
        }
    }
}

/// Asynchronous player constructor registered for one provider
pub type PlayerConstructor =
    Arc<dyn Fn(PlayerOptions) -> BoxFuture<'static, Result<Arc<dyn Player>>> + Send + Sync>;

/// Factory mapping provider names to constructors
pub struct DefaultPlayerFactory {
    constructors: HashMap<String, PlayerConstructor>,
    options: PlayerOptions,
}

impl DefaultPlayerFactory {
    /// Factory with no provider registered
    pub fn new(options: PlayerOptions) -> Self {
        Self {
            constructors: HashMap::new(),
            options,
        }
    }

    /// Factory serving the simulated backend
    pub fn with_simulated(options: PlayerOptions) -> Self {
        let mut factory = Self::new(options);
        factory.register(
            simulated::PROVIDER,
            Arc::new(|options| SimulatedPlayer::create(options).boxed()),
        );
        factory
    }

    pub fn register(&mut self, provider: impl Into<String>, constructor: PlayerConstructor) {
        self.constructors.insert(provider.into(), constructor);
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}

#[async_trait]
impl PlayerFactory for DefaultPlayerFactory {
    fn can_create_player(&self, provider: &str) -> bool {
        self.constructors.contains_key(provider)
    }

    async fn new_player(&self, provider: &str) -> Result<Arc<dyn Player>> {
        let constructor = self
            .constructors
            .get(provider)
            .cloned()
            .ok_or_else(|| Error::UnsupportedProvider(provider.to_string()))?;

        debug!("Constructing {} player", provider);
        constructor(self.options.clone()).await
    }
}
