//! Engine settings and configuration file resolution

use crate::{Error, FadeCurve, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable naming the settings file
pub const CONFIG_ENV_VAR: &str = "MIXTUBE_CONFIG";

/// Playback quality a backend should force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaQuality {
    #[default]
    Default,
    Low,
}

/// Settings meant for testing the engine against short media
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSettings {
    /// Caps every media duration, in seconds. Absent or negative (`-1`)
    /// means the real duration is used.
    pub media_duration_secs: Option<f64>,

    /// Forced playback quality
    pub media_quality: MediaQuality,
}

impl DebugSettings {
    /// Media duration cap, if one is configured
    pub fn media_duration(&self) -> Option<Duration> {
        self.media_duration_secs
            .filter(|secs| *secs >= 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// A non-negative cap must be a representable duration
    fn validate(&self) -> Result<()> {
        match self.media_duration_secs {
            Some(secs) if secs.is_nan() || (secs >= 0.0 && self.media_duration().is_none()) => {
                Err(Error::Config(format!(
                    "debug.media_duration_secs out of range: {}",
                    secs
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Engine settings
///
/// Everything here is plain data. The entry producers are closures and are
/// handed to the engine separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Target fade duration between two videos, clamped per slot to the
    /// remaining media time
    pub transition_duration_ms: u64,

    /// Period of the playback position sampling that drives cues
    pub cues_poll_interval_ms: u64,

    /// Events buffered per subscriber before it starts lagging
    pub event_capacity: usize,

    /// Players kept alive per provider by the DRM checker
    pub drm_max_players: usize,

    /// Curve used by player backends for fades
    pub fade_curve: FadeCurve,

    pub debug: DebugSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            transition_duration_ms: 5000,
            cues_poll_interval_ms: 100,
            event_capacity: 100,
            drm_max_players: 4,
            fade_curve: FadeCurve::default(),
            debug: DebugSettings::default(),
        }
    }
}

impl EngineSettings {
    pub fn transition_duration(&self) -> Duration {
        Duration::from_millis(self.transition_duration_ms)
    }

    pub fn cues_poll_interval(&self) -> Duration {
        Duration::from_millis(self.cues_poll_interval_ms)
    }

    /// Reject values the engine can not run with
    pub fn validate(&self) -> Result<()> {
        if self.cues_poll_interval_ms == 0 {
            return Err(Error::Config(
                "cues_poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config(
                "event_capacity must be greater than zero".to_string(),
            ));
        }
        if self.drm_max_players == 0 {
            return Err(Error::Config(
                "drm_max_players must be greater than zero".to_string(),
            ));
        }
        self.debug.validate()
    }

    /// Parse settings from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: EngineSettings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Settings file resolution, in priority order:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. `<user config dir>/mixtube/config.toml`, when it exists
///
/// Returns `None` when no file applies and compiled defaults should be used.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path().filter(|path| path.exists())
}

/// Platform default location of the settings file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mixtube").join("config.toml"))
}

/// Load settings from `path`, or compiled defaults when `path` is `None`
pub fn load_settings(path: Option<&Path>) -> Result<EngineSettings> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Cannot read {}: {}", path.display(), e))
            })?;
            let settings = EngineSettings::from_toml(&text)?;
            info!("Loaded engine settings from {}", path.display());
            Ok(settings)
        }
        None => {
            debug!("No settings file, using defaults");
            Ok(EngineSettings::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = EngineSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.transition_duration(), Duration::from_secs(5));
        assert_eq!(settings.cues_poll_interval(), Duration::from_millis(100));
        assert_eq!(settings.debug.media_duration(), None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = EngineSettings::from_toml(
            r#"
            transition_duration_ms = 2000

            [debug]
            media_duration_secs = 6.0
            media_quality = "low"
            "#,
        )
        .unwrap();

        assert_eq!(settings.transition_duration_ms, 2000);
        assert_eq!(settings.cues_poll_interval_ms, 100);
        assert_eq!(settings.debug.media_duration(), Some(Duration::from_secs(6)));
        assert_eq!(settings.debug.media_quality, MediaQuality::Low);
    }

    #[test]
    fn test_negative_media_duration_means_real_duration() {
        let debug = DebugSettings {
            media_duration_secs: Some(-1.0),
            media_quality: MediaQuality::Default,
        };
        assert_eq!(debug.media_duration(), None);
    }

    #[test]
    fn test_huge_media_duration_rejected() {
        let debug = DebugSettings {
            media_duration_secs: Some(1e30),
            media_quality: MediaQuality::Default,
        };
        assert_eq!(debug.media_duration(), None);

        let result = EngineSettings::from_toml("[debug]\nmedia_duration_secs = 1e30");
        assert!(matches!(result, Err(Error::Config(_))));

        let result = EngineSettings::from_toml("[debug]\nmedia_duration_secs = inf");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let err = EngineSettings::from_toml("cues_poll_interval_ms = 0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_cli_argument_wins() {
        let path = resolve_config_path(Some(Path::new("/tmp/explicit.toml")), "MIXTUBE_TEST_UNSET");
        assert_eq!(path, Some(PathBuf::from("/tmp/explicit.toml")));
    }
}
