//! Simulated player backend
//!
//! Plays "videos" against the tokio clock so the engine can run and be
//! tested without a browser. Video ids encode the behavior:
//! - `fail:<reason>`: loading is rejected
//! - `drm:<code>`: the video is blocked (DRM probe reports it, loading fails)
//! - `<name>@<seconds>`: media lasts `<seconds>`
//! - anything else: media lasts three minutes

use super::factory::PlayerOptions;
use super::{DrmReport, Player};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

/// Provider name served by this backend
pub const PROVIDER: &str = "simulated";

const DEFAULT_MEDIA_DURATION: Duration = Duration::from_secs(180);
const LOAD_LATENCY: Duration = Duration::from_millis(50);
const FADE_STEP: Duration = Duration::from_millis(50);

/// Process-wide backend handshake, computed once and shared by every player
static BACKEND: OnceCell<BackendInfo> = OnceCell::const_new();

#[derive(Debug)]
pub struct BackendInfo {
    pub ready_at: DateTime<Utc>,
}

/// Wait for the backend to be ready; only the first caller performs the
/// handshake.
pub async fn backend_ready() -> &'static BackendInfo {
    BACKEND
        .get_or_init(|| async {
            tokio::task::yield_now().await;
            info!("Simulated player backend ready");
            BackendInfo {
                ready_at: Utc::now(),
            }
        })
        .await
}

/// What a video id asks the simulation to do
#[derive(Debug, Clone, PartialEq)]
struct VideoBehavior {
    rejection: Option<String>,
    drm_code: Option<String>,
    duration: Duration,
}

impl VideoBehavior {
    fn parse(id: &str) -> Self {
        let mut behavior = VideoBehavior {
            rejection: None,
            drm_code: None,
            duration: DEFAULT_MEDIA_DURATION,
        };

        if let Some(reason) = id.strip_prefix("fail:") {
            behavior.rejection = Some(reason.to_string());
        } else if let Some(code) = id.strip_prefix("drm:") {
            behavior.drm_code = Some(code.to_string());
            behavior.rejection = Some(format!("blocked ({})", code));
        }

        if let Some((_, secs)) = id.rsplit_once('@') {
            if let Some(duration) = secs
                .parse::<f64>()
                .ok()
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            {
                behavior.duration = duration;
            }
        }

        behavior
    }
}

#[derive(Debug, Clone, Copy)]
enum Clock {
    Idle,
    Running { since: Instant, offset: Duration },
    Paused { at: Duration },
}

impl Clock {
    fn position(&self) -> Duration {
        match *self {
            Clock::Idle => Duration::ZERO,
            Clock::Running { since, offset } => offset + since.elapsed(),
            Clock::Paused { at } => at,
        }
    }
}

#[derive(Debug)]
struct SimState {
    video_id: Option<String>,
    media_duration: Duration,
    clock: Clock,
    volume: f32,
    fade_generation: u64,
}

/// A player whose playback position follows the tokio clock
pub struct SimulatedPlayer {
    instance: Uuid,
    options: PlayerOptions,
    state: Mutex<SimState>,
}

impl SimulatedPlayer {
    pub fn new(options: PlayerOptions) -> Self {
        Self {
            instance: Uuid::new_v4(),
            options,
            state: Mutex::new(SimState {
                video_id: None,
                media_duration: Duration::ZERO,
                clock: Clock::Idle,
                volume: 0.0,
                fade_generation: 0,
            }),
        }
    }

    /// Constructor registered in the player factory
    pub async fn create(options: PlayerOptions) -> Result<Arc<dyn Player>> {
        backend_ready().await;
        let player = SimulatedPlayer::new(options);
        debug!("Simulated player {} created", player.instance);
        Ok(Arc::new(player))
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance
    }

    /// Current output level, 0.0 to 1.0
    pub fn volume(&self) -> f32 {
        self.lock().volume
    }

    pub fn video_id(&self) -> Option<String> {
        self.lock().video_id.clone()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.lock().clock, Clock::Running { .. })
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn fade_to(&self, target: f32, duration: Duration) {
        let (generation, from) = {
            let mut state = self.lock();
            state.fade_generation += 1;
            (state.fade_generation, state.volume)
        };

        if duration.is_zero() {
            let mut state = self.lock();
            if state.fade_generation == generation {
                state.volume = target;
            }
            return;
        }

        let started = Instant::now();
        let mut ticker = interval(FADE_STEP);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let progress = (started.elapsed().as_secs_f32() / duration.as_secs_f32()).min(1.0);
            {
                let mut state = self.lock();
                // A newer fade took over from the level we reached
                if state.fade_generation != generation {
                    return;
                }
                state.volume = self.options.fade_curve.interpolate(from, target, progress);
            }
            if progress >= 1.0 {
                return;
            }
        }
    }
}

#[async_trait]
impl Player for SimulatedPlayer {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn load_by_id(&self, id: &str) -> Result<()> {
        tokio::time::sleep(LOAD_LATENCY).await;

        let behavior = VideoBehavior::parse(id);
        if let Some(reason) = behavior.rejection {
            return Err(Error::Load {
                video: format!("{}:{}", PROVIDER, id),
                reason,
            });
        }

        let media_duration = match self.options.media_duration {
            Some(cap) => behavior.duration.min(cap),
            None => behavior.duration,
        };

        let mut state = self.lock();
        state.video_id = Some(id.to_string());
        state.media_duration = media_duration;
        state.clock = Clock::Idle;
        debug!(
            "Player {} loaded {} ({:?}, quality {:?})",
            self.instance, id, media_duration, self.options.media_quality
        );
        Ok(())
    }

    fn play(&self) {
        let mut state = self.lock();
        state.clock = Clock::Running {
            since: Instant::now(),
            offset: Duration::ZERO,
        };
    }

    fn pause(&self) {
        let mut state = self.lock();
        if let Clock::Running { .. } = state.clock {
            let at = state.clock.position().min(state.media_duration);
            state.clock = Clock::Paused { at };
        }
    }

    fn resume(&self) {
        let mut state = self.lock();
        if let Clock::Paused { at } = state.clock {
            state.clock = Clock::Running {
                since: Instant::now(),
                offset: at,
            };
        }
    }

    fn stop(&self) {
        let mut state = self.lock();
        state.clock = Clock::Idle;
        state.volume = 0.0;
        state.fade_generation += 1;
    }

    async fn fade_in(&self, duration: Duration) {
        self.fade_to(1.0, duration).await;
    }

    async fn fade_out(&self, duration: Duration) {
        self.fade_to(0.0, duration).await;
    }

    fn current_time(&self) -> Duration {
        let state = self.lock();
        state.clock.position().min(state.media_duration)
    }

    fn duration(&self) -> Duration {
        self.lock().media_duration
    }

    async fn check_drm_by_id(&self, id: &str) -> Result<DrmReport> {
        tokio::time::sleep(LOAD_LATENCY).await;
        Ok(match VideoBehavior::parse(id).drm_code {
            Some(code) => DrmReport::blocked(code),
            None => DrmReport::playable(),
        })
    }
}
