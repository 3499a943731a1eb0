//! Playback slot
//!
//! A slot drives one player through the lifecycle of one entry:
//!
//! `Pristine → Loading → Loaded → Running → Ending → Ended`
//!
//! While running, a poll loop samples the playback position and fires the
//! "ending soon" and "ending" cues as the position crosses them; reaching the
//! auto end position ends the slot. Ending always fires both cues exactly
//! once, fades the player out, stops it and returns it to the pool.
//!
//! Playback only begins once the slot's pause gate is open, so a slot
//! started while the sequencer is paused waits instead of playing.

use super::cues::{Cue, CueSchedule, CueTracker, Cues};
use super::gate::Gate;
use crate::player::Player;
use crate::pool::PlayersPool;
use crate::{Error, Result};
use futures::future::{self, BoxFuture, Shared};
use futures::FutureExt;
use mixtube_common::Video;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, warn};

/// Slot lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotState {
    Pristine,
    Loading,
    Loaded,
    Running,
    Ending,
    Ended,
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotState::Pristine => "pristine",
            SlotState::Loading => "loading",
            SlotState::Loaded => "loaded",
            SlotState::Running => "running",
            SlotState::Ending => "ending",
            SlotState::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// What the sequencer needs from a slot
pub trait Slot<E>: Send + Sync {
    fn entry(&self) -> &E;

    /// Load the entry's video. Memoized: every call shares the outcome of
    /// the first one.
    fn load(&self) -> BoxFuture<'static, Result<()>>;

    /// Begin playback; only legal once loaded
    fn start(&self) -> Result<()>;

    /// Terminate the slot. Memoized; resolves once the player is released.
    fn end(&self) -> BoxFuture<'static, ()>;

    /// Close the pause gate and pause the player if it is playing
    fn suspend(&self);

    /// Open the pause gate and resume the player if it was paused
    fn proceed(&self);
}

/// Maps an entry to the video to play for it
pub type VideoProducer<E> = Arc<dyn Fn(&E) -> Video + Send + Sync>;

/// Everything a [`PlaybackSlot`] is built from
pub struct SlotConfig<E> {
    pub entry: E,
    pub video_producer: VideoProducer<E>,
    pub cues: Cues,
    /// Fade duration target, clamped to the remaining media time
    pub transition_duration: Duration,
    pub cues_poll_interval: Duration,
    pub players_pool: Arc<PlayersPool>,
}

struct SlotInner {
    state: SlotState,
    player: Option<Arc<dyn Player>>,
    media_duration: Duration,
    /// Set once `play()` was issued on the player
    playing: bool,
    /// Gate wait then playback; aborted on dispose
    kick_off_task: Option<JoinHandle<()>>,
    cues_task: Option<JoinHandle<()>>,
    load: Option<Shared<BoxFuture<'static, Result<()>>>>,
    end: Option<Shared<BoxFuture<'static, ()>>>,
}

/// [`Slot`] backed by a pooled [`Player`]
pub struct PlaybackSlot<E> {
    me: Weak<PlaybackSlot<E>>,
    entry: E,
    video_producer: VideoProducer<E>,
    cues: Cues,
    transition_duration: Duration,
    cues_poll_interval: Duration,
    players_pool: Arc<PlayersPool>,
    gate: Gate,
    ending_soon_fired: AtomicBool,
    ending_fired: AtomicBool,
    inner: Mutex<SlotInner>,
}

impl<E> PlaybackSlot<E>
where
    E: Clone + fmt::Debug + Send + Sync + 'static,
{
    pub fn new(config: SlotConfig<E>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            entry: config.entry,
            video_producer: config.video_producer,
            cues: config.cues,
            transition_duration: config.transition_duration,
            cues_poll_interval: config.cues_poll_interval,
            players_pool: config.players_pool,
            gate: Gate::new(),
            ending_soon_fired: AtomicBool::new(false),
            ending_fired: AtomicBool::new(false),
            inner: Mutex::new(SlotInner {
                state: SlotState::Pristine,
                player: None,
                media_duration: Duration::ZERO,
                playing: false,
                kick_off_task: None,
                cues_task: None,
                load: None,
                end: None,
            }),
        })
    }

    pub fn state(&self) -> SlotState {
        self.lock().state
    }

    /// Media duration reported by the player once loaded
    pub fn media_duration(&self) -> Duration {
        self.lock().media_duration
    }

    /// Whether the slot currently owns a player
    pub fn has_player(&self) -> bool {
        self.lock().player.is_some()
    }

    pub fn is_suspended(&self) -> bool {
        !self.gate.is_open()
    }

    fn lock(&self) -> MutexGuard<'_, SlotInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn this(&self) -> Result<Arc<Self>> {
        self.me
            .upgrade()
            .ok_or_else(|| Error::Internal("slot dropped while in use".to_string()))
    }

    async fn load_player(self: Arc<Self>) -> Result<()> {
        let video = (self.video_producer)(&self.entry);
        debug!("Slot {:?}: loading {}", self.entry, video);

        match self.fetch_and_load(&video).await {
            Ok(player) => {
                let mut inner = self.lock();
                inner.media_duration = player.duration();
                inner.state = SlotState::Loaded;
                debug!(
                    "Slot {:?}: loaded, media duration {:?}",
                    self.entry, inner.media_duration
                );
                Ok(())
            }
            Err(e) => {
                warn!("Slot {:?}: load of {} failed: {}", self.entry, video, e);
                // Never started, so no cue fires; only the player goes back
                self.dispose();
                Err(e)
            }
        }
    }

    async fn fetch_and_load(&self, video: &Video) -> Result<Arc<dyn Player>> {
        let player = self.players_pool.get_player(&video.provider).await?;
        self.lock().player = Some(Arc::clone(&player));
        player.load_by_id(&video.id).await?;
        Ok(player)
    }

    /// Wait for the gate, then play and fade in
    async fn kick_off(self: Arc<Self>) {
        let (player, fade) = loop {
            self.gate.opened().await;

            let mut inner = self.lock();
            if inner.state != SlotState::Running {
                debug!("Slot {:?}: left running before playback began", self.entry);
                return;
            }
            // Closed again between wake up and lock
            if !self.gate.is_open() {
                continue;
            }
            let Some(player) = inner.player.clone() else {
                return;
            };

            player.play();
            inner.playing = true;

            let schedule =
                CueSchedule::compute(&self.cues, inner.media_duration, self.transition_duration);
            debug!("Slot {:?}: playing, cues at {:?}", self.entry, schedule);
            inner.cues_task = Some(tokio::spawn(
                Arc::clone(&self).watch_cues(Arc::clone(&player), schedule),
            ));

            let fade = self
                .transition_duration
                .min(inner.media_duration.saturating_sub(player.current_time()));
            break (player, fade);
        };

        player.fade_in(fade).await;
    }

    async fn watch_cues(self: Arc<Self>, player: Arc<dyn Player>, schedule: CueSchedule) {
        let mut tracker = CueTracker::new(schedule);
        let mut ticker = interval(self.cues_poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let crossed = tracker.sample(player.current_time());

            if crossed.ending_soon {
                self.fire_once(&self.ending_soon_fired, &self.cues.ending_soon);
            }
            if crossed.auto_end {
                debug!("Slot {:?}: reached auto end", self.entry);
                // Ending aborts this task; nothing may follow
                drop(self.end());
                return;
            }
        }
    }

    fn fire_once(&self, fired: &AtomicBool, cue: &Cue) {
        if !fired.swap(true, Ordering::SeqCst) {
            cue.fire();
        }
    }

    async fn finish(self: Arc<Self>) {
        let load = self.lock().load.clone();
        if let Some(load) = load {
            // Failure was already reported to the load caller
            let _ = load.await;
        }

        let running = {
            let mut inner = self.lock();
            match inner.state {
                SlotState::Running | SlotState::Ending => {
                    inner.state = SlotState::Ending;
                    if let Some(task) = inner.cues_task.take() {
                        task.abort();
                    }
                    Some((inner.player.clone(), inner.playing, inner.media_duration))
                }
                _ => None,
            }
        };

        if let Some((player, playing, media_duration)) = running {
            debug!("Slot {:?}: ending", self.entry);
            self.fire_once(&self.ending_soon_fired, &self.cues.ending_soon);
            self.fire_once(&self.ending_fired, &self.cues.ending);

            if let (Some(player), true) = (player, playing) {
                let fade = self
                    .transition_duration
                    .min(media_duration.saturating_sub(player.current_time()));
                player.fade_out(fade).await;
                player.stop();
            }
        }

        self.dispose();
    }

    /// Mark ended and give the player back, at most once
    fn dispose(&self) {
        let player = {
            let mut inner = self.lock();
            inner.state = SlotState::Ended;
            inner.playing = false;
            for task in [inner.kick_off_task.take(), inner.cues_task.take()]
                .into_iter()
                .flatten()
            {
                task.abort();
            }
            inner.player.take()
        };

        if let Some(player) = player {
            if let Err(e) = self.players_pool.release_player(&player) {
                error!("Slot {:?}: failed to release player: {}", self.entry, e);
            }
        }
        debug!("Slot {:?}: ended", self.entry);
    }
}

impl<E> Slot<E> for PlaybackSlot<E>
where
    E: Clone + fmt::Debug + Send + Sync + 'static,
{
    fn entry(&self) -> &E {
        &self.entry
    }

    fn load(&self) -> BoxFuture<'static, Result<()>> {
        let mut inner = self.lock();
        if let Some(load) = &inner.load {
            return load.clone().boxed();
        }
        if inner.state != SlotState::Pristine {
            let err = Error::InvalidState(format!("can not load a {} slot", inner.state));
            return future::ready(Err(err)).boxed();
        }
        let me = match self.this() {
            Ok(me) => me,
            Err(e) => return future::ready(Err(e)).boxed(),
        };

        inner.state = SlotState::Loading;
        let task = tokio::spawn(me.load_player());
        let shared = async move {
            task.await
                .unwrap_or_else(|e| Err(Error::Internal(format!("load task failed: {}", e))))
        }
        .boxed()
        .shared();
        inner.load = Some(shared.clone());
        shared.boxed()
    }

    fn start(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.state != SlotState::Loaded {
            return Err(Error::InvalidState(format!(
                "can not start a {} slot",
                inner.state
            )));
        }
        let me = self.this()?;
        inner.state = SlotState::Running;
        inner.kick_off_task = Some(tokio::spawn(me.kick_off()));
        Ok(())
    }

    fn end(&self) -> BoxFuture<'static, ()> {
        let mut inner = self.lock();
        if let Some(end) = &inner.end {
            return end.clone().boxed();
        }
        let Ok(me) = self.this() else {
            return future::ready(()).boxed();
        };

        let task = tokio::spawn(me.finish());
        let shared = async move {
            if let Err(e) = task.await {
                error!("Slot end task failed: {}", e);
            }
        }
        .boxed()
        .shared();
        inner.end = Some(shared.clone());
        shared.boxed()
    }

    fn suspend(&self) {
        if !self.gate.close() {
            return;
        }
        let inner = self.lock();
        if inner.playing && matches!(inner.state, SlotState::Running | SlotState::Ending) {
            if let Some(player) = &inner.player {
                player.pause();
            }
        }
    }

    fn proceed(&self) {
        if !self.gate.open() {
            return;
        }
        let inner = self.lock();
        if inner.playing && matches!(inner.state, SlotState::Running | SlotState::Ending) {
            if let Some(player) = &inner.player {
                player.resume();
            }
        }
    }
}
