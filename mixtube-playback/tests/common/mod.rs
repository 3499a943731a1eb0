//! Shared test doubles for mixtube-playback integration tests
//!
//! - MockPlayer / MockFactory: players whose position is set by the test
//! - MockSlot / SlotRecorder: scripted slots for driving the sequencer
//! - event helpers with timeouts

#![allow(dead_code)]

use async_trait::async_trait;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use mixtube_playback::{
    CueCallback, DrmReport, Error, NextEntryProducer, PlaybackEvent, Player, PlayerFactory,
    Result, SequencerState, Slot, SlotProducer, SlotRequest,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

pub const MOCK_PROVIDER: &str = "mock";

// ============================================================================
// Players
// ============================================================================

/// Player with a test controlled position
///
/// Ids starting with `fail` are rejected on load, ids starting with `slow`
/// take one second to load, `drm:<code>` is reported blocked and `error`
/// makes the DRM probe itself fail.
pub struct MockPlayer {
    pub serial: usize,
    media_duration: Duration,
    position: Mutex<Duration>,
    loaded: Mutex<Option<String>>,
    pub loads: AtomicUsize,
    pub plays: AtomicUsize,
    pub pauses: AtomicUsize,
    pub resumes: AtomicUsize,
    pub stops: AtomicUsize,
    pub fade_ins: Mutex<Vec<Duration>>,
    pub fade_outs: Mutex<Vec<Duration>>,
}

impl MockPlayer {
    pub fn new(serial: usize, media_duration: Duration) -> Self {
        Self {
            serial,
            media_duration,
            position: Mutex::new(Duration::ZERO),
            loaded: Mutex::new(None),
            loads: AtomicUsize::new(0),
            plays: AtomicUsize::new(0),
            pauses: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            fade_ins: Mutex::new(Vec::new()),
            fade_outs: Mutex::new(Vec::new()),
        }
    }

    pub fn set_position(&self, position: Duration) {
        *self.position.lock().unwrap() = position;
    }

    pub fn loaded(&self) -> Option<String> {
        self.loaded.lock().unwrap().clone()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Player for MockPlayer {
    fn provider(&self) -> &str {
        MOCK_PROVIDER
    }

    async fn load_by_id(&self, id: &str) -> Result<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if id.starts_with("slow") {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        if id.starts_with("fail") {
            return Err(Error::Load {
                video: id.to_string(),
                reason: "mock rejection".to_string(),
            });
        }
        *self.loaded.lock().unwrap() = Some(id.to_string());
        Ok(())
    }

    fn play(&self) {
        self.plays.fetch_add(1, Ordering::SeqCst);
    }

    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.resumes.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    async fn fade_in(&self, duration: Duration) {
        self.fade_ins.lock().unwrap().push(duration);
    }

    async fn fade_out(&self, duration: Duration) {
        self.fade_outs.lock().unwrap().push(duration);
    }

    fn current_time(&self) -> Duration {
        *self.position.lock().unwrap()
    }

    fn duration(&self) -> Duration {
        self.media_duration
    }

    async fn check_drm_by_id(&self, id: &str) -> Result<DrmReport> {
        if id == "error" {
            return Err(Error::Player("probe crashed".to_string()));
        }
        Ok(match id.strip_prefix("drm:") {
            Some(code) => DrmReport::blocked(code),
            None => DrmReport::playable(),
        })
    }
}

/// Builds MockPlayers for the "mock" provider and keeps them for inspection
pub struct MockFactory {
    media_duration: Duration,
    pub created: Mutex<Vec<Arc<MockPlayer>>>,
}

impl MockFactory {
    pub fn new(media_duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            media_duration,
            created: Mutex::new(Vec::new()),
        })
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn player(&self, index: usize) -> Arc<MockPlayer> {
        self.created.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl PlayerFactory for MockFactory {
    fn can_create_player(&self, provider: &str) -> bool {
        provider == MOCK_PROVIDER
    }

    async fn new_player(&self, provider: &str) -> Result<Arc<dyn Player>> {
        if provider != MOCK_PROVIDER {
            return Err(Error::UnsupportedProvider(provider.to_string()));
        }
        let mut created = self.created.lock().unwrap();
        let player = Arc::new(MockPlayer::new(created.len(), self.media_duration));
        created.push(player.clone());
        Ok(player)
    }
}

// ============================================================================
// Slots
// ============================================================================

/// How a scripted slot behaves
#[derive(Debug, Clone, Default)]
pub struct SlotBehavior {
    pub fail_load: bool,
    pub load_delay: Option<Duration>,
    /// Fire "ending soon" then "ending" this long after start
    pub auto_end_after: Option<Duration>,
}

/// Slot recording every call the sequencer makes
pub struct MockSlot {
    entry: usize,
    behavior: SlotBehavior,
    ending_soon: CueCallback,
    ending: CueCallback,
    calls: Mutex<Vec<&'static str>>,
}

impl MockSlot {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }

    pub fn fire_ending_soon(&self) {
        (self.ending_soon)();
    }

    pub fn fire_ending(&self) {
        (self.ending)();
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Slot<usize> for MockSlot {
    fn entry(&self) -> &usize {
        &self.entry
    }

    fn load(&self) -> BoxFuture<'static, Result<()>> {
        self.record("load");
        let delay = self.behavior.load_delay;
        let outcome = if self.behavior.fail_load {
            Err(Error::Load {
                video: format!("mock:{}", self.entry),
                reason: "mock rejection".to_string(),
            })
        } else {
            Ok(())
        };
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            outcome
        }
        .boxed()
    }

    fn start(&self) -> Result<()> {
        self.record("start");
        if let Some(after) = self.behavior.auto_end_after {
            let ending_soon = self.ending_soon.clone();
            let ending = self.ending.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                ending_soon();
                tokio::time::sleep(after).await;
                ending();
            });
        }
        Ok(())
    }

    fn end(&self) -> BoxFuture<'static, ()> {
        self.record("end");
        future::ready(()).boxed()
    }

    fn suspend(&self) {
        self.record("suspend");
    }

    fn proceed(&self) {
        self.record("proceed");
    }
}

/// Slot producer handing out MockSlots, one behavior per entry
#[derive(Default)]
pub struct SlotRecorder {
    behaviors: Mutex<HashMap<usize, SlotBehavior>>,
    default_behavior: SlotBehavior,
    slots: Mutex<Vec<Arc<MockSlot>>>,
}

impl SlotRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_default(behavior: SlotBehavior) -> Arc<Self> {
        Arc::new(Self {
            default_behavior: behavior,
            ..Self::default()
        })
    }

    pub fn set_behavior(&self, entry: usize, behavior: SlotBehavior) {
        self.behaviors.lock().unwrap().insert(entry, behavior);
    }

    pub fn producer(self: &Arc<Self>) -> SlotProducer<usize> {
        let recorder = self.clone();
        Arc::new(move |request: SlotRequest<usize>| {
            let behavior = recorder
                .behaviors
                .lock()
                .unwrap()
                .get(&request.entry)
                .cloned()
                .unwrap_or_else(|| recorder.default_behavior.clone());
            let slot = Arc::new(MockSlot {
                entry: request.entry,
                behavior,
                ending_soon: request.ending_soon,
                ending: request.ending,
                calls: Mutex::new(Vec::new()),
            });
            recorder.slots.lock().unwrap().push(slot.clone());
            let slot: Arc<dyn Slot<usize>> = slot;
            slot
        })
    }

    pub fn slots(&self) -> Vec<Arc<MockSlot>> {
        self.slots.lock().unwrap().clone()
    }

    pub fn slot(&self, index: usize) -> Arc<MockSlot> {
        self.slots.lock().unwrap()[index].clone()
    }

    /// Entries of the created slots, in creation order
    pub fn entries(&self) -> Vec<usize> {
        self.slots.lock().unwrap().iter().map(|s| *s.entry()).collect()
    }
}

/// Entries `0..count` in order
pub fn entries_producer(count: usize) -> NextEntryProducer<usize> {
    Arc::new(move |entry: Option<&usize>| {
        let next = entry.map_or(0, |e| e + 1);
        (next < count).then_some(next)
    })
}

/// Producer that never has a next entry
pub fn no_next_entry() -> NextEntryProducer<usize> {
    Arc::new(|_: Option<&usize>| None)
}

// ============================================================================
// Events
// ============================================================================

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn next_event<E: Clone>(
    events: &mut broadcast::Receiver<PlaybackEvent<E>>,
) -> PlaybackEvent<E> {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel failed")
}

/// Collect events up to and including the first one matching `last`
pub async fn events_until<E: Clone>(
    events: &mut broadcast::Receiver<PlaybackEvent<E>>,
    last: impl Fn(&PlaybackEvent<E>) -> bool,
) -> Vec<PlaybackEvent<E>> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        let done = last(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

pub async fn events_until_stopped<E: Clone>(
    events: &mut broadcast::Receiver<PlaybackEvent<E>>,
) -> Vec<PlaybackEvent<E>> {
    events_until(events, |e| e.is_transition_to(SequencerState::Stopped)).await
}

pub async fn wait_playing<E: Clone + PartialEq>(
    events: &mut broadcast::Receiver<PlaybackEvent<E>>,
    entry: E,
) -> Vec<PlaybackEvent<E>> {
    events_until(
        events,
        |e| matches!(e, PlaybackEvent::PlayingChanged { entry: playing } if *playing == entry),
    )
    .await
}

pub fn playing_entries<E: Clone>(events: &[PlaybackEvent<E>]) -> Vec<E> {
    events
        .iter()
        .filter_map(|e| match e {
            PlaybackEvent::PlayingChanged { entry } => Some(entry.clone()),
            _ => None,
        })
        .collect()
}

pub fn failed_entries<E: Clone>(events: &[PlaybackEvent<E>]) -> Vec<E> {
    events
        .iter()
        .filter_map(|e| match e {
            PlaybackEvent::LoadFailed { entry, .. } => Some(entry.clone()),
            _ => None,
        })
        .collect()
}

pub fn coming_next_count<E>(events: &[PlaybackEvent<E>]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, PlaybackEvent::ComingNext { .. }))
        .count()
}

/// Let spawned tasks run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
