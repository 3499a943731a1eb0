//! Sequencer
//!
//! Decides which slot plays, which one is preloaded and which one is being
//! skipped to, drives auto-advance and retries entries that fail to load.
//!
//! **Roles:**
//! - skipping: slot loading after a user skip; promoted to playing once loaded
//! - preloading: next entry, loaded ahead of time; promoted when the playing
//!   slot reaches its ending cue
//! - playing: the audible slot
//! - ending: draining slots, removed once their `end()` resolves
//!
//! Every role change goes through [`Core::apply`], the single place where
//! slots are loaded, started and ended. Each mutation runs inside one
//! critical section that is never held across an await; asynchronous
//! outcomes re-enter through a fresh critical section and check that the
//! slot they concern still holds its role.
//!
//! Producers and slots are called with the sequencer locked: they must not
//! call back into the sequencer synchronously. Cue callbacks are expected
//! from slot tasks.

use super::cues::CueCallback;
use super::roles::{Collection, Singleton, Transition};
use super::slot::Slot;
use crate::tasks::detach;
use crate::Result;
use futures::future::BoxFuture;
use mixtube_common::{PlaybackEvent, SequencerState};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Builds a slot for an entry, wiring in the sequencer's cue callbacks
pub type SlotProducer<E> = Arc<dyn Fn(SlotRequest<E>) -> Arc<dyn Slot<E>> + Send + Sync>;

/// Next entry to play after the given one (`None`: the first one).
/// Returning `None` means there is nothing left to play.
pub type NextEntryProducer<E> = Arc<dyn Fn(Option<&E>) -> Option<E> + Send + Sync>;

/// What a slot producer receives
pub struct SlotRequest<E> {
    pub entry: E,
    /// To be fired at the slot's "ending soon" cue
    pub ending_soon: CueCallback,
    /// To be fired at the slot's "ending" cue
    pub ending: CueCallback,
}

pub struct SequencerConfig<E> {
    pub next_entry_producer: NextEntryProducer<E>,
    pub slot_producer: SlotProducer<E>,
    /// Events buffered per subscriber
    pub event_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SlotId(u64);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A slot plus the identity the sequencer tracks it by
struct TrackedSlot<E> {
    id: SlotId,
    slot: Arc<dyn Slot<E>>,
}

impl<E> Clone for TrackedSlot<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<E> PartialEq for TrackedSlot<E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Preloading,
    Skipping,
    Playing,
}

struct Roles<E> {
    state: SequencerState,
    preloading: Singleton<TrackedSlot<E>>,
    skipping: Singleton<TrackedSlot<E>>,
    playing: Singleton<TrackedSlot<E>>,
    ending: Collection<TrackedSlot<E>>,
    next_id: u64,
}

impl<E> Roles<E> {
    fn is_playing(&self, id: SlotId) -> bool {
        matches!(self.playing.get(), Some(playing) if playing.id == id)
    }

    fn is_idle(&self) -> bool {
        self.preloading.is_empty()
            && self.skipping.is_empty()
            && self.playing.is_empty()
            && self.ending.is_empty()
    }

    fn tracked(&self) -> Vec<Arc<dyn Slot<E>>> {
        self.preloading
            .get()
            .into_iter()
            .chain(self.skipping.get())
            .chain(self.playing.get())
            .chain(self.ending.iter())
            .map(|tracked| Arc::clone(&tracked.slot))
            .collect()
    }
}

struct Core<E> {
    next_entry_producer: NextEntryProducer<E>,
    slot_producer: SlotProducer<E>,
    roles: Mutex<Roles<E>>,
    events: broadcast::Sender<PlaybackEvent<E>>,
}

/// Continuous playback coordinator
pub struct Sequencer<E> {
    core: Arc<Core<E>>,
}

impl<E> Sequencer<E>
where
    E: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    pub fn new(config: SequencerConfig<E>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            core: Arc::new(Core {
                next_entry_producer: config.next_entry_producer,
                slot_producer: config.slot_producer,
                roles: Mutex::new(Roles {
                    state: SequencerState::Pristine,
                    preloading: Singleton::new(),
                    skipping: Singleton::new(),
                    playing: Singleton::new(),
                    ending: Collection::new(),
                    next_id: 0,
                }),
                events,
            }),
        }
    }

    /// Enter the playing state and resume every tracked slot.
    ///
    /// Does not pick an entry by itself: call [`Sequencer::skip`] to choose
    /// what plays.
    pub fn play(&self) {
        let mut roles = self.core.lock();
        if roles.state == SequencerState::Playing {
            return;
        }
        self.core.set_state(&mut roles, SequencerState::Playing);
        for slot in roles.tracked() {
            slot.proceed();
        }
    }

    /// Pause every tracked slot; only effective while playing
    pub fn pause(&self) {
        let mut roles = self.core.lock();
        if roles.state != SequencerState::Playing {
            return;
        }
        self.core.set_state(&mut roles, SequencerState::Paused);
        for slot in roles.tracked() {
            slot.suspend();
        }
    }

    /// Jump to `entry` as soon as it is loaded, superseding any previous
    /// skip. Entries failing to load are replaced by the next ones from the
    /// next entry producer.
    pub fn skip(&self, entry: E) -> Result<()> {
        let mut roles = self.core.lock();
        info!("Skipping to {:?}", entry);
        self.core.begin_skip(&mut roles, entry)
    }

    /// Discard the skipping, preloading and playing slots. The sequencer
    /// reports `Stopped` once the ending slots have drained.
    pub fn stop(&self) -> Result<()> {
        let mut roles = self.core.lock();
        info!("Stopping playback");
        for role in [Role::Skipping, Role::Preloading, Role::Playing] {
            let transition = roles.role_mut(role).set(None);
            self.core.apply(&mut roles, role, transition)?;
        }
        self.core.check_stopped(&mut roles);
        Ok(())
    }

    /// Ask the next entry producer again what follows the playing entry and
    /// replace the preloaded slot if the answer changed.
    pub fn check_next_entry(&self) -> Result<()> {
        let mut roles = self.core.lock();
        let Some(playing) = roles.playing.get().cloned() else {
            return Ok(());
        };

        let next = (self.core.next_entry_producer)(Some(playing.slot.entry()));
        let preloaded = roles.preloading.get().map(|t| t.slot.entry().clone());
        if next == preloaded {
            return Ok(());
        }

        debug!("Next entry changed from {:?} to {:?}", preloaded, next);
        self.core.preload(&mut roles, next)
    }

    pub fn state(&self) -> SequencerState {
        self.core.lock().state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent<E>> {
        self.core.events.subscribe()
    }

    pub fn playing_entry(&self) -> Option<E> {
        self.core.lock().playing.get().map(|t| t.slot.entry().clone())
    }

    pub fn preloading_entry(&self) -> Option<E> {
        self.core.lock().preloading.get().map(|t| t.slot.entry().clone())
    }

    pub fn skipping_entry(&self) -> Option<E> {
        self.core.lock().skipping.get().map(|t| t.slot.entry().clone())
    }
}

impl<E> Roles<E> {
    fn role_mut(&mut self, role: Role) -> &mut Singleton<TrackedSlot<E>> {
        match role {
            Role::Preloading => &mut self.preloading,
            Role::Skipping => &mut self.skipping,
            Role::Playing => &mut self.playing,
        }
    }
}

impl<E> Core<E>
where
    E: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    fn lock(&self) -> MutexGuard<'_, Roles<E>> {
        self.roles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: PlaybackEvent<E>) {
        debug!("Event: {}", event.kind());
        // No subscriber is not an error
        let _ = self.events.send(event);
    }

    fn set_state(&self, roles: &mut Roles<E>, state: SequencerState) {
        let previous = std::mem::replace(&mut roles.state, state);
        info!("Sequencer state: {} -> {}", previous, state);
        self.emit(PlaybackEvent::StateChanged {
            previous,
            current: state,
        });
    }

    /// Create a slot whose cues call back into this sequencer and whose gate
    /// matches the current state.
    fn new_slot(self: &Arc<Self>, roles: &mut Roles<E>, entry: E) -> TrackedSlot<E> {
        let id = SlotId(roles.next_id);
        roles.next_id += 1;

        let weak = Arc::downgrade(self);
        let ending_soon: CueCallback = {
            let weak = weak.clone();
            Arc::new(move || {
                if let Some(core) = weak.upgrade() {
                    core.notify_coming_next(id);
                }
            })
        };
        let ending: CueCallback = Arc::new(move || {
            if let Some(core) = weak.upgrade() {
                core.move_on(id);
            }
        });

        debug!("Creating slot {} for {:?}", id, entry);
        let slot = (self.slot_producer)(SlotRequest {
            entry,
            ending_soon,
            ending,
        });
        if roles.state == SequencerState::Playing {
            slot.proceed();
        } else {
            slot.suspend();
        }
        TrackedSlot { id, slot }
    }

    /// Run the side effects of a role change
    fn apply(
        self: &Arc<Self>,
        roles: &mut Roles<E>,
        role: Role,
        transition: Transition<TrackedSlot<E>>,
    ) -> Result<()> {
        let emptied = transition.removed.is_some() && transition.added.is_none();

        if let Some(removed) = transition.removed {
            debug!("{:?}: slot {} leaves", role, removed.id);
            match role {
                Role::Preloading => {
                    tokio::spawn(removed.slot.end());
                }
                Role::Skipping | Role::Playing => self.retire(roles, removed),
            }
        }

        if let Some(added) = transition.added {
            debug!("{:?}: slot {} enters", role, added.id);
            match role {
                Role::Preloading => self.watch_preload(added),
                Role::Skipping => {}
                Role::Playing => self.start_playing(roles, added)?,
            }
        }

        if emptied {
            self.check_stopped(roles);
        }
        Ok(())
    }

    /// Move a slot to the ending collection and drop it once ended
    fn retire(self: &Arc<Self>, roles: &mut Roles<E>, tracked: TrackedSlot<E>) {
        if !roles.ending.add(tracked.clone()) {
            return;
        }
        let end = tracked.slot.end();
        let core = Arc::clone(self);
        tokio::spawn(async move {
            end.await;
            core.ending_finished(&tracked);
        });
    }

    fn ending_finished(&self, tracked: &TrackedSlot<E>) {
        let mut roles = self.lock();
        roles.ending.remove(tracked);
        debug!("Slot {} drained", tracked.id);
        self.check_stopped(&mut roles);
    }

    fn check_stopped(&self, roles: &mut Roles<E>) {
        let active = matches!(
            roles.state,
            SequencerState::Playing | SequencerState::Paused
        );
        if active && roles.is_idle() {
            self.set_state(roles, SequencerState::Stopped);
        }
    }

    fn start_playing(self: &Arc<Self>, roles: &mut Roles<E>, tracked: TrackedSlot<E>) -> Result<()> {
        let entry = tracked.slot.entry().clone();
        info!("Now playing {:?}", entry);
        tracked.slot.start()?;
        self.emit(PlaybackEvent::PlayingChanged {
            entry: entry.clone(),
        });

        let next = (self.next_entry_producer)(Some(&entry));
        self.preload(roles, next)
    }

    /// Put a slot for `next` in the preloading role, or empty the role
    fn preload(self: &Arc<Self>, roles: &mut Roles<E>, next: Option<E>) -> Result<()> {
        let slot = next.map(|entry| self.new_slot(roles, entry));
        let transition = roles.preloading.set(slot);
        self.apply(roles, Role::Preloading, transition)
    }

    fn watch_preload(self: &Arc<Self>, tracked: TrackedSlot<E>) {
        let load = tracked.slot.load();
        let core = Arc::clone(self);
        detach("preload", async move {
            if let Err(e) = load.await {
                let mut roles = core.lock();
                return core.replace_failed_preload(&mut roles, &tracked, &e.to_string());
            }
            Ok(())
        });
    }

    /// Replace a preloaded slot that failed to load with the entry after it.
    ///
    /// Both the preload watcher and auto-advance may observe the same
    /// failure; only the first one, while the slot still holds the role,
    /// acts and reports it.
    fn replace_failed_preload(
        self: &Arc<Self>,
        roles: &mut Roles<E>,
        failed: &TrackedSlot<E>,
        error: &str,
    ) -> Result<()> {
        if !roles.preloading.holds(failed) {
            return Ok(());
        }

        let entry = failed.slot.entry().clone();
        warn!("Preloading {:?} failed: {}", entry, error);
        self.emit(PlaybackEvent::LoadFailed {
            entry: entry.clone(),
            error: error.to_string(),
        });

        let next = (self.next_entry_producer)(Some(&entry));
        self.preload(roles, next)
    }

    fn begin_skip(self: &Arc<Self>, roles: &mut Roles<E>, entry: E) -> Result<()> {
        let tracked = self.skip_to(roles, entry)?;
        let load = tracked.slot.load();
        let core = Arc::clone(self);
        detach("skip", core.drive_skip(tracked, load));
        Ok(())
    }

    /// Put a new slot for `entry` in the skipping role
    fn skip_to(self: &Arc<Self>, roles: &mut Roles<E>, entry: E) -> Result<TrackedSlot<E>> {
        let tracked = self.new_slot(roles, entry.clone());
        let transition = roles.skipping.set(Some(tracked.clone()));
        self.apply(roles, Role::Skipping, transition)?;
        self.emit(PlaybackEvent::LoadingChanged {
            entry,
            loading: true,
        });
        Ok(tracked)
    }

    /// Wait for skipped-to slots to load, walking the next entry producer
    /// past the ones that fail.
    async fn drive_skip(
        self: Arc<Self>,
        mut tracked: TrackedSlot<E>,
        mut load: BoxFuture<'static, Result<()>>,
    ) -> Result<()> {
        loop {
            let outcome = load.await;
            match self.settle_skip(&tracked, outcome)? {
                Some(next) => {
                    load = next.slot.load();
                    tracked = next;
                }
                None => return Ok(()),
            }
        }
    }

    /// Returns the slot to wait for next, if the skip goes on
    fn settle_skip(
        self: &Arc<Self>,
        tracked: &TrackedSlot<E>,
        outcome: Result<()>,
    ) -> Result<Option<TrackedSlot<E>>> {
        let mut roles = self.lock();
        let entry = tracked.slot.entry().clone();
        self.emit(PlaybackEvent::LoadingChanged {
            entry: entry.clone(),
            loading: false,
        });

        match outcome {
            Ok(()) => {
                if !roles.skipping.holds(tracked) {
                    debug!("Skip to {:?} was superseded", entry);
                    return Ok(None);
                }
                // Promoted, not discarded
                roles.skipping.clear();
                let transition = roles.preloading.set(None);
                self.apply(&mut roles, Role::Preloading, transition)?;
                let transition = roles.playing.set(Some(tracked.clone()));
                self.apply(&mut roles, Role::Playing, transition)?;
                Ok(None)
            }
            Err(e) => {
                warn!("Skipping to {:?} failed: {}", entry, e);
                self.emit(PlaybackEvent::LoadFailed {
                    entry: entry.clone(),
                    error: e.to_string(),
                });
                if !roles.skipping.holds(tracked) {
                    return Ok(None);
                }

                match (self.next_entry_producer)(Some(&entry)) {
                    Some(next) => {
                        debug!("Trying {:?} instead", next);
                        self.skip_to(&mut roles, next).map(Some)
                    }
                    None => {
                        let transition = roles.skipping.set(None);
                        self.apply(&mut roles, Role::Skipping, transition)?;
                        Ok(None)
                    }
                }
            }
        }
    }

    /// "Ending soon" cue of slot `id`
    fn notify_coming_next(&self, id: SlotId) {
        let roles = self.lock();
        let Some(playing) = roles.playing.get() else {
            return;
        };
        if playing.id != id {
            debug!("Ignoring ending soon cue of superseded slot {}", id);
            return;
        }

        let next = roles
            .skipping
            .get()
            .or(roles.preloading.get())
            .map(|t| t.slot.entry().clone());
        self.emit(PlaybackEvent::ComingNext {
            current: playing.slot.entry().clone(),
            next,
        });
    }

    /// "Ending" cue of slot `id`: hand over to the preloaded slot
    fn move_on(self: &Arc<Self>, id: SlotId) {
        let mut roles = self.lock();
        if !roles.is_playing(id) {
            debug!("Ignoring ending cue of superseded slot {}", id);
            return;
        }

        match roles.preloading.get().cloned() {
            Some(candidate) => {
                let load = candidate.slot.load();
                let core = Arc::clone(self);
                detach("auto-advance", core.drive_move(id, candidate, load));
            }
            None => {
                debug!("Nothing preloaded after slot {}", id);
                let transition = roles.playing.set(None);
                if let Err(e) = self.apply(&mut roles, Role::Playing, transition) {
                    warn!("Ending slot {} failed: {}", id, e);
                }
            }
        }
    }

    async fn drive_move(
        self: Arc<Self>,
        commanding: SlotId,
        mut candidate: TrackedSlot<E>,
        mut load: BoxFuture<'static, Result<()>>,
    ) -> Result<()> {
        loop {
            let outcome = load.await;
            match self.settle_move(commanding, &candidate, outcome)? {
                Some(next) => {
                    load = next.slot.load();
                    candidate = next;
                }
                None => return Ok(()),
            }
        }
    }

    /// Returns the next preloaded slot to wait for, if the move goes on
    fn settle_move(
        self: &Arc<Self>,
        commanding: SlotId,
        candidate: &TrackedSlot<E>,
        outcome: Result<()>,
    ) -> Result<Option<TrackedSlot<E>>> {
        let mut roles = self.lock();
        if let Err(e) = &outcome {
            self.replace_failed_preload(&mut roles, candidate, &e.to_string())?;
        }
        if !roles.is_playing(commanding) {
            return Ok(None);
        }

        if outcome.is_ok() && roles.preloading.holds(candidate) {
            // Promoted, not discarded
            roles.preloading.clear();
            let transition = roles.playing.set(Some(candidate.clone()));
            self.apply(&mut roles, Role::Playing, transition)?;
            return Ok(None);
        }

        match roles.preloading.get().cloned() {
            Some(next) => Ok(Some(next)),
            None => {
                let transition = roles.playing.set(None);
                self.apply(&mut roles, Role::Playing, transition)?;
                Ok(None)
            }
        }
    }
}
