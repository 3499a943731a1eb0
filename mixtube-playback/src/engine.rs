//! Playback engine facade
//!
//! Wires a [`Sequencer`] to [`PlaybackSlot`]s built over an unbounded
//! [`PlayersPool`]. Transitions start `transition_duration` before the end
//! of each media; "coming next" is announced twice that duration before
//! the end.

use crate::playback::cues::{Cue, Cues};
use crate::playback::sequencer::{
    NextEntryProducer, Sequencer, SequencerConfig, SlotProducer, SlotRequest,
};
use crate::playback::slot::{PlaybackSlot, Slot, SlotConfig, VideoProducer};
use crate::player::{DefaultPlayerFactory, PlayerFactory, PlayerOptions};
use crate::pool::{PlayersPool, PoolStats};
use crate::Result;
use mixtube_common::{EngineSettings, PlaybackEvent, SequencerState};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Aggregate engine state
pub type EngineState = SequencerState;

pub struct Engine<E> {
    sequencer: Sequencer<E>,
    players_pool: Arc<PlayersPool>,
    settings: EngineSettings,
}

impl<E> Engine<E>
where
    E: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    /// Every state the engine reports
    pub const STATES: [EngineState; 4] = SequencerState::ALL;

    pub fn new(
        settings: EngineSettings,
        factory: Arc<dyn PlayerFactory>,
        video_producer: VideoProducer<E>,
        next_entry_producer: NextEntryProducer<E>,
    ) -> Result<Self> {
        settings.validate()?;

        let players_pool = Arc::new(PlayersPool::new(factory, None));
        let transition = settings.transition_duration();
        let poll_interval = settings.cues_poll_interval();

        let pool = Arc::clone(&players_pool);
        let slot_producer: SlotProducer<E> = Arc::new(move |request: SlotRequest<E>| {
            let slot: Arc<dyn Slot<E>> = PlaybackSlot::new(SlotConfig {
                entry: request.entry,
                video_producer: Arc::clone(&video_producer),
                cues: Cues {
                    ending_soon: Cue::before_end(transition * 2, request.ending_soon),
                    ending: Cue::before_end(transition, request.ending),
                },
                transition_duration: transition,
                cues_poll_interval: poll_interval,
                players_pool: Arc::clone(&pool),
            });
            slot
        });

        let sequencer = Sequencer::new(SequencerConfig {
            next_entry_producer,
            slot_producer,
            event_capacity: settings.event_capacity,
        });

        info!(
            "Engine ready (transition {:?}, cues poll {:?})",
            transition, poll_interval
        );
        Ok(Self {
            sequencer,
            players_pool,
            settings,
        })
    }

    /// Engine playing through simulated players
    pub fn with_simulated_players(
        settings: EngineSettings,
        video_producer: VideoProducer<E>,
        next_entry_producer: NextEntryProducer<E>,
    ) -> Result<Self> {
        let factory = DefaultPlayerFactory::with_simulated(PlayerOptions::from_settings(&settings));
        Self::new(settings, Arc::new(factory), video_producer, next_entry_producer)
    }

    pub fn play(&self) {
        self.sequencer.play();
    }

    pub fn pause(&self) {
        self.sequencer.pause();
    }

    pub fn skip(&self, entry: E) -> Result<()> {
        self.sequencer.skip(entry)
    }

    pub fn stop(&self) -> Result<()> {
        self.sequencer.stop()
    }

    pub fn check_next_entry(&self) -> Result<()> {
        self.sequencer.check_next_entry()
    }

    pub fn state(&self) -> EngineState {
        self.sequencer.state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent<E>> {
        self.sequencer.subscribe()
    }

    pub fn playing_entry(&self) -> Option<E> {
        self.sequencer.playing_entry()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Players pool occupancy for `provider`
    pub fn pool_stats(&self, provider: &str) -> Option<PoolStats> {
        self.players_pool.stats(provider)
    }
}
