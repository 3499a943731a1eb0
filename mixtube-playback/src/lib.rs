//! # Mixtube Playback Library (mixtube-playback)
//!
//! Continuous video playback engine: preloads, transitions between and
//! sequences embedded players so that one video fades out exactly as the
//! next fades in.
//!
//! **Architecture:** a [`Sequencer`] arbitrates three slot roles (playing,
//! preloading, skipping) plus a draining ending collection. Each
//! [`PlaybackSlot`] drives one player through load, start and end, firing
//! "ending soon" and "ending" cues off the playback position. Players come
//! from a bounded, recycling [`PlayersPool`].

pub mod drm;
pub mod engine;
pub mod error;
pub mod playback;
pub mod player;
pub mod playlist;
pub mod pool;
pub mod tasks;

pub use drm::DrmChecker;
pub use engine::{Engine, EngineState};
pub use error::{Error, Result};
pub use playback::cues::{Cue, CueCallback, Cues};
pub use playback::sequencer::{
    NextEntryProducer, Sequencer, SequencerConfig, SlotProducer, SlotRequest,
};
pub use playback::slot::{PlaybackSlot, Slot, SlotConfig, SlotState, VideoProducer};
pub use player::{DefaultPlayerFactory, DrmReport, Player, PlayerFactory, PlayerOptions};
pub use pool::{ObjectsPool, PlayersPool, PoolStats};

pub use mixtube_common::{EngineSettings, PlaybackEvent, SequencerState, Video};
