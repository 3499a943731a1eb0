//! Playback coordination
//!
//! - [`slot`]: one entry's player lifecycle (load, start, end) and cues
//! - [`sequencer`]: slot roles, auto-advance, skip and retry
//! - [`gate`], [`roles`], [`cues`]: building blocks of the two above

pub mod cues;
pub mod gate;
pub mod roles;
pub mod sequencer;
pub mod slot;

pub use cues::{Cue, CueCallback, Cues};
pub use gate::Gate;
pub use roles::{Collection, Singleton, Transition};
pub use sequencer::{Sequencer, SequencerConfig, SlotRequest};
pub use slot::{PlaybackSlot, Slot, SlotConfig, SlotState};
