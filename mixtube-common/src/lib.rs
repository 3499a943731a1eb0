//! # Mixtube Common Library
//!
//! Shared vocabulary for the Mixtube playback workspace:
//! - Video descriptors produced from caller entries
//! - Sequencer states and playback events
//! - Fade curve definitions used by player backends
//! - Engine settings and configuration file resolution

pub mod config;
pub mod error;
pub mod events;
pub mod fade_curves;
pub mod video;

pub use config::{DebugSettings, EngineSettings, MediaQuality};
pub use error::{Error, Result};
pub use events::{PlaybackEvent, SequencerState};
pub use fade_curves::FadeCurve;
pub use video::Video;
