//! Event types for the Mixtube event system
//!
//! The sequencer reports everything a caller may react to through these
//! events: state transitions, the entry that just started playing, what is
//! coming next, loading progress of user initiated skips and load failures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate playback state reported by the sequencer
///
/// `Pristine → Playing ⇄ Paused`, and `Playing | Paused → Stopped` once no
/// slot is active anymore. `Stopped` is not terminal: a later skip + play
/// re-enters `Playing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequencerState {
    Pristine,
    Playing,
    Paused,
    Stopped,
}

impl SequencerState {
    /// Every state, in declaration order
    pub const ALL: [SequencerState; 4] = [
        SequencerState::Pristine,
        SequencerState::Playing,
        SequencerState::Paused,
        SequencerState::Stopped,
    ];
}

impl fmt::Display for SequencerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequencerState::Pristine => write!(f, "pristine"),
            SequencerState::Playing => write!(f, "playing"),
            SequencerState::Paused => write!(f, "paused"),
            SequencerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Playback events, generic over the caller's entry type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent<E> {
    /// Fired on every sequencer state transition
    StateChanged {
        previous: SequencerState,
        current: SequencerState,
    },

    /// A slot was promoted to the playing role
    PlayingChanged { entry: E },

    /// The playing entry reached its "ending soon" cue
    ///
    /// `next` prefers the entry being skipped to, then the preloaded one.
    ComingNext { current: E, next: Option<E> },

    /// A user initiated skip started (`loading = true`) or finished loading.
    /// Preloads never emit this event.
    LoadingChanged { entry: E, loading: bool },

    /// An entry failed to load; emitted once per failing entry
    LoadFailed { entry: E, error: String },
}

impl<E> PlaybackEvent<E> {
    /// Short name of the event kind, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            PlaybackEvent::StateChanged { .. } => "state_changed",
            PlaybackEvent::PlayingChanged { .. } => "playing_changed",
            PlaybackEvent::ComingNext { .. } => "coming_next",
            PlaybackEvent::LoadingChanged { .. } => "loading_changed",
            PlaybackEvent::LoadFailed { .. } => "load_failed",
        }
    }

    /// True when this event reports a transition into `state`
    pub fn is_transition_to(&self, state: SequencerState) -> bool {
        matches!(self, PlaybackEvent::StateChanged { current, .. } if *current == state)
    }
}
