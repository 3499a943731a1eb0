//! Playback cues
//!
//! A cue is a callback scheduled at a position computed from the media
//! duration. Each slot carries two: "ending soon" (announce what comes next)
//! and "ending" (hand over to the next slot).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub type CueCallback = Arc<dyn Fn() + Send + Sync>;

/// Maps a media duration to the cue position
pub type CueTime = Arc<dyn Fn(Duration) -> Duration + Send + Sync>;

#[derive(Clone)]
pub struct Cue {
    time: CueTime,
    callback: CueCallback,
}

impl Cue {
    pub fn new<F>(time: F, callback: CueCallback) -> Self
    where
        F: Fn(Duration) -> Duration + Send + Sync + 'static,
    {
        Self {
            time: Arc::new(time),
            callback,
        }
    }

    /// Cue `lead` before the end of the media (at zero for shorter media)
    pub fn before_end(lead: Duration, callback: CueCallback) -> Self {
        Self::new(move |media| media.saturating_sub(lead), callback)
    }

    pub fn time(&self, media_duration: Duration) -> Duration {
        (self.time)(media_duration)
    }

    pub fn fire(&self) {
        (self.callback)()
    }
}

impl fmt::Debug for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cue").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Cues {
    pub ending_soon: Cue,
    pub ending: Cue,
}

/// Cue positions for one loaded media
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CueSchedule {
    pub ending_soon: Duration,
    /// Position where the slot ends itself
    pub auto_end: Duration,
}

impl CueSchedule {
    /// `auto_end` is the ending cue clamped to `[0, D - T]` so the fade out
    /// fits in the media; `ending_soon` is clamped to `[0, auto_end]`.
    pub fn compute(cues: &Cues, media_duration: Duration, transition: Duration) -> Self {
        let auto_end = cues
            .ending
            .time(media_duration)
            .min(media_duration.saturating_sub(transition));
        let ending_soon = cues.ending_soon.time(media_duration).min(auto_end);
        Self {
            ending_soon,
            auto_end,
        }
    }
}

/// Thresholds crossed by one position sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crossed {
    pub ending_soon: bool,
    pub auto_end: bool,
}

/// Detects forward crossings of the schedule thresholds between samples
#[derive(Debug)]
pub struct CueTracker {
    schedule: CueSchedule,
    last: Option<Duration>,
}

impl CueTracker {
    pub fn new(schedule: CueSchedule) -> Self {
        Self {
            schedule,
            last: None,
        }
    }

    pub fn schedule(&self) -> CueSchedule {
        self.schedule
    }

    /// Feed the next sampled position. A threshold is crossed when it lies
    /// in `(previous, position]`; samples that do not move forward cross
    /// nothing.
    pub fn sample(&mut self, position: Duration) -> Crossed {
        let previous = self.last.replace(position);
        if matches!(previous, Some(p) if position <= p) {
            return Crossed::default();
        }

        let crosses = |threshold: Duration| {
            previous.map_or(true, |p| p < threshold) && threshold <= position
        };
        Crossed {
            ending_soon: crosses(self.schedule.ending_soon),
            auto_end: crosses(self.schedule.auto_end),
        }
    }
}
