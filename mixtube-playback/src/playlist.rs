//! Playlist files for the `mixtube` binary
//!
//! ```toml
//! [[entries]]
//! title = "Opening"
//! provider = "simulated"
//! id = "intro@20"
//! ```

use crate::playback::sequencer::NextEntryProducer;
use crate::playback::slot::VideoProducer;
use crate::{Error, Result};
use mixtube_common::Video;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// One playlist entry; entries compare by position, title and video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    /// Index in the playlist, assigned on load
    #[serde(default, skip_deserializing)]
    pub position: usize,
    #[serde(default)]
    pub title: String,
    pub provider: String,
    pub id: String,
}

impl PlaylistEntry {
    pub fn video(&self) -> Video {
        Video::new(self.provider.clone(), self.id.clone())
    }
}

impl fmt::Display for PlaylistEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.title.is_empty() {
            write!(f, "#{} {}:{}", self.position, self.provider, self.id)
        } else {
            write!(f, "#{} {}", self.position, self.title)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Playlist {
    #[serde(default)]
    pub entries: Vec<PlaylistEntry>,
}

impl Playlist {
    pub fn from_toml(text: &str) -> Result<Self> {
        let mut playlist: Playlist =
            toml::from_str(text).map_err(|e| Error::Config(format!("invalid playlist: {}", e)))?;

        for (position, entry) in playlist.entries.iter_mut().enumerate() {
            if entry.provider.is_empty() || entry.id.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "playlist entry {} needs a provider and an id",
                    position
                )));
            }
            entry.position = position;
        }
        Ok(playlist)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read playlist {}: {}", path.display(), e))
        })?;
        let playlist = Self::from_toml(&text)?;
        info!(
            "Loaded {} playlist entries from {}",
            playlist.len(),
            path.display()
        );
        Ok(playlist)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> Option<&PlaylistEntry> {
        self.entries.first()
    }

    /// Entry after `entry`, or the first one for `None`
    pub fn next_after(&self, entry: Option<&PlaylistEntry>) -> Option<&PlaylistEntry> {
        let index = entry.map_or(0, |e| e.position + 1);
        self.entries.get(index)
    }

    /// Producers for an engine playing this playlist in order
    pub fn producers(
        self: &Arc<Self>,
    ) -> (VideoProducer<PlaylistEntry>, NextEntryProducer<PlaylistEntry>) {
        let playlist = Arc::clone(self);
        let video_producer: VideoProducer<PlaylistEntry> =
            Arc::new(|entry: &PlaylistEntry| entry.video());
        let next_entry_producer: NextEntryProducer<PlaylistEntry> =
            Arc::new(move |entry: Option<&PlaylistEntry>| playlist.next_after(entry).cloned());
        (video_producer, next_entry_producer)
    }
}
