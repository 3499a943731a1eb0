//! Video descriptor

use serde::{Deserialize, Serialize};
use std::fmt;

/// A video as understood by a player backend.
///
/// Derived from a caller entry by the video producer each time a slot needs
/// it; never cached by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Video {
    /// Backend name, used to pick a player pool (e.g. "youtube", "simulated")
    pub provider: String,
    /// Identifier that only makes sense to the backend
    pub id: String,
}

impl Video {
    pub fn new(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for Video {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.id)
    }
}
