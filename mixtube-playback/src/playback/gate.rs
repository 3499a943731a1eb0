//! Pause gate
//!
//! Two-state open/closed barrier. Work that must not happen while paused
//! awaits [`Gate::opened`]; closing the gate defers it, opening releases
//! every waiter at once. Waiters hold no resources beyond their receiver, so
//! dropping a waiter or the gate leaks nothing.

use tokio::sync::watch;

#[derive(Debug)]
pub struct Gate {
    open: watch::Sender<bool>,
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate {
    /// A closed gate
    pub fn new() -> Self {
        let (open, _) = watch::channel(false);
        Self { open }
    }

    /// Open the gate; returns whether it was closed before
    pub fn open(&self) -> bool {
        self.open.send_if_modified(|open| !std::mem::replace(open, true))
    }

    /// Close the gate; returns whether it was open before
    pub fn close(&self) -> bool {
        self.open.send_if_modified(|open| std::mem::replace(open, false))
    }

    pub fn is_open(&self) -> bool {
        *self.open.borrow()
    }

    /// Resolves immediately when open, otherwise once the gate next opens
    pub async fn opened(&self) {
        let mut receiver = self.open.subscribe();
        // The sender lives in `self`, so the channel can not close here
        let _ = receiver.wait_for(|open| *open).await;
    }
}
