//! Detached task helpers
//!
//! Every fire-and-forget chain in the engine ends here so that a failure
//! nobody awaits still shows up in the logs instead of vanishing.

use crate::Result;
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::error;

/// Spawn `future` with no consumer for its outcome.
///
/// An `Err` is logged at error level together with `what`.
pub fn detach<F>(what: &'static str, future: F) -> JoinHandle<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = future.await {
            error!("Unhandled failure in {}: {}", what, e);
        }
    })
}
