// src/runner/cancel.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Owns the cancellation token of a run.
///
/// Clones share the same token. The controller only flips the token; the
/// runner and the executor observe it and decide what to stop.
#[derive(Debug, Clone, Default)]
pub struct CancellationController {
    token: CancellationToken,
    requested: Arc<AtomicBool>,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns `true` only for the call that actually
    /// cancelled; later calls are no-ops.
    pub fn cancel(&self) -> bool {
        let first = !self.requested.swap(true, Ordering::SeqCst);
        self.token.cancel();
        if first {
            info!("cancellation requested");
        }
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Handle for consumers; it observes the same cancellation.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}
