//! Cooperative cancellation.
//!
//! One token is threaded from the triggering workspace event down
//! through analyzer invocation and storage I/O. Long-running code calls
//! [`CancellationToken::check`] at suspension points; everything between
//! checkpoints runs to completion, which is what keeps cache writes
//! atomic under cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::EngineError;

/// A cheaply cloneable cancellation flag shared by one operation.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that can never be cancelled.
    pub fn none() -> Self {
        Self::default()
    }

    /// Request cancellation; all clones observe it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Checkpoint: bail out with [`EngineError::Cancelled`] if requested.
    pub fn check(&self) -> Result<(), EngineError> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}
