//! Fixed-length dispute window driven by an externally advanced block clock.

use crate::domain::Height;
use crate::ports::DisputeWindow;
use std::sync::atomic::{AtomicI64, Ordering};

/// Refs created at `H` become final once the current height reaches
/// `H + period_blocks`.
#[derive(Debug)]
pub struct FixedDisputePeriod {
    period_blocks: u64,
    current: AtomicI64,
}

impl FixedDisputePeriod {
    /// Window of `period_blocks`, clock starting at height 0.
    pub fn new(period_blocks: u64) -> Self {
        Self::starting_at(period_blocks, 0)
    }

    /// Window of `period_blocks`, clock starting at `height`.
    pub fn starting_at(period_blocks: u64, height: Height) -> Self {
        Self {
            period_blocks,
            current: AtomicI64::new(height),
        }
    }

    /// Move the clock to `height`. The clock never runs backwards.
    pub fn advance_to(&self, height: Height) {
        self.current.fetch_max(height, Ordering::SeqCst);
    }

    /// Move the clock forward by one block and return the new height.
    /// The clock saturates at `Height::MAX`.
    pub fn next_block(&self) -> Height {
        let step = |h: Height| h.saturating_add(1);
        match self
            .current
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |h| Some(step(h)))
        {
            Ok(prev) | Err(prev) => step(prev),
        }
    }
}

impl DisputeWindow for FixedDisputePeriod {
    fn current_height(&self) -> Height {
        self.current.load(Ordering::SeqCst)
    }

    fn is_window_elapsed(&self, creation_height: Height) -> bool {
        let period = i64::try_from(self.period_blocks).unwrap_or(i64::MAX);
        match creation_height.checked_add(period) {
            Some(deadline) => self.current_height() >= deadline,
            None => false,
        }
    }
}
