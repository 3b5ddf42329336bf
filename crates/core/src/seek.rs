// Single-slot pending seek handed from the control thread to the render thread

use std::sync::atomic::{AtomicU64, Ordering};

const NO_SEEK: u64 = u64::MAX;

/// Pending seek target. A new request overwrites an unconsumed one, so the
/// latest request always wins and nothing is ever queued.
#[derive(Debug)]
pub struct SeekCoordinator {
    pending: AtomicU64,
}

impl SeekCoordinator {
    pub fn new() -> Self {
        Self {
            pending: AtomicU64::new(NO_SEEK),
        }
    }

    /// Replace any pending target with `frame`.
    /// The caller validates the range against the session.
    pub fn request(&self, frame: u64) {
        debug_assert_ne!(frame, NO_SEEK);
        self.pending.store(frame, Ordering::Release);
    }

    /// Consume the pending target, if any. Called once per render cycle.
    pub fn take(&self) -> Option<u64> {
        match self.pending.swap(NO_SEEK, Ordering::AcqRel) {
            NO_SEEK => None,
            frame => Some(frame),
        }
    }

    /// Look at the pending target without consuming it
    pub fn peek(&self) -> Option<u64> {
        match self.pending.load(Ordering::Acquire) {
            NO_SEEK => None,
            frame => Some(frame),
        }
    }

    pub fn clear(&self) {
        self.pending.store(NO_SEEK, Ordering::Release);
    }
}

impl Default for SeekCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
