// Authoritative frame position of the live session

use std::sync::atomic::{AtomicU64, Ordering};

/// Current frame index, readable from any thread.
///
/// The render thread advances it after each read; the control thread only
/// writes it directly while the transport is not playing.
#[derive(Debug, Default)]
pub struct PositionTracker {
    frame: AtomicU64,
}

impl PositionTracker {
    pub fn new(frame: u64) -> Self {
        Self {
            frame: AtomicU64::new(frame),
        }
    }

    pub fn get(&self) -> u64 {
        self.frame.load(Ordering::Acquire)
    }

    pub fn set(&self, frame: u64) {
        self.frame.store(frame, Ordering::Release);
    }
}
