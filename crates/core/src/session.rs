// State shared by the control surface and one session's render engine

use crate::position::PositionTracker;
use crate::seek::SeekCoordinator;
use crate::source::SourceInfo;
use crate::state::{PlaybackStatus, TransportCell, TransportState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One loaded source's atomics. Rebuilt on every load; the loop flag is
/// owned by the player and survives loads.
#[derive(Debug)]
pub struct SessionShared {
    pub transport: TransportCell,
    pub position: PositionTracker,
    pub seek: SeekCoordinator,
    pub looping: Arc<AtomicBool>,
    pub info: SourceInfo,
}

impl SessionShared {
    pub fn new(info: SourceInfo, looping: Arc<AtomicBool>) -> Self {
        Self {
            transport: TransportCell::new(TransportState::Stopped),
            position: PositionTracker::new(0),
            seek: SeekCoordinator::default(),
            looping,
            info,
        }
    }

    pub fn should_loop(&self) -> bool {
        self.looping.load(Ordering::Relaxed)
    }

    /// Pending seek target if one is queued, else the current frame
    pub fn target_frame(&self) -> u64 {
        self.seek
            .peek()
            .map(|frame| frame.min(self.info.total_frames))
            .unwrap_or_else(|| self.position.get())
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.transport.get(),
            frame_index: self.position.get(),
            total_frames: self.info.total_frames,
            sample_rate: self.info.sample_rate,
            should_loop: self.should_loop(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> SourceInfo {
        SourceInfo {
            total_frames: 1000,
            sample_rate: 100,
            channels: 1,
        }
    }

    #[test]
    fn test_status_reports_consumed_position() {
        let shared = SessionShared::new(info(), Arc::new(AtomicBool::new(false)));
        shared.position.set(10);
        assert_eq!(shared.target_frame(), 10);

        shared.seek.request(500);
        assert_eq!(shared.target_frame(), 500);
        assert_eq!(shared.status().frame_index, 10);
        assert_eq!(shared.status().current_time(), 0.1);
    }

    #[test]
    fn test_loop_flag_is_shared() {
        let looping = Arc::new(AtomicBool::new(false));
        let shared = SessionShared::new(info(), looping.clone());
        looping.store(true, Ordering::Relaxed);
        assert!(shared.status().should_loop);
    }
}
