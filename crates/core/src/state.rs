// Transport state shared between the control thread and the render thread

use crate::error::{AudioError, Result};
use std::sync::atomic::{AtomicU8, Ordering};

/// Transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransportState {
    /// Nothing played yet in this session
    Stopped = 0,
    /// Render callback is supplying source frames
    Playing = 1,
    /// Device stopped, position retained
    Paused = 2,
    /// Reached the last frame without looping
    EndOfFile = 3,
}

impl TransportState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => TransportState::Playing,
            2 => TransportState::Paused,
            3 => TransportState::EndOfFile,
            _ => TransportState::Stopped,
        }
    }

    /// Whether `self -> to` is a legal transition
    pub fn can_transition_to(self, to: TransportState) -> bool {
        use TransportState::*;

        match (self, to) {
            // From Stopped
            (Stopped, Playing) => true,
            (Stopped, EndOfFile) => true, // seek to the last frame

            // From Playing
            (Playing, Paused) => true,
            (Playing, EndOfFile) => true,
            (Playing, Stopped) => true, // load while playing

            // From Paused
            (Paused, Playing) => true,
            (Paused, EndOfFile) => true,
            (Paused, Stopped) => true,

            // From EndOfFile
            (EndOfFile, Playing) => true,
            (EndOfFile, Paused) => true, // seek away from the end
            (EndOfFile, Stopped) => true,

            _ => false,
        }
    }
}

/// Lock-free transport state cell.
///
/// Written by the control thread for play/pause/seek/load and by the render
/// thread only for `Playing -> EndOfFile`.
#[derive(Debug)]
pub struct TransportCell {
    state: AtomicU8,
}

impl TransportCell {
    pub fn new(state: TransportState) -> Self {
        Self {
            state: AtomicU8::new(state as u8),
        }
    }

    pub fn get(&self) -> TransportState {
        TransportState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_playing(&self) -> bool {
        self.get() == TransportState::Playing
    }

    /// Validated transition from the control thread.
    /// Returns the previous state; same-state requests are accepted as no-ops.
    pub fn transition(&self, to: TransportState) -> Result<TransportState> {
        let from = self.get();
        if from == to {
            return Ok(from);
        }
        if !from.can_transition_to(to) {
            return Err(AudioError::InvalidState(format!(
                "Invalid state transition from {:?} to {:?}",
                from, to
            )));
        }
        if self.compare_exchange(from, to) {
            log::debug!("Transport state changed: {:?} -> {:?}", from, to);
            Ok(from)
        } else {
            // The render thread raced us to EndOfFile; retry from there.
            self.transition(to)
        }
    }

    /// Atomically move `from -> to`; false if the state was not `from`.
    /// Never logs, so it is safe on the render thread.
    pub fn compare_exchange(&self, from: TransportState, to: TransportState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Unconditional store, used when a session is (re)built
    pub fn reset(&self, state: TransportState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl Default for TransportCell {
    fn default() -> Self {
        Self::new(TransportState::Stopped)
    }
}

/// Snapshot of the player, cheap to copy to a UI
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackStatus {
    pub state: TransportState,
    pub frame_index: u64,
    pub total_frames: u64,
    pub sample_rate: u32,
    pub should_loop: bool,
}

impl PlaybackStatus {
    pub fn current_time(&self) -> f64 {
        frames_to_seconds(self.frame_index, self.sample_rate)
    }

    pub fn duration(&self) -> f64 {
        frames_to_seconds(self.total_frames, self.sample_rate)
    }
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            state: TransportState::Stopped,
            frame_index: 0,
            total_frames: 0,
            sample_rate: 0,
            should_loop: false,
        }
    }
}

pub fn frames_to_seconds(frames: u64, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        0.0
    } else {
        frames as f64 / sample_rate as f64
    }
}

/// `MM:SS`, minutes keep counting past an hour
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}
