// Player configuration

use std::time::Duration;

/// Maximum frames rendered per slice, and the default device buffer size
pub const DEFAULT_FRAMES_PER_SLICE: usize = 4096;

/// Bound of each notification queue
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Visualization ring size, in frames per channel
pub const DEFAULT_SAMPLE_TAP_FRAMES: usize = 16_384;

/// Minimum spacing of position notifications (milliseconds)
pub const DEFAULT_POSITION_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    /// Largest block the render engine reads from the source at once.
    /// Device callbacks larger than this are processed in several slices.
    pub frames_per_slice: usize,
    pub event_capacity: usize,
    pub sample_tap_frames: usize,
    pub position_interval: Duration,
}

impl PlayerConfig {
    pub fn with_frames_per_slice(mut self, frames: usize) -> Self {
        self.frames_per_slice = frames.max(1);
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(8);
        self
    }

    pub fn with_sample_tap_frames(mut self, frames: usize) -> Self {
        self.sample_tap_frames = frames;
        self
    }

    pub fn with_position_interval(mut self, interval: Duration) -> Self {
        self.position_interval = interval;
        self
    }

    /// Sample tap capacity in samples for a given channel count
    pub fn sample_tap_capacity(&self, channels: u16) -> usize {
        self.sample_tap_frames
            .max(self.frames_per_slice)
            .saturating_mul(channels.max(1) as usize)
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            frames_per_slice: DEFAULT_FRAMES_PER_SLICE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            sample_tap_frames: DEFAULT_SAMPLE_TAP_FRAMES,
            position_interval: Duration::from_millis(DEFAULT_POSITION_INTERVAL_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_clamp() {
        let config = PlayerConfig::default()
            .with_frames_per_slice(0)
            .with_event_capacity(1)
            .with_position_interval(Duration::ZERO);
        assert_eq!(config.frames_per_slice, 1);
        assert_eq!(config.event_capacity, 8);
        assert_eq!(config.position_interval, Duration::ZERO);
    }

    #[test]
    fn test_tap_capacity_covers_a_slice() {
        let config = PlayerConfig::default()
            .with_frames_per_slice(8192)
            .with_sample_tap_frames(1024);
        assert_eq!(config.sample_tap_capacity(2), 16_384);
    }
}
