// Source adapter seam: frame-addressable audio the render engine pulls from

use crate::error::{AudioError, Result};
use std::sync::Arc;

/// Fixed description of an opened source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub total_frames: u64,
    pub sample_rate: u32,
    pub channels: u16,
}

impl SourceInfo {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(AudioError::UnsupportedFormat(
                "Sample rate must be positive".to_string(),
            ));
        }
        if self.channels == 0 {
            return Err(AudioError::UnsupportedFormat(
                "Channel count must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        crate::state::frames_to_seconds(self.total_frames, self.sample_rate)
    }
}

/// A seekable, frame-addressable audio source.
///
/// `read` is called from the render thread. Implementations must not block
/// on anything other than the already-open resource.
pub trait SourceAdapter: Send {
    fn info(&self) -> SourceInfo;

    /// Read up to `frames` frames starting at frame `start` into `buffers`,
    /// one planar buffer per source channel, each at least `frames` long.
    ///
    /// Returns the number of frames written. A short count means the source
    /// ran out of frames.
    fn read(&mut self, start: u64, frames: usize, buffers: &mut [Vec<f32>]) -> Result<usize>;

    /// Open an independent handle to the same underlying audio, so the
    /// player's reads never contend with the caller's own use of `self`.
    fn reopen(&self) -> Result<Box<dyn SourceAdapter>>;

    /// Path or other locator the source was opened from
    fn locator(&self) -> Option<&str> {
        None
    }
}

/// In-memory planar source. Handles created by `reopen` share the sample data.
#[derive(Debug, Clone)]
pub struct MemorySource {
    channels: Arc<Vec<Vec<f32>>>,
    sample_rate: u32,
    locator: Option<String>,
}

impl MemorySource {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self> {
        let first = channels
            .first()
            .ok_or_else(|| AudioError::UnsupportedFormat("No channels".to_string()))?;
        if channels.iter().any(|c| c.len() != first.len()) {
            return Err(AudioError::UnsupportedFormat(
                "Channels differ in length".to_string(),
            ));
        }
        if channels.len() > u16::MAX as usize {
            return Err(AudioError::UnsupportedFormat(format!(
                "Too many channels: {}",
                channels.len()
            )));
        }

        let source = Self {
            channels: Arc::new(channels),
            sample_rate,
            locator: None,
        };
        source.info().validate()?;
        Ok(source)
    }

    /// Build from interleaved samples; a trailing partial frame is dropped
    pub fn from_interleaved(sample_rate: u32, channels: u16, samples: &[f32]) -> Result<Self> {
        if channels == 0 {
            return Err(AudioError::UnsupportedFormat(
                "Channel count must be positive".to_string(),
            ));
        }
        let count = channels as usize;
        let frames = samples.len() / count;
        let mut planar = vec![Vec::with_capacity(frames); count];
        for frame in samples.chunks_exact(count) {
            for (ch, &sample) in frame.iter().enumerate() {
                planar[ch].push(sample);
            }
        }
        Self::new(sample_rate, planar)
    }

    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }
}

impl SourceAdapter for MemorySource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            total_frames: self.channels[0].len() as u64,
            sample_rate: self.sample_rate,
            channels: self.channels.len() as u16,
        }
    }

    fn read(&mut self, start: u64, frames: usize, buffers: &mut [Vec<f32>]) -> Result<usize> {
        let total = self.channels[0].len();
        let start = usize::try_from(start).unwrap_or(usize::MAX).min(total);
        let count = frames.min(total - start);

        for (dst, src) in buffers.iter_mut().zip(self.channels.iter()) {
            dst[..count].copy_from_slice(&src[start..start + count]);
        }
        Ok(count)
    }

    fn reopen(&self) -> Result<Box<dyn SourceAdapter>> {
        Ok(Box::new(self.clone()))
    }

    fn locator(&self) -> Option<&str> {
        self.locator.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32).collect()
    }

    #[test]
    fn test_memory_source_info() {
        let source = MemorySource::new(48_000, vec![ramp(96_000), ramp(96_000)]).unwrap();
        let info = source.info();
        assert_eq!(info.total_frames, 96_000);
        assert_eq!(info.channels, 2);
        assert_eq!(info.duration(), 2.0);
    }

    #[test]
    fn test_memory_source_read_is_random_access() {
        let mut source = MemorySource::new(8_000, vec![ramp(10)]).unwrap();
        let mut buffers = vec![vec![0.0; 4]];

        assert_eq!(source.read(6, 4, &mut buffers).unwrap(), 4);
        assert_eq!(buffers[0], vec![6.0, 7.0, 8.0, 9.0]);

        assert_eq!(source.read(1, 2, &mut buffers).unwrap(), 2);
        assert_eq!(&buffers[0][..2], &[1.0, 2.0]);
    }

    #[test]
    fn test_memory_source_short_read_at_end() {
        let mut source = MemorySource::new(8_000, vec![ramp(10)]).unwrap();
        let mut buffers = vec![vec![0.0; 8]];

        assert_eq!(source.read(7, 8, &mut buffers).unwrap(), 3);
        assert_eq!(source.read(10, 8, &mut buffers).unwrap(), 0);
        assert_eq!(source.read(500, 8, &mut buffers).unwrap(), 0);
    }

    #[test]
    fn test_from_interleaved() {
        let source =
            MemorySource::from_interleaved(44_100, 2, &[0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
        let mut buffers = vec![vec![0.0; 2], vec![0.0; 2]];
        let mut handle = source.reopen().unwrap();

        assert_eq!(handle.info().total_frames, 2);
        assert_eq!(handle.read(0, 2, &mut buffers).unwrap(), 2);
        assert_eq!(buffers[0], vec![0.0, 2.0]);
        assert_eq!(buffers[1], vec![1.0, 3.0]);
    }

    #[test]
    fn test_rejects_bad_layouts() {
        assert!(MemorySource::new(44_100, vec![]).is_err());
        assert!(MemorySource::new(44_100, vec![vec![0.0; 3], vec![0.0; 2]]).is_err());
        assert!(MemorySource::new(0, vec![vec![0.0; 3]]).is_err());
        assert!(MemorySource::from_interleaved(44_100, 0, &[0.0]).is_err());
    }

    #[test]
    fn test_reopen_keeps_locator() {
        let source = MemorySource::new(44_100, vec![ramp(4)])
            .unwrap()
            .with_locator("memory://ramp");
        let handle = source.reopen().unwrap();
        assert_eq!(handle.locator(), Some("memory://ramp"));
    }
}
