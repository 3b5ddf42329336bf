// Lock-free PCM tap between the render thread and the notification dispatcher

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Create a tap holding up to `capacity` samples (all channels together).
pub fn sample_tap(capacity: usize) -> (TapWriter, TapReader) {
    let (producer, consumer) = HeapRb::<f32>::new(capacity.max(1)).split();
    (
        TapWriter { inner: producer },
        TapReader {
            inner: consumer,
            block: Vec::new(),
        },
    )
}

/// Render-side half. Never blocks and never allocates.
pub struct TapWriter {
    inner: HeapProd<f32>,
}

impl TapWriter {
    /// Push `frames` frames of planar audio, channel after channel.
    ///
    /// The block is written whole or not at all, so the reader always sees
    /// complete blocks. Returns false when there is not enough room.
    pub fn push_planar(&mut self, channels: &[Vec<f32>], frames: usize) -> bool {
        let needed = frames * channels.len();
        if needed == 0 {
            return true;
        }
        if self.inner.vacant_len() < needed {
            return false;
        }
        if channels.iter().any(|ch| ch.len() < frames) {
            return false;
        }

        for channel in channels {
            self.inner.push_slice(&channel[..frames]);
        }
        true
    }

    /// Free space in samples
    pub fn vacant(&self) -> usize {
        self.inner.vacant_len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity().get()
    }
}

/// Dispatcher-side half. Reuses its block storage between reads.
pub struct TapReader {
    inner: HeapCons<f32>,
    block: Vec<Vec<f32>>,
}

impl TapReader {
    /// Pop one planar block previously written with [`TapWriter::push_planar`].
    ///
    /// Returns `None` if the tap does not hold a full block of that shape.
    pub fn pop_planar(&mut self, channels: usize, frames: usize) -> Option<PlanarBlock<'_>> {
        let needed = frames * channels;
        if needed == 0 || self.inner.occupied_len() < needed {
            return None;
        }

        if self.block.len() < channels {
            self.block.resize_with(channels, Vec::new);
        }
        for channel in self.block.iter_mut().take(channels) {
            channel.resize(frames, 0.0);
            let read = self.inner.pop_slice(&mut channel[..frames]);
            debug_assert_eq!(read, frames);
        }
        Some(PlanarBlock {
            channels: &self.block[..channels],
            frames,
        })
    }

    /// Samples waiting to be read
    pub fn available(&self) -> usize {
        self.inner.occupied_len()
    }

    /// Drop everything currently buffered
    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

/// A borrowed block of planar samples.
#[derive(Debug, Clone, Copy)]
pub struct PlanarBlock<'a> {
    channels: &'a [Vec<f32>],
    frames: usize,
}

impl<'a> PlanarBlock<'a> {
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> &'a [f32] {
        &self.channels[index][..self.frames]
    }

    /// One slice per channel, each `frames()` long
    pub fn slices(&self) -> Vec<&'a [f32]> {
        self.channels.iter().map(|c| &c[..self.frames]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_block_round_trip() {
        let (mut writer, mut reader) = sample_tap(64);
        let left = vec![0.1, 0.2, 0.3, 0.4];
        let right = vec![-0.1, -0.2, -0.3, -0.4];

        assert!(writer.push_planar(&[left.clone(), right.clone()], 3));
        assert_eq!(reader.available(), 6);

        let block = reader.pop_planar(2, 3).unwrap();
        assert_eq!(block.frames(), 3);
        assert_eq!(block.channel_count(), 2);
        assert_eq!(block.channel(0), &left[..3]);
        assert_eq!(block.channel(1), &right[..3]);
        assert_eq!(reader.available(), 0);
    }

    #[test]
    fn test_block_rejected_when_full() {
        let (mut writer, mut reader) = sample_tap(8);
        let chan = vec![1.0; 4];

        assert!(writer.push_planar(&[chan.clone(), chan.clone()], 4));
        // Tap is full; a second block is dropped whole
        assert!(!writer.push_planar(&[chan.clone(), chan.clone()], 1));
        assert_eq!(reader.available(), 8);

        assert!(reader.pop_planar(2, 4).is_some());
        assert!(writer.push_planar(&[chan.clone(), chan], 4));
    }

    #[test]
    fn test_pop_requires_full_block() {
        let (mut writer, mut reader) = sample_tap(16);
        assert!(writer.push_planar(&[vec![0.5; 2]], 2));

        assert!(reader.pop_planar(1, 3).is_none());
        assert!(reader.pop_planar(1, 2).is_some());
    }

    #[test]
    fn test_clear_discards_pending_samples() {
        let (mut writer, mut reader) = sample_tap(16);
        assert!(writer.push_planar(&[vec![0.5; 4]], 4));

        reader.clear();
        assert_eq!(reader.available(), 0);
        assert!(reader.pop_planar(1, 4).is_none());
    }

    #[test]
    fn test_short_channel_is_rejected() {
        let (mut writer, reader) = sample_tap(16);
        assert!(!writer.push_planar(&[vec![0.0; 4], vec![0.0; 2]], 4));
        assert_eq!(reader.available(), 0);
    }
}
