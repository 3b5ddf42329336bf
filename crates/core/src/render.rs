// Real-time render engine: pulls frames from the source into the device buffer

use crate::notify::RenderNotifier;
use crate::session::SessionShared;
use crate::source::SourceAdapter;
use crate::state::TransportState;
use std::sync::Arc;

/// Runs inside the device callback.
///
/// Everything is allocated up front: `render` does not allocate, log, or
/// wait on a lock. Source read failures become silence plus an event.
pub struct RenderEngine {
    source: Box<dyn SourceAdapter>,
    shared: Arc<SessionShared>,
    notifier: RenderNotifier,
    scratch: Vec<Vec<f32>>,
    device_channels: usize,
}

impl RenderEngine {
    pub fn new(
        source: Box<dyn SourceAdapter>,
        shared: Arc<SessionShared>,
        notifier: RenderNotifier,
        device_channels: u16,
        frames_per_slice: usize,
    ) -> Self {
        let source_channels = shared.info.channels.max(1) as usize;
        Self {
            source,
            shared,
            notifier,
            scratch: vec![vec![0.0; frames_per_slice.max(1)]; source_channels],
            device_channels: device_channels.max(1) as usize,
        }
    }

    pub fn shared(&self) -> &Arc<SessionShared> {
        &self.shared
    }

    /// Fill one interleaved device buffer
    pub fn render(&mut self, out: &mut [f32]) {
        let shared = &*self.shared;

        if let Some(target) = shared.seek.take() {
            shared.position.set(target.min(shared.info.total_frames));
        }

        if shared.transport.get() != TransportState::Playing {
            out.fill(0.0);
            return;
        }

        let channels = self.device_channels;
        let total_out = out.len() / channels;
        if total_out == 0 {
            out.fill(0.0);
            return;
        }

        let total = shared.info.total_frames;
        let slice = self.scratch[0].len();
        let mut position = shared.position.get().min(total);
        let mut written = 0usize;
        let mut ended = false;

        while written < total_out {
            if position >= total {
                if shared.should_loop() && total > 0 {
                    position = 0;
                } else {
                    ended = true;
                    break;
                }
            }

            let remaining = (total - position).min(usize::MAX as u64) as usize;
            let want = (total_out - written).min(slice).min(remaining);

            let mut failed = false;
            let got = match self.source.read(position, want, &mut self.scratch) {
                Ok(n) => n.min(want),
                Err(error) => {
                    self.notifier.source_error(position, error);
                    failed = true;
                    0
                }
            };

            let source_channels = self.scratch.len();
            let block = &mut out[written * channels..(written + got) * channels];
            for (i, frame) in block.chunks_exact_mut(channels).enumerate() {
                for (c, sample) in frame.iter_mut().enumerate() {
                    *sample = self.scratch[c % source_channels][i];
                }
            }

            self.notifier.samples(&self.scratch, got);
            written += got;
            position += got as u64;

            if failed {
                break;
            }
            if got == 0 {
                // The data ran out before the advertised length
                if shared.should_loop() && position > 0 {
                    position = 0;
                    continue;
                }
                ended = true;
                break;
            }
        }

        out[written * channels..].fill(0.0);
        shared.position.set(position);
        self.notifier.position(position);

        if ended
            && shared
                .transport
                .compare_exchange(TransportState::Playing, TransportState::EndOfFile)
        {
            self.notifier.end_of_file();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::PlayerEvent;
    use crate::config::PlayerConfig;
    use crate::error::{AudioError, Result};
    use crate::notify::{render_link, ControlEpoch, RenderLink};
    use crate::source::{MemorySource, SourceInfo};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32).collect()
    }

    fn engine_for(
        source: Box<dyn SourceAdapter>,
        device_channels: u16,
        slice: usize,
    ) -> (RenderEngine, RenderLink) {
        let info = source.info();
        let config = PlayerConfig::default().with_frames_per_slice(slice);
        let shared = Arc::new(SessionShared::new(info, Arc::new(AtomicBool::new(false))));
        let (notifier, link) = render_link(&config, info.channels, ControlEpoch::default());
        let engine = RenderEngine::new(source, shared, notifier, device_channels, slice);
        (engine, link)
    }

    fn events(link: &RenderLink) -> Vec<PlayerEvent> {
        link_events(link)
            .into_iter()
            .filter(|e| !matches!(e, PlayerEvent::SamplesRead { .. }))
            .collect()
    }

    fn link_events(link: &RenderLink) -> Vec<PlayerEvent> {
        link.receiver().try_iter().map(|s| s.event).collect()
    }

    #[test]
    fn test_silence_unless_playing() {
        let source = MemorySource::new(100, vec![ramp(10)]).unwrap();
        let (mut engine, link) = engine_for(Box::new(source), 1, 4);
        let mut out = vec![9.0; 4];

        engine.render(&mut out);
        assert_eq!(out, vec![0.0; 4]);
        assert!(link_events(&link).is_empty());
        assert_eq!(engine.shared().position.get(), 0);
    }

    #[test]
    fn test_pending_seek_is_consumed_even_when_idle() {
        let source = MemorySource::new(100, vec![ramp(10)]).unwrap();
        let (mut engine, _link) = engine_for(Box::new(source), 1, 4);
        engine.shared().seek.request(6);

        engine.render(&mut [0.0; 4]);
        assert_eq!(engine.shared().position.get(), 6);
        assert_eq!(engine.shared().seek.peek(), None);
    }

    #[test]
    fn test_reads_advance_position() {
        let source = MemorySource::new(100, vec![ramp(10)]).unwrap();
        let (mut engine, link) = engine_for(Box::new(source), 1, 4);
        engine.shared().transport.reset(TransportState::Playing);
        engine.shared().seek.request(2);

        let mut out = [0.0; 3];
        engine.render(&mut out);
        assert_eq!(out, [2.0, 3.0, 4.0]);
        assert_eq!(engine.shared().position.get(), 5);
        assert_eq!(
            events(&link),
            vec![PlayerEvent::PositionChanged { frame: 5 }]
        );
    }

    #[test]
    fn test_large_buffer_is_sliced() {
        let source = MemorySource::new(100, vec![ramp(20)]).unwrap();
        let (mut engine, link) = engine_for(Box::new(source), 1, 4);
        engine.shared().transport.reset(TransportState::Playing);

        let mut out = [0.0; 10];
        engine.render(&mut out);
        assert_eq!(out.to_vec(), ramp(10));

        let reads: Vec<_> = link_events(&link)
            .into_iter()
            .filter_map(|e| match e {
                PlayerEvent::SamplesRead { frames, .. } => Some(frames),
                _ => None,
            })
            .collect();
        assert_eq!(reads, vec![4, 4, 2]);
    }

    #[test]
    fn test_loop_wrap_splices_within_buffer() {
        let source = MemorySource::new(100, vec![ramp(10)]).unwrap();
        let (mut engine, link) = engine_for(Box::new(source), 1, 16);
        engine.shared().looping.store(true, Ordering::Relaxed);
        engine.shared().transport.reset(TransportState::Playing);
        engine.shared().seek.request(7);

        let mut out = [0.0; 6];
        engine.render(&mut out);
        assert_eq!(out, [7.0, 8.0, 9.0, 0.0, 1.0, 2.0]);
        assert_eq!(engine.shared().position.get(), 3);
        assert_eq!(engine.shared().transport.get(), TransportState::Playing);
        assert!(!events(&link).contains(&PlayerEvent::EndOfFile));
    }

    #[test]
    fn test_end_of_file_once_then_silence() {
        let source = MemorySource::new(100, vec![ramp(10)]).unwrap();
        let (mut engine, link) = engine_for(Box::new(source), 1, 16);
        engine.shared().transport.reset(TransportState::Playing);
        engine.shared().seek.request(7);

        let mut out = [0.0; 6];
        engine.render(&mut out);
        assert_eq!(out, [7.0, 8.0, 9.0, 0.0, 0.0, 0.0]);
        assert_eq!(engine.shared().transport.get(), TransportState::EndOfFile);

        let mut again = [5.0; 6];
        engine.render(&mut again);
        assert_eq!(again, [0.0; 6]);

        let eof_count = events(&link)
            .iter()
            .filter(|e| **e == PlayerEvent::EndOfFile)
            .count();
        assert_eq!(eof_count, 1);
        assert_eq!(engine.shared().position.get(), 10);
    }

    #[test]
    fn test_mono_source_fills_every_device_channel() {
        let source = MemorySource::new(100, vec![ramp(4)]).unwrap();
        let (mut engine, _link) = engine_for(Box::new(source), 2, 8);
        engine.shared().transport.reset(TransportState::Playing);

        let mut out = [0.0; 4];
        engine.render(&mut out);
        assert_eq!(out, [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_stereo_source_on_mono_device_takes_first_channel() {
        let source = MemorySource::new(100, vec![vec![1.0; 4], vec![-1.0; 4]]).unwrap();
        let (mut engine, _link) = engine_for(Box::new(source), 1, 8);
        engine.shared().transport.reset(TransportState::Playing);

        let mut out = [0.0; 2];
        engine.render(&mut out);
        assert_eq!(out, [1.0, 1.0]);
    }

    struct FailingSource {
        info: SourceInfo,
    }

    impl SourceAdapter for FailingSource {
        fn info(&self) -> SourceInfo {
            self.info
        }

        fn read(&mut self, start: u64, _frames: usize, _buffers: &mut [Vec<f32>]) -> Result<usize> {
            Err(AudioError::SourceRead {
                frame: start,
                message: "disk gone".to_string(),
            })
        }

        fn reopen(&self) -> Result<Box<dyn SourceAdapter>> {
            Ok(Box::new(FailingSource { info: self.info }))
        }
    }

    #[test]
    fn test_read_error_becomes_silence_and_event() {
        let info = SourceInfo {
            total_frames: 100,
            sample_rate: 100,
            channels: 1,
        };
        let (mut engine, link) = engine_for(Box::new(FailingSource { info }), 1, 8);
        engine.shared().transport.reset(TransportState::Playing);
        engine.shared().seek.request(40);

        let mut out = [3.0; 4];
        engine.render(&mut out);
        assert_eq!(out, [0.0; 4]);
        assert_eq!(engine.shared().position.get(), 40);
        assert_eq!(engine.shared().transport.get(), TransportState::Playing);

        let seen = events(&link);
        assert!(matches!(
            seen.first(),
            Some(PlayerEvent::SourceError { frame: 40, .. })
        ));
    }

    /// Advertises more frames than it can deliver
    struct ShortSource {
        inner: MemorySource,
        claimed: u64,
    }

    impl SourceAdapter for ShortSource {
        fn info(&self) -> SourceInfo {
            SourceInfo {
                total_frames: self.claimed,
                ..self.inner.info()
            }
        }

        fn read(&mut self, start: u64, frames: usize, buffers: &mut [Vec<f32>]) -> Result<usize> {
            self.inner.read(start, frames, buffers)
        }

        fn reopen(&self) -> Result<Box<dyn SourceAdapter>> {
            Ok(Box::new(ShortSource {
                inner: self.inner.clone(),
                claimed: self.claimed,
            }))
        }
    }

    #[test]
    fn test_short_read_ends_playback() {
        let source = ShortSource {
            inner: MemorySource::new(100, vec![ramp(10)]).unwrap(),
            claimed: 20,
        };
        let (mut engine, link) = engine_for(Box::new(source), 1, 32);
        engine.shared().transport.reset(TransportState::Playing);

        let mut out = [1.0; 16];
        engine.render(&mut out);
        assert_eq!(&out[..10], ramp(10).as_slice());
        assert_eq!(&out[10..], &[0.0; 6]);
        assert_eq!(engine.shared().transport.get(), TransportState::EndOfFile);
        assert!(events(&link).contains(&PlayerEvent::EndOfFile));
    }

    /// Delivers `good` frames, then fails every read after them
    struct TruncatedSource {
        inner: MemorySource,
        good: u64,
    }

    impl SourceAdapter for TruncatedSource {
        fn info(&self) -> SourceInfo {
            self.inner.info()
        }

        fn read(&mut self, start: u64, frames: usize, buffers: &mut [Vec<f32>]) -> Result<usize> {
            if start >= self.good {
                return Err(AudioError::SourceRead {
                    frame: start,
                    message: "unreadable".to_string(),
                });
            }
            let frames = frames.min((self.good - start) as usize);
            self.inner.read(start, frames, buffers)
        }

        fn reopen(&self) -> Result<Box<dyn SourceAdapter>> {
            Ok(Box::new(TruncatedSource {
                inner: self.inner.clone(),
                good: self.good,
            }))
        }
    }

    #[test]
    fn test_frames_before_a_failed_read_are_kept() {
        let source = TruncatedSource {
            inner: MemorySource::new(100, vec![ramp(20)]).unwrap(),
            good: 5,
        };
        let (mut engine, link) = engine_for(Box::new(source), 1, 16);
        engine.shared().transport.reset(TransportState::Playing);

        let mut out = [9.0; 8];
        engine.render(&mut out);
        assert_eq!(out, [0.0, 1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0]);
        assert_eq!(engine.shared().position.get(), 5);
        assert_eq!(engine.shared().transport.get(), TransportState::Playing);

        let seen = events(&link);
        assert!(matches!(
            seen.first(),
            Some(PlayerEvent::SourceError { frame: 5, .. })
        ));
        assert!(!seen.contains(&PlayerEvent::EndOfFile));
    }

    #[test]
    fn test_short_source_wraps_when_looping() {
        let source = ShortSource {
            inner: MemorySource::new(100, vec![ramp(4)]).unwrap(),
            claimed: 10,
        };
        let (mut engine, link) = engine_for(Box::new(source), 1, 16);
        engine.shared().looping.store(true, Ordering::Relaxed);
        engine.shared().transport.reset(TransportState::Playing);

        let mut out = [0.0; 6];
        engine.render(&mut out);
        assert_eq!(out, [0.0, 1.0, 2.0, 3.0, 0.0, 1.0]);
        assert_eq!(engine.shared().transport.get(), TransportState::Playing);
        assert!(!events(&link).contains(&PlayerEvent::EndOfFile));
    }
}
