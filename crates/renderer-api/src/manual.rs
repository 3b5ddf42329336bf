// Offline renderer driven by explicit clock ticks

use crate::{AudioRenderer, AudioSpec, RenderCallback, RendererFactory};
use parking_lot::Mutex;
use playhead_core::{AudioError, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

struct ClockInner {
    callback: Mutex<Option<RenderCallback>>,
    spec: Mutex<AudioSpec>,
    playing: AtomicBool,
    fail_next_start: AtomicBool,
    /// Bumped per created renderer; stale renderers cannot touch the clock
    generation: AtomicU64,
    ticks: AtomicU64,
}

impl ClockInner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }
}

/// Device clock for offline rendering and tests.
/// Each `tick` runs the current renderer's callback once, on the calling thread.
#[derive(Clone)]
pub struct ManualClock {
    inner: Arc<ClockInner>,
}

impl ManualClock {
    /// Pull `frames` frames; silence when the device is stopped
    pub fn tick(&self, frames: usize) -> Vec<f32> {
        let channels = self.inner.spec.lock().channels.max(1) as usize;
        let mut out = vec![0.0; frames * channels];
        self.tick_into(&mut out);
        out
    }

    /// Pull one interleaved buffer into `out`; returns whether the callback ran
    pub fn tick_into(&self, out: &mut [f32]) -> bool {
        let mut callback = self.inner.callback.lock();
        match callback.as_mut() {
            Some(render) if self.inner.playing.load(Ordering::Acquire) => {
                render(out);
                self.inner.ticks.fetch_add(1, Ordering::Relaxed);
                true
            }
            _ => {
                out.fill(0.0);
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.playing.load(Ordering::Acquire)
    }

    /// Callbacks run so far
    pub fn ticks(&self) -> u64 {
        self.inner.ticks.load(Ordering::Relaxed)
    }

    pub fn spec(&self) -> AudioSpec {
        *self.inner.spec.lock()
    }

    /// Make the next `start` fail with a DeviceError
    pub fn fail_next_start(&self) {
        self.inner.fail_next_start.store(true, Ordering::Release);
    }
}

pub struct ManualRenderer {
    inner: Arc<ClockInner>,
    generation: u64,
    spec: AudioSpec,
}

impl AudioRenderer for ManualRenderer {
    fn start(&mut self) -> Result<()> {
        if !self.inner.is_current(self.generation) {
            return Err(AudioError::DeviceError("Renderer was released".to_string()));
        }
        if self.inner.fail_next_start.swap(false, Ordering::AcqRel) {
            return Err(AudioError::DeviceError(
                "Manual clock refused to start".to_string(),
            ));
        }
        self.inner.playing.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.inner.is_current(self.generation) {
            self.inner.playing.store(false, Ordering::Release);
            // Wait out a tick that is already inside the callback
            drop(self.inner.callback.lock());
        }
        Ok(())
    }

    fn set_render_callback(&mut self, callback: RenderCallback) -> Result<()> {
        if !self.inner.is_current(self.generation) {
            return Err(AudioError::DeviceError("Renderer was released".to_string()));
        }
        *self.inner.callback.lock() = Some(callback);
        Ok(())
    }

    fn get_sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    fn get_channels(&self) -> u16 {
        self.spec.channels
    }

    fn get_buffer_size(&self) -> usize {
        self.spec.buffer_size
    }

    fn is_playing(&self) -> bool {
        self.inner.is_current(self.generation) && self.inner.playing.load(Ordering::Acquire)
    }

    fn release(&mut self) -> Result<()> {
        self.stop()?;
        if self.inner.is_current(self.generation) {
            self.inner.callback.lock().take();
        }
        Ok(())
    }
}

/// Hands out renderers that all share one [`ManualClock`].
/// Creating a renderer retires the previous one.
pub struct ManualRendererFactory {
    inner: Arc<ClockInner>,
    channels: Option<u16>,
}

impl ManualRendererFactory {
    pub fn new() -> (Self, ManualClock) {
        let inner = Arc::new(ClockInner {
            callback: Mutex::new(None),
            spec: Mutex::new(AudioSpec::default()),
            playing: AtomicBool::new(false),
            fail_next_start: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
        });
        let clock = ManualClock {
            inner: inner.clone(),
        };
        (
            Self {
                inner,
                channels: None,
            },
            clock,
        )
    }

    /// Fix the device channel count instead of following the source
    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = Some(channels.max(1));
        self
    }
}

impl RendererFactory for ManualRendererFactory {
    fn create_renderer(&self, spec: AudioSpec) -> Result<Box<dyn AudioRenderer>> {
        let spec = AudioSpec {
            channels: self.channels.unwrap_or(spec.channels).max(1),
            ..spec
        };
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.playing.store(false, Ordering::Release);
        *self.inner.callback.lock() = None;
        *self.inner.spec.lock() = spec;
        log::debug!("Manual renderer #{} created: {:?}", generation, spec);

        Ok(Box::new(ManualRenderer {
            inner: self.inner.clone(),
            generation,
            spec,
        }))
    }
}
