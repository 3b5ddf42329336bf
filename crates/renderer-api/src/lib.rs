// Audio renderer abstraction layer

mod manual;

pub use manual::{ManualClock, ManualRenderer, ManualRendererFactory};

use playhead_core::Result;

/// Render callback driven by the device clock.
/// Receives an interleaved buffer and must fill all of it.
pub type RenderCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// Audio output device.
/// Platform implementations (cpal, the manual clock) implement this trait.
pub trait AudioRenderer: Send {
    /// Start pulling buffers from the render callback
    fn start(&mut self) -> Result<()>;

    /// Stop the device. Blocks until any in-flight callback has returned,
    /// so the callback is not running once this succeeds.
    fn stop(&mut self) -> Result<()>;

    /// Install the callback that provides PCM data
    fn set_render_callback(&mut self, callback: RenderCallback) -> Result<()>;

    fn get_sample_rate(&self) -> u32;

    fn get_channels(&self) -> u16;

    /// Preferred callback size in frames
    fn get_buffer_size(&self) -> usize;

    fn is_playing(&self) -> bool;

    /// Stop and drop the callback and all device resources
    fn release(&mut self) -> Result<()>;
}

/// Audio format requested from a renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_size: usize,
}

impl Default for AudioSpec {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            buffer_size: 1024,
        }
    }
}

/// Creates renderers; the player asks for a new one on every load
pub trait RendererFactory: Send + Sync {
    fn create_renderer(&self, spec: AudioSpec) -> Result<Box<dyn AudioRenderer>>;

    /// Spec used when nothing better is known
    fn get_preferred_spec(&self) -> AudioSpec {
        AudioSpec::default()
    }
}
