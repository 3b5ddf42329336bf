// cpal-based renderer for the system's default output device

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use crate::gate::CallbackGate;
use playhead_core::{AudioError, Result};
use playhead_renderer_api::{AudioRenderer, AudioSpec, RenderCallback, RendererFactory};
use std::sync::Arc;

/// cpal audio renderer
pub struct CpalRenderer {
    stream: Option<Stream>,
    gate: Arc<CallbackGate>,
    sample_rate: u32,
    channels: u16,
    buffer_size: usize,
}

impl CpalRenderer {
    /// Open the default output device at `spec.sample_rate`.
    /// A `spec.channels` of 0 takes the device's own channel count.
    pub fn new(spec: AudioSpec) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceError("No output device available".to_string()))?;

        let channels = if spec.channels == 0 {
            device
                .default_output_config()
                .map_err(|e| AudioError::DeviceError(format!("No default output config: {}", e)))?
                .channels()
        } else {
            spec.channels
        };

        let config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(spec.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(spec.buffer_size as u32),
        };

        let gate = Arc::new(CallbackGate::default());

        let build = |config: &StreamConfig| {
            let gate = gate.clone();
            device.build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| gate.fill(data),
                |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None,
            )
        };

        // Not every backend accepts a fixed buffer size
        let stream = match build(&config) {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("Fixed buffer of {} frames rejected ({}); using device default", spec.buffer_size, e);
                let config = StreamConfig {
                    buffer_size: cpal::BufferSize::Default,
                    ..config.clone()
                };
                build(&config).map_err(|e| {
                    AudioError::DeviceError(format!("Failed to build output stream: {}", e))
                })?
            }
        };

        log::info!(
            "Output stream ready: {} Hz, {} channel(s)",
            spec.sample_rate,
            channels
        );

        Ok(Self {
            stream: Some(stream),
            gate,
            sample_rate: spec.sample_rate,
            channels,
            buffer_size: spec.buffer_size,
        })
    }
}

impl AudioRenderer for CpalRenderer {
    fn start(&mut self) -> Result<()> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| AudioError::DeviceError("Renderer was released".to_string()))?;
        stream
            .play()
            .map_err(|e| AudioError::DeviceError(format!("Failed to start stream: {}", e)))?;
        self.gate.open();
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.gate.close();
        if let Some(stream) = &self.stream {
            stream
                .pause()
                .map_err(|e| AudioError::DeviceError(format!("Failed to stop stream: {}", e)))?;
        }
        Ok(())
    }

    fn set_render_callback(&mut self, callback: RenderCallback) -> Result<()> {
        self.gate.set(callback);
        Ok(())
    }

    fn get_sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn get_channels(&self) -> u16 {
        self.channels
    }

    fn get_buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn is_playing(&self) -> bool {
        self.gate.is_open()
    }

    fn release(&mut self) -> Result<()> {
        self.stop()?;
        self.stream = None;
        self.gate.clear();
        Ok(())
    }
}

impl Drop for CpalRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("Failed to release output stream: {}", e);
        }
    }
}

// SAFETY: cpal::Stream is !Send on some backends because of platform
// threading rules. The stream is only touched through `&mut self`, by the
// single player that owns this renderer, and is dropped on release.
unsafe impl Send for CpalRenderer {}

/// Creates [`CpalRenderer`]s on the default device, matching the source's
/// sample rate and keeping the device's channel layout.
#[derive(Debug, Default)]
pub struct CpalRendererFactory;

impl CpalRendererFactory {
    pub fn new() -> Self {
        Self
    }
}

impl RendererFactory for CpalRendererFactory {
    fn create_renderer(&self, spec: AudioSpec) -> Result<Box<dyn AudioRenderer>> {
        let spec = AudioSpec {
            channels: 0,
            ..spec
        };
        Ok(Box::new(CpalRenderer::new(spec)?))
    }

    fn get_preferred_spec(&self) -> AudioSpec {
        let config = cpal::default_host()
            .default_output_device()
            .and_then(|device| device.default_output_config().ok());
        match config {
            Some(config) => AudioSpec {
                sample_rate: config.sample_rate().0,
                channels: config.channels(),
                ..AudioSpec::default()
            },
            None => AudioSpec::default(),
        }
    }
}
