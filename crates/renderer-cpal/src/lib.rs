// Desktop audio renderer using cpal

#[cfg(feature = "device")]
mod cpal_renderer;
#[cfg_attr(not(feature = "device"), allow(dead_code))]
mod gate;

#[cfg(feature = "device")]
pub use cpal_renderer::{CpalRenderer, CpalRendererFactory};

#[cfg(not(feature = "device"))]
mod stub {
    use playhead_core::{AudioError, Result};
    use playhead_renderer_api::{AudioRenderer, AudioSpec, RendererFactory};

    const DISABLED: &str = "Built without the `device` feature; no output device available";

    pub struct CpalRenderer;

    impl CpalRenderer {
        pub fn new(_spec: AudioSpec) -> Result<Self> {
            Err(AudioError::DeviceError(DISABLED.to_string()))
        }
    }

    #[derive(Debug, Default)]
    pub struct CpalRendererFactory;

    impl CpalRendererFactory {
        pub fn new() -> Self {
            Self
        }
    }

    impl RendererFactory for CpalRendererFactory {
        fn create_renderer(&self, _spec: AudioSpec) -> Result<Box<dyn AudioRenderer>> {
            Err(AudioError::DeviceError(DISABLED.to_string()))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_factory_reports_device_error() {
            let result = CpalRendererFactory::new().create_renderer(AudioSpec::default());
            assert!(matches!(result, Err(AudioError::DeviceError(_))));
            assert!(CpalRenderer::new(AudioSpec::default()).is_err());
        }
    }
}

#[cfg(not(feature = "device"))]
pub use stub::{CpalRenderer, CpalRendererFactory};
