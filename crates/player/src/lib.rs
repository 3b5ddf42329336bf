// playhead: audio file playback with a real-time render engine

pub mod player;

pub use player::AudioPlayer;

// Re-exports
pub use playhead_core::{
    format_time, AudioError, ErrorKind, MemorySource, ObserverId, PlaybackStatus, PlayerConfig,
    PlayerObserver, Result, SourceAdapter, SourceInfo, TransportState,
};
pub use playhead_renderer_api::{
    AudioRenderer, AudioSpec, ManualClock, ManualRenderer, ManualRendererFactory, RenderCallback,
    RendererFactory,
};
pub use playhead_renderer_cpal::CpalRendererFactory;
pub use playhead_source_symphonia::SymphoniaSource;

/// Create a player on the default output device.
///
/// Loading fails with a DeviceError unless the crate is built with the
/// `device` feature.
pub fn create_player() -> AudioPlayer {
    create_player_with_config(PlayerConfig::default())
}

pub fn create_player_with_config(config: PlayerConfig) -> AudioPlayer {
    log::info!("Creating audio player on the default output device");
    AudioPlayer::with_config(CpalRendererFactory::new(), config)
}

/// Create a player driven by a [`ManualClock`] instead of a device
pub fn create_offline_player(config: PlayerConfig) -> (AudioPlayer, ManualClock) {
    let (factory, clock) = ManualRendererFactory::new();
    log::info!("Creating offline audio player");
    (AudioPlayer::with_config(factory, config), clock)
}
