// Audio player control surface

use playhead_core::{
    format_time, frames_to_seconds, render_link, AudioError, ControlNotifier, Dispatcher,
    ObserverId, PlaybackStatus, PlayerConfig, PlayerEvent, PlayerObserver, RenderEngine, Result,
    SessionShared, SourceAdapter, SourceInfo, TransportState,
};
use playhead_renderer_api::{AudioRenderer, AudioSpec, RendererFactory};
use playhead_source_symphonia::SymphoniaSource;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// One loaded source: its private handle lives inside the render callback
struct PlaybackSession {
    shared: Arc<SessionShared>,
    renderer: Box<dyn AudioRenderer>,
    locator: Option<String>,
}

impl PlaybackSession {
    /// Stop the device synchronously and free it
    fn teardown(mut self) -> Result<()> {
        let stopped = self.renderer.stop();
        let released = self.renderer.release();
        stopped.and(released)
    }
}

/// Plays one source at a time on a renderer from `factory`.
///
/// Control calls return immediately; their effects reach observers through
/// the notification thread. The player owns that thread and the device, and
/// both are shut down on [`AudioPlayer::release`] or drop.
pub struct AudioPlayer {
    config: PlayerConfig,
    factory: Box<dyn RendererFactory>,
    dispatcher: Dispatcher,
    notifier: ControlNotifier,
    looping: Arc<AtomicBool>,
    session: Option<PlaybackSession>,
}

impl AudioPlayer {
    pub fn new(factory: impl RendererFactory + 'static) -> Self {
        Self::with_config(factory, PlayerConfig::default())
    }

    pub fn with_config(factory: impl RendererFactory + 'static, config: PlayerConfig) -> Self {
        let dispatcher = Dispatcher::spawn(&config);
        let notifier = dispatcher.notifier();
        Self {
            config,
            factory: Box::new(factory),
            dispatcher,
            notifier,
            looping: Arc::new(AtomicBool::new(false)),
            session: None,
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    // ----- Observers -----

    /// Observers are held weakly; dropping the last `Arc` unsubscribes
    pub fn subscribe<O: PlayerObserver + 'static>(&self, observer: &Arc<O>) -> ObserverId {
        self.dispatcher.subscribe(observer)
    }

    pub fn subscribe_weak(&self, observer: Weak<dyn PlayerObserver>) -> ObserverId {
        self.dispatcher.subscribe_weak(observer)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    pub fn observer_count(&self) -> usize {
        self.dispatcher.observer_count()
    }

    // ----- Loading -----

    /// Load a new session bound to an independent handle of `source`.
    /// The caller keeps full use of `source` afterwards.
    pub fn load(&mut self, source: &dyn SourceAdapter) -> Result<()> {
        let handle = source.reopen()?;
        self.install(handle)
    }

    /// Open `path` with the Symphonia decoder and load it
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let source = SymphoniaSource::open(path)?;
        self.install(Box::new(source))
    }

    /// Load `source` and start playing it
    pub fn play_source(&mut self, source: &dyn SourceAdapter) -> Result<()> {
        self.load(source)?;
        self.play()
    }

    fn install(&mut self, source: Box<dyn SourceAdapter>) -> Result<()> {
        let info = source.info();
        info.validate()?;
        let locator = source.locator().map(str::to_string);

        if let Some(old) = self.session.take() {
            if let Err(e) = old.teardown() {
                log::warn!("Failed to stop previous session cleanly: {}", e);
            }
        }

        let preferred = self.factory.get_preferred_spec();
        let spec = AudioSpec {
            sample_rate: info.sample_rate,
            channels: info.channels,
            buffer_size: preferred.buffer_size.min(self.config.frames_per_slice).max(1),
        };
        let mut renderer = self.factory.create_renderer(spec)?;

        let shared = Arc::new(SessionShared::new(info, self.looping.clone()));
        let (render_notifier, link) =
            render_link(&self.config, info.channels, self.notifier.epoch());
        let mut engine = RenderEngine::new(
            source,
            shared.clone(),
            render_notifier,
            renderer.get_channels(),
            self.config.frames_per_slice,
        );
        renderer.set_render_callback(Box::new(move |out: &mut [f32]| engine.render(out)))?;
        self.notifier.attach(link);

        log::info!(
            "Loaded {}: {} frames at {} Hz, {} channel(s) on a {}-channel device",
            locator.as_deref().unwrap_or("source"),
            info.total_frames,
            info.sample_rate,
            info.channels,
            renderer.get_channels()
        );

        self.session = Some(PlaybackSession {
            shared,
            renderer,
            locator,
        });
        Ok(())
    }

    // ----- Transport -----

    /// Start or resume playback. From end of file, restarts at frame 0.
    pub fn play(&mut self) -> Result<()> {
        let session = self.session.as_mut().ok_or(AudioError::NoSource)?;
        let shared = &session.shared;

        let state = shared.transport.get();
        if state == TransportState::Playing {
            return Ok(());
        }

        session.renderer.start()?;

        if state == TransportState::EndOfFile {
            shared.seek.clear();
            shared.position.set(0);
        }

        self.notifier.post(PlayerEvent::Resumed);
        shared.transport.transition(TransportState::Playing)?;
        log::info!("Playing from frame {}", shared.target_frame());
        Ok(())
    }

    /// Pause playback; a no-op unless playing
    pub fn pause(&mut self) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if session.shared.transport.get() != TransportState::Playing {
            return Ok(());
        }

        session.renderer.stop()?;

        let shared = &session.shared;
        // The render thread may have reached the end before the device stopped
        if shared
            .transport
            .compare_exchange(TransportState::Playing, TransportState::Paused)
        {
            if let Some(frame) = shared.seek.take() {
                shared.position.set(frame.min(shared.info.total_frames));
            }
            self.notifier.post(PlayerEvent::Paused);
            log::info!("Paused at frame {}", shared.position.get());
        }
        Ok(())
    }

    /// Move the playhead to `frame`, which must lie in `[0, total_frames]`
    pub fn seek_to_frame(&mut self, frame: u64) -> Result<()> {
        let session = self.session.as_ref().ok_or(AudioError::NoSource)?;
        let shared = &session.shared;
        let total_frames = shared.info.total_frames;
        if frame > total_frames {
            return Err(AudioError::SeekOutOfRange {
                frame,
                total_frames,
            });
        }

        log::info!("Seek to frame {}", frame);
        if shared.transport.is_playing() {
            shared.seek.request(frame);
            // Still playing: the next render cycle applies it
            if shared.transport.get() != TransportState::EndOfFile {
                return Ok(());
            }
        }

        shared.position.set(frame);
        shared.seek.request(frame);
        if frame == total_frames {
            shared.transport.transition(TransportState::EndOfFile)?;
        } else if shared.transport.get() == TransportState::EndOfFile {
            shared.transport.transition(TransportState::Paused)?;
        }
        self.notifier.post(PlayerEvent::PositionChanged { frame });
        Ok(())
    }

    /// Seek to a time in seconds
    pub fn set_current_time(&mut self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(AudioError::InvalidTime(seconds));
        }
        let info = self.source_info().ok_or(AudioError::NoSource)?;
        let frame = (seconds * info.sample_rate as f64) as u64;
        self.seek_to_frame(frame)
    }

    pub fn set_should_loop(&self, should_loop: bool) {
        self.looping.store(should_loop, Ordering::Relaxed);
        log::debug!("Looping {}", if should_loop { "on" } else { "off" });
    }

    pub fn should_loop(&self) -> bool {
        self.looping.load(Ordering::Relaxed)
    }

    /// Stop the device and drop the session
    pub fn release(&mut self) -> Result<()> {
        match self.session.take() {
            Some(session) => {
                log::info!("Releasing player");
                session.teardown()
            }
            None => Ok(()),
        }
    }

    // ----- Queries -----

    pub fn state(&self) -> TransportState {
        self.session
            .as_ref()
            .map(|s| s.shared.transport.get())
            .unwrap_or(TransportState::Stopped)
    }

    pub fn status(&self) -> PlaybackStatus {
        match &self.session {
            Some(session) => session.shared.status(),
            None => PlaybackStatus {
                should_loop: self.should_loop(),
                ..PlaybackStatus::default()
            },
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state() == TransportState::Playing
    }

    pub fn is_end_of_file(&self) -> bool {
        self.state() == TransportState::EndOfFile
    }

    pub fn has_source(&self) -> bool {
        self.session.is_some()
    }

    pub fn source_info(&self) -> Option<SourceInfo> {
        self.session.as_ref().map(|s| s.shared.info)
    }

    pub fn locator(&self) -> Option<&str> {
        self.session.as_ref().and_then(|s| s.locator.as_deref())
    }

    /// Last frame consumed by the render thread, or set by a direct seek
    pub fn frame_index(&self) -> u64 {
        self.session
            .as_ref()
            .map(|s| s.shared.position.get())
            .unwrap_or(0)
    }

    pub fn total_frames(&self) -> u64 {
        self.source_info().map(|i| i.total_frames).unwrap_or(0)
    }

    /// Seconds
    pub fn current_time(&self) -> f64 {
        let rate = self.source_info().map(|i| i.sample_rate).unwrap_or(0);
        frames_to_seconds(self.frame_index(), rate)
    }

    /// Seconds
    pub fn duration(&self) -> f64 {
        self.source_info().map(|i| i.duration()).unwrap_or(0.0)
    }

    pub fn formatted_current_time(&self) -> String {
        format_time(self.current_time())
    }

    pub fn formatted_duration(&self) -> String {
        format_time(self.duration())
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("Failed to release player: {}", e);
        }
        self.dispatcher.shutdown();
    }
}
