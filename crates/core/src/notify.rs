// Notification fan-out: non-blocking handoff from the render and control
// threads to a dispatcher thread that calls the observers

use crate::callback::{ObserverId, ObserverRegistry, PlayerEvent, PlayerObserver};
use crate::config::PlayerConfig;
use crate::error::AudioError;
use crossbeam_channel::{Receiver, Select, Sender, TryRecvError};
use parking_lot::Mutex;
use playhead_ringbuffer::{sample_tap, TapReader, TapWriter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

/// Queue slots kept free for events that must not be dropped
const RESERVED_SLOTS: usize = 2;

/// Idle wake-up when position throttling is off
const IDLE_TICK: Duration = Duration::from_millis(100);

/// Count of control events posted so far.
///
/// Render events carry the value they were produced under, which places
/// each of them between two control events.
#[derive(Debug, Clone, Default)]
pub struct ControlEpoch(Arc<AtomicU64>);

impl ControlEpoch {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// A render event and the control epoch it was produced under
#[derive(Debug)]
pub struct Stamped {
    pub epoch: u64,
    pub event: PlayerEvent,
}

/// Render-thread half of a session's notification path.
///
/// Every method is wait-free and allocation-free: a full queue or tap drops
/// the lossy event (samples, position) instead of waiting.
pub struct RenderNotifier {
    events: Sender<Stamped>,
    tap: TapWriter,
    capacity: usize,
    epoch: ControlEpoch,
    dropped: Arc<AtomicU64>,
}

impl RenderNotifier {
    /// Room for an event that must leave `reserve` slots free
    fn has_room(&self, reserve: usize) -> bool {
        self.events.len() + reserve < self.capacity
    }

    fn send(&mut self, event: PlayerEvent, reserve: usize) {
        let stamped = Stamped {
            epoch: self.epoch.current(),
            event,
        };
        if !self.has_room(reserve) || self.events.try_send(stamped).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn send_lossy(&mut self, event: PlayerEvent) {
        self.send(event, RESERVED_SLOTS);
    }

    /// Publish `frames` frames of the planar `buffers`
    pub fn samples(&mut self, buffers: &[Vec<f32>], frames: usize) {
        if frames == 0 {
            return;
        }
        // This thread is the only producer, so room seen here stays available.
        if !self.has_room(RESERVED_SLOTS) || !self.tap.push_planar(buffers, frames) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.send_lossy(PlayerEvent::SamplesRead {
            frames,
            channels: buffers.len(),
        });
    }

    pub fn position(&mut self, frame: u64) {
        self.send_lossy(PlayerEvent::PositionChanged { frame });
    }

    /// May take the last free slot
    pub fn end_of_file(&mut self) {
        self.send(PlayerEvent::EndOfFile, 0);
    }

    /// May take one reserved slot; the other stays free for end of file
    pub fn source_error(&mut self, frame: u64, error: AudioError) {
        self.send(PlayerEvent::SourceError { frame, error }, 1);
    }

    /// Events dropped so far because the dispatcher fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Dispatcher half of a session's notification path
pub struct RenderLink {
    events: Receiver<Stamped>,
    tap: TapReader,
    dropped: Arc<AtomicU64>,
}

impl RenderLink {
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn receiver(&self) -> &Receiver<Stamped> {
        &self.events
    }
}

/// Build the bounded queue and sample tap for one session.
/// Events are stamped from `epoch`, normally [`ControlNotifier::epoch`].
pub fn render_link(
    config: &PlayerConfig,
    channels: u16,
    epoch: ControlEpoch,
) -> (RenderNotifier, RenderLink) {
    let capacity = config.event_capacity.max(RESERVED_SLOTS + 1);
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    let (writer, reader) = sample_tap(config.sample_tap_capacity(channels));
    let dropped = Arc::new(AtomicU64::new(0));

    (
        RenderNotifier {
            events: tx,
            tap: writer,
            capacity,
            epoch,
            dropped: dropped.clone(),
        },
        RenderLink {
            events: rx,
            tap: reader,
            dropped,
        },
    )
}

enum ControlMsg {
    Event(PlayerEvent, u64),
    Attach(RenderLink),
    Shutdown,
}

/// Control-thread handle for posting events to the dispatcher
#[derive(Clone)]
pub struct ControlNotifier {
    tx: Sender<ControlMsg>,
    epoch: ControlEpoch,
}

impl ControlNotifier {
    /// Render events produced before this call reach observers before
    /// `event`; those produced after it, after.
    pub fn post(&self, event: PlayerEvent) {
        let epoch = self.epoch.advance();
        if self.tx.send(ControlMsg::Event(event, epoch)).is_err() {
            log::warn!("Dispatcher gone; event dropped");
        }
    }

    pub fn epoch(&self) -> ControlEpoch {
        self.epoch.clone()
    }

    /// Route a new session's render events to the observers.
    /// Events still queued from the previous session are delivered first.
    pub fn attach(&self, link: RenderLink) {
        if self.tx.send(ControlMsg::Attach(link)).is_err() {
            log::warn!("Dispatcher gone; render link dropped");
        }
    }
}

/// Owns the dispatcher thread and the observer registry
pub struct Dispatcher {
    registry: Arc<Mutex<ObserverRegistry>>,
    control: ControlNotifier,
    handle: Option<thread::JoinHandle<()>>,
}

impl Dispatcher {
    pub fn spawn(config: &PlayerConfig) -> Self {
        let registry = Arc::new(Mutex::new(ObserverRegistry::new(config.position_interval)));
        let (tx, rx) = crossbeam_channel::unbounded();
        let tick = if config.position_interval.is_zero() {
            IDLE_TICK
        } else {
            config.position_interval
        };

        let worker = DispatchLoop {
            registry: registry.clone(),
            control: rx,
            link: None,
            never: crossbeam_channel::never(),
            tick,
            held: None,
            delivered_epoch: 0,
        };

        let handle = thread::Builder::new()
            .name("playhead-notify".to_string())
            .spawn(move || worker.run())
            .map_err(|e| log::error!("Failed to spawn dispatcher thread: {}", e))
            .ok();

        Self {
            registry,
            control: ControlNotifier {
                tx,
                epoch: ControlEpoch::default(),
            },
            handle,
        }
    }

    pub fn notifier(&self) -> ControlNotifier {
        self.control.clone()
    }

    pub fn subscribe<O: PlayerObserver + 'static>(&self, observer: &Arc<O>) -> ObserverId {
        self.registry.lock().subscribe(observer)
    }

    pub fn subscribe_weak(&self, observer: Weak<dyn PlayerObserver>) -> ObserverId {
        self.registry.lock().subscribe_weak(observer)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.registry.lock().unsubscribe(id)
    }

    pub fn observer_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Deliver everything queued, then stop the thread
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.control.tx.send(ControlMsg::Shutdown);
            if handle.join().is_err() {
                log::error!("Dispatcher thread panicked");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

enum Incoming {
    Control(ControlMsg),
    Render(Stamped),
    Detached,
    Idle,
}

struct DispatchLoop {
    registry: Arc<Mutex<ObserverRegistry>>,
    control: Receiver<ControlMsg>,
    link: Option<RenderLink>,
    never: Receiver<Stamped>,
    tick: Duration,
    /// Render event taken off the queue while flushing, not yet delivered
    held: Option<Stamped>,
    /// Epoch of the latest control event delivered
    delivered_epoch: u64,
}

impl DispatchLoop {
    fn run(mut self) {
        log::debug!("Dispatcher thread started");
        loop {
            let running = match self.wait() {
                Incoming::Control(msg) => self.handle_control(msg),
                Incoming::Render(stamped) => self.handle_stamped(stamped),
                Incoming::Detached => {
                    self.link = None;
                    true
                }
                Incoming::Idle => {
                    self.registry.lock().flush_positions(Instant::now());
                    true
                }
            };
            if !running {
                break;
            }
        }
        log::debug!("Dispatcher thread exited");
    }

    fn wait(&mut self) -> Incoming {
        if let Some(stamped) = self.held.take() {
            return Incoming::Render(stamped);
        }

        let render = self.link.as_ref().map(|l| &l.events).unwrap_or(&self.never);

        let mut select = Select::new();
        let control_op = select.recv(&self.control);
        let render_op = select.recv(render);

        match select.select_timeout(self.tick) {
            Ok(op) if op.index() == control_op => match op.recv(&self.control) {
                Ok(msg) => Incoming::Control(msg),
                Err(_) => Incoming::Control(ControlMsg::Shutdown),
            },
            Ok(op) => {
                debug_assert_eq!(op.index(), render_op);
                match op.recv(render) {
                    Ok(stamped) => Incoming::Render(stamped),
                    Err(_) => Incoming::Detached,
                }
            }
            Err(_) => Incoming::Idle,
        }
    }

    /// Returns false on shutdown
    fn handle_control(&mut self, msg: ControlMsg) -> bool {
        match msg {
            ControlMsg::Event(event, epoch) => {
                self.deliver_control(event, epoch);
                true
            }
            ControlMsg::Attach(link) => {
                self.drain_link();
                self.link = Some(link);
                true
            }
            ControlMsg::Shutdown => {
                while let Ok(msg) = self.control.try_recv() {
                    if !matches!(msg, ControlMsg::Shutdown) {
                        self.handle_control(msg);
                    }
                }
                self.drain_link();
                self.registry.lock().force_positions();
                false
            }
        }
    }

    /// Control events posted before `stamped` was produced are already
    /// queued; deliver them first. Returns false on shutdown.
    fn handle_stamped(&mut self, stamped: Stamped) -> bool {
        let epoch = stamped.epoch;
        self.held = Some(stamped);
        while self.delivered_epoch < epoch {
            match self.control.try_recv() {
                Ok(msg) => {
                    if !self.handle_control(msg) {
                        return false;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return self.handle_control(ControlMsg::Shutdown);
                }
            }
        }
        if let Some(stamped) = self.held.take() {
            self.handle_render(stamped.event);
        }
        true
    }

    fn deliver_control(&mut self, event: PlayerEvent, epoch: u64) {
        self.flush_render_before(epoch);
        self.delivered_epoch = self.delivered_epoch.max(epoch);
        self.registry.lock().dispatch(&event);
    }

    /// Deliver queued render events stamped before `epoch`
    fn flush_render_before(&mut self, epoch: u64) {
        loop {
            let stamped = match self.held.take() {
                Some(stamped) => stamped,
                None => match self.link.as_ref().map(|link| link.events.try_recv()) {
                    Some(Ok(stamped)) => stamped,
                    _ => return,
                },
            };
            if stamped.epoch >= epoch {
                self.held = Some(stamped);
                return;
            }
            self.handle_render(stamped.event);
        }
    }

    fn handle_render(&mut self, event: PlayerEvent) {
        let mut registry = self.registry.lock();
        match event {
            PlayerEvent::SamplesRead { frames, channels } => {
                let Some(link) = self.link.as_mut() else {
                    return;
                };
                if let Some(block) = link.tap.pop_planar(channels, frames) {
                    let slices = block.slices();
                    registry.dispatch_samples(&slices, frames, channels);
                }
            }
            other => registry.dispatch(&other),
        }
    }

    /// Deliver everything left from the current session and drop its link
    fn drain_link(&mut self) {
        self.flush_render_before(u64::MAX);
        if let Some(link) = self.link.take() {
            let dropped = link.dropped();
            if dropped > 0 {
                log::debug!("Session dropped {} render notification(s)", dropped);
            }
        }
    }
}
