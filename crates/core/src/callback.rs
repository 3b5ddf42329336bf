// Player events and the weakly-held observer registry

use crate::error::AudioError;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Player event types
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Playback started or resumed
    Resumed,

    /// Playback paused
    Paused,

    /// Render reached the last frame with looping off
    EndOfFile,

    /// New frame index
    PositionChanged { frame: u64 },

    /// A block of frames was read; the samples travel through the sample tap
    SamplesRead { frames: usize, channels: usize },

    /// A render-triggered read failed at `frame`; those frames were silenced
    SourceError { frame: u64, error: AudioError },
}

/// Receives player notifications. Every method is optional.
///
/// Calls arrive on the dispatcher thread, never on the render thread. UI code
/// must hop to its own thread before touching non-thread-safe state, and must
/// not subscribe or unsubscribe from inside a callback.
pub trait PlayerObserver: Send + Sync {
    fn on_resumed(&self) {}

    fn on_paused(&self) {}

    fn on_end_of_file(&self) {}

    /// `buffers[c]` holds `frames` samples of channel `c`
    fn on_samples(&self, _buffers: &[&[f32]], _frames: usize, _channels: usize) {}

    fn on_position(&self, _frame: u64) {}

    fn on_error(&self, _error: &AudioError) {}
}

/// Handle returned by [`ObserverRegistry::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Limits position updates per observer. Updates inside the interval are
/// coalesced: the latest one is held back and delivered later, never lost.
#[derive(Debug)]
struct PositionThrottle {
    interval: Duration,
    last_sent: Option<Instant>,
    pending: Option<u64>,
}

impl PositionThrottle {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
            pending: None,
        }
    }

    fn offer(&mut self, frame: u64, now: Instant) -> Option<u64> {
        let due = match self.last_sent {
            Some(last) => now.duration_since(last) >= self.interval,
            None => true,
        };
        if due {
            self.last_sent = Some(now);
            self.pending = None;
            Some(frame)
        } else {
            self.pending = Some(frame);
            None
        }
    }

    /// Release the held-back update once the interval has passed
    fn flush(&mut self, now: Instant) -> Option<u64> {
        let frame = self.pending?;
        self.offer(frame, now)
    }

    /// Release the held-back update regardless of timing
    fn force(&mut self, now: Instant) -> Option<u64> {
        let frame = self.pending.take()?;
        self.last_sent = Some(now);
        Some(frame)
    }
}

struct Entry {
    id: ObserverId,
    observer: Weak<dyn PlayerObserver>,
    throttle: PositionThrottle,
}

/// Observers are held weakly; dropping the last `Arc` unsubscribes.
pub struct ObserverRegistry {
    entries: Vec<Entry>,
    next_id: u64,
    position_interval: Duration,
}

impl ObserverRegistry {
    pub fn new(position_interval: Duration) -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
            position_interval,
        }
    }

    pub fn subscribe<O: PlayerObserver + 'static>(&mut self, observer: &Arc<O>) -> ObserverId {
        let weak: Weak<dyn PlayerObserver> = Arc::downgrade(observer) as Weak<dyn PlayerObserver>;
        self.subscribe_weak(weak)
    }

    pub fn subscribe_weak(&mut self, observer: Weak<dyn PlayerObserver>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            observer,
            throttle: PositionThrottle::new(self.position_interval),
        });
        log::debug!("Observer {:?} subscribed ({} total)", id, self.entries.len());
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Live observers
    pub fn len(&mut self) -> usize {
        self.prune();
        self.entries.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    pub fn dispatch(&mut self, event: &PlayerEvent) {
        self.dispatch_at(event, Instant::now());
    }

    pub fn dispatch_at(&mut self, event: &PlayerEvent, now: Instant) {
        self.prune();
        for entry in &mut self.entries {
            let Some(observer) = entry.observer.upgrade() else {
                continue;
            };

            if let PlayerEvent::PositionChanged { frame } = event {
                if let Some(frame) = entry.throttle.offer(*frame, now) {
                    observer.on_position(frame);
                }
                continue;
            }

            // Keep ordering: a held-back position precedes anything that follows it
            if let Some(frame) = entry.throttle.force(now) {
                observer.on_position(frame);
            }

            match event {
                PlayerEvent::Resumed => observer.on_resumed(),
                PlayerEvent::Paused => observer.on_paused(),
                PlayerEvent::EndOfFile => observer.on_end_of_file(),
                PlayerEvent::SourceError { error, .. } => observer.on_error(error),
                // Samples are delivered through `dispatch_samples`
                PlayerEvent::SamplesRead { .. } | PlayerEvent::PositionChanged { .. } => {}
            }
        }
    }

    pub fn dispatch_samples(&mut self, buffers: &[&[f32]], frames: usize, channels: usize) {
        for entry in &self.entries {
            if let Some(observer) = entry.observer.upgrade() {
                observer.on_samples(buffers, frames, channels);
            }
        }
    }

    /// Deliver coalesced positions whose interval has elapsed
    pub fn flush_positions(&mut self, now: Instant) {
        self.prune();
        for entry in &mut self.entries {
            if let Some(frame) = entry.throttle.flush(now) {
                if let Some(observer) = entry.observer.upgrade() {
                    observer.on_position(frame);
                }
            }
        }
    }

    /// Deliver every coalesced position now
    pub fn force_positions(&mut self) {
        let now = Instant::now();
        for entry in &mut self.entries {
            if let Some(frame) = entry.throttle.force(now) {
                if let Some(observer) = entry.observer.upgrade() {
                    observer.on_position(frame);
                }
            }
        }
    }

    fn prune(&mut self) {
        let before = self.entries.len();
        self.entries.retain(|e| e.observer.strong_count() > 0);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            log::debug!("Pruned {} dropped observer(s)", dropped);
        }
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}
