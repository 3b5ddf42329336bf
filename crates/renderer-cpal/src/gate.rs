// Hand-off between the device callback and the control thread

use parking_lot::Mutex;
use playhead_renderer_api::RenderCallback;
use std::sync::atomic::{AtomicBool, Ordering};

/// The render callback plus the flag that lets it run.
///
/// The device thread never waits on the lock. The flag is checked while the
/// lock is held, so once [`CallbackGate::close`] returns no callback runs
/// until the gate is opened again.
#[derive(Default)]
pub(crate) struct CallbackGate {
    playing: AtomicBool,
    callback: Mutex<Option<RenderCallback>>,
}

impl CallbackGate {
    /// Device thread: render into `data`, or write silence
    pub fn fill(&self, data: &mut [f32]) {
        let Some(mut guard) = self.callback.try_lock() else {
            data.fill(0.0);
            return;
        };
        match guard.as_mut() {
            Some(render) if self.playing.load(Ordering::Acquire) => render(data),
            _ => data.fill(0.0),
        }
    }

    pub fn open(&self) {
        self.playing.store(true, Ordering::Release);
    }

    /// Waits out a callback already running
    pub fn close(&self) {
        self.playing.store(false, Ordering::Release);
        drop(self.callback.lock());
    }

    pub fn is_open(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn set(&self, callback: RenderCallback) {
        *self.callback.lock() = Some(callback);
    }

    pub fn clear(&self) {
        self.callback.lock().take();
    }
}
