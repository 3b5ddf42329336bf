#![allow(dead_code)]

use parking_lot::Mutex;
use playhead::{AudioError, MemorySource, PlayerObserver, Result, SourceAdapter, SourceInfo};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Resumed,
    Paused,
    EndOfFile,
    Position(u64),
    Samples(usize),
    Error(AudioError),
}

#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
    stall: Mutex<Option<Duration>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sleeps for `delay` in its first `on_samples`, like a slow UI
    pub fn stalling(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            stall: Mutex::new(Some(delay)),
            ..Self::default()
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Everything except sample blocks
    pub fn transport_events(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| !matches!(e, Event::Samples(_)))
            .collect()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }
}

impl PlayerObserver for Recorder {
    fn on_resumed(&self) {
        self.events.lock().push(Event::Resumed);
    }

    fn on_paused(&self) {
        self.events.lock().push(Event::Paused);
    }

    fn on_end_of_file(&self) {
        self.events.lock().push(Event::EndOfFile);
    }

    fn on_samples(&self, _buffers: &[&[f32]], frames: usize, _channels: usize) {
        let stall = self.stall.lock().take();
        if let Some(delay) = stall {
            std::thread::sleep(delay);
        }
        self.events.lock().push(Event::Samples(frames));
    }

    fn on_position(&self, frame: u64) {
        self.events.lock().push(Event::Position(frame));
    }

    fn on_error(&self, error: &AudioError) {
        self.events.lock().push(Event::Error(error.clone()));
    }
}

/// Mono source whose sample at frame `i` is `i`
pub fn ramp(frames: usize, sample_rate: u32) -> MemorySource {
    let samples = (0..frames).map(|i| i as f32).collect();
    MemorySource::new(sample_rate, vec![samples]).unwrap()
}

/// Every read fails
pub struct BrokenSource {
    pub info: SourceInfo,
}

impl SourceAdapter for BrokenSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn read(&mut self, start: u64, _frames: usize, _buffers: &mut [Vec<f32>]) -> Result<usize> {
        Err(AudioError::SourceRead {
            frame: start,
            message: "device unplugged".to_string(),
        })
    }

    fn reopen(&self) -> Result<Box<dyn SourceAdapter>> {
        Ok(Box::new(BrokenSource { info: self.info }))
    }
}

/// 16-bit mono PCM WAV with a constant sample value
pub fn write_wav(frames: usize, sample_rate: u32, value: i16) -> tempfile::NamedTempFile {
    use std::io::Write;

    let data_len = frames as u32 * 2;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for _ in 0..frames {
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    let mut file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
    file.write_all(&bytes).unwrap();
    file.flush().unwrap();
    file
}
