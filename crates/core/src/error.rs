// Error handling for the playback engine

use std::fmt;

/// Broad classes of failure, used to decide how an error is surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller bug: reported synchronously, never clamped
    Validation,
    /// Source failed during a render-triggered read: reported asynchronously
    SourceRead,
    /// Output device failed to start or stop
    Device,
    /// Source could not be opened or described
    Load,
}

/// Audio engine error types
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Operation needs a loaded source
    NoSource,

    /// Invalid state transition
    InvalidState(String),

    /// Seek target outside `[0, total_frames]`
    SeekOutOfRange { frame: u64, total_frames: u64 },

    /// Time value that cannot be mapped to a frame (negative, NaN, infinite)
    InvalidTime(f64),

    /// Source read failed during rendering
    SourceRead { frame: u64, message: String },

    /// Output device error (start/stop/build)
    DeviceError(String),

    /// Failed to open or probe a source
    LoadError(String),

    /// Source format not supported
    UnsupportedFormat(String),

    /// IO error
    IoError(String),
}

impl AudioError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AudioError::NoSource
            | AudioError::InvalidState(_)
            | AudioError::SeekOutOfRange { .. }
            | AudioError::InvalidTime(_) => ErrorKind::Validation,
            AudioError::SourceRead { .. } => ErrorKind::SourceRead,
            AudioError::DeviceError(_) => ErrorKind::Device,
            AudioError::LoadError(_) | AudioError::UnsupportedFormat(_) | AudioError::IoError(_) => {
                ErrorKind::Load
            }
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AudioError::NoSource => write!(f, "Invalid state: no source loaded"),
            AudioError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            AudioError::SeekOutOfRange {
                frame,
                total_frames,
            } => write!(
                f,
                "Seek out of range: frame {} not in [0, {}]",
                frame, total_frames
            ),
            AudioError::InvalidTime(secs) => write!(f, "Invalid time: {}", secs),
            AudioError::SourceRead { frame, message } => {
                write!(f, "Source read error at frame {}: {}", frame, message)
            }
            AudioError::DeviceError(msg) => write!(f, "Device error: {}", msg),
            AudioError::LoadError(msg) => write!(f, "Load error: {}", msg),
            AudioError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            AudioError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for AudioError {}

/// Result type alias for audio operations
pub type Result<T> = std::result::Result<T, AudioError>;

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::IoError(err.to_string())
    }
}
