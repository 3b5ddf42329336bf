// Core types and the real-time engine for the playhead audio player

pub mod callback;
pub mod config;
pub mod error;
pub mod notify;
pub mod position;
pub mod render;
pub mod seek;
pub mod session;
pub mod source;
pub mod state;

// Re-export commonly used types
pub use callback::{ObserverId, ObserverRegistry, PlayerEvent, PlayerObserver};
pub use config::PlayerConfig;
pub use error::{AudioError, ErrorKind, Result};
pub use notify::{
    render_link, ControlEpoch, ControlNotifier, Dispatcher, RenderLink, RenderNotifier,
};
pub use position::PositionTracker;
pub use render::RenderEngine;
pub use seek::SeekCoordinator;
pub use session::SessionShared;
pub use source::{MemorySource, SourceAdapter, SourceInfo};
pub use state::{format_time, frames_to_seconds, PlaybackStatus, TransportCell, TransportState};
