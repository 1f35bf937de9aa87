/// PCM blocks and the capture ring buffer
pub mod buffer;

/// Capture backed by a cpal input stream
pub mod capture;

/// Audio device lookup and format validation
pub mod device;

/// Audio-related error types
pub mod error;

/// Playback backed by a cpal output stream
pub mod playback;

/// Playback collaborator interface
pub mod sink;

/// Capture collaborator interface
pub mod source;

// Re-export commonly used types
pub use buffer::{PcmBlock, MAX_AMPLITUDE};
pub use capture::CpalCapture;
pub use error::{AudioError, AudioResult};
pub use playback::CpalPlayback;
pub use sink::{BufferId, PlaybackSink, SourceState};
pub use source::{CaptureSource, SessionState};
