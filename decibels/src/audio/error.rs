use thiserror::Error;

use crate::audio::sink::BufferId;

/// Audio-related errors
#[derive(Error, Debug)]
pub enum AudioError {
    /// Capture or playback device could not be opened
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The configured PCM format is not supported by the device
    #[error("Configuration mismatch: {0}")]
    ConfigMismatch(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildFailed(String),

    /// Audio stream error
    #[error("Audio stream error: {0}")]
    StreamError(String),

    /// The sink handed back a buffer the pool does not own
    #[error("Unknown playback buffer: {0}")]
    UnknownBuffer(BufferId),

    /// Attempt to fill a buffer that is still queued on the source
    #[error("Playback buffer {0} is still queued")]
    BufferBusy(BufferId),

    /// A zero-length block was handed to playback
    #[error("Refusing to queue an empty PCM block")]
    EmptyBlock,

    /// Block length exceeds the configured capacity
    #[error("PCM block of {len} samples exceeds capacity of {capacity}")]
    BlockTooLarge { len: usize, capacity: usize },

    /// Operation not valid in the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// cpal error
    #[error("cpal error: {0}")]
    CpalError(#[from] cpal::DevicesError),

    /// Default config error
    #[error("Default config error: {0}")]
    DefaultConfigError(#[from] cpal::DefaultStreamConfigError),

    /// Supported config error
    #[error("Supported config error: {0}")]
    SupportedConfigError(#[from] cpal::SupportedStreamConfigsError),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
