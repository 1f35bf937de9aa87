use thiserror::Error;

use crate::audio::error::AudioError;

/// Meter errors
#[derive(Error, Debug)]
pub enum MeterError {
    /// RMS over zero samples is undefined
    #[error("Cannot compute RMS of an empty block")]
    EmptyBlock,

    /// Smoothing coefficient outside [0, 1)
    #[error("Smoothing coefficient must be in [0, 1), got {0}")]
    InvalidSmoothing(f64),

    /// Audio collaborator failure
    #[error(transparent)]
    Audio(#[from] AudioError),
}

impl MeterError {
    /// Whether the loop can keep running after this error
    ///
    /// Stream hiccups and a busy buffer heal on a later iteration. Device,
    /// configuration and bookkeeping errors do not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MeterError::Audio(AudioError::StreamError(_))
                | MeterError::Audio(AudioError::BufferBusy(_))
        )
    }
}

/// Result type for meter operations
pub type MeterResult<T> = Result<T, MeterError>;
