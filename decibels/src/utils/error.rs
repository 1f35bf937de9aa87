//! Application-level error handling
//!
//! Aggregates every module error into [`AppError`] and maps each one to a
//! stable [`ErrorCode`], a message fit for the terminal and, where one exists,
//! a recovery hint.
//!
//! # Example
//!
//! ```
//! use decibels_lib::audio::AudioError;
//! use decibels_lib::utils::error::{AppError, ErrorCode};
//!
//! let err = AppError::from(AudioError::DeviceUnavailable("no input".into()));
//! assert_eq!(err.code(), ErrorCode::AudioDeviceUnavailable);
//! assert!(err.recovery_hint().is_some());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::error::AudioError;
use crate::config::ConfigError;
use crate::meter::error::MeterError;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Audio error
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// Meter loop error
    #[error("Meter error: {0}")]
    Meter(#[from] MeterError),

    /// Config error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Audio
    /// No usable capture or playback device
    AudioDeviceUnavailable,
    /// Device does not support the configured format
    AudioConfigMismatch,
    /// Stream could not be built or failed
    AudioStreamError,
    /// Buffer pool bookkeeping went wrong
    AudioBufferError,

    // Meter
    /// Smoothing coefficient out of range
    MeterInvalidSmoothing,
    /// Estimator handed an empty block
    MeterEmptyBlock,

    // Config
    /// Configuration failed validation
    ConfigInvalid,

    // General
    InternalError,
}

/// Error context for display and logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    pub code: ErrorCode,
    /// Message for the terminal
    pub message: String,
    /// Full error chain, for logs
    pub detail: Option<String>,
    pub recovery_hint: Option<String>,
    pub recoverable: bool,
}

impl ErrorContext {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
            recovery_hint: None,
            recoverable: true,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_recovery_hint(mut self, hint: impl Into<String>) -> Self {
        self.recovery_hint = Some(hint.into());
        self
    }

    pub fn not_recoverable(mut self) -> Self {
        self.recoverable = false;
        self
    }
}

impl AppError {
    /// Error code
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Audio(err) | AppError::Meter(MeterError::Audio(err)) => audio_code(err),
            AppError::Meter(MeterError::InvalidSmoothing(_)) => ErrorCode::MeterInvalidSmoothing,
            AppError::Meter(MeterError::EmptyBlock) => ErrorCode::MeterEmptyBlock,
            AppError::Config(_) => ErrorCode::ConfigInvalid,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Short message for the terminal
    pub fn user_message(&self) -> String {
        match self.code() {
            ErrorCode::AudioDeviceUnavailable => "No usable audio device was found".to_string(),
            ErrorCode::AudioConfigMismatch => {
                "The audio device does not support the required format".to_string()
            }
            ErrorCode::AudioStreamError => "The audio stream failed".to_string(),
            ErrorCode::AudioBufferError => "Playback buffers got out of step".to_string(),
            ErrorCode::MeterInvalidSmoothing => "Invalid smoothing coefficient".to_string(),
            ErrorCode::MeterEmptyBlock => "No samples to measure".to_string(),
            ErrorCode::ConfigInvalid => match self {
                AppError::Config(err) => format!("Invalid configuration: {}", err),
                _ => "Invalid configuration".to_string(),
            },
            ErrorCode::InternalError => match self {
                AppError::Internal(msg) => format!("Internal error: {}", msg),
                _ => "Internal error".to_string(),
            },
        }
    }

    /// Full error context
    pub fn context(&self) -> ErrorContext {
        let mut ctx = ErrorContext::new(self.code(), self.user_message()).with_detail(self.to_string());
        ctx.recovery_hint = self.recovery_hint();

        if !self.is_recoverable() {
            ctx = ctx.not_recoverable();
        }
        ctx
    }

    /// Recovery hint
    pub fn recovery_hint(&self) -> Option<String> {
        match self.code() {
            ErrorCode::AudioDeviceUnavailable => Some(
                "Connect a microphone and speakers and check the system default devices"
                    .to_string(),
            ),
            ErrorCode::AudioConfigMismatch => Some(
                "Pick a default device that supports 16-bit mono at the configured sample rate"
                    .to_string(),
            ),
            ErrorCode::AudioStreamError => {
                Some("Check that no other application holds the device exclusively".to_string())
            }
            ErrorCode::ConfigInvalid | ErrorCode::MeterInvalidSmoothing => {
                Some("Use a smoothing coefficient in [0, 1) and positive sizes".to_string())
            }
            _ => None,
        }
    }

    /// Whether the process can carry on after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Meter(err) => err.is_recoverable(),
            AppError::Audio(err) => matches!(
                err,
                AudioError::StreamError(_) | AudioError::BufferBusy(_)
            ),
            AppError::Config(_) | AppError::Internal(_) => false,
        }
    }
}

fn audio_code(err: &AudioError) -> ErrorCode {
    match err {
        AudioError::DeviceUnavailable(_) | AudioError::CpalError(_) => {
            ErrorCode::AudioDeviceUnavailable
        }
        AudioError::ConfigMismatch(_)
        | AudioError::DefaultConfigError(_)
        | AudioError::SupportedConfigError(_) => ErrorCode::AudioConfigMismatch,
        AudioError::StreamBuildFailed(_) | AudioError::StreamError(_) => {
            ErrorCode::AudioStreamError
        }
        AudioError::UnknownBuffer(_)
        | AudioError::BufferBusy(_)
        | AudioError::EmptyBlock
        | AudioError::BlockTooLarge { .. }
        | AudioError::InvalidState(_) => ErrorCode::AudioBufferError,
    }
}

/// Application result type
pub type AppResult<T> = Result<T, AppError>;
