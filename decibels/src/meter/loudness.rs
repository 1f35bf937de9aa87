//! Loudness estimation
//!
//! A block of samples becomes an instantaneous RMS amplitude, which feeds a
//! first-order IIR low-pass on the magnitude envelope:
//!
//! ```text
//! smoothed' = smoothed * α + (1 - α) * rms
//! dBFS      = 20 * log10(smoothed' / 2^15)
//! ```
//!
//! Higher α responds slower and flickers less.
//!
//! # Example
//!
//! ```
//! use decibels_lib::meter::loudness::{Decibels, EstimatorState};
//!
//! let mut state = EstimatorState::new(0.4).unwrap();
//! let level = state.update(&[32767; 2500]).unwrap();
//! assert!(matches!(level, Decibels::Level(db) if (db + 4.437).abs() < 0.01));
//! ```

use std::fmt;

use crate::audio::buffer::MAX_AMPLITUDE;
use crate::meter::error::{MeterError, MeterResult};

/// Smoothing coefficient used when none is configured
pub const DEFAULT_SMOOTHING: f64 = 0.4;

/// A level relative to full scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decibels {
    /// Zero magnitude; the logarithm is undefined
    Silence,
    /// dBFS, ≤ 0 for in-range input
    Level(f64),
}

impl Decibels {
    /// The dB value, with silence as negative infinity
    pub fn value(self) -> f64 {
        match self {
            Decibels::Silence => f64::NEG_INFINITY,
            Decibels::Level(db) => db,
        }
    }

    pub fn is_silence(self) -> bool {
        matches!(self, Decibels::Silence)
    }
}

impl fmt::Display for Decibels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decibels::Silence => write!(f, "-infdB"),
            Decibels::Level(db) => write!(f, "{:.2}dB", db),
        }
    }
}

/// Result of one estimator step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Instantaneous RMS of the block
    pub rms: f64,
    /// New smoothed magnitude
    pub smoothed: f64,
    pub decibels: Decibels,
}

/// Root-mean-square amplitude of `samples`
///
/// # Errors
/// Returns `MeterError::EmptyBlock` for an empty slice.
pub fn rms(samples: &[i16]) -> MeterResult<f64> {
    if samples.is_empty() {
        return Err(MeterError::EmptyBlock);
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let s = f64::from(s);
            s * s
        })
        .sum();

    Ok((sum_squares / samples.len() as f64).sqrt())
}

/// One exponential smoothing step
pub fn smooth(previous: f64, rms: f64, alpha: f64) -> f64 {
    previous * alpha + (1.0 - alpha) * rms
}

/// Convert a magnitude to decibels relative to full scale
///
/// Zero, negative and non-finite magnitudes map to [`Decibels::Silence`].
pub fn to_decibels(level: f64) -> Decibels {
    if !level.is_finite() || level <= 0.0 {
        return Decibels::Silence;
    }
    Decibels::Level(20.0 * (level / MAX_AMPLITUDE).log10())
}

/// Pure estimator step from `(previous, block, alpha)`
pub fn estimate(previous: f64, block: &[i16], alpha: f64) -> MeterResult<Estimate> {
    validate_alpha(alpha)?;
    let rms = rms(block)?;
    let smoothed = smooth(previous, rms, alpha);

    Ok(Estimate {
        rms,
        smoothed,
        decibels: to_decibels(smoothed),
    })
}

fn validate_alpha(alpha: f64) -> MeterResult<()> {
    if (0.0..1.0).contains(&alpha) {
        Ok(())
    } else {
        Err(MeterError::InvalidSmoothing(alpha))
    }
}

/// Smoothed level carried across cycles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorState {
    rms_smooth: f64,
    alpha: f64,
}

impl EstimatorState {
    /// Start from silence
    ///
    /// # Errors
    /// Returns `MeterError::InvalidSmoothing` unless `alpha` is in [0, 1).
    pub fn new(alpha: f64) -> MeterResult<Self> {
        Self::with_level(alpha, 0.0)
    }

    /// Start from an arbitrary non-negative level
    pub fn with_level(alpha: f64, rms_smooth: f64) -> MeterResult<Self> {
        validate_alpha(alpha)?;
        Ok(Self {
            rms_smooth: rms_smooth.max(0.0),
            alpha,
        })
    }

    pub fn rms_smooth(&self) -> f64 {
        self.rms_smooth
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn decibels(&self) -> Decibels {
        to_decibels(self.rms_smooth)
    }

    /// Fold `block` into the smoothed level
    ///
    /// The state is left untouched on error.
    pub fn update(&mut self, block: &[i16]) -> MeterResult<Decibels> {
        let estimate = estimate(self.rms_smooth, block, self.alpha)?;
        self.rms_smooth = estimate.smoothed;
        Ok(estimate.decibels)
    }
}

impl Default for EstimatorState {
    fn default() -> Self {
        Self {
            rms_smooth: 0.0,
            alpha: DEFAULT_SMOOTHING,
        }
    }
}
