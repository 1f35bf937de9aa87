/// Meter error types
pub mod error;

/// Session pair with ordered teardown
pub mod loopback;

/// RMS, smoothing and decibel conversion
pub mod loudness;

/// Where level lines go
pub mod output;

/// Playback buffer pool and cycler
pub mod pool;

/// The polling loop
pub mod scheduler;

/// Loop counters
pub mod stats;

pub use error::{MeterError, MeterResult};
pub use loopback::Loopback;
pub use loudness::{Decibels, Estimate, EstimatorState, DEFAULT_SMOOTHING};
pub use output::{LevelOutput, StdoutOutput};
pub use pool::{BufferPool, BufferState, CycleOutcome};
pub use scheduler::{Scheduler, Tick};
pub use stats::CycleStats;
