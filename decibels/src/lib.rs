/// Audio devices, streams and the capture/playback interfaces
pub mod audio;

/// Meter configuration
pub mod config;

/// Loudness estimation and the loopback loop
pub mod meter;

/// Utility modules
pub mod utils;
