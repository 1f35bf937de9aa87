//! Capture-side collaborator interface

use crate::audio::error::AudioResult;

/// Lifecycle of a capture or playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Open,
    Active,
    Stopped,
}

/// A source of mono 16-bit PCM frames
///
/// All queries are non-blocking. Implementations are not thread-safe by
/// contract and must stay confined to the thread driving the meter loop.
pub trait CaptureSource {
    /// Begin capturing
    fn start(&mut self) -> AudioResult<()>;

    /// Number of frames ready to be read; zero or negative means not ready
    fn available_frames(&self) -> isize;

    /// Read up to `dest.len()` frames, returning how many were written
    fn read(&mut self, dest: &mut [i16]) -> AudioResult<usize>;

    /// Stop capturing. Safe to call more than once.
    fn stop(&mut self);

    /// Release the device. Safe to call more than once.
    fn close(&mut self);

    fn state(&self) -> SessionState;
}
