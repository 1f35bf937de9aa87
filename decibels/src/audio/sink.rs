//! Playback-side collaborator interface
//!
//! Modelled on a queued playback source: buffers are filled, queued in
//! order, played, and handed back once processed.

use std::fmt;

use crate::audio::error::AudioResult;
use crate::audio::source::SessionState;

/// Opaque handle of a buffer owned by the playback sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// State of the playback source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Created, never played
    Initial,
    Playing,
    /// Stopped explicitly or after running out of queued audio
    Stopped,
}

/// A sink that plays queued mono 16-bit PCM buffers
///
/// Not thread-safe by contract; confine to the thread driving the meter loop.
pub trait PlaybackSink {
    /// Allocate `count` new buffers
    fn create_buffers(&mut self, count: usize) -> AudioResult<Vec<BufferId>>;

    /// Replace the contents of an unqueued buffer
    fn fill_buffer(&mut self, id: BufferId, samples: &[i16], sample_rate: u32) -> AudioResult<()>;

    /// Append buffers to the source queue, in order
    fn queue(&mut self, ids: &[BufferId]) -> AudioResult<()>;

    /// Start (or restart) playback of the source
    fn play(&mut self) -> AudioResult<()>;

    /// Number of queued buffers that have finished playing
    fn completed_count(&self) -> usize;

    /// Remove the oldest finished buffer from the queue
    fn dequeue_one(&mut self) -> AudioResult<BufferId>;

    fn source_state(&self) -> SourceState;

    /// Stop the source; every queued buffer becomes processed
    fn stop(&mut self);

    /// Release buffers, unqueueing them first if needed
    fn delete_buffers(&mut self, ids: &[BufferId]);

    /// Destroy the playback context and close the device
    fn close(&mut self);

    fn session_state(&self) -> SessionState;
}
