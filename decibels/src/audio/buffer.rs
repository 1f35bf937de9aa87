//! PCM buffers
//!
//! Two containers live here:
//!
//! - [`CaptureRing`]: lock-free ring buffer between the capture callback and
//!   the polling loop, sized to one block so capture latency stays bounded
//! - [`PcmBlock`]: the fixed-capacity scratch block reused every cycle
//!
//! # Example
//!
//! ```
//! use decibels_lib::audio::buffer::{CaptureRing, PcmBlock};
//!
//! let (mut producer, mut consumer) = CaptureRing::new(2500);
//! producer.push_slice(&[100i16; 480]);
//!
//! let mut block = PcmBlock::new(2500);
//! let read = block.fill_with(480, |dest| Ok(consumer.pop_slice(dest))).unwrap();
//! assert_eq!(read, 480);
//! ```

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapRb,
};

use crate::audio::error::AudioResult;

/// Full-scale magnitude of a signed 16-bit sample (2^15)
pub const MAX_AMPLITUDE: f64 = (1u32 << 15) as f64;

/// Capture ring buffer
///
/// Wraps the ringbuf heap ring with an i16 PCM API.
pub struct CaptureRing;

/// Write half, owned by the audio callback
pub struct CaptureProducer {
    producer: ringbuf::HeapProd<i16>,
}

/// Read half, owned by the polling loop
pub struct CaptureConsumer {
    consumer: ringbuf::HeapCons<i16>,
}

impl CaptureRing {
    /// Create a ring holding at most `capacity` samples
    ///
    /// # Returns
    ///
    /// A (producer, consumer) pair
    pub fn new(capacity: usize) -> (CaptureProducer, CaptureConsumer) {
        let rb = HeapRb::<i16>::new(capacity);
        let (producer, consumer) = rb.split();

        (CaptureProducer { producer }, CaptureConsumer { consumer })
    }
}

impl CaptureProducer {
    /// Push a single sample
    ///
    /// Returns `false` when the ring is full and the sample was dropped
    pub fn push(&mut self, sample: i16) -> bool {
        self.producer.try_push(sample).is_ok()
    }

    /// Push as many samples as fit, returning how many were written
    pub fn push_slice(&mut self, samples: &[i16]) -> usize {
        self.producer.push_slice(samples)
    }
}

impl CaptureConsumer {
    /// Pop samples into `output`, returning how many were read
    pub fn pop_slice(&mut self, output: &mut [i16]) -> usize {
        self.consumer.pop_slice(output)
    }

    /// Number of samples waiting to be read
    pub fn available_samples(&self) -> usize {
        self.consumer.occupied_len()
    }

    /// Discard everything currently buffered
    pub fn clear(&mut self) {
        let _ = self.consumer.clear();
    }
}

/// Fixed-capacity mono PCM block
///
/// Storage is allocated once; `len` tracks how many samples are valid, so a
/// short capture read produces a short block rather than stale tail data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBlock {
    samples: Vec<i16>,
    len: usize,
}

impl PcmBlock {
    /// Create an empty block able to hold `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0; capacity],
            len: 0,
        }
    }

    /// Create a block of `capacity` samples of silence
    pub fn silent(capacity: usize) -> Self {
        Self {
            samples: vec![0; capacity],
            len: capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Valid samples of the block
    pub fn as_slice(&self) -> &[i16] {
        &self.samples[..self.len]
    }

    /// Refill the block through `read`, requesting up to `frames` samples
    ///
    /// The request is clamped to the capacity. `read` receives the
    /// destination slice and returns how many samples it actually wrote.
    pub fn fill_with<F>(&mut self, frames: usize, read: F) -> AudioResult<usize>
    where
        F: FnOnce(&mut [i16]) -> AudioResult<usize>,
    {
        let requested = frames.min(self.capacity());
        let written = read(&mut self.samples[..requested])?;
        self.len = written.min(requested);
        Ok(self.len)
    }
}
