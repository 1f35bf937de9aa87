//! Capture/playback session pair with guaranteed teardown

use tracing::{debug, info, warn};

use crate::audio::source::CaptureSource;
use crate::audio::sink::PlaybackSink;
use crate::config::MeterConfig;
use crate::meter::error::MeterResult;
use crate::meter::pool::BufferPool;

/// Owns both hardware sessions and the buffer pool between them
///
/// Teardown runs exactly once, on [`Loopback::shutdown`] or on drop:
/// stop capture, close capture, stop the source, release the buffers,
/// close the playback context.
pub struct Loopback<C: CaptureSource, P: PlaybackSink> {
    capture: C,
    playback: P,
    pool: BufferPool,
    torn_down: bool,
}

impl<C: CaptureSource, P: PlaybackSink> Loopback<C, P> {
    /// Prime the buffer pool, start playback, then start capturing
    ///
    /// # Errors
    /// Any failure closes both sessions before returning.
    pub fn start(mut capture: C, mut playback: P, config: &MeterConfig) -> MeterResult<Self> {
        let pool = match BufferPool::prime(
            &mut playback,
            config.buffers,
            config.block_capacity,
            config.sample_rate,
        ) {
            Ok(pool) => pool,
            Err(e) => {
                capture.close();
                playback.close();
                return Err(e.into());
            }
        };

        let mut loopback = Self {
            capture,
            playback,
            pool,
            torn_down: false,
        };

        // From here on, Drop tears everything down on early return
        loopback.playback.play()?;
        loopback.capture.start()?;

        info!(
            "Loopback running with {} buffers of {} samples",
            loopback.pool.len(),
            loopback.pool.block_capacity()
        );
        Ok(loopback)
    }

    pub fn capture(&self) -> &C {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut C {
        &mut self.capture
    }

    pub fn playback(&self) -> &P {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut P {
        &mut self.playback
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Split borrow of the sessions and the pool for one loop iteration
    pub fn parts_mut(&mut self) -> (&mut C, &mut P, &mut BufferPool) {
        (&mut self.capture, &mut self.playback, &mut self.pool)
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Run the teardown sequence; later calls do nothing
    pub fn shutdown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        debug!("Tearing down loopback");
        self.capture.stop();
        self.capture.close();
        self.playback.stop();
        self.pool.release(&mut self.playback);
        self.playback.close();

        if !self.pool.is_released() {
            warn!("Playback buffers were not released");
        }
        info!("Loopback shut down");
    }
}

impl<C: CaptureSource, P: PlaybackSink> Drop for Loopback<C, P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
