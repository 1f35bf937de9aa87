//! Polling scheduler
//!
//! One cooperative loop drives everything. Each iteration pauses for a fixed
//! quantum, then:
//!
//! 1. does nothing until a playback buffer has finished (backpressure)
//! 2. does nothing while capture has no frames, so no finished buffer is
//!    taken back without content for it
//! 3. reads the available frames into the scratch block
//! 4. refills and re-queues one finished buffer with that block
//! 5. updates the smoothed level from the same block and emits it
//! 6. plays the source again if it stopped
//!
//! A block whose refill failed is kept and retried on the next iteration
//! before anything new is read, so every emitted level belongs to a block
//! that was queued for playback.
//!
//! The only suspension point is the pause; every collaborator call is a
//! non-blocking query. The scheduler is not thread-safe; keep it on one task.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use crate::audio::buffer::PcmBlock;
use crate::audio::sink::{PlaybackSink, SourceState};
use crate::audio::source::CaptureSource;
use crate::config::MeterConfig;
use crate::meter::error::MeterResult;
use crate::meter::loopback::Loopback;
use crate::meter::loudness::{Decibels, EstimatorState};
use crate::meter::output::LevelOutput;
use crate::meter::pool::CycleOutcome;
use crate::meter::stats::CycleStats;

/// Outcome of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    /// No playback buffer finished yet
    Idle,
    /// A buffer finished but capture had nothing to give
    EmptyCapture,
    /// `frames` samples were measured and re-queued
    Cycled {
        frames: usize,
        level: Decibels,
        /// Whether the stalled source had to be played again
        restarted: bool,
    },
}

/// Drives a [`Loopback`] until stopped
pub struct Scheduler<C: CaptureSource, P: PlaybackSink, O: LevelOutput> {
    loopback: Loopback<C, P>,
    block: PcmBlock,
    /// `block` holds captured audio not yet queued
    unplayed: bool,
    estimator: EstimatorState,
    output: O,
    stats: CycleStats,
    poll_interval: Duration,
    stall_warn_polls: u64,
}

impl<C: CaptureSource, P: PlaybackSink, O: LevelOutput> Scheduler<C, P, O> {
    /// Create a scheduler over a started loopback
    ///
    /// # Errors
    /// Returns `MeterError::InvalidSmoothing` for an out-of-range smoothing
    /// coefficient.
    pub fn new(loopback: Loopback<C, P>, output: O, config: &MeterConfig) -> MeterResult<Self> {
        Ok(Self {
            block: PcmBlock::new(loopback.pool().block_capacity()),
            unplayed: false,
            estimator: EstimatorState::new(config.smoothing)?,
            loopback,
            output,
            stats: CycleStats::default(),
            poll_interval: config.poll_interval(),
            stall_warn_polls: config.stall_warn_polls,
        })
    }

    /// Run one iteration without pausing
    pub fn tick(&mut self) -> MeterResult<Tick> {
        let (capture, playback, pool) = self.loopback.parts_mut();

        if !pool.has_finished(playback) {
            if self.stats.record_idle(self.stall_warn_polls) {
                warn!(
                    "No playback buffer finished for {} polls; capture and playback are out of step",
                    self.stall_warn_polls
                );
            }
            return Ok(Tick::Idle);
        }

        let frames = if self.unplayed {
            self.block.len()
        } else {
            let available = capture.available_frames();
            if available <= 0 {
                trace!("Capture not ready ({} frames)", available);
                self.stats.record_empty_capture();
                return Ok(Tick::EmptyCapture);
            }

            let frames = self
                .block
                .fill_with(available as usize, |dest| capture.read(dest))?;
            if frames == 0 {
                self.stats.record_empty_capture();
                return Ok(Tick::EmptyCapture);
            }
            frames
        };

        // Held for retry until queued
        self.unplayed = true;
        if pool.cycle_step(playback, &self.block)? == CycleOutcome::Idle {
            self.stats.record_idle(self.stall_warn_polls);
            return Ok(Tick::Idle);
        }
        self.unplayed = false;

        let level = self.estimator.update(self.block.as_slice())?;
        self.output.emit(level);

        let restarted = if playback.source_state() != SourceState::Playing {
            warn!("Playback stalled, restarting source");
            playback.play()?;
            self.stats.record_restart();
            true
        } else {
            false
        };

        self.stats.record_cycle(frames);
        Ok(Tick::Cycled {
            frames,
            level,
            restarted,
        })
    }

    /// Loop until `stop` resolves, then tear down
    ///
    /// `stop` is checked before every pause. Recoverable errors are logged
    /// and counted; any other error ends the loop. Teardown runs on every
    /// exit path.
    pub async fn run<F>(&mut self, stop: F) -> MeterResult<CycleStats>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(stop);
        info!("Meter loop started, polling every {:?}", self.poll_interval);

        loop {
            tokio::select! {
                biased;
                _ = &mut stop => {
                    info!("Stop requested");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            match self.tick() {
                Ok(tick) => trace!("{:?}", tick),
                Err(e) if e.is_recoverable() => {
                    warn!("Meter loop recovered from: {}", e);
                    self.stats.record_recovered_error();
                }
                Err(e) => {
                    error!("Meter loop failed: {}", e);
                    self.shutdown();
                    return Err(e);
                }
            }
        }

        self.shutdown();
        debug!("Final stats: {:?}", self.stats);
        Ok(self.stats.clone())
    }

    /// Tear down both sessions; later calls do nothing
    pub fn shutdown(&mut self) {
        self.loopback.shutdown();
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn estimator(&self) -> &EstimatorState {
        &self.estimator
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn loopback(&self) -> &Loopback<C, P> {
        &self.loopback
    }

    pub fn loopback_mut(&mut self) -> &mut Loopback<C, P> {
        &mut self.loopback
    }
}
