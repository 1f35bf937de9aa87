use serde::Serialize;

/// Counters kept by the polling loop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    /// Loop iterations
    pub ticks: u64,
    /// Iterations that refilled and re-queued a buffer
    pub cycles: u64,
    /// Iterations with no finished playback buffer
    pub idle_polls: u64,
    /// Iterations with a finished buffer but no captured frames
    pub empty_captures: u64,
    /// Times a stalled source was played again
    pub playback_restarts: u64,
    /// Samples handed to playback
    pub frames_played: u64,
    /// Current run of idle polls
    pub consecutive_idle: u64,
    /// Idle runs that reached the warning threshold
    pub underflows: u64,
    /// Errors the loop logged and survived
    pub recovered_errors: u64,
}

impl CycleStats {
    /// Record an idle poll
    ///
    /// Returns `true` exactly once per idle run, when it reaches
    /// `warn_after` polls.
    pub fn record_idle(&mut self, warn_after: u64) -> bool {
        self.ticks += 1;
        self.idle_polls += 1;
        self.consecutive_idle += 1;

        if self.consecutive_idle == warn_after {
            self.underflows += 1;
            true
        } else {
            false
        }
    }

    pub fn record_empty_capture(&mut self) {
        self.ticks += 1;
        self.empty_captures += 1;
        self.consecutive_idle = 0;
    }

    pub fn record_cycle(&mut self, frames: usize) {
        self.ticks += 1;
        self.cycles += 1;
        self.frames_played += frames as u64;
        self.consecutive_idle = 0;
    }

    pub fn record_restart(&mut self) {
        self.playback_restarts += 1;
    }

    /// Record an iteration that ended in a survivable error
    pub fn record_recovered_error(&mut self) {
        self.ticks += 1;
        self.recovered_errors += 1;
    }
}
