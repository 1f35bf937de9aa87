//! Scripted capture and playback collaborators shared by the integration tests
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use decibels_lib::audio::{
    AudioError, AudioResult, BufferId, CaptureSource, PlaybackSink, SessionState, SourceState,
};
use decibels_lib::config::MeterConfig;

/// Ordered record of collaborator calls, shared by both fakes
pub type EventLog = Rc<RefCell<Vec<String>>>;

pub fn event_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Default config with a short poll interval for async tests
pub fn test_config() -> MeterConfig {
    MeterConfig {
        poll_interval_ms: 1,
        ..MeterConfig::default()
    }
}

/// Capture that hands out whatever samples the test pushed
pub struct FakeCapture {
    samples: VecDeque<i16>,
    /// Overrides the reported frame count when set
    pub reported: Option<isize>,
    pub reads: usize,
    pub fail_start: bool,
    state: SessionState,
    log: EventLog,
}

impl FakeCapture {
    pub fn new(log: &EventLog) -> Self {
        Self {
            samples: VecDeque::new(),
            reported: None,
            reads: 0,
            fail_start: false,
            state: SessionState::Open,
            log: Rc::clone(log),
        }
    }

    pub fn push(&mut self, samples: &[i16]) {
        self.samples.extend(samples.iter().copied());
    }

    pub fn buffered(&self) -> usize {
        self.samples.len()
    }
}

impl CaptureSource for FakeCapture {
    fn start(&mut self) -> AudioResult<()> {
        self.log.borrow_mut().push("capture.start".into());
        if self.fail_start {
            return Err(AudioError::StreamBuildFailed("scripted".into()));
        }
        self.state = SessionState::Active;
        Ok(())
    }

    fn available_frames(&self) -> isize {
        self.reported.unwrap_or(self.samples.len() as isize)
    }

    fn read(&mut self, dest: &mut [i16]) -> AudioResult<usize> {
        self.reads += 1;
        let n = dest.len().min(self.samples.len());
        for (slot, sample) in dest.iter_mut().zip(self.samples.drain(..n)) {
            *slot = sample;
        }
        Ok(n)
    }

    fn stop(&mut self) {
        self.log.borrow_mut().push("capture.stop".into());
        if self.state == SessionState::Active {
            self.state = SessionState::Stopped;
        }
    }

    fn close(&mut self) {
        self.log.borrow_mut().push("capture.close".into());
        self.state = SessionState::Closed;
    }

    fn state(&self) -> SessionState {
        self.state
    }
}

/// Queued playback source the test advances by hand
pub struct FakeSink {
    buffers: BTreeMap<BufferId, Vec<i16>>,
    next_id: u32,
    queue: VecDeque<BufferId>,
    processed: usize,
    source: SourceState,
    session: SessionState,
    log: EventLog,
    /// Number of upcoming fills that fail
    pub fail_fills: usize,
    pub fail_create: bool,
    /// Returned by the next dequeue instead of the queue head
    pub rogue_dequeue: Option<BufferId>,
    pub play_calls: usize,
    pub dequeues: usize,
    pub deleted: Vec<BufferId>,
}

impl FakeSink {
    pub fn new(log: &EventLog) -> Self {
        Self {
            buffers: BTreeMap::new(),
            next_id: 1,
            queue: VecDeque::new(),
            processed: 0,
            source: SourceState::Initial,
            session: SessionState::Open,
            log: Rc::clone(log),
            fail_fills: 0,
            fail_create: false,
            rogue_dequeue: None,
            play_calls: 0,
            dequeues: 0,
            deleted: Vec::new(),
        }
    }

    /// Mark up to `n` more queued buffers as played
    pub fn finish(&mut self, n: usize) {
        self.processed = (self.processed + n).min(self.queue.len());
    }

    /// Simulate running out of audio: everything played, source stopped
    pub fn underrun(&mut self) {
        self.processed = self.queue.len();
        self.source = SourceState::Stopped;
    }

    pub fn queued_ids(&self) -> Vec<BufferId> {
        self.queue.iter().copied().collect()
    }

    pub fn contents(&self, id: BufferId) -> Option<&[i16]> {
        self.buffers.get(&id).map(Vec::as_slice)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }
}

impl PlaybackSink for FakeSink {
    fn create_buffers(&mut self, count: usize) -> AudioResult<Vec<BufferId>> {
        self.log.borrow_mut().push("playback.create".into());
        if self.fail_create {
            return Err(AudioError::DeviceUnavailable("scripted".into()));
        }
        let ids: Vec<BufferId> = (0..count)
            .map(|i| BufferId(self.next_id + i as u32))
            .collect();
        self.next_id += count as u32;
        for &id in &ids {
            self.buffers.insert(id, Vec::new());
        }
        Ok(ids)
    }

    fn fill_buffer(&mut self, id: BufferId, samples: &[i16], _sample_rate: u32) -> AudioResult<()> {
        if self.queue.contains(&id) {
            return Err(AudioError::BufferBusy(id));
        }
        if self.fail_fills > 0 {
            self.fail_fills -= 1;
            return Err(AudioError::StreamError("scripted fill failure".into()));
        }
        let buffer = self
            .buffers
            .get_mut(&id)
            .ok_or(AudioError::UnknownBuffer(id))?;
        buffer.clear();
        buffer.extend_from_slice(samples);
        Ok(())
    }

    fn queue(&mut self, ids: &[BufferId]) -> AudioResult<()> {
        for id in ids {
            if !self.buffers.contains_key(id) {
                return Err(AudioError::UnknownBuffer(*id));
            }
            if self.queue.contains(id) {
                return Err(AudioError::BufferBusy(*id));
            }
        }
        self.queue.extend(ids.iter().copied());
        Ok(())
    }

    fn play(&mut self) -> AudioResult<()> {
        self.log.borrow_mut().push("playback.play".into());
        self.play_calls += 1;
        if self.source != SourceState::Playing {
            self.processed = 0;
        }
        self.source = SourceState::Playing;
        self.session = SessionState::Active;
        Ok(())
    }

    fn completed_count(&self) -> usize {
        self.processed
    }

    fn dequeue_one(&mut self) -> AudioResult<BufferId> {
        if let Some(id) = self.rogue_dequeue.take() {
            return Ok(id);
        }
        if self.processed == 0 {
            return Err(AudioError::InvalidState("nothing processed".into()));
        }
        let id = self
            .queue
            .pop_front()
            .ok_or_else(|| AudioError::InvalidState("queue empty".into()))?;
        self.processed -= 1;
        self.dequeues += 1;
        Ok(id)
    }

    fn source_state(&self) -> SourceState {
        self.source
    }

    fn stop(&mut self) {
        self.log.borrow_mut().push("playback.stop".into());
        self.source = SourceState::Stopped;
        self.processed = self.queue.len();
    }

    fn delete_buffers(&mut self, ids: &[BufferId]) {
        self.log.borrow_mut().push("playback.delete".into());
        for id in ids {
            if let Some(pos) = self.queue.iter().position(|queued| queued == id) {
                self.queue.remove(pos);
                if pos < self.processed {
                    self.processed -= 1;
                }
            }
            if self.buffers.remove(id).is_some() {
                self.deleted.push(*id);
            }
        }
        self.processed = self.processed.min(self.queue.len());
    }

    fn close(&mut self) {
        self.log.borrow_mut().push("playback.close".into());
        self.session = SessionState::Closed;
    }

    fn session_state(&self) -> SessionState {
        self.session
    }
}
