use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::audio::device::{default_output_device, device_name, output_config};
use crate::audio::error::{AudioError, AudioResult};
use crate::audio::sink::{BufferId, PlaybackSink, SourceState};
use crate::audio::source::SessionState;
use crate::config::MeterConfig;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use tracing::{debug, error, info, warn};

/// Queued playback source shared with the output callback
///
/// Buffers play in queue order. The first `processed` entries of the queue
/// have finished and wait to be dequeued; `cursor` is the read position in
/// the buffer after them. Running past the last queued buffer stops the
/// source (underrun), and playing a stopped source rewinds the whole queue.
#[derive(Debug)]
pub(crate) struct SourceQueue {
    buffers: HashMap<BufferId, Vec<i16>>,
    next_id: u32,
    queue: VecDeque<BufferId>,
    processed: usize,
    cursor: usize,
    state: SourceState,
}

impl SourceQueue {
    pub(crate) fn new() -> Self {
        Self {
            buffers: HashMap::new(),
            next_id: 1,
            queue: VecDeque::new(),
            processed: 0,
            cursor: 0,
            state: SourceState::Initial,
        }
    }

    pub(crate) fn create(&mut self, count: usize) -> Vec<BufferId> {
        (0..count)
            .map(|_| {
                let id = BufferId(self.next_id);
                self.next_id += 1;
                self.buffers.insert(id, Vec::new());
                id
            })
            .collect()
    }

    pub(crate) fn fill(&mut self, id: BufferId, samples: &[i16]) -> AudioResult<()> {
        if self.queue.contains(&id) {
            return Err(AudioError::BufferBusy(id));
        }
        let buffer = self
            .buffers
            .get_mut(&id)
            .ok_or(AudioError::UnknownBuffer(id))?;
        buffer.clear();
        buffer.extend_from_slice(samples);
        Ok(())
    }

    pub(crate) fn enqueue(&mut self, ids: &[BufferId]) -> AudioResult<()> {
        for (i, id) in ids.iter().enumerate() {
            if !self.buffers.contains_key(id) {
                return Err(AudioError::UnknownBuffer(*id));
            }
            if self.queue.contains(id) || ids[..i].contains(id) {
                return Err(AudioError::BufferBusy(*id));
            }
        }
        self.queue.extend(ids.iter().copied());
        Ok(())
    }

    pub(crate) fn play(&mut self) {
        if self.state == SourceState::Playing {
            return;
        }
        self.processed = 0;
        self.cursor = 0;
        self.state = SourceState::Playing;
    }

    pub(crate) fn stop(&mut self) {
        self.processed = self.queue.len();
        self.cursor = 0;
        self.state = SourceState::Stopped;
    }

    pub(crate) fn state(&self) -> SourceState {
        self.state
    }

    pub(crate) fn completed(&self) -> usize {
        self.processed
    }

    pub(crate) fn queued(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn dequeue(&mut self) -> AudioResult<BufferId> {
        if self.processed == 0 {
            return Err(AudioError::InvalidState(
                "no processed buffer to dequeue".to_string(),
            ));
        }
        let id = self
            .queue
            .pop_front()
            .ok_or_else(|| AudioError::InvalidState("source queue is empty".to_string()))?;
        self.processed -= 1;
        Ok(id)
    }

    pub(crate) fn delete(&mut self, ids: &[BufferId]) {
        for id in ids {
            if let Some(index) = self.queue.iter().position(|queued| queued == id) {
                self.queue.remove(index);
                if index < self.processed {
                    self.processed -= 1;
                } else if index == self.processed {
                    self.cursor = 0;
                }
            }
            self.buffers.remove(id);
        }
    }

    /// Next sample to play, or silence when the source is not playing
    pub(crate) fn next_sample(&mut self) -> i16 {
        if self.state != SourceState::Playing {
            return 0;
        }

        loop {
            let Some(id) = self.queue.get(self.processed) else {
                self.state = SourceState::Stopped;
                self.cursor = 0;
                return 0;
            };
            let buffer = self.buffers.get(id).map(Vec::as_slice).unwrap_or(&[]);

            if self.cursor < buffer.len() {
                let sample = buffer[self.cursor];
                self.cursor += 1;
                if self.cursor == buffer.len() {
                    self.processed += 1;
                    self.cursor = 0;
                }
                return sample;
            }

            // Empty buffer
            self.processed += 1;
            self.cursor = 0;
        }
    }
}

fn lock(source: &Mutex<SourceQueue>) -> MutexGuard<'_, SourceQueue> {
    source.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Loopback playback backed by a cpal output stream
///
/// The stream is the playback context: it is created on open and renders
/// silence until the source is played. Mono samples are written to every
/// channel of the device.
pub struct CpalPlayback {
    /// Stream configuration
    config: StreamConfig,
    /// The output stream (None after close)
    stream: Option<Stream>,
    /// Source queue shared with the output callback
    source: Arc<Mutex<SourceQueue>>,
    state: SessionState,
}

impl CpalPlayback {
    /// Open the default output device and create the playback context
    ///
    /// # Errors
    /// Returns `AudioError::DeviceUnavailable` if there is no output device.
    /// Returns `AudioError::ConfigMismatch` if the device cannot play the
    /// configured sample rate.
    pub fn open(config: &MeterConfig) -> AudioResult<Self> {
        let host = cpal::default_host();
        let device = default_output_device(&host)?;

        info!("Using audio output device: {}", device_name(&device));

        let supported = output_config(&device, config)?;
        let sample_format = supported.sample_format();

        info!(
            "Playback config: {} Hz, {} channel(s), {:?}",
            supported.sample_rate().0,
            supported.channels(),
            sample_format
        );

        let stream_config = StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let source = Arc::new(Mutex::new(SourceQueue::new()));
        let stream = build_stream(&device, &stream_config, sample_format, Arc::clone(&source))?;
        stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        Ok(Self {
            config: stream_config,
            stream: Some(stream),
            source,
            state: SessionState::Open,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn ensure_open(&self) -> AudioResult<()> {
        if self.state == SessionState::Closed {
            return Err(AudioError::InvalidState("playback context is closed".to_string()));
        }
        Ok(())
    }
}

fn build_stream(
    device: &Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    source: Arc<Mutex<SourceQueue>>,
) -> AudioResult<Stream> {
    match sample_format {
        SampleFormat::I16 => build_typed_stream::<i16>(device, config, source),
        SampleFormat::F32 => build_typed_stream::<f32>(device, config, source),
        other => Err(AudioError::ConfigMismatch(format!(
            "unsupported playback sample format {:?}",
            other
        ))),
    }
}

fn build_typed_stream<T>(
    device: &Device,
    config: &StreamConfig,
    source: Arc<Mutex<SourceQueue>>,
) -> AudioResult<Stream>
where
    T: SizedSample + FromSample<i16>,
{
    let channels = usize::from(config.channels).max(1);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut source = lock(&source);
                for frame in data.chunks_mut(channels) {
                    frame.fill(T::from_sample(source.next_sample()));
                }
            },
            move |err| {
                error!("Audio playback stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildFailed(e.to_string()))
}

impl PlaybackSink for CpalPlayback {
    fn create_buffers(&mut self, count: usize) -> AudioResult<Vec<BufferId>> {
        self.ensure_open()?;
        let ids = lock(&self.source).create(count);
        debug!("Created {} playback buffers", ids.len());
        Ok(ids)
    }

    fn fill_buffer(&mut self, id: BufferId, samples: &[i16], sample_rate: u32) -> AudioResult<()> {
        self.ensure_open()?;
        if sample_rate != self.sample_rate() {
            return Err(AudioError::ConfigMismatch(format!(
                "buffer at {} Hz on a {} Hz playback stream",
                sample_rate,
                self.sample_rate()
            )));
        }
        lock(&self.source).fill(id, samples)
    }

    fn queue(&mut self, ids: &[BufferId]) -> AudioResult<()> {
        self.ensure_open()?;
        lock(&self.source).enqueue(ids)
    }

    fn play(&mut self) -> AudioResult<()> {
        self.ensure_open()?;
        lock(&self.source).play();
        self.state = SessionState::Active;
        Ok(())
    }

    fn completed_count(&self) -> usize {
        lock(&self.source).completed()
    }

    fn dequeue_one(&mut self) -> AudioResult<BufferId> {
        self.ensure_open()?;
        lock(&self.source).dequeue()
    }

    fn source_state(&self) -> SourceState {
        lock(&self.source).state()
    }

    fn stop(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        lock(&self.source).stop();
        self.state = SessionState::Stopped;
        debug!("Playback source stopped");
    }

    fn delete_buffers(&mut self, ids: &[BufferId]) {
        let mut source = lock(&self.source);
        source.delete(ids);
        if source.queued() > 0 {
            warn!("{} buffers still queued after delete", source.queued());
        }
    }

    fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.stop();
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("Failed to pause playback stream: {}", e);
            }
            drop(stream);
        }
        self.state = SessionState::Closed;
        debug!("Playback context destroyed");
    }

    fn session_state(&self) -> SessionState {
        self.state
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        self.close();
    }
}
