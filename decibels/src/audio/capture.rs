use crate::audio::buffer::{CaptureConsumer, CaptureProducer, CaptureRing};
use crate::audio::device::{default_input_device, device_name, input_config};
use crate::audio::error::{AudioError, AudioResult};
use crate::audio::source::{CaptureSource, SessionState};
use crate::config::MeterConfig;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use tracing::{debug, error, info, warn};

/// Microphone capture backed by a cpal input stream
///
/// The audio callback converts samples to i16 and pushes them into a ring
/// buffer sized to one block; the polling loop drains it through
/// [`CaptureSource`]. When the loop falls behind, newer samples are dropped
/// until space frees up.
pub struct CpalCapture {
    /// Device being used for capture
    device: Device,
    /// Stream configuration
    config: StreamConfig,
    /// Native sample format of the stream
    sample_format: SampleFormat,
    /// The input stream (None until first start, and after close)
    stream: Option<Stream>,
    /// Write half of the ring, moved into the callback on first start
    producer: Option<CaptureProducer>,
    /// Read half of the ring
    consumer: CaptureConsumer,
    state: SessionState,
}

impl CpalCapture {
    /// Open the default input device with the configured format
    ///
    /// # Errors
    /// Returns `AudioError::DeviceUnavailable` if there is no input device.
    /// Returns `AudioError::ConfigMismatch` if the device cannot capture
    /// mono at the configured sample rate.
    ///
    /// # Example
    /// ```no_run
    /// use decibels_lib::audio::CpalCapture;
    /// use decibels_lib::config::MeterConfig;
    ///
    /// let capture = CpalCapture::open(&MeterConfig::default()).unwrap();
    /// ```
    pub fn open(config: &MeterConfig) -> AudioResult<Self> {
        let host = cpal::default_host();
        let device = default_input_device(&host)?;

        info!("Using audio input device: {}", device_name(&device));

        let supported = input_config(&device, config)?;
        let sample_format = supported.sample_format();

        info!(
            "Capture config: {} Hz, {} channel(s), {:?}",
            supported.sample_rate().0,
            supported.channels(),
            sample_format
        );

        let stream_config = StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let (producer, consumer) = CaptureRing::new(config.block_capacity);

        Ok(Self {
            device,
            config: stream_config,
            sample_format,
            stream: None,
            producer: Some(producer),
            consumer,
            state: SessionState::Open,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn build_stream(&mut self) -> AudioResult<Stream> {
        let producer = self
            .producer
            .take()
            .ok_or_else(|| AudioError::InvalidState("capture ring already in use".to_string()))?;

        match self.sample_format {
            SampleFormat::I16 => self.build_typed_stream::<i16>(producer),
            SampleFormat::F32 => self.build_typed_stream::<f32>(producer),
            other => Err(AudioError::ConfigMismatch(format!(
                "unsupported capture sample format {:?}",
                other
            ))),
        }
    }

    fn build_typed_stream<T>(&self, mut producer: CaptureProducer) -> AudioResult<Stream>
    where
        T: SizedSample,
        i16: FromSample<T>,
    {
        self.device
            .build_input_stream(
                &self.config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    for &sample in data {
                        if !producer.push(to_pcm(sample)) {
                            break;
                        }
                    }
                },
                move |err| {
                    error!("Audio capture stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::StreamBuildFailed(e.to_string()))
    }
}

/// Convert one device sample to 16-bit PCM
fn to_pcm<T>(sample: T) -> i16
where
    T: SizedSample,
    i16: FromSample<T>,
{
    i16::from_sample(sample)
}

impl CaptureSource for CpalCapture {
    fn start(&mut self) -> AudioResult<()> {
        match self.state {
            SessionState::Closed => {
                return Err(AudioError::InvalidState("capture device is closed".to_string()));
            }
            SessionState::Active => {
                warn!("Audio capture already started");
                return Ok(());
            }
            SessionState::Open | SessionState::Stopped => {}
        }

        if self.stream.is_none() {
            let stream = self.build_stream()?;
            self.stream = Some(stream);
        }

        if let Some(stream) = &self.stream {
            stream
                .play()
                .map_err(|e| AudioError::StreamError(e.to_string()))?;
        }

        self.state = SessionState::Active;
        info!("Audio capture started");
        Ok(())
    }

    fn available_frames(&self) -> isize {
        self.consumer.available_samples() as isize
    }

    fn read(&mut self, dest: &mut [i16]) -> AudioResult<usize> {
        Ok(self.consumer.pop_slice(dest))
    }

    fn stop(&mut self) {
        if self.state != SessionState::Active {
            return;
        }

        if let Some(stream) = &self.stream {
            if let Err(e) = stream.pause() {
                warn!("Failed to pause capture stream: {}", e);
            }
        }

        self.state = SessionState::Stopped;
        info!("Audio capture stopped");
    }

    fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        self.stop();
        if let Some(stream) = self.stream.take() {
            drop(stream);
        }
        self.consumer.clear();
        self.state = SessionState::Closed;
        debug!("Capture device closed");
    }

    fn state(&self) -> SessionState {
        self.state
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.close();
    }
}
