use crate::audio::error::{AudioError, AudioResult};
use crate::config::MeterConfig;
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{
    Device, Host, SampleFormat, SampleRate, SupportedStreamConfig, SupportedStreamConfigRange,
    SupportedStreamConfigsError,
};

/// Sample formats the streams can convert to and from i16
const CONVERTIBLE_FORMATS: [SampleFormat; 2] = [SampleFormat::I16, SampleFormat::F32];

/// How the channel count of a candidate configuration must relate to the
/// configured one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMatch {
    /// Exactly the configured count (capture)
    Exact,
    /// The configured count if offered, otherwise the fewest channels
    /// available; mono is duplicated into every channel (playback)
    Fanout,
}

/// Get the default input device
///
/// # Errors
/// Returns `AudioError::DeviceUnavailable` if the host has no default input.
pub fn default_input_device(host: &Host) -> AudioResult<Device> {
    host.default_input_device()
        .ok_or_else(|| AudioError::DeviceUnavailable("no default input device".to_string()))
}

/// Get the default output device
///
/// # Errors
/// Returns `AudioError::DeviceUnavailable` if the host has no default output.
pub fn default_output_device(host: &Host) -> AudioResult<Device> {
    host.default_output_device()
        .ok_or_else(|| AudioError::DeviceUnavailable("no default output device".to_string()))
}

/// Human-readable device name
pub fn device_name(device: &Device) -> String {
    device.name().unwrap_or_else(|_| "Unknown".to_string())
}

/// Map a failed format query, keeping a vanished device distinct from a
/// format problem
pub fn supported_configs_error(device: &str, err: SupportedStreamConfigsError) -> AudioError {
    match err {
        SupportedStreamConfigsError::DeviceNotAvailable => {
            AudioError::DeviceUnavailable(format!("device '{}' is not available", device))
        }
        other => AudioError::SupportedConfigError(other),
    }
}

/// Pick an input configuration matching `config`
///
/// # Errors
/// Returns `AudioError::DeviceUnavailable` if the device went away.
/// Returns `AudioError::ConfigMismatch` listing what the device offers when
/// nothing matches.
pub fn input_config(device: &Device, config: &MeterConfig) -> AudioResult<SupportedStreamConfig> {
    let ranges: Vec<SupportedStreamConfigRange> = device
        .supported_input_configs()
        .map_err(|e| supported_configs_error(&device_name(device), e))?
        .collect();
    choose_config(&ranges, config, ChannelMatch::Exact).ok_or_else(|| {
        AudioError::ConfigMismatch(format!(
            "input device '{}' does not support {} Hz, {} channel(s), i16/f32 (supported: {})",
            device_name(device),
            config.sample_rate,
            config.channels,
            describe_ranges(&ranges)
        ))
    })
}

/// Pick an output configuration able to play `config`'s format
///
/// # Errors
/// Returns `AudioError::DeviceUnavailable` if the device went away.
/// Returns `AudioError::ConfigMismatch` when the sample rate is not offered.
pub fn output_config(device: &Device, config: &MeterConfig) -> AudioResult<SupportedStreamConfig> {
    let ranges: Vec<SupportedStreamConfigRange> = device
        .supported_output_configs()
        .map_err(|e| supported_configs_error(&device_name(device), e))?
        .collect();
    choose_config(&ranges, config, ChannelMatch::Fanout).ok_or_else(|| {
        AudioError::ConfigMismatch(format!(
            "output device '{}' does not support {} Hz, i16/f32 (supported: {})",
            device_name(device),
            config.sample_rate,
            describe_ranges(&ranges)
        ))
    })
}

/// Choose the best matching configuration among `ranges`
///
/// Candidates must contain the configured sample rate and use a convertible
/// sample format. Fewer channels win, then i16 over f32.
pub fn choose_config(
    ranges: &[SupportedStreamConfigRange],
    config: &MeterConfig,
    channels: ChannelMatch,
) -> Option<SupportedStreamConfig> {
    let rate = SampleRate(config.sample_rate);

    ranges
        .iter()
        .filter(|range| rate >= range.min_sample_rate() && rate <= range.max_sample_rate())
        .filter(|range| CONVERTIBLE_FORMATS.contains(&range.sample_format()))
        .filter(|range| match channels {
            ChannelMatch::Exact => range.channels() == config.channels,
            ChannelMatch::Fanout => range.channels() >= config.channels,
        })
        .min_by_key(|range| {
            let format_rank = if range.sample_format() == SampleFormat::I16 { 0 } else { 1 };
            (range.channels(), format_rank)
        })
        .map(|range| range.with_sample_rate(rate))
}

fn describe_ranges(ranges: &[SupportedStreamConfigRange]) -> String {
    if ranges.is_empty() {
        return "none".to_string();
    }

    ranges
        .iter()
        .map(|range| {
            format!(
                "{}ch {}-{} Hz {:?}",
                range.channels(),
                range.min_sample_rate().0,
                range.max_sample_rate().0,
                range.sample_format()
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}
