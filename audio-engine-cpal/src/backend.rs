use audio_engine_core::{
    AudioFormat, BlockingInput, BlockingOutput, CallbackStream, EngineError, InputBackend,
    OutputBackend, RenderCallback,
};
use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::CpalError;
use crate::input::CpalInput;
use crate::output::{CpalBlockingOutput, CpalCallbackStream};

/// Audio backend on the default cpal host.
///
/// Devices are selected by name; `None` means the host's default device.
/// Only 16-bit PCM formats are accepted; devices are driven with `i16`,
/// `f32` or `u16` samples, whichever they offer.
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    output_device: Option<String>,
    input_device: Option<String>,
}

impl CpalBackend {
    /// Backend using the default input and output devices.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_device(mut self, name: impl Into<String>) -> Self {
        self.output_device = Some(name.into());
        self
    }

    pub fn with_input_device(mut self, name: impl Into<String>) -> Self {
        self.input_device = Some(name.into());
        self
    }

    /// Names of the host's output devices.
    pub fn output_device_names() -> Result<Vec<String>, EngineError> {
        let devices = cpal::default_host()
            .output_devices()
            .map_err(CpalError::from)?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    /// Names of the host's input devices.
    pub fn input_device_names() -> Result<Vec<String>, EngineError> {
        let devices = cpal::default_host()
            .input_devices()
            .map_err(CpalError::from)?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }
}

impl OutputBackend for CpalBackend {
    fn open_blocking(&self, format: AudioFormat) -> Result<Box<dyn BlockingOutput>, EngineError> {
        let config = stream_config(format, None)?;
        let output = CpalBlockingOutput::open(self.output_device.clone(), format, config)?;
        Ok(Box::new(output))
    }

    fn open_callback(
        &self,
        format: AudioFormat,
        block_frames: usize,
        callback: RenderCallback,
    ) -> Result<Box<dyn CallbackStream>, EngineError> {
        let config = stream_config(format, Some(block_frames))?;
        let stream = CpalCallbackStream::open(self.output_device.clone(), config, callback)?;
        Ok(Box::new(stream))
    }
}

impl InputBackend for CpalBackend {
    fn open_input(&self, format: AudioFormat) -> Result<Box<dyn BlockingInput>, EngineError> {
        let config = stream_config(format, None)?;
        let input = CpalInput::open(self.input_device.clone(), format, config)?;
        Ok(Box::new(input))
    }
}

/// cpal stream configuration for a 16-bit PCM format.
pub(crate) fn stream_config(
    format: AudioFormat,
    block_frames: Option<usize>,
) -> Result<cpal::StreamConfig, EngineError> {
    format.validate()?;
    if format.sample_width != 2 {
        return Err(EngineError::UnsupportedFormat(format!(
            "cpal backend plays 16-bit PCM only, got {}-bit",
            format.bit_depth()
        )));
    }

    let buffer_size = match block_frames {
        Some(0) => {
            return Err(EngineError::ConfigurationFailed("block size must be positive".into()))
        }
        Some(frames) => cpal::BufferSize::Fixed(frames as u32),
        None => cpal::BufferSize::Default,
    };

    Ok(cpal::StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size,
    })
}

/// Device sample types in order of preference; the engine works in `i16`.
const PREFERRED_SAMPLE_FORMATS: [cpal::SampleFormat; 3] = [
    cpal::SampleFormat::I16,
    cpal::SampleFormat::F32,
    cpal::SampleFormat::U16,
];

/// Sample type to open `device` with for `config`.
pub(crate) fn output_sample_format(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
) -> Result<cpal::SampleFormat, EngineError> {
    let offered = device.supported_output_configs().map_err(CpalError::from)?;
    pick_sample_format(offered, config)
}

pub(crate) fn input_sample_format(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
) -> Result<cpal::SampleFormat, EngineError> {
    let offered = device.supported_input_configs().map_err(CpalError::from)?;
    pick_sample_format(offered, config)
}

fn pick_sample_format(
    offered: impl IntoIterator<Item = cpal::SupportedStreamConfigRange>,
    config: &cpal::StreamConfig,
) -> Result<cpal::SampleFormat, EngineError> {
    let matching: Vec<cpal::SampleFormat> = offered
        .into_iter()
        .filter(|range| {
            range.channels() == config.channels
                && range.min_sample_rate() <= config.sample_rate
                && config.sample_rate <= range.max_sample_rate()
        })
        .map(|range| range.sample_format())
        .collect();

    PREFERRED_SAMPLE_FORMATS
        .into_iter()
        .find(|format| matching.contains(format))
        .ok_or_else(|| {
            EngineError::UnsupportedFormat(format!(
                "device has no i16, f32 or u16 format for {} ch at {} Hz (offers {:?})",
                config.channels, config.sample_rate.0, matching
            ))
        })
}

pub(crate) fn find_output_device(name: Option<&str>) -> Result<cpal::Device, EngineError> {
    let host = cpal::default_host();
    match name {
        None => host.default_output_device().ok_or(EngineError::DeviceNotAvailable),
        Some(name) => host
            .output_devices()
            .map_err(CpalError::from)?
            .find(|d| d.name().is_ok_and(|n| n == name))
            .ok_or(EngineError::DeviceNotAvailable),
    }
}

pub(crate) fn find_input_device(name: Option<&str>) -> Result<cpal::Device, EngineError> {
    let host = cpal::default_host();
    match name {
        None => host.default_input_device().ok_or(EngineError::DeviceNotAvailable),
        Some(name) => host
            .input_devices()
            .map_err(CpalError::from)?
            .find(|d| d.name().is_ok_and(|n| n == name))
            .ok_or(EngineError::DeviceNotAvailable),
    }
}
