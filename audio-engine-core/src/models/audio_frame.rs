use std::sync::Arc;

use super::error::EngineError;

/// PCM layout shared by every frame of one stream.
///
/// Samples are signed little-endian integers, `sample_width` bytes each,
/// interleaved across `channels`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Bytes per sample (2 for 16-bit PCM).
    pub sample_width: u16,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16, sample_width: u16) -> Self {
        Self {
            sample_rate,
            channels,
            sample_width,
        }
    }

    /// 16-bit PCM, the format speech synthesizers and the recorder use.
    pub fn pcm16(sample_rate: u32, channels: u16) -> Self {
        Self::new(sample_rate, channels, 2)
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.sample_width as usize
    }

    pub fn bit_depth(&self) -> u16 {
        self.sample_width * 8
    }

    /// Number of bytes covering `duration_secs` of audio, rounded down to whole frames.
    pub fn bytes_for_duration(&self, duration_secs: f64) -> usize {
        let frames = (duration_secs * self.sample_rate as f64) as usize;
        frames * self.bytes_per_frame()
    }

    pub fn frames_to_secs(&self, frames: u64) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        frames as f64 / self.sample_rate as f64
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.sample_rate == 0 {
            return Err(EngineError::UnsupportedFormat("sample rate must be positive".into()));
        }
        if self.channels == 0 {
            return Err(EngineError::UnsupportedFormat("channel count must be positive".into()));
        }
        if !(1..=4).contains(&self.sample_width) {
            return Err(EngineError::UnsupportedFormat(format!(
                "unsupported sample width: {} bytes",
                self.sample_width
            )));
        }
        Ok(())
    }
}

/// An immutable block of interleaved PCM samples.
///
/// Cloning is cheap: the byte buffer is reference counted and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    data: Arc<[u8]>,
    format: AudioFormat,
}

impl AudioFrame {
    /// Wrap `data` as a frame. Fails if `data` is not a whole number of PCM frames.
    pub fn new(data: impl Into<Arc<[u8]>>, format: AudioFormat) -> Result<Self, EngineError> {
        let data = data.into();
        let bytes_per_frame = format.bytes_per_frame();
        if bytes_per_frame == 0 || data.len() % bytes_per_frame != 0 {
            return Err(EngineError::UnsupportedFormat(format!(
                "{} bytes is not a whole number of {}-byte frames",
                data.len(),
                bytes_per_frame
            )));
        }
        Ok(Self { data, format })
    }

    /// A zero-filled frame holding `frame_count` frames.
    pub fn silence(frame_count: usize, format: AudioFormat) -> Self {
        Self {
            data: vec![0u8; frame_count * format.bytes_per_frame()].into(),
            format,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn len_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn frame_count(&self) -> usize {
        self.data.len() / self.format.bytes_per_frame()
    }

    pub fn duration_secs(&self) -> f64 {
        self.format.frames_to_secs(self.frame_count() as u64)
    }
}
