use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader};

use crate::models::audio_frame::{AudioFormat, AudioFrame};
use crate::models::error::EngineError;
use crate::processing::pcm;
use crate::traits::frame_source::FrameSource;

/// Reads a pre-rendered WAV file in fixed-size blocks.
///
/// Integer PCM is passed through at its own width. 32-bit float files are
/// converted to 16-bit PCM so every frame this source yields is integer PCM.
pub struct WavFileSource {
    reader: WavReader<BufReader<File>>,
    path: PathBuf,
    sample_format: SampleFormat,
    format: AudioFormat,
    block_frames: usize,
    total_frames: u64,
    frames_read: u64,
}

impl WavFileSource {
    pub fn open(path: impl AsRef<Path>, block_frames: usize) -> Result<Self, EngineError> {
        let path = path.as_ref().to_path_buf();
        if block_frames == 0 {
            return Err(EngineError::ConfigurationFailed("block size must be positive".into()));
        }

        let reader = WavReader::open(&path).map_err(|e| {
            EngineError::Source(format!("failed to open {}: {}", path.display(), e))
        })?;
        let spec = reader.spec();

        let sample_width = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => bits / 8,
            (SampleFormat::Float, 32) => 2,
            (kind, bits) => {
                return Err(EngineError::UnsupportedFormat(format!(
                    "{:?} samples with {} bits",
                    kind, bits
                )))
            }
        };
        let format = AudioFormat::new(spec.sample_rate, spec.channels, sample_width);
        format.validate()?;

        let total_frames = reader.duration() as u64;
        log::debug!(
            "Opened {}: {} Hz, {} ch, {} bit {:?}, {} frames",
            path.display(),
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample,
            spec.sample_format,
            total_frames
        );

        Ok(Self {
            reader,
            path,
            sample_format: spec.sample_format,
            format,
            block_frames,
            total_frames,
            frames_read: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn duration_secs(&self) -> f64 {
        self.format.frames_to_secs(self.total_frames)
    }

    fn read_error(&self, e: hound::Error) -> EngineError {
        EngineError::Source(format!("failed to read {}: {}", self.path.display(), e))
    }
}

impl FrameSource for WavFileSource {
    fn next_frame(&mut self) -> Result<Option<AudioFrame>, EngineError> {
        let remaining = self.total_frames - self.frames_read;
        if remaining == 0 {
            return Ok(None);
        }
        let frames = remaining.min(self.block_frames as u64) as usize;
        let sample_count = frames * self.format.channels as usize;

        let data = match self.sample_format {
            SampleFormat::Int => {
                let samples = self
                    .reader
                    .samples::<i32>()
                    .take(sample_count)
                    .collect::<Result<Vec<_>, _>>();
                let samples = samples.map_err(|e| self.read_error(e))?;
                pcm::ints_to_pcm(&samples, self.format.sample_width as usize)
            }
            SampleFormat::Float => {
                let samples = self
                    .reader
                    .samples::<f32>()
                    .take(sample_count)
                    .collect::<Result<Vec<_>, _>>();
                let samples = samples.map_err(|e| self.read_error(e))?;
                pcm::f32_to_pcm16(&samples)
            }
        };

        if data.len() < sample_count * self.format.sample_width as usize {
            return Err(EngineError::Source(format!(
                "{} ended after {} of {} frames",
                self.path.display(),
                self.frames_read,
                self.total_frames
            )));
        }

        self.frames_read += frames as u64;
        AudioFrame::new(data, self.format).map(Some)
    }

    fn format(&self) -> Option<AudioFormat> {
        Some(self.format)
    }

    fn total_frames(&self) -> Option<u64> {
        Some(self.total_frames)
    }
}
