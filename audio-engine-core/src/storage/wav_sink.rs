use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::audio_frame::{AudioFormat, AudioFrame};
use crate::models::error::EngineError;
use crate::processing::wav_format;

/// What a finalized sink wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkSummary {
    pub file_path: PathBuf,
    pub frame_count: u64,
    pub checksum: String,
}

/// Streaming WAV writer used by the capture worker.
///
/// ## File Format
/// ```text
/// [44-byte WAV header, sizes zero until finalized]
/// [raw PCM data...]
/// ```
pub struct WavFileSink {
    file_path: PathBuf,
    format: AudioFormat,
    writer: Option<BufWriter<File>>,
    data_bytes: u64,
}

impl WavFileSink {
    /// Create the file (and its parent directories) and write a placeholder header.
    pub fn create(file_path: impl Into<PathBuf>, format: AudioFormat) -> Result<Self, EngineError> {
        let file_path = file_path.into();
        format.validate()?;

        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| EngineError::Storage(format!("failed to create directory: {}", e)))?;
            }
        }

        let file = File::create(&file_path)
            .map_err(|e| EngineError::Storage(format!("failed to create {}: {}", file_path.display(), e)))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&wav_format::encode_header(format, 0)?)
            .map_err(|e| EngineError::Storage(format!("write failed: {}", e)))?;

        Ok(Self {
            file_path,
            format,
            writer: Some(writer),
            data_bytes: 0,
        })
    }

    /// Append one block of PCM. The frame must match the sink's format.
    pub fn write(&mut self, frame: &AudioFrame) -> Result<(), EngineError> {
        if frame.format() != self.format {
            return Err(EngineError::UnsupportedFormat(format!(
                "frame format {:?} does not match sink format {:?}",
                frame.format(),
                self.format
            )));
        }
        if self.data_bytes + frame.len_bytes() as u64 > wav_format::MAX_DATA_SIZE {
            return Err(EngineError::Storage("recording exceeds the WAV size limit".into()));
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| EngineError::Storage("sink is already finalized".into()))?;
        writer
            .write_all(frame.data())
            .map_err(|e| EngineError::Storage(format!("write failed: {}", e)))?;
        self.data_bytes += frame.len_bytes() as u64;
        Ok(())
    }

    /// Rewrite the header with final sizes, flush, and checksum the file.
    pub fn finalize(&mut self) -> Result<SinkSummary, EngineError> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| EngineError::Storage("sink is already finalized".into()))?;

        let header = wav_format::encode_header(self.format, self.data_bytes)?;
        writer
            .seek(SeekFrom::Start(0))
            .and_then(|_| writer.write_all(&header))
            .and_then(|_| writer.flush())
            .map_err(|e| EngineError::Storage(format!("failed to finalize header: {}", e)))?;
        drop(writer);

        Ok(SinkSummary {
            file_path: self.file_path.clone(),
            frame_count: self.frame_count(),
            checksum: sha256_file(&self.file_path)?,
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.data_bytes / self.format.bytes_per_frame() as u64
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

impl Drop for WavFileSink {
    fn drop(&mut self) {
        if self.writer.is_some() {
            if let Err(e) = self.finalize() {
                log::error!("Failed to finalize {}: {}", self.file_path.display(), e);
            }
        }
    }
}

/// Compute SHA-256 hex digest of a file.
fn sha256_file(path: &Path) -> Result<String, EngineError> {
    let data = fs::read(path)
        .map_err(|e| EngineError::Storage(format!("failed to read file for checksum: {}", e)))?;
    let digest = Sha256::digest(&data);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}
