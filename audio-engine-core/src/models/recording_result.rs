use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::audio_frame::AudioFormat;

/// Result returned when a capture session completes successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub duration_secs: f64,
    pub frame_count: u64,
    pub metadata: RecordingMetadata,
    pub checksum: String,
}

/// Metadata stored alongside a recording.
///
/// Serializable for the JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub duration_secs: f64,
    pub file_path: String,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
}

impl RecordingMetadata {
    pub fn new(duration_secs: f64, file_path: &str, checksum: &str, format: AudioFormat) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            duration_secs,
            file_path: file_path.to_string(),
            checksum: checksum.to_string(),
            created_at: Utc::now(),
            sample_rate: format.sample_rate,
            channels: format.channels,
            bit_depth: format.bit_depth(),
        }
    }
}
