use std::fs;
use std::path::{Path, PathBuf};

use crate::models::error::EngineError;
use crate::models::recording_result::RecordingMetadata;

/// Sidecar location for a recording: `take.wav` → `take.metadata.json`.
pub fn metadata_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("metadata.json")
}

/// Write recording metadata as a JSON sidecar file.
pub fn write_metadata(metadata: &RecordingMetadata, recording_path: &Path) -> Result<(), EngineError> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| EngineError::Storage(format!("failed to serialize metadata: {}", e)))?;
    fs::write(metadata_path(recording_path), json)
        .map_err(|e| EngineError::Storage(format!("failed to write metadata: {}", e)))?;
    Ok(())
}

/// Read recording metadata from a JSON sidecar file.
pub fn read_metadata(recording_path: &Path) -> Result<RecordingMetadata, EngineError> {
    let json = fs::read_to_string(metadata_path(recording_path))
        .map_err(|e| EngineError::Storage(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json)
        .map_err(|e| EngineError::Storage(format!("failed to parse metadata: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_frame::AudioFormat;

    #[test]
    fn sidecar_sits_next_to_recording() {
        assert_eq!(
            metadata_path(Path::new("/tmp/takes/line-3.wav")),
            PathBuf::from("/tmp/takes/line-3.metadata.json")
        );
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let recording = dir.path().join("take.wav");
        let metadata = RecordingMetadata::new(1.5, &recording.to_string_lossy(), "abc123", AudioFormat::pcm16(44100, 1));

        write_metadata(&metadata, &recording).unwrap();
        let loaded = read_metadata(&recording).unwrap();

        assert_eq!(loaded, metadata);
        assert_eq!(loaded.bit_depth, 16);
        assert!(!loaded.id.is_empty());
    }

    #[test]
    fn timestamp_is_stored_as_rfc3339() {
        let dir = tempfile::tempdir().unwrap();
        let recording = dir.path().join("take.wav");
        let metadata = RecordingMetadata::new(0.5, &recording.to_string_lossy(), "ff00", AudioFormat::pcm16(16000, 1));
        write_metadata(&metadata, &recording).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(metadata_path(&recording)).unwrap()).unwrap();
        let stamp = raw["created_at"].as_str().unwrap();
        let parsed = chrono::DateTime::parse_from_rfc3339(stamp).unwrap();
        assert_eq!(parsed.with_timezone(&chrono::Utc), metadata.created_at);
    }

    #[test]
    fn missing_sidecar_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_metadata(&dir.path().join("none.wav")).unwrap_err();
        assert!(matches!(err, EngineError::Storage(_)));
    }
}
