use thiserror::Error;

/// Errors that can occur during playback, streaming or capture.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("a playback session is already active")]
    AlreadyPlaying,

    #[error("a recording session is already active")]
    AlreadyRecording,

    #[error("device not available")]
    DeviceNotAvailable,

    #[error("device error: {0}")]
    Device(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("source error: {0}")]
    Source(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("timeout")]
    Timeout,

    #[error("unknown error: {0}")]
    Unknown(String),
}
