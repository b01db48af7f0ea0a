use audio_engine_core::EngineError;
use thiserror::Error;

/// cpal failures, folded into [`EngineError`] at the backend boundary.
#[derive(Debug, Error)]
pub enum CpalError {
    #[error("failed to list devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query device formats: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("failed to build stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

impl From<CpalError> for EngineError {
    fn from(error: CpalError) -> Self {
        match error {
            CpalError::BuildStream(cpal::BuildStreamError::DeviceNotAvailable)
            | CpalError::SupportedConfigs(cpal::SupportedStreamConfigsError::DeviceNotAvailable)
            | CpalError::PlayStream(cpal::PlayStreamError::DeviceNotAvailable) => {
                EngineError::DeviceNotAvailable
            }
            CpalError::BuildStream(cpal::BuildStreamError::StreamConfigNotSupported) => {
                EngineError::UnsupportedFormat("stream configuration not supported by device".into())
            }
            other => EngineError::Device(other.to_string()),
        }
    }
}
