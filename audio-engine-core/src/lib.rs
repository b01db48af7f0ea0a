//! # audio-engine-core
//!
//! Platform-agnostic real-time audio I/O engine.
//!
//! Plays pre-rendered files and incrementally synthesized streams to an
//! output device with pause/resume/stop control and progress feedback, and
//! records narration from an input device to WAV. Platform backends
//! implement the `OutputBackend` / `InputBackend` traits; `MemoryBackend`
//! is an in-process implementation for tests and headless use.
//!
//! ## Architecture
//!
//! ```text
//! audio-engine-core (this crate)
//! ├── traits/       ← FrameSource, OutputBackend, InputBackend, callbacks
//! ├── models/       ← EngineError, PlaybackState, CaptureState, AudioFrame, configs
//! ├── processing/   ← relay queue, byte accumulator, stream renderer, WAV header, PCM
//! ├── session/      ← FilePlaybackController, StreamingPlaybackPipeline, AudioCaptureController
//! ├── storage/      ← WavFileSource, WavFileSink, metadata sidecar
//! └── backend/      ← MemoryBackend
//! ```

pub mod backend;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use backend::memory::{MemoryBackend, MemoryOptions, Pacing};
pub use models::audio_frame::{AudioFormat, AudioFrame};
pub use models::config::{CaptureConfiguration, PlaybackConfig, StreamingConfig};
pub use models::error::EngineError;
pub use models::recording_result::{RecordingMetadata, RecordingResult};
pub use models::state::{CaptureState, PlaybackState};
pub use processing::stream_renderer::{StreamEnd, StreamSummary};
pub use session::capture::AudioCaptureController;
pub use session::file_playback::FilePlaybackController;
pub use session::streaming::{StreamStart, StreamingPlaybackPipeline};
pub use storage::wav_sink::WavFileSink;
pub use storage::wav_source::WavFileSource;
pub use traits::callbacks::{CaptureProgressCallback, FinishedCallback, PlaybackProgressCallback};
pub use traits::device::{
    BlockingInput, BlockingOutput, CallbackStream, InputBackend, OutputBackend, RenderCallback, Rendered,
};
pub use traits::frame_source::{FrameSource, IterSource};
