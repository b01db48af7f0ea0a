//! # audio-engine-cpal
//!
//! Hardware backend for audio-engine-core on top of cpal.
//!
//! Provides:
//! - `CpalBackend`: implements `OutputBackend` and `InputBackend`
//! - blocking output (pull model) fed through a bounded channel
//! - callback output (push model) driving the engine's render callback
//! - blocking input reassembling device buffers into fixed-size reads
//!
//! Every cpal stream lives on its own thread, so the handles given to the
//! engine are `Send`. The engine side is 16-bit PCM only; devices are
//! driven with `i16`, `f32` or `u16` samples, whichever they offer.
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use audio_engine_core::{FilePlaybackController, PlaybackConfig};
//! use audio_engine_cpal::CpalBackend;
//!
//! let player = FilePlaybackController::new(Arc::new(CpalBackend::new()), PlaybackConfig::default());
//! player.play_file("narration.wav")?;
//! ```

pub mod backend;
pub mod error;
pub mod input;
pub mod output;
mod stream_thread;

pub use backend::CpalBackend;
pub use error::CpalError;
pub use input::CpalInput;
pub use output::{CpalBlockingOutput, CpalCallbackStream};
