use crate::models::audio_frame::{AudioFormat, AudioFrame};
use crate::models::error::EngineError;

/// Outcome of one device callback invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rendered {
    /// Bytes at the start of the output buffer that carry audio or tail silence.
    /// Anything after this is padding.
    pub bytes: usize,

    /// The stream has nothing more to emit; the device may stop calling.
    pub finished: bool,
}

/// Device callback for push-model output.
///
/// Called on the backend's real-time thread with a byte buffer of
/// `block_frames * bytes_per_frame` bytes to fill. Must not block beyond a
/// bounded wait.
pub type RenderCallback = Box<dyn FnMut(&mut [u8]) -> Rendered + Send + 'static>;

/// An open output device driven by synchronous writes (pull model).
///
/// A device may buffer a little audio ahead of playback, so what was accepted
/// before a pause can still sound briefly after it. Implementations keep that
/// to a couple of blocks.
pub trait BlockingOutput {
    /// Write one block, returning once the device has accepted it.
    ///
    /// Must fail rather than block indefinitely if the device stops consuming.
    fn write(&mut self, frame: &AudioFrame) -> Result<(), EngineError>;

    /// Drain and release the device.
    fn close(&mut self) -> Result<(), EngineError>;
}

/// An open output device that pulls audio through a [`RenderCallback`].
pub trait CallbackStream: Send {
    /// Stop invoking the callback and release the device.
    ///
    /// Once this returns the callback (and everything it owns) has been dropped.
    fn close(&mut self) -> Result<(), EngineError>;
}

/// An open input device read synchronously.
pub trait BlockingInput {
    /// Read exactly `frames` frames, blocking until they are available.
    fn read(&mut self, frames: usize) -> Result<AudioFrame, EngineError>;

    /// Release the device.
    fn close(&mut self) -> Result<(), EngineError>;
}

/// Platform audio output.
///
/// Implemented by:
/// - `MemoryBackend` (in-process, real-time paced, for tests and headless runs)
/// - `CpalBackend` (audio-engine-cpal)
pub trait OutputBackend: Send + Sync {
    /// Open a device accepting synchronous block writes in `format`.
    fn open_blocking(&self, format: AudioFormat) -> Result<Box<dyn BlockingOutput>, EngineError>;

    /// Open a device that invokes `callback` every `block_frames` frames.
    fn open_callback(
        &self,
        format: AudioFormat,
        block_frames: usize,
        callback: RenderCallback,
    ) -> Result<Box<dyn CallbackStream>, EngineError>;
}

/// Platform audio input.
pub trait InputBackend: Send + Sync {
    /// Open a capture device delivering `format`.
    fn open_input(&self, format: AudioFormat) -> Result<Box<dyn BlockingInput>, EngineError>;
}
