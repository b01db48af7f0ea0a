//! In-process audio backend.
//!
//! Behaves like a device without touching hardware: writes and reads take
//! as long as the audio they carry (or a fixed latency), callback streams are
//! driven from their own thread at block cadence, and everything delivered
//! is recorded for inspection. Failures can be injected after a number of
//! blocks to exercise error paths.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::audio_frame::{AudioFormat, AudioFrame};
use crate::models::error::EngineError;
use crate::traits::device::{
    BlockingInput, BlockingOutput, CallbackStream, InputBackend, OutputBackend, RenderCallback,
};

/// How long each simulated device operation takes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacing {
    /// As long as the audio in the block.
    RealTime,
    /// A fixed delay per block.
    Fixed(Duration),
    /// Return immediately.
    Unpaced,
}

impl Pacing {
    fn delay_for(&self, frames: usize, format: AudioFormat) -> Duration {
        match self {
            Pacing::RealTime => Duration::from_secs_f64(format.frames_to_secs(frames as u64)),
            Pacing::Fixed(delay) => *delay,
            Pacing::Unpaced => Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemoryOptions {
    pub pacing: Pacing,
    /// Fail every write after this many successful ones.
    pub fail_after_writes: Option<usize>,
    /// Fail every read after this many successful ones.
    pub fail_after_reads: Option<usize>,
    /// Refuse to open any device.
    pub unavailable: bool,
    /// Sample value captured input is filled with (16-bit formats only; wider formats read silence).
    pub input_sample: i16,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            pacing: Pacing::RealTime,
            fail_after_writes: None,
            fail_after_reads: None,
            unavailable: false,
            input_sample: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Recorded {
    written_frames: u64,
    written_blocks: usize,
    written_bytes: Vec<u8>,
    rendered_bytes: Vec<u8>,
    render_calls: usize,
    read_frames: u64,
}

struct Shared {
    options: MemoryOptions,
    recorded: Mutex<Recorded>,
    open_devices: AtomicUsize,
}

/// In-memory output and input device.
#[derive(Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    pub fn new(options: MemoryOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                options,
                recorded: Mutex::new(Recorded::default()),
                open_devices: AtomicUsize::new(0),
            }),
        }
    }

    /// Real-time paced backend.
    pub fn realtime() -> Self {
        Self::new(MemoryOptions::default())
    }

    /// Backend whose operations each take `delay`.
    pub fn with_latency(delay: Duration) -> Self {
        Self::new(MemoryOptions {
            pacing: Pacing::Fixed(delay),
            ..Default::default()
        })
    }

    /// Frames accepted by blocking writes.
    pub fn written_frames(&self) -> u64 {
        self.shared.recorded.lock().written_frames
    }

    pub fn written_blocks(&self) -> usize {
        self.shared.recorded.lock().written_blocks
    }

    /// Every byte accepted by blocking writes, in order.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.shared.recorded.lock().written_bytes.clone()
    }

    /// Meaningful bytes produced by render callbacks, in order.
    pub fn rendered_bytes(&self) -> Vec<u8> {
        self.shared.recorded.lock().rendered_bytes.clone()
    }

    pub fn render_calls(&self) -> usize {
        self.shared.recorded.lock().render_calls
    }

    pub fn read_frames(&self) -> u64 {
        self.shared.recorded.lock().read_frames
    }

    /// Devices opened and not yet closed or dropped.
    pub fn open_devices(&self) -> usize {
        self.shared.open_devices.load(Ordering::SeqCst)
    }

    fn open_guard(&self, format: AudioFormat) -> Result<DeviceGuard, EngineError> {
        if self.shared.options.unavailable {
            return Err(EngineError::DeviceNotAvailable);
        }
        format.validate()?;
        self.shared.open_devices.fetch_add(1, Ordering::SeqCst);
        Ok(DeviceGuard {
            shared: Arc::clone(&self.shared),
        })
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::realtime()
    }
}

/// Counts a device as open for as long as it lives.
struct DeviceGuard {
    shared: Arc<Shared>,
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        self.shared.open_devices.fetch_sub(1, Ordering::SeqCst);
    }
}

impl OutputBackend for MemoryBackend {
    fn open_blocking(&self, format: AudioFormat) -> Result<Box<dyn BlockingOutput>, EngineError> {
        let guard = self.open_guard(format)?;
        log::debug!("Memory output opened: {:?}", format);
        Ok(Box::new(MemoryOutput {
            format,
            guard: Some(guard),
            writes: 0,
        }))
    }

    fn open_callback(
        &self,
        format: AudioFormat,
        block_frames: usize,
        mut callback: RenderCallback,
    ) -> Result<Box<dyn CallbackStream>, EngineError> {
        let guard = self.open_guard(format)?;
        if block_frames == 0 {
            return Err(EngineError::ConfigurationFailed("block size must be positive".into()));
        }

        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let shared = Arc::clone(&self.shared);
        let delay = shared.options.pacing.delay_for(block_frames, format);

        let handle = thread::Builder::new()
            .name("memory-render".into())
            .spawn(move || {
                let mut buffer = vec![0u8; block_frames * format.bytes_per_frame()];
                while thread_running.load(Ordering::SeqCst) {
                    let rendered = callback(&mut buffer);
                    {
                        let mut recorded = shared.recorded.lock();
                        recorded.render_calls += 1;
                        recorded
                            .rendered_bytes
                            .extend_from_slice(&buffer[..rendered.bytes]);
                    }
                    if rendered.finished {
                        break;
                    }
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                }
            })
            .map_err(|e| EngineError::Unknown(format!("failed to spawn render thread: {}", e)))?;

        Ok(Box::new(MemoryCallbackStream {
            running,
            handle: Some(handle),
            guard: Some(guard),
        }))
    }
}

impl InputBackend for MemoryBackend {
    fn open_input(&self, format: AudioFormat) -> Result<Box<dyn BlockingInput>, EngineError> {
        let guard = self.open_guard(format)?;
        Ok(Box::new(MemoryInput {
            format,
            guard: Some(guard),
            reads: 0,
        }))
    }
}

struct MemoryOutput {
    format: AudioFormat,
    guard: Option<DeviceGuard>,
    writes: usize,
}

impl BlockingOutput for MemoryOutput {
    fn write(&mut self, frame: &AudioFrame) -> Result<(), EngineError> {
        let guard = self
            .guard
            .as_ref()
            .ok_or_else(|| EngineError::Device("device is closed".into()))?;
        let options = &guard.shared.options;
        if options.fail_after_writes.is_some_and(|limit| self.writes >= limit) {
            return Err(EngineError::Device("simulated write failure".into()));
        }
        if frame.format() != self.format {
            return Err(EngineError::UnsupportedFormat(format!(
                "device opened for {:?}, got {:?}",
                self.format,
                frame.format()
            )));
        }

        let delay = options.pacing.delay_for(frame.frame_count(), self.format);
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let mut recorded = guard.shared.recorded.lock();
        recorded.written_frames += frame.frame_count() as u64;
        recorded.written_blocks += 1;
        recorded.written_bytes.extend_from_slice(frame.data());
        self.writes += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        self.guard.take();
        Ok(())
    }
}

struct MemoryCallbackStream {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    guard: Option<DeviceGuard>,
}

impl CallbackStream for MemoryCallbackStream {
    fn close(&mut self) -> Result<(), EngineError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| EngineError::Device("render thread panicked".into()))?;
        }
        self.guard.take();
        Ok(())
    }
}

impl Drop for MemoryCallbackStream {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

struct MemoryInput {
    format: AudioFormat,
    guard: Option<DeviceGuard>,
    reads: usize,
}

impl BlockingInput for MemoryInput {
    fn read(&mut self, frames: usize) -> Result<AudioFrame, EngineError> {
        let guard = self
            .guard
            .as_ref()
            .ok_or_else(|| EngineError::Device("device is closed".into()))?;
        let options = &guard.shared.options;
        if options.fail_after_reads.is_some_and(|limit| self.reads >= limit) {
            return Err(EngineError::Device("simulated read failure".into()));
        }

        let delay = options.pacing.delay_for(frames, self.format);
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let frame = if self.format.sample_width == 2 && options.input_sample != 0 {
            let sample = options.input_sample.to_le_bytes();
            let data: Vec<u8> = sample
                .iter()
                .copied()
                .cycle()
                .take(frames * self.format.bytes_per_frame())
                .collect();
            AudioFrame::new(data, self.format)?
        } else {
            AudioFrame::silence(frames, self.format)
        };

        guard.shared.recorded.lock().read_frames += frames as u64;
        self.reads += 1;
        Ok(frame)
    }

    fn close(&mut self) -> Result<(), EngineError> {
        self.guard.take();
        Ok(())
    }
}
