//! Push-model playback of audio produced incrementally.
//!
//! ```text
//! [FrameSource] → producer thread → [relay queue] → device callback → [StreamRenderer] → device
//!                                         ↑
//!                              prebuffer (before the device opens)
//! ```
//! The producer blocks when the relay queue is full. The renderer waits on
//! the queue for a bounded time, then plays out a short tail of silence and
//! signals completion once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use parking_lot::Mutex;

use crate::models::audio_frame::AudioFormat;
use crate::models::config::StreamingConfig;
use crate::models::error::EngineError;
use crate::processing::byte_accumulator::ByteAccumulator;
use crate::processing::relay_queue::{relay_queue, PushError, RelayItem, RelayPop, RelaySender};
use crate::processing::stream_renderer::{StreamEnd, StreamRenderer, StreamSummary};
use crate::traits::device::{CallbackStream, OutputBackend, RenderCallback};
use crate::traits::frame_source::FrameSource;

/// How often a waiter re-checks for cancellation.
const WAIT_POLL: Duration = Duration::from_millis(100);

/// Outcome of [`StreamingPlaybackPipeline::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStart {
    /// The device is open and playing.
    Started,
    /// The source ended before producing any audio; no device was opened.
    NothingToPlay,
    /// `stop()` was called before playback began; no device was opened.
    Cancelled,
}

struct ActiveStream {
    cancel: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    producer: Option<JoinHandle<Result<(), EngineError>>>,
    device: Option<Box<dyn CallbackStream>>,
    completion: Receiver<StreamSummary>,
}

impl ActiveStream {
    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Cancel the producer, release the device, and collect the producer's result.
    fn close(&mut self, join_producer: bool) -> Result<(), EngineError> {
        self.cancel.store(true, Ordering::SeqCst);

        if let Some(mut device) = self.device.take() {
            if let Err(e) = device.close() {
                log::warn!("Failed to close output stream: {}", e);
            }
        }

        let Some(producer) = self.producer.take() else {
            return Ok(());
        };
        if !join_producer {
            log::warn!("Leaving stalled audio producer to finish on its own");
            return Ok(());
        }
        producer
            .join()
            .unwrap_or_else(|_| Err(EngineError::Unknown("audio producer panicked".into())))
    }
}

/// Plays a stream of frames as they are produced (e.g. speech synthesis).
pub struct StreamingPlaybackPipeline {
    backend: Arc<dyn OutputBackend>,
    config: StreamingConfig,
    start_lock: Mutex<()>,
    // Cancel flag of a `start()` that is still prebuffering.
    pending: Mutex<Option<Arc<AtomicBool>>>,
    active: Mutex<Option<ActiveStream>>,
}

/// Clears the pending-start slot when `start()` returns.
struct PendingStart<'a>(&'a Mutex<Option<Arc<AtomicBool>>>);

impl Drop for PendingStart<'_> {
    fn drop(&mut self) {
        self.0.lock().take();
    }
}

impl StreamingPlaybackPipeline {
    pub fn new(backend: Arc<dyn OutputBackend>, config: StreamingConfig) -> Self {
        Self {
            backend,
            config,
            start_lock: Mutex::new(()),
            pending: Mutex::new(None),
            active: Mutex::new(None),
        }
    }

    /// Start producing from `source` and open the device once the prebuffer is filled.
    ///
    /// Waits up to `first_frame_timeout` for the first frame; `stop()` from
    /// another thread interrupts the wait. A source that fails before
    /// yielding any audio is reported here as the error.
    pub fn start(&self, source: Box<dyn FrameSource>) -> Result<StreamStart, EngineError> {
        let _start = self.start_lock.lock();
        self.config
            .validate()
            .map_err(EngineError::ConfigurationFailed)?;
        self.reap_finished()?;

        let cancel = Arc::new(AtomicBool::new(false));
        let (relay_tx, relay_rx) = relay_queue(self.config.queue_capacity);

        *self.pending.lock() = Some(Arc::clone(&cancel));
        let pending = PendingStart(&self.pending);

        let producer_cancel = Arc::clone(&cancel);
        let producer = thread::Builder::new()
            .name("stream-producer".into())
            .spawn(move || Self::run_producer(source, relay_tx, &producer_cancel))
            .map_err(|e| EngineError::Unknown(format!("failed to spawn producer thread: {}", e)))?;

        // --- Prebuffer ---
        let mut prebuffered: Option<(AudioFormat, ByteAccumulator)> = None;
        let mut end: Option<StreamEnd> = None;
        let mut pulled = 0;
        let waiting_since = Instant::now();
        while end.is_none() && (pulled < self.config.prebuffer_frames || prebuffered.is_none()) {
            let wait = if prebuffered.is_some() {
                self.config.relay_timeout
            } else {
                WAIT_POLL.min(self.config.first_frame_timeout)
            };
            match relay_rx.pop(wait) {
                RelayPop::Item(RelayItem::Frame(frame)) => {
                    let (_, accumulator) = prebuffered.get_or_insert_with(|| {
                        let block_bytes = self.config.block_frames * frame.format().bytes_per_frame();
                        let capacity = block_bytes.max(frame.len_bytes()) * 4;
                        (frame.format(), ByteAccumulator::with_capacity(capacity))
                    });
                    accumulator.push(frame.data());
                    pulled += 1;
                }
                RelayPop::Item(RelayItem::EndOfStream) => end = Some(StreamEnd::Completed),
                RelayPop::Item(RelayItem::Failed(e)) => end = Some(StreamEnd::Failed(e)),
                RelayPop::TimedOut if prebuffered.is_some() => {
                    log::warn!("Prebuffer incomplete after {:?}, starting anyway", self.config.relay_timeout);
                    break;
                }
                RelayPop::TimedOut => {
                    if cancel.load(Ordering::SeqCst) {
                        end = Some(StreamEnd::Cancelled);
                    } else if waiting_since.elapsed() >= self.config.first_frame_timeout {
                        end = Some(StreamEnd::Starved);
                    }
                }
                RelayPop::Disconnected => end = Some(StreamEnd::Completed),
            }
        }

        if cancel.load(Ordering::SeqCst) {
            // Stopped while prebuffering. The producer may be blocked in its
            // source, so it is left to notice the flag on its own.
            log::info!("Streaming stopped before playback started");
            return Ok(StreamStart::Cancelled);
        }

        let Some((format, accumulator)) = prebuffered else {
            cancel.store(true, Ordering::SeqCst);
            return match end {
                Some(StreamEnd::Starved) => {
                    log::warn!(
                        "Audio source produced nothing within {:?}",
                        self.config.first_frame_timeout
                    );
                    Err(EngineError::Timeout)
                }
                _ => {
                    producer
                        .join()
                        .unwrap_or_else(|_| Err(EngineError::Unknown("audio producer panicked".into())))?;
                    log::debug!("Audio source was empty, nothing to play");
                    Ok(StreamStart::NothingToPlay)
                }
            };
        };

        // --- Open the device ---
        let (completion_tx, completion_rx) = bounded(1);
        let mut renderer = StreamRenderer::new(
            relay_rx,
            accumulator,
            end,
            format,
            self.config.tail_silence,
            self.config.relay_timeout,
            completion_tx,
        );
        let cancel_requested = Arc::clone(&cancel);
        let finished = Arc::new(AtomicBool::new(false));
        let callback_finished = Arc::clone(&finished);
        let callback: RenderCallback = Box::new(move |out: &mut [u8]| {
            let rendered = renderer.render(out);
            if rendered.finished {
                callback_finished.store(true, Ordering::SeqCst);
            }
            rendered
        });

        let mut stream = ActiveStream {
            cancel,
            finished,
            producer: Some(producer),
            device: None,
            completion: completion_rx,
        };
        match self
            .backend
            .open_callback(format, self.config.block_frames, callback)
        {
            Ok(device) => stream.device = Some(device),
            Err(e) => {
                log::error!("Failed to open output stream: {}", e);
                if let Err(producer_error) = stream.close(true) {
                    log::debug!("Producer ended with: {}", producer_error);
                }
                return Err(e);
            }
        }

        log::info!(
            "Streaming started: {} Hz, {} ch, {} frames prebuffered",
            format.sample_rate,
            format.channels,
            pulled
        );
        *self.active.lock() = Some(stream);
        drop(pending);
        if cancel_requested.load(Ordering::SeqCst) {
            self.stop();
            return Ok(StreamStart::Cancelled);
        }
        Ok(StreamStart::Started)
    }

    /// Block until the current stream has played out (including its tail),
    /// then release the device.
    ///
    /// Returns immediately with an empty summary when nothing is streaming.
    pub fn wait_until_finished(&self) -> Result<StreamSummary, EngineError> {
        let (completion, cancel) = {
            let active = self.active.lock();
            let Some(stream) = active.as_ref() else {
                log::debug!("No stream to wait for");
                return Ok(Self::empty_summary());
            };
            (stream.completion.clone(), Arc::clone(&stream.cancel))
        };

        let summary = loop {
            match completion.recv_timeout(WAIT_POLL) {
                Ok(summary) => break summary,
                Err(RecvTimeoutError::Timeout) if !cancel.load(Ordering::SeqCst) => continue,
                // Stopped, or the device dropped the renderer without finishing.
                Err(_) => break Self::cancelled_summary(),
            }
        };

        let stream = {
            let mut active = self.active.lock();
            match active.as_ref() {
                Some(stream) if Arc::ptr_eq(&stream.cancel, &cancel) => active.take(),
                _ => None,
            }
        };
        if let Some(mut stream) = stream {
            let join_producer = summary.end != StreamEnd::Starved;
            stream.close(join_producer)?;
        }

        log::info!(
            "Streaming finished: {} audio bytes, {} silence bytes, {:?}",
            summary.audio_bytes,
            summary.silence_bytes,
            summary.end
        );
        Ok(summary)
    }

    /// `start` followed by `wait_until_finished`.
    pub fn play_blocking(&self, source: Box<dyn FrameSource>) -> Result<StreamSummary, EngineError> {
        match self.start(source)? {
            StreamStart::Started => self.wait_until_finished(),
            StreamStart::NothingToPlay => Ok(Self::empty_summary()),
            StreamStart::Cancelled => Ok(Self::cancelled_summary()),
        }
    }

    /// Cancel the producer, close the device, and join the producer. Safe when idle.
    ///
    /// Also interrupts a `start()` still waiting for its first frames.
    pub fn stop(&self) {
        if let Some(cancel) = self.pending.lock().as_ref() {
            cancel.store(true, Ordering::SeqCst);
        }
        let Some(mut stream) = self.active.lock().take() else {
            log::debug!("No stream to stop");
            return;
        };
        if let Err(e) = stream.close(true) {
            log::error!("Audio producer failed: {}", e);
        }
        log::info!("Streaming stopped");
    }

    /// Whether a stream is open and has not finished playing.
    pub fn is_active(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|stream| !stream.is_finished())
    }

    // --- Internal helpers ---

    /// Release a previous stream that finished but was never waited on.
    fn reap_finished(&self) -> Result<(), EngineError> {
        let mut active = self.active.lock();
        match active.as_ref() {
            Some(stream) if !stream.is_finished() => {
                log::warn!("Stream already playing, ignoring start()");
                Err(EngineError::AlreadyPlaying)
            }
            Some(_) => {
                if let Some(mut stream) = active.take() {
                    if let Err(e) = stream.close(true) {
                        log::warn!("Previous stream ended with: {}", e);
                    }
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn run_producer(
        mut source: Box<dyn FrameSource>,
        relay: RelaySender,
        cancel: &AtomicBool,
    ) -> Result<(), EngineError> {
        let mut format = source.format();
        let mut frames = 0u64;

        loop {
            let next = source.next_frame().and_then(|frame| match (frame, format) {
                (Some(frame), Some(expected)) if frame.format() != expected => {
                    Err(EngineError::UnsupportedFormat(format!(
                        "source changed format mid-stream: {:?} -> {:?}",
                        expected,
                        frame.format()
                    )))
                }
                (frame, _) => Ok(frame),
            });

            match next {
                Ok(Some(frame)) => {
                    format.get_or_insert(frame.format());
                    if frame.is_empty() {
                        continue;
                    }
                    frames += frame.frame_count() as u64;
                    match relay.push_frame(frame, cancel) {
                        Ok(()) => {}
                        Err(PushError::Cancelled) => {
                            log::debug!("Audio producer cancelled after {} frames", frames);
                            return Ok(());
                        }
                        Err(PushError::Disconnected) => {
                            log::debug!("Audio consumer gone after {} frames", frames);
                            return Ok(());
                        }
                    }
                }
                Ok(None) => {
                    log::debug!("Audio source exhausted after {} frames", frames);
                    let _ = relay.finish(RelayItem::EndOfStream, cancel);
                    return Ok(());
                }
                Err(e) => {
                    log::error!("Audio source failed after {} frames: {}", frames, e);
                    let _ = relay.finish(RelayItem::Failed(e.clone()), cancel);
                    return Err(e);
                }
            }
        }
    }

    fn empty_summary() -> StreamSummary {
        StreamSummary {
            audio_bytes: 0,
            silence_bytes: 0,
            end: StreamEnd::Completed,
        }
    }

    fn cancelled_summary() -> StreamSummary {
        StreamSummary {
            audio_bytes: 0,
            silence_bytes: 0,
            end: StreamEnd::Cancelled,
        }
    }
}

impl Drop for StreamingPlaybackPipeline {
    fn drop(&mut self) {
        if let Some(mut stream) = self.active.get_mut().take() {
            let _ = stream.close(true);
        }
    }
}
