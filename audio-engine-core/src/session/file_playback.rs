use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::Mutex;

use super::control::WorkerControl;
use crate::models::audio_frame::AudioFormat;
use crate::models::config::PlaybackConfig;
use crate::models::error::EngineError;
use crate::models::state::PlaybackState;
use crate::storage::wav_source::WavFileSource;
use crate::traits::callbacks::{invoke_guarded, FinishedCallback, PlaybackProgressCallback};
use crate::traits::device::{BlockingOutput, OutputBackend};
use crate::traits::frame_source::FrameSource;

/// State shared between the controller and one playback worker.
struct PlaybackSession {
    state: Mutex<PlaybackState>,
    control: WorkerControl,
    worker_thread: OnceLock<ThreadId>,
    frames_delivered: AtomicU64,
    format: AudioFormat,
    total_secs: f64,
}

impl PlaybackSession {
    fn new(format: AudioFormat, total_frames: u64) -> Self {
        Self {
            state: Mutex::new(PlaybackState::Idle),
            control: WorkerControl::new(),
            worker_thread: OnceLock::new(),
            frames_delivered: AtomicU64::new(0),
            format,
            total_secs: format.frames_to_secs(total_frames),
        }
    }

    /// Apply `next` if it is a legal successor of the current state.
    fn transition(&self, next: PlaybackState) -> bool {
        let mut state = self.state.lock();
        if !state.can_transition_to(&next) {
            log::debug!("Ignoring playback transition {:?} -> {:?}", *state, next);
            return false;
        }
        *state = next;
        true
    }

    fn is_worker_thread(&self) -> bool {
        self.worker_thread.get() == Some(&thread::current().id())
    }

    fn elapsed_secs(&self) -> f64 {
        self.format
            .frames_to_secs(self.frames_delivered.load(Ordering::SeqCst))
    }
}

#[derive(Default)]
struct SessionSlot {
    session: Option<Arc<PlaybackSession>>,
    worker: Option<JoinHandle<()>>,
}

impl SessionSlot {
    fn worker_alive(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}

/// Pull-model playback of a finite source with known length.
///
/// A worker thread pulls one block at a time from the source and writes it
/// synchronously to a blocking output device:
/// ```text
/// [FrameSource] → next_frame() → [BlockingOutput::write] → progress(elapsed, total)
/// ```
/// Control calls may come from any thread, including from inside the
/// progress and finished callbacks. Only one session runs at a time.
pub struct FilePlaybackController {
    backend: Arc<dyn OutputBackend>,
    config: PlaybackConfig,
    progress_callback: Mutex<Option<PlaybackProgressCallback>>,
    finished_callback: Mutex<Option<FinishedCallback>>,
    // Serializes play/pause/resume/stop so teardown never races a new session.
    control_lock: Mutex<()>,
    slot: Mutex<SessionSlot>,
}

impl FilePlaybackController {
    pub fn new(backend: Arc<dyn OutputBackend>, config: PlaybackConfig) -> Self {
        Self {
            backend,
            config,
            progress_callback: Mutex::new(None),
            finished_callback: Mutex::new(None),
            control_lock: Mutex::new(()),
            slot: Mutex::new(SessionSlot::default()),
        }
    }

    /// Receive `(elapsed_secs, total_secs)` once at start and after every block.
    pub fn register_progress_callback<F>(&self, callback: F)
    where
        F: Fn(f64, f64) + Send + Sync + 'static,
    {
        *self.progress_callback.lock() = Some(Arc::new(callback));
    }

    /// Receive the final state when a session ends on its own (end of source or error).
    pub fn register_finished_callback<F>(&self, callback: F)
    where
        F: Fn(&PlaybackState) + Send + Sync + 'static,
    {
        *self.finished_callback.lock() = Some(Arc::new(callback));
    }

    /// Open a WAV file and play it.
    pub fn play_file(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let source = WavFileSource::open(path, self.config.block_frames)?;
        self.play(Box::new(source))
    }

    /// Start playing `source` on a new worker thread.
    ///
    /// Reports `(0.0, total)` to the progress callback before returning.
    pub fn play(&self, source: Box<dyn FrameSource>) -> Result<(), EngineError> {
        if self.worker_session().is_some() {
            log::warn!("play() called from the playback thread, ignoring");
            return Err(EngineError::AlreadyPlaying);
        }
        let _control = self.control_lock.lock();
        self.config
            .validate()
            .map_err(EngineError::ConfigurationFailed)?;

        let session = {
            let mut slot = self.slot.lock();
            if slot.worker_alive() {
                log::warn!("Playback already in progress, ignoring play()");
                return Err(EngineError::AlreadyPlaying);
            }
            if let Some(finished) = slot.worker.take() {
                let _ = finished.join();
            }

            let format = source.format().ok_or_else(|| {
                EngineError::ConfigurationFailed("source does not report its format".into())
            })?;
            format.validate()?;
            let total_frames = source.total_frames().ok_or_else(|| {
                EngineError::ConfigurationFailed("source does not report its length".into())
            })?;

            let session = Arc::new(PlaybackSession::new(format, total_frames));
            session.transition(PlaybackState::Playing);
            slot.session = Some(Arc::clone(&session));
            session
        };

        let progress = self.progress_callback.lock().clone();
        let finished = self.finished_callback.lock().clone();
        if let Some(ref callback) = progress {
            invoke_guarded("Progress", || callback(0.0, session.total_secs));
        }

        let backend = Arc::clone(&self.backend);
        let worker_session = Arc::clone(&session);
        let spawned = thread::Builder::new()
            .name("file-playback".into())
            .spawn(move || {
                Self::run_worker(backend.as_ref(), source, &worker_session, progress, finished)
            });

        match spawned {
            Ok(handle) => {
                log::info!(
                    "Playback started: {:.2}s at {} Hz, {} ch",
                    session.total_secs,
                    session.format.sample_rate,
                    session.format.channels
                );
                self.slot.lock().worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                let error = EngineError::Unknown(format!("failed to spawn playback thread: {}", e));
                session.transition(PlaybackState::Failed(error.clone()));
                Err(error)
            }
        }
    }

    /// Pause after the block in flight. Returns `true` once the worker has
    /// acknowledged; no progress is reported until `resume()`.
    pub fn pause(&self) -> bool {
        if let Some(session) = self.worker_session() {
            // The worker parks before pulling its next block.
            session.control.request_pause();
            session.transition(PlaybackState::Paused);
            return true;
        }
        let _control = self.control_lock.lock();
        let Some(session) = self.active_session() else {
            log::warn!("No playback to pause");
            return false;
        };

        session.control.request_pause();
        session.transition(PlaybackState::Paused);
        let acknowledged = session.control.wait_parked(self.config.pause_ack_timeout);
        if !acknowledged {
            log::warn!(
                "Playback worker did not acknowledge pause within {:?}",
                self.config.pause_ack_timeout
            );
        }
        acknowledged
    }

    pub fn resume(&self) {
        if let Some(session) = self.worker_session() {
            session.control.request_resume(&thread::current());
            session.transition(PlaybackState::Playing);
            return;
        }
        let _control = self.control_lock.lock();
        let slot = self.slot.lock();
        let (Some(session), Some(worker)) = (slot.session.as_ref(), slot.worker.as_ref()) else {
            log::warn!("No playback to resume");
            return;
        };
        if worker.is_finished() {
            log::warn!("No playback to resume");
            return;
        }

        session.control.request_resume(worker.thread());
        session.transition(PlaybackState::Playing);
    }

    /// Stop playback and join the worker. Safe to call in any state.
    pub fn stop(&self) {
        if let Some(session) = self.worker_session() {
            // Inside a callback: the worker exits once the callback returns.
            log::debug!("stop() called from the playback thread");
            session.control.request_stop(&thread::current());
            return;
        }
        let _control = self.control_lock.lock();
        self.shutdown(true);
    }

    pub fn is_playing(&self) -> bool {
        let slot = self.slot.lock();
        slot.worker_alive()
            && slot
                .session
                .as_ref()
                .is_some_and(|s| !s.control.is_pause_requested())
    }

    pub fn is_paused(&self) -> bool {
        let slot = self.slot.lock();
        slot.worker_alive()
            && slot
                .session
                .as_ref()
                .is_some_and(|s| s.control.is_pause_requested())
    }

    pub fn state(&self) -> PlaybackState {
        self.slot
            .lock()
            .session
            .as_ref()
            .map(|s| s.state.lock().clone())
            .unwrap_or(PlaybackState::Idle)
    }

    /// Frames written to the device in the current (or last) session.
    pub fn frames_delivered(&self) -> u64 {
        self.slot
            .lock()
            .session
            .as_ref()
            .map(|s| s.frames_delivered.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    // --- Internal helpers ---

    /// The current session, when the caller is its worker thread.
    fn worker_session(&self) -> Option<Arc<PlaybackSession>> {
        self.slot
            .lock()
            .session
            .as_ref()
            .filter(|s| s.is_worker_thread())
            .cloned()
    }

    fn active_session(&self) -> Option<Arc<PlaybackSession>> {
        let slot = self.slot.lock();
        if slot.worker_alive() {
            slot.session.clone()
        } else {
            None
        }
    }

    fn shutdown(&self, warn_when_idle: bool) {
        let (session, worker) = {
            let mut slot = self.slot.lock();
            (slot.session.clone(), slot.worker.take())
        };
        let (Some(session), Some(worker)) = (session, worker) else {
            if warn_when_idle {
                log::warn!("No playback to stop");
            }
            return;
        };
        if worker.is_finished() {
            let _ = worker.join();
            if warn_when_idle {
                log::warn!("No playback to stop");
            }
            return;
        }

        session.control.request_stop(worker.thread());

        if worker.thread().id() == thread::current().id() {
            // Called from a callback on the worker itself; it exits after returning.
            log::warn!("stop() called from the playback thread, not joining");
            self.slot.lock().worker = Some(worker);
            return;
        }

        if worker.join().is_err() {
            log::error!("Playback worker panicked");
            session.transition(PlaybackState::Failed(EngineError::Unknown(
                "playback worker panicked".into(),
            )));
        }
        session.transition(PlaybackState::Stopped);
        log::info!(
            "Playback stopped at {:.2}s of {:.2}s",
            session.elapsed_secs(),
            session.total_secs
        );
    }

    fn run_worker(
        backend: &dyn OutputBackend,
        mut source: Box<dyn FrameSource>,
        session: &PlaybackSession,
        progress: Option<PlaybackProgressCallback>,
        finished: Option<FinishedCallback>,
    ) {
        let _ = session.worker_thread.set(thread::current().id());
        let result = Self::playback_loop(backend, source.as_mut(), session, progress.as_ref());
        let stopped = session.control.should_stop();

        let final_state = match result {
            Ok(()) => PlaybackState::Stopped,
            Err(e) => {
                log::error!("Playback failed: {}", e);
                PlaybackState::Failed(e)
            }
        };
        session.transition(final_state.clone());
        session.control.mark_exited();

        if stopped {
            log::debug!("Playback worker exiting after stop request");
            return;
        }
        log::info!("Playback finished: {:?}", final_state);
        if let Some(callback) = finished {
            invoke_guarded("Finished", || callback(&final_state));
        }
    }

    fn playback_loop(
        backend: &dyn OutputBackend,
        source: &mut dyn FrameSource,
        session: &PlaybackSession,
        progress: Option<&PlaybackProgressCallback>,
    ) -> Result<(), EngineError> {
        let mut output = backend.open_blocking(session.format)?;
        let result = Self::write_blocks(output.as_mut(), source, session, progress);
        let closed = output.close();
        if let Err(ref e) = closed {
            log::warn!("Failed to close output device: {}", e);
        }
        result.and(closed)
    }

    fn write_blocks(
        output: &mut dyn BlockingOutput,
        source: &mut dyn FrameSource,
        session: &PlaybackSession,
        progress: Option<&PlaybackProgressCallback>,
    ) -> Result<(), EngineError> {
        let control = &session.control;
        loop {
            if control.should_stop() {
                return Ok(());
            }
            control.park_while_paused();
            if control.should_stop() {
                return Ok(());
            }

            let Some(frame) = source.next_frame()? else {
                return Ok(());
            };
            if frame.format() != session.format {
                return Err(EngineError::UnsupportedFormat(format!(
                    "source changed format mid-stream: {:?} -> {:?}",
                    session.format,
                    frame.format()
                )));
            }

            output.write(&frame)?;
            session
                .frames_delivered
                .fetch_add(frame.frame_count() as u64, Ordering::SeqCst);

            if !control.should_stop() {
                if let Some(callback) = progress {
                    let elapsed = session.elapsed_secs();
                    invoke_guarded("Progress", || callback(elapsed, session.total_secs));
                }
            }
        }
    }
}

impl Drop for FilePlaybackController {
    fn drop(&mut self) {
        self.shutdown(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use approx::assert_relative_eq;
    use hound::{SampleFormat, WavSpec, WavWriter};

    use crate::backend::memory::{MemoryBackend, MemoryOptions, Pacing};
    use crate::models::audio_frame::AudioFrame;
    use crate::traits::frame_source::IterSource;

    fn format() -> AudioFormat {
        AudioFormat::pcm16(8000, 1)
    }

    fn blocks(count: usize, frames: usize) -> Box<dyn FrameSource> {
        let frames = (0..count)
            .map(|_| AudioFrame::silence(frames, format()))
            .collect();
        Box::new(IterSource::from_frames(frames))
    }

    fn unpaced() -> MemoryBackend {
        MemoryBackend::new(MemoryOptions {
            pacing: Pacing::Unpaced,
            ..Default::default()
        })
    }

    fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    type ProgressLog = Arc<Mutex<Vec<(f64, f64)>>>;

    fn record_progress(controller: &FilePlaybackController) -> ProgressLog {
        let log: ProgressLog = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        controller.register_progress_callback(move |elapsed, total| sink.lock().push((elapsed, total)));
        log
    }

    #[test]
    fn short_file_reports_progress_up_to_total() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silence.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..11025 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let backend = unpaced();
        let controller = FilePlaybackController::new(
            Arc::new(backend.clone()),
            PlaybackConfig {
                block_frames: 512,
                ..Default::default()
            },
        );
        let progress = record_progress(&controller);

        controller.play_file(&path).unwrap();
        assert!(wait_for(Duration::from_secs(2), || !controller.is_playing()));

        let progress = progress.lock();
        assert_eq!(progress.len(), 1 + 22);
        assert_eq!(progress[0], (0.0, 0.25));
        assert!(progress.iter().all(|&(_, total)| total == 0.25));
        let (current, total) = progress[progress.len() - 1];
        assert_relative_eq!(current, total);
        assert!(progress.windows(2).all(|w| w[0].0 <= w[1].0));

        assert_eq!(backend.written_frames(), 11025);
        assert_eq!(controller.frames_delivered(), 11025);
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert_eq!(backend.open_devices(), 0);
    }

    #[test]
    fn no_progress_while_paused() {
        let controller = FilePlaybackController::new(
            Arc::new(MemoryBackend::with_latency(Duration::from_millis(5))),
            PlaybackConfig::default(),
        );
        let progress = record_progress(&controller);

        controller.play(blocks(400, 64)).unwrap();
        thread::sleep(Duration::from_millis(30));

        assert!(controller.pause());
        assert!(controller.is_paused());
        assert!(!controller.is_playing());
        assert_eq!(controller.state(), PlaybackState::Paused);

        let seen = progress.lock().len();
        thread::sleep(Duration::from_millis(60));
        assert_eq!(progress.lock().len(), seen);

        controller.resume();
        assert!(controller.is_playing());
        assert!(wait_for(Duration::from_secs(1), || progress.lock().len() > seen));

        controller.stop();
    }

    #[test]
    fn stop_from_any_state_releases_everything() {
        let backend = MemoryBackend::with_latency(Duration::from_millis(5));
        let controller =
            FilePlaybackController::new(Arc::new(backend.clone()), PlaybackConfig::default());

        // Idle.
        controller.stop();
        assert_eq!(controller.state(), PlaybackState::Idle);

        // Playing.
        controller.play(blocks(400, 64)).unwrap();
        thread::sleep(Duration::from_millis(20));
        controller.stop();
        assert!(!controller.is_playing());
        assert!(!controller.is_paused());
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert_eq!(backend.open_devices(), 0);

        // Paused.
        controller.play(blocks(400, 64)).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(controller.pause());
        controller.stop();
        assert!(!controller.is_playing());
        assert!(!controller.is_paused());
        assert_eq!(backend.open_devices(), 0);

        // Twice.
        controller.stop();
        assert_eq!(controller.state(), PlaybackState::Stopped);
    }

    #[test]
    fn no_progress_after_stop_returns() {
        let controller = FilePlaybackController::new(
            Arc::new(MemoryBackend::with_latency(Duration::from_millis(2))),
            PlaybackConfig::default(),
        );
        let progress = record_progress(&controller);

        controller.play(blocks(1000, 16)).unwrap();
        thread::sleep(Duration::from_millis(20));
        controller.stop();

        let seen = progress.lock().len();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(progress.lock().len(), seen);
    }

    #[test]
    fn second_play_is_rejected_while_active() {
        let controller = FilePlaybackController::new(
            Arc::new(MemoryBackend::with_latency(Duration::from_millis(5))),
            PlaybackConfig::default(),
        );

        controller.play(blocks(200, 64)).unwrap();
        assert_eq!(controller.play(blocks(1, 64)), Err(EngineError::AlreadyPlaying));

        controller.stop();
        controller.play(blocks(1, 64)).unwrap();
        assert!(wait_for(Duration::from_secs(1), || !controller.is_playing()));
    }

    #[test]
    fn concurrent_play_has_one_winner() {
        let controller = Arc::new(FilePlaybackController::new(
            Arc::new(MemoryBackend::with_latency(Duration::from_millis(5))),
            PlaybackConfig::default(),
        ));

        let callers: Vec<_> = (0..4)
            .map(|_| {
                let controller = Arc::clone(&controller);
                thread::spawn(move || controller.play(blocks(200, 64)))
            })
            .collect();
        let results: Vec<_> = callers.into_iter().map(|c| c.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| *r == Err(EngineError::AlreadyPlaying)));
        controller.stop();
    }

    #[test]
    fn finished_callback_fires_on_natural_end_only() {
        let controller = FilePlaybackController::new(Arc::new(unpaced()), PlaybackConfig::default());
        let finished: Arc<Mutex<Vec<PlaybackState>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&finished);
        controller.register_finished_callback(move |state| sink.lock().push(state.clone()));

        controller.play(blocks(3, 64)).unwrap();
        assert!(wait_for(Duration::from_secs(1), || finished.lock().len() == 1));
        assert_eq!(finished.lock()[0], PlaybackState::Stopped);

        let slow = FilePlaybackController::new(
            Arc::new(MemoryBackend::with_latency(Duration::from_millis(5))),
            PlaybackConfig::default(),
        );
        let stopped = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&stopped);
        slow.register_finished_callback(move |_| *counter.lock() += 1);
        slow.play(blocks(200, 64)).unwrap();
        thread::sleep(Duration::from_millis(15));
        slow.stop();
        assert_eq!(*stopped.lock(), 0);
    }

    #[test]
    fn device_error_fails_the_session() {
        let backend = MemoryBackend::new(MemoryOptions {
            pacing: Pacing::Unpaced,
            fail_after_writes: Some(2),
            ..Default::default()
        });
        let controller = FilePlaybackController::new(Arc::new(backend.clone()), PlaybackConfig::default());
        let finished: Arc<Mutex<Option<PlaybackState>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&finished);
        controller.register_finished_callback(move |state| *sink.lock() = Some(state.clone()));

        controller.play(blocks(10, 64)).unwrap();
        assert!(wait_for(Duration::from_secs(1), || finished.lock().is_some()));

        assert!(matches!(controller.state(), PlaybackState::Failed(EngineError::Device(_))));
        assert!(matches!(*finished.lock(), Some(PlaybackState::Failed(_))));
        assert_eq!(controller.frames_delivered(), 128);
        assert_eq!(backend.open_devices(), 0);
    }

    #[test]
    fn unavailable_device_fails_the_session() {
        let backend = MemoryBackend::new(MemoryOptions {
            unavailable: true,
            ..Default::default()
        });
        let controller = FilePlaybackController::new(Arc::new(backend), PlaybackConfig::default());

        controller.play(blocks(1, 64)).unwrap();
        assert!(wait_for(Duration::from_secs(1), || controller.state().is_terminal()));
        assert_eq!(
            controller.state(),
            PlaybackState::Failed(EngineError::DeviceNotAvailable)
        );
    }

    #[test]
    fn source_without_length_is_rejected() {
        let controller = FilePlaybackController::new(Arc::new(unpaced()), PlaybackConfig::default());
        let frames: Vec<Result<AudioFrame, EngineError>> = vec![Ok(AudioFrame::silence(4, format()))];
        let source = IterSource::new(frames.into_iter()).with_format(format());

        assert!(matches!(
            controller.play(Box::new(source)),
            Err(EngineError::ConfigurationFailed(_))
        ));
        assert_eq!(controller.state(), PlaybackState::Idle);
    }

    #[test]
    fn missing_file_is_reported_to_caller() {
        let dir = tempfile::tempdir().unwrap();
        let controller = FilePlaybackController::new(Arc::new(unpaced()), PlaybackConfig::default());
        assert!(matches!(
            controller.play_file(dir.path().join("nope.wav")),
            Err(EngineError::Source(_))
        ));
    }

    #[test]
    fn panicking_progress_callback_does_not_stop_playback() {
        let backend = unpaced();
        let controller = FilePlaybackController::new(Arc::new(backend.clone()), PlaybackConfig::default());
        controller.register_progress_callback(|elapsed, _| {
            if elapsed > 0.0 {
                panic!("progress bar went away");
            }
        });

        controller.play(blocks(5, 64)).unwrap();
        assert!(wait_for(Duration::from_secs(1), || !controller.is_playing()));
        assert_eq!(backend.written_frames(), 320);
        assert_eq!(controller.state(), PlaybackState::Stopped);
    }

    #[test]
    fn stop_from_progress_callback_during_stop_does_not_deadlock() {
        let controller = Arc::new(FilePlaybackController::new(
            Arc::new(MemoryBackend::with_latency(Duration::from_millis(5))),
            PlaybackConfig::default(),
        ));
        let weak = Arc::downgrade(&controller);
        controller.register_progress_callback(move |elapsed, _| {
            if elapsed > 0.0 {
                thread::sleep(Duration::from_millis(100));
                if let Some(controller) = weak.upgrade() {
                    controller.stop();
                }
            }
        });

        controller.play(blocks(400, 64)).unwrap();
        thread::sleep(Duration::from_millis(30));

        let stopper = Arc::clone(&controller);
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            stopper.stop();
            let _ = done_tx.send(());
        });

        assert!(done_rx.recv_timeout(Duration::from_secs(3)).is_ok());
        assert!(!controller.is_playing());
        assert_eq!(controller.state(), PlaybackState::Stopped);
    }

    #[test]
    fn callbacks_can_control_playback() {
        let backend = unpaced();
        let controller = Arc::new(FilePlaybackController::new(
            Arc::new(backend.clone()),
            PlaybackConfig::default(),
        ));
        let weak = Arc::downgrade(&controller);
        let reports = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&reports);
        controller.register_progress_callback(move |elapsed, _| {
            *counter.lock() += 1;
            if elapsed > 0.0 {
                if let Some(controller) = weak.upgrade() {
                    assert_eq!(controller.play(blocks(1, 64)), Err(EngineError::AlreadyPlaying));
                    controller.stop();
                }
            }
        });

        controller.play(blocks(50, 64)).unwrap();
        assert!(wait_for(Duration::from_secs(1), || controller.state().is_terminal()));
        assert_eq!(*reports.lock(), 2);
        assert_eq!(backend.written_frames(), 64);
    }

    #[test]
    fn pause_without_playback_is_a_no_op() {
        let controller = FilePlaybackController::new(Arc::new(unpaced()), PlaybackConfig::default());
        assert!(!controller.pause());
        controller.resume();
        assert_eq!(controller.state(), PlaybackState::Idle);
    }
}
