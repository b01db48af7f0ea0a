use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::models::config::CaptureConfiguration;
use crate::models::error::EngineError;
use crate::models::recording_result::{RecordingMetadata, RecordingResult};
use crate::models::state::CaptureState;
use crate::storage::metadata;
use crate::storage::wav_sink::WavFileSink;
use crate::traits::callbacks::{invoke_guarded, CaptureProgressCallback};
use crate::traits::device::{BlockingInput, InputBackend};

type CaptureOutcome = Result<RecordingResult, EngineError>;

/// One running capture: where it writes and how to reach its worker.
struct CaptureSession {
    file_path: PathBuf,
    stop: Arc<AtomicBool>,
    worker: JoinHandle<()>,
    completion: Receiver<CaptureOutcome>,
}

/// Everything the capture worker owns.
struct CaptureWorker {
    backend: Arc<dyn InputBackend>,
    config: CaptureConfiguration,
    sink: WavFileSink,
    stop: Arc<AtomicBool>,
    state: Arc<Mutex<CaptureState>>,
    progress: Option<CaptureProgressCallback>,
}

/// Records from an input device into a WAV file.
///
/// ```text
/// [BlockingInput::read] → [WavFileSink::write] → progress(elapsed)
///                                  ↓ on stop
///                      finalize header → checksum → RecordingResult
/// ```
pub struct AudioCaptureController {
    backend: Arc<dyn InputBackend>,
    config: CaptureConfiguration,
    progress_callback: Mutex<Option<CaptureProgressCallback>>,
    state: Arc<Mutex<CaptureState>>,
    control_lock: Mutex<()>,
    session: Mutex<Option<CaptureSession>>,
}

impl AudioCaptureController {
    pub fn new(backend: Arc<dyn InputBackend>, config: CaptureConfiguration) -> Self {
        Self {
            backend,
            config,
            progress_callback: Mutex::new(None),
            state: Arc::new(Mutex::new(CaptureState::Idle)),
            control_lock: Mutex::new(()),
            session: Mutex::new(None),
        }
    }

    /// Receive elapsed seconds after every block captured.
    pub fn register_progress_callback<F>(&self, callback: F)
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        *self.progress_callback.lock() = Some(Arc::new(callback));
    }

    /// Start recording into `path`. Returns once the worker is running.
    pub fn start(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let _control = self.control_lock.lock();
        let mut slot = self.session.lock();
        if let Some(session) = slot.as_ref() {
            if !session.worker.is_finished() {
                log::warn!(
                    "Already recording to {}, ignoring start()",
                    session.file_path.display()
                );
                return Err(EngineError::AlreadyRecording);
            }
        }
        if let Some(finished) = slot.take() {
            log::debug!("Discarding uncollected recording {}", finished.file_path.display());
            let _ = finished.worker.join();
        }

        self.config
            .validate()
            .map_err(EngineError::ConfigurationFailed)?;

        let file_path = path.as_ref().to_path_buf();
        let sink = WavFileSink::create(&file_path, self.config.format())?;

        let stop = Arc::new(AtomicBool::new(false));
        let (completion_tx, completion_rx) = bounded(1);
        let worker = CaptureWorker {
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
            sink,
            stop: Arc::clone(&stop),
            state: Arc::clone(&self.state),
            progress: self.progress_callback.lock().clone(),
        };

        self.set_state(CaptureState::Recording { elapsed_secs: 0.0 });
        let handle = thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || worker.run(completion_tx))
            .map_err(|e| {
                let error = EngineError::Unknown(format!("failed to spawn capture thread: {}", e));
                self.set_state(CaptureState::Failed(error.clone()));
                error
            })?;

        log::info!(
            "Recording started: {} ({} Hz, {} ch, {}-bit)",
            file_path.display(),
            self.config.sample_rate,
            self.config.channels,
            self.config.bit_depth
        );
        *slot = Some(CaptureSession {
            file_path,
            stop,
            worker: handle,
            completion: completion_rx,
        });
        Ok(())
    }

    /// Stop recording and return the finalized result.
    ///
    /// `Ok(None)` when nothing is recording. On `Err(Timeout)` the worker is
    /// still running and `stop()` may be called again.
    pub fn stop(&self) -> Result<Option<RecordingResult>, EngineError> {
        let _control = self.control_lock.lock();
        let completion = {
            let slot = self.session.lock();
            let Some(session) = slot.as_ref() else {
                log::warn!("No recording to stop");
                return Ok(None);
            };
            session.stop.store(true, Ordering::SeqCst);
            session.completion.clone()
        };
        {
            let mut state = self.state.lock();
            if state.is_recording() {
                *state = CaptureState::Stopping;
            }
        }

        let outcome = match completion.recv_timeout(self.config.stop_timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                log::error!(
                    "Capture worker did not stop within {:?}",
                    self.config.stop_timeout
                );
                return Err(EngineError::Timeout);
            }
            Err(RecvTimeoutError::Disconnected) => {
                let error = EngineError::Unknown("capture worker exited without a result".into());
                self.set_state(CaptureState::Failed(error.clone()));
                Err(error)
            }
        };

        if let Some(session) = self.session.lock().take() {
            if session.worker.join().is_err() {
                log::error!("Capture worker panicked");
            }
        }

        outcome.map(Some)
    }

    /// Whether a capture worker is alive.
    pub fn is_recording(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|session| !session.worker.is_finished())
    }

    pub fn state(&self) -> CaptureState {
        self.state.lock().clone()
    }

    fn set_state(&self, state: CaptureState) {
        *self.state.lock() = state;
    }
}

impl Drop for AudioCaptureController {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.stop.store(true, Ordering::SeqCst);
            let _ = session.worker.join();
        }
    }
}

impl CaptureWorker {
    fn run(mut self, completion: Sender<CaptureOutcome>) {
        let captured = self.capture_loop();
        let finalized = self.finalize();

        let outcome = match (captured, finalized) {
            (Err(e), finalized) => {
                if let Err(ref finalize_error) = finalized {
                    log::error!("Failed to finalize partial recording: {}", finalize_error);
                }
                Err(e)
            }
            (Ok(()), finalized) => finalized,
        };

        match outcome {
            Ok(ref result) => {
                log::info!(
                    "Recording finished: {} ({:.2}s, {} frames)",
                    result.file_path.display(),
                    result.duration_secs,
                    result.frame_count
                );
                *self.state.lock() = CaptureState::Completed(Box::new(result.clone()));
            }
            Err(ref e) => {
                log::error!("Recording failed: {}", e);
                *self.state.lock() = CaptureState::Failed(e.clone());
            }
        }

        // Nobody may be waiting if the session ended on its own.
        let _ = completion.send(outcome);
    }

    fn capture_loop(&mut self) -> Result<(), EngineError> {
        let mut input = self.backend.open_input(self.config.format())?;
        let result = self.read_blocks(input.as_mut());
        let closed = input.close();
        if let Err(ref e) = closed {
            log::warn!("Failed to close input device: {}", e);
        }
        result.and(closed)
    }

    fn read_blocks(&mut self, input: &mut dyn BlockingInput) -> Result<(), EngineError> {
        let format = self.sink.format();
        while !self.stop.load(Ordering::SeqCst) {
            let frame = input.read(self.config.block_frames)?;
            self.sink.write(&frame)?;

            let elapsed = format.frames_to_secs(self.sink.frame_count());
            {
                let mut state = self.state.lock();
                if state.is_recording() {
                    *state = CaptureState::Recording {
                        elapsed_secs: elapsed,
                    };
                }
            }
            if !self.stop.load(Ordering::SeqCst) {
                if let Some(ref callback) = self.progress {
                    invoke_guarded("Progress", || callback(elapsed));
                }
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<RecordingResult, EngineError> {
        let summary = self.sink.finalize()?;
        let format = self.sink.format();
        let duration_secs = format.frames_to_secs(summary.frame_count);

        let recording_metadata = RecordingMetadata::new(
            duration_secs,
            &summary.file_path.to_string_lossy(),
            &summary.checksum,
            format,
        );
        if self.config.write_metadata {
            metadata::write_metadata(&recording_metadata, &summary.file_path)?;
        }

        Ok(RecordingResult {
            file_path: summary.file_path,
            duration_secs,
            frame_count: summary.frame_count,
            metadata: recording_metadata,
            checksum: summary.checksum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use crate::backend::memory::{MemoryBackend, MemoryOptions, Pacing};

    fn config() -> CaptureConfiguration {
        CaptureConfiguration {
            sample_rate: 8000,
            block_frames: 400, // 50ms
            ..Default::default()
        }
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

    #[test]
    fn duration_tracks_wall_clock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.wav");
        let backend = MemoryBackend::realtime();
        let controller = AudioCaptureController::new(Arc::new(backend.clone()), config());

        let started = Instant::now();
        controller.start(&path).unwrap();
        assert!(controller.is_recording());
        thread::sleep(Duration::from_millis(300));
        let result = controller.stop().unwrap().unwrap();
        let wall = started.elapsed().as_secs_f64();

        assert!(!controller.is_recording());
        assert!(result.duration_secs >= 0.25, "captured {}", result.duration_secs);
        assert!(result.duration_secs <= wall + 0.05, "captured {} in {}", result.duration_secs, wall);
        assert_eq!(result.frame_count % 400, 0);
        assert_eq!(result.checksum.len(), 64);
        assert_eq!(backend.open_devices(), 0);

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.duration() as u64, result.frame_count);
        assert_eq!(reader.spec().sample_rate, 8000);
        assert!(matches!(controller.state(), CaptureState::Completed(_)));
    }

    #[test]
    fn captured_samples_reach_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pattern.wav");
        let backend = MemoryBackend::new(MemoryOptions {
            pacing: Pacing::Fixed(Duration::from_millis(2)),
            input_sample: 1234,
            ..Default::default()
        });
        let controller = AudioCaptureController::new(Arc::new(backend), config());

        controller.start(&path).unwrap();
        thread::sleep(Duration::from_millis(20));
        let result = controller.stop().unwrap().unwrap();

        let mut reader = hound::WavReader::open(&result.file_path).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert!(!samples.is_empty());
        assert!(samples.iter().all(|&s| s == 1234));
    }

    #[test]
    fn progress_reports_elapsed_per_block() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::with_latency(Duration::from_millis(2));
        let controller = AudioCaptureController::new(Arc::new(backend), config());
        let reports: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);
        controller.register_progress_callback(move |elapsed| sink.lock().push(elapsed));

        controller.start(dir.path().join("p.wav")).unwrap();
        assert!(wait_for(Duration::from_secs(1), || reports.lock().len() >= 3));
        controller.stop().unwrap();

        let reports = reports.lock();
        assert_eq!(&reports[..3], &[0.05, 0.1, 0.15]);
        assert!(reports.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn second_start_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let controller = AudioCaptureController::new(
            Arc::new(MemoryBackend::with_latency(Duration::from_millis(2))),
            config(),
        );

        controller.start(dir.path().join("a.wav")).unwrap();
        assert_eq!(
            controller.start(dir.path().join("b.wav")),
            Err(EngineError::AlreadyRecording)
        );
        assert!(!dir.path().join("b.wav").exists());
        controller.stop().unwrap();
    }

    #[test]
    fn stop_when_idle_returns_none() {
        let controller = AudioCaptureController::new(Arc::new(MemoryBackend::realtime()), config());
        assert_eq!(controller.stop(), Ok(None));
        assert!(controller.state().is_idle());
    }

    #[test]
    fn input_failure_ends_session_and_keeps_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.wav");
        let backend = MemoryBackend::new(MemoryOptions {
            pacing: Pacing::Unpaced,
            fail_after_reads: Some(3),
            ..Default::default()
        });
        let controller = AudioCaptureController::new(Arc::new(backend.clone()), config());

        controller.start(&path).unwrap();
        assert!(wait_for(Duration::from_secs(1), || !controller.is_recording()));

        assert!(matches!(controller.state(), CaptureState::Failed(EngineError::Device(_))));
        assert!(matches!(controller.stop(), Err(EngineError::Device(_))));
        assert_eq!(controller.stop(), Ok(None));

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.duration(), 1200);
        assert_eq!(backend.open_devices(), 0);
    }

    #[test]
    fn unavailable_device_fails_session() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new(MemoryOptions {
            unavailable: true,
            ..Default::default()
        });
        let controller = AudioCaptureController::new(Arc::new(backend), config());

        controller.start(dir.path().join("none.wav")).unwrap();
        assert_eq!(controller.stop(), Err(EngineError::DeviceNotAvailable));
        assert_eq!(controller.state(), CaptureState::Failed(EngineError::DeviceNotAvailable));
    }

    #[test]
    fn slow_worker_times_out_then_stops() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::with_latency(Duration::from_millis(300));
        let controller = AudioCaptureController::new(
            Arc::new(backend),
            CaptureConfiguration {
                stop_timeout: Duration::from_millis(20),
                ..config()
            },
        );

        controller.start(dir.path().join("slow.wav")).unwrap();
        thread::sleep(Duration::from_millis(10));
        assert_eq!(controller.stop(), Err(EngineError::Timeout));
        assert!(controller.is_recording());
        assert_eq!(controller.state(), CaptureState::Stopping);

        assert!(wait_for(Duration::from_secs(2), || !controller.is_recording()));
        let result = controller.stop().unwrap().unwrap();
        assert_eq!(result.frame_count, 400);
    }

    #[test]
    fn metadata_sidecar_is_written_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("with_meta.wav");
        let controller = AudioCaptureController::new(
            Arc::new(MemoryBackend::with_latency(Duration::from_millis(2))),
            CaptureConfiguration {
                write_metadata: true,
                ..config()
            },
        );

        controller.start(&path).unwrap();
        thread::sleep(Duration::from_millis(10));
        let result = controller.stop().unwrap().unwrap();

        let stored = metadata::read_metadata(&path).unwrap();
        assert_eq!(stored, result.metadata);
        assert_eq!(stored.checksum, result.checksum);
        assert_eq!(stored.sample_rate, 8000);
        assert_eq!(stored.bit_depth, 16);
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let controller = AudioCaptureController::new(
            Arc::new(MemoryBackend::realtime()),
            CaptureConfiguration {
                bit_depth: 12,
                ..config()
            },
        );
        assert!(matches!(
            controller.start(dir.path().join("x.wav")),
            Err(EngineError::ConfigurationFailed(_))
        ));
        assert!(!controller.is_recording());
    }

    #[test]
    fn can_record_again_after_stop() {
        let dir = tempfile::tempdir().unwrap();
        let controller = AudioCaptureController::new(
            Arc::new(MemoryBackend::with_latency(Duration::from_millis(2))),
            config(),
        );

        controller.start(dir.path().join("one.wav")).unwrap();
        let first = controller.stop().unwrap().unwrap();
        controller.start(dir.path().join("two.wav")).unwrap();
        let second = controller.stop().unwrap().unwrap();

        assert_ne!(first.file_path, second.file_path);
        assert_ne!(first.metadata.id, second.metadata.id);
    }
}
