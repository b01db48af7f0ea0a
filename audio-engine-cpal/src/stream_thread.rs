//! Owns a `cpal::Stream` on a dedicated thread.
//!
//! `cpal::Stream` is `!Send` on several hosts, so the stream is built, played
//! and dropped on one thread. The handle returned to the engine only holds a
//! shutdown channel and the join handle, which are `Send`.

use std::thread::{self, JoinHandle};

use audio_engine_core::EngineError;
use cpal::traits::StreamTrait;
use crossbeam_channel::{bounded, Sender};

use crate::error::CpalError;

pub(crate) struct StreamThread {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StreamThread {
    /// Run `build` on a new thread, start the stream, and return once it is playing.
    pub fn spawn<F>(name: &str, build: F) -> Result<Self, EngineError>
    where
        F: FnOnce() -> Result<cpal::Stream, EngineError> + Send + 'static,
    {
        let (ready_tx, ready_rx) = bounded::<Result<(), EngineError>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                let started = build().and_then(|stream| {
                    stream.play().map_err(CpalError::from)?;
                    Ok(stream)
                });
                let stream = match started {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Returns once the owner drops its sender.
                let _ = shutdown_rx.recv();
                drop(stream);
            })
            .map_err(|e| EngineError::Unknown(format!("failed to spawn stream thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                shutdown: Some(shutdown_tx),
                handle: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(EngineError::Device("stream thread exited during setup".into()))
            }
        }
    }

    /// Stop the stream and wait for its thread. Idempotent.
    pub fn close(&mut self) -> Result<(), EngineError> {
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| EngineError::Device("stream thread panicked".into()))?;
        }
        Ok(())
    }
}

impl Drop for StreamThread {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("{}", e);
        }
    }
}
