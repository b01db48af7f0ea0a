//! Control-thread ↔ worker signalling.
//!
//! Stop and pause are single-writer atomic flags. A paused worker parks its
//! thread; the control side unparks it on resume/stop. Pause is acknowledged
//! over a one-slot channel so `pause()` can return only once the worker is
//! guaranteed not to be writing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

/// Upper bound on a single park, so a lost wake-up costs at most this much.
const PARK_POLL: Duration = Duration::from_millis(50);

pub(crate) struct WorkerControl {
    stop: AtomicBool,
    pause: AtomicBool,
    parked: AtomicBool,
    exited: AtomicBool,
    ack_tx: Sender<()>,
    ack_rx: Receiver<()>,
}

impl WorkerControl {
    pub fn new() -> Self {
        let (ack_tx, ack_rx) = bounded(1);
        Self {
            stop: AtomicBool::new(false),
            pause: AtomicBool::new(false),
            parked: AtomicBool::new(false),
            exited: AtomicBool::new(false),
            ack_tx,
            ack_rx,
        }
    }

    // --- Control side ---

    pub fn request_stop(&self, worker: &Thread) {
        self.stop.store(true, Ordering::SeqCst);
        worker.unpark();
    }

    pub fn request_pause(&self) {
        self.pause.store(true, Ordering::SeqCst);
    }

    pub fn request_resume(&self, worker: &Thread) {
        self.pause.store(false, Ordering::SeqCst);
        worker.unpark();
    }

    /// Wait until the worker reports it is parked. Returns `false` on timeout
    /// or if the worker exited instead.
    pub fn wait_parked(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.parked.load(Ordering::SeqCst) {
                return true;
            }
            if self.exited.load(Ordering::SeqCst) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.ack_rx.recv_timeout(deadline - now) {
                Ok(()) => continue,
                Err(RecvTimeoutError::Timeout) => return self.parked.load(Ordering::SeqCst),
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    pub fn is_pause_requested(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }

    // --- Worker side ---

    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// If a pause is requested, acknowledge it and park until resumed or stopped.
    pub fn park_while_paused(&self) {
        if !self.pause.load(Ordering::SeqCst) {
            return;
        }
        self.parked.store(true, Ordering::SeqCst);
        let _ = self.ack_tx.try_send(());

        while self.pause.load(Ordering::SeqCst) && !self.stop.load(Ordering::SeqCst) {
            thread::park_timeout(PARK_POLL);
        }
        self.parked.store(false, Ordering::SeqCst);
    }

    /// Called once as the worker exits; wakes any pending `wait_parked`.
    pub fn mark_exited(&self) {
        self.exited.store(true, Ordering::SeqCst);
        let _ = self.ack_tx.try_send(());
    }
}
