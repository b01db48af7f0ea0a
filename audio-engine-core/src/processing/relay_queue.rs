//! Bounded relay between a frame producer and a real-time consumer.
//!
//! The producer blocks while the queue is full (backpressure); nothing is
//! ever dropped. The stream is terminated by exactly one terminal item,
//! after which the sender is consumed so no further data can follow.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};

use crate::models::audio_frame::AudioFrame;
use crate::models::error::EngineError;

/// How often a blocked producer re-checks its cancel flag.
const CANCEL_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq)]
pub enum RelayItem {
    Frame(AudioFrame),
    EndOfStream,
    Failed(EngineError),
}

impl RelayItem {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Frame(_))
    }
}

/// Result of a bounded wait on the relay queue.
#[derive(Debug, PartialEq)]
pub enum RelayPop {
    Item(RelayItem),
    /// Nothing arrived within the timeout.
    TimedOut,
    /// The producer is gone without sending a terminal item.
    Disconnected,
}

/// Why a push did not go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// The consumer side was dropped.
    Disconnected,
    /// The cancel flag was raised while waiting for capacity.
    Cancelled,
}

pub fn relay_queue(capacity: usize) -> (RelaySender, RelayReceiver) {
    let (tx, rx) = bounded(capacity);
    (RelaySender { tx }, RelayReceiver { rx })
}

pub struct RelaySender {
    tx: Sender<RelayItem>,
}

impl RelaySender {
    /// Enqueue a frame, waiting for capacity until `cancel` is raised.
    pub fn push_frame(&self, frame: AudioFrame, cancel: &AtomicBool) -> Result<(), PushError> {
        self.push(RelayItem::Frame(frame), cancel)
    }

    /// Enqueue the terminal item and close the sending side.
    pub fn finish(self, item: RelayItem, cancel: &AtomicBool) -> Result<(), PushError> {
        debug_assert!(item.is_terminal());
        self.push(item, cancel)
    }

    fn push(&self, mut item: RelayItem, cancel: &AtomicBool) -> Result<(), PushError> {
        loop {
            if cancel.load(Ordering::SeqCst) {
                return Err(PushError::Cancelled);
            }
            match self.tx.send_timeout(item, CANCEL_POLL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(returned)) => item = returned,
                Err(SendTimeoutError::Disconnected(_)) => return Err(PushError::Disconnected),
            }
        }
    }
}

pub struct RelayReceiver {
    rx: Receiver<RelayItem>,
}

impl RelayReceiver {
    /// Wait up to `timeout` for the next item.
    pub fn pop(&self, timeout: Duration) -> RelayPop {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => RelayPop::Item(item),
            Err(RecvTimeoutError::Timeout) => RelayPop::TimedOut,
            Err(RecvTimeoutError::Disconnected) => RelayPop::Disconnected,
        }
    }

    /// Items currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    use crate::models::audio_frame::AudioFormat;

    fn frame(n: usize) -> AudioFrame {
        AudioFrame::silence(n, AudioFormat::pcm16(16000, 1))
    }

    #[test]
    fn items_arrive_in_order_then_terminal() {
        let cancel = AtomicBool::new(false);
        let (tx, rx) = relay_queue(4);
        tx.push_frame(frame(1), &cancel).unwrap();
        tx.push_frame(frame(2), &cancel).unwrap();
        tx.finish(RelayItem::EndOfStream, &cancel).unwrap();

        let timeout = Duration::from_millis(10);
        assert_eq!(rx.pop(timeout), RelayPop::Item(RelayItem::Frame(frame(1))));
        assert_eq!(rx.pop(timeout), RelayPop::Item(RelayItem::Frame(frame(2))));
        assert_eq!(rx.pop(timeout), RelayPop::Item(RelayItem::EndOfStream));
        assert_eq!(rx.pop(timeout), RelayPop::Disconnected);
    }

    #[test]
    fn full_queue_applies_backpressure() {
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = relay_queue(1);
        tx.push_frame(frame(1), &cancel).unwrap();

        let producer_cancel = Arc::clone(&cancel);
        let producer = thread::spawn(move || {
            let started = Instant::now();
            tx.push_frame(frame(2), &producer_cancel).unwrap();
            started.elapsed()
        });

        thread::sleep(Duration::from_millis(100));
        assert_eq!(rx.len(), 1);
        assert!(matches!(rx.pop(Duration::from_millis(10)), RelayPop::Item(_)));

        let blocked_for = producer.join().unwrap();
        assert!(blocked_for >= Duration::from_millis(80));
        assert_eq!(rx.pop(Duration::from_millis(100)), RelayPop::Item(RelayItem::Frame(frame(2))));
    }

    #[test]
    fn cancel_releases_blocked_producer() {
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, _rx) = relay_queue(1);
        tx.push_frame(frame(1), &cancel).unwrap();

        let producer_cancel = Arc::clone(&cancel);
        let producer = thread::spawn(move || tx.push_frame(frame(2), &producer_cancel));

        thread::sleep(Duration::from_millis(20));
        cancel.store(true, Ordering::SeqCst);
        assert_eq!(producer.join().unwrap(), Err(PushError::Cancelled));
    }

    #[test]
    fn dropped_consumer_disconnects_producer() {
        let cancel = AtomicBool::new(false);
        let (tx, rx) = relay_queue(2);
        drop(rx);
        assert_eq!(tx.push_frame(frame(1), &cancel), Err(PushError::Disconnected));
    }

    #[test]
    fn empty_queue_times_out() {
        let (_tx, rx) = relay_queue(2);
        assert_eq!(rx.pop(Duration::from_millis(5)), RelayPop::TimedOut);
    }
}
