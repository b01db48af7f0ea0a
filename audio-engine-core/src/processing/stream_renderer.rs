//! Device-callback side of streaming playback.
//!
//! Each `render` call fills one device buffer from the byte accumulator,
//! topping it up from the relay queue with a bounded wait. Once the stream
//! ends it emits a short tail of silence, then reports completion exactly
//! once.

use std::time::Duration;

use crossbeam_channel::Sender;

use super::byte_accumulator::ByteAccumulator;
use super::relay_queue::{RelayItem, RelayPop, RelayReceiver};
use crate::models::audio_frame::AudioFormat;
use crate::models::error::EngineError;
use crate::traits::device::Rendered;

/// Why a stream stopped producing audio.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEnd {
    /// The source was exhausted normally.
    Completed,
    /// The relay queue stayed empty past the timeout, or the producer vanished.
    Starved,
    /// The source reported an error.
    Failed(EngineError),
    /// Playback was stopped before the stream finished.
    Cancelled,
}

/// What a finished stream delivered to the device.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSummary {
    pub audio_bytes: u64,
    pub silence_bytes: u64,
    pub end: StreamEnd,
}

pub struct StreamRenderer {
    relay: RelayReceiver,
    accumulator: ByteAccumulator,
    relay_timeout: Duration,
    tail_bytes: usize,
    tail_remaining: usize,
    end: Option<StreamEnd>,
    audio_bytes: u64,
    silence_bytes: u64,
    completion: Option<Sender<StreamSummary>>,
}

impl StreamRenderer {
    /// `prebuffered` holds audio pulled before the device opened; `end` is set
    /// if the terminal item was already seen while prebuffering.
    pub fn new(
        relay: RelayReceiver,
        prebuffered: ByteAccumulator,
        end: Option<StreamEnd>,
        format: AudioFormat,
        tail_silence: Duration,
        relay_timeout: Duration,
        completion: Sender<StreamSummary>,
    ) -> Self {
        let tail_bytes = format.bytes_for_duration(tail_silence.as_secs_f64());
        Self {
            relay,
            accumulator: prebuffered,
            relay_timeout,
            tail_bytes,
            tail_remaining: if end.is_some() { tail_bytes } else { 0 },
            end,
            audio_bytes: 0,
            silence_bytes: 0,
            completion: Some(completion),
        }
    }

    /// Fill `out` and report how much of it is meaningful.
    pub fn render(&mut self, out: &mut [u8]) -> Rendered {
        if self.completion.is_none() {
            out.fill(0);
            return Rendered {
                bytes: 0,
                finished: true,
            };
        }

        let needed = out.len();
        while self.accumulator.len() < needed && self.end.is_none() {
            match self.relay.pop(self.relay_timeout) {
                RelayPop::Item(RelayItem::Frame(frame)) => self.accumulator.push(frame.data()),
                RelayPop::Item(RelayItem::EndOfStream) => self.end_stream(StreamEnd::Completed),
                RelayPop::Item(RelayItem::Failed(e)) => {
                    log::error!("Audio source failed mid-stream: {}", e);
                    self.end_stream(StreamEnd::Failed(e));
                }
                RelayPop::TimedOut => {
                    log::warn!(
                        "Relay queue starved for {:?}, treating as end of stream",
                        self.relay_timeout
                    );
                    self.end_stream(StreamEnd::Starved);
                }
                RelayPop::Disconnected => {
                    log::warn!("Audio producer exited without ending the stream");
                    self.end_stream(StreamEnd::Starved);
                }
            }
        }

        let mut written = self.accumulator.drain_into(out);
        self.audio_bytes += written as u64;

        if self.end.is_some() && written < needed {
            let tail = (needed - written).min(self.tail_remaining);
            out[written..written + tail].fill(0);
            self.tail_remaining -= tail;
            self.silence_bytes += tail as u64;
            written += tail;
        }

        // Anything left over is padding, not part of the stream.
        out[written..].fill(0);

        let finished =
            self.end.is_some() && self.accumulator.is_empty() && self.tail_remaining == 0;
        if finished {
            self.complete();
        }

        Rendered {
            bytes: written,
            finished,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.completion.is_none()
    }

    fn end_stream(&mut self, end: StreamEnd) {
        self.end = Some(end);
        self.tail_remaining = self.tail_bytes;
    }

    fn complete(&mut self) {
        let Some(completion) = self.completion.take() else {
            return;
        };
        let summary = StreamSummary {
            audio_bytes: self.audio_bytes,
            silence_bytes: self.silence_bytes,
            end: self.end.clone().unwrap_or(StreamEnd::Completed),
        };
        log::debug!(
            "Stream finished: {} audio bytes, {} silence bytes, {:?}",
            summary.audio_bytes,
            summary.silence_bytes,
            summary.end
        );
        // The waiter may already be gone after a stop(); nothing to report then.
        let _ = completion.try_send(summary);
    }
}
