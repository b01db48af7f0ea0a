//! Output streams.
//!
//! cpal only offers callback-driven output. The blocking output feeds the
//! callback through a small bounded channel so `write()` returns at device
//! pace; the callback stream hands the device buffer straight to the
//! engine's render callback. Both convert from `i16` to whatever sample
//! type the device was opened with.

use std::collections::VecDeque;
use std::time::Duration;

use audio_engine_core::processing::pcm;
use audio_engine_core::{AudioFormat, AudioFrame, BlockingOutput, CallbackStream, EngineError, RenderCallback};
use cpal::traits::DeviceTrait;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TryRecvError};

use crate::backend::{find_output_device, output_sample_format};
use crate::error::CpalError;
use crate::stream_thread::StreamThread;

/// Blocks queued ahead of the device before `write()` blocks. This is also
/// how much already-written audio can still sound after a pause.
const QUEUED_BLOCKS: usize = 2;

/// Slack on top of the queued audio's duration before a write gives up.
const WRITE_SLACK: Duration = Duration::from_millis(500);

/// Longest `close()` waits for queued audio to play out.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest `write()` of a block lasting `block` may wait for room in the queue.
fn write_timeout(block: Duration) -> Duration {
    block * (QUEUED_BLOCKS as u32 + 1) + WRITE_SLACK
}

fn queue_block(blocks: &Sender<Vec<i16>>, samples: Vec<i16>, timeout: Duration) -> Result<(), EngineError> {
    blocks.send_timeout(samples, timeout).map_err(|e| match e {
        SendTimeoutError::Timeout(_) => {
            EngineError::Device(format!("output device stopped consuming audio for {:?}", timeout))
        }
        SendTimeoutError::Disconnected(_) => EngineError::Device("output stream stopped".into()),
    })
}

/// Device-side end of the blocking output: pulls queued samples into the device buffer.
struct SampleFeed {
    blocks: Receiver<Vec<i16>>,
    pending: VecDeque<i16>,
    drained: Sender<()>,
    drained_sent: bool,
}

impl SampleFeed {
    /// Fill `out`, padding with silence. Returns the number of queued samples played.
    fn fill<T>(&mut self, out: &mut [T]) -> usize
    where
        T: cpal::SizedSample + cpal::FromSample<i16>,
    {
        let mut filled = 0;
        while filled < out.len() {
            if self.pending.is_empty() {
                match self.blocks.try_recv() {
                    Ok(block) => self.pending.extend(block),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        if !self.drained_sent {
                            self.drained_sent = true;
                            let _ = self.drained.try_send(());
                        }
                        break;
                    }
                }
                continue;
            }
            let n = (out.len() - filled).min(self.pending.len());
            for (slot, sample) in out[filled..filled + n].iter_mut().zip(self.pending.drain(..n)) {
                *slot = T::from_sample(sample);
            }
            filled += n;
        }
        out[filled..].fill(T::EQUILIBRIUM);
        filled
    }
}

/// Pull-model output on a cpal device.
pub struct CpalBlockingOutput {
    format: AudioFormat,
    blocks: Option<Sender<Vec<i16>>>,
    drained: Receiver<()>,
    stream: StreamThread,
}

impl CpalBlockingOutput {
    pub(crate) fn open(
        device_name: Option<String>,
        format: AudioFormat,
        config: cpal::StreamConfig,
    ) -> Result<Self, EngineError> {
        let (blocks_tx, blocks_rx) = bounded(QUEUED_BLOCKS);
        let (drained_tx, drained_rx) = bounded(1);
        let feed = SampleFeed {
            blocks: blocks_rx,
            pending: VecDeque::new(),
            drained: drained_tx,
            drained_sent: false,
        };

        let stream = StreamThread::spawn("cpal-output", move || {
            let device = find_output_device(device_name.as_deref())?;
            match output_sample_format(&device, &config)? {
                cpal::SampleFormat::I16 => build_feed_stream::<i16>(&device, &config, feed),
                cpal::SampleFormat::F32 => build_feed_stream::<f32>(&device, &config, feed),
                cpal::SampleFormat::U16 => build_feed_stream::<u16>(&device, &config, feed),
                other => Err(EngineError::UnsupportedFormat(format!(
                    "unsupported device sample format: {:?}",
                    other
                ))),
            }
        })?;

        log::debug!("cpal blocking output opened: {:?}", format);
        Ok(Self {
            format,
            blocks: Some(blocks_tx),
            drained: drained_rx,
            stream,
        })
    }
}

fn build_feed_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut feed: SampleFeed,
) -> Result<cpal::Stream, EngineError>
where
    T: cpal::SizedSample + cpal::FromSample<i16>,
{
    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                feed.fill(data);
            },
            |err| log::error!("Output stream error: {}", err),
            None,
        )
        .map_err(CpalError::from)?;
    Ok(stream)
}

impl BlockingOutput for CpalBlockingOutput {
    fn write(&mut self, frame: &AudioFrame) -> Result<(), EngineError> {
        if frame.format() != self.format {
            return Err(EngineError::UnsupportedFormat(format!(
                "device opened for {:?}, got {:?}",
                self.format,
                frame.format()
            )));
        }
        let blocks = self
            .blocks
            .as_ref()
            .ok_or_else(|| EngineError::Device("output is closed".into()))?;

        let mut samples = vec![0i16; frame.len_bytes() / 2];
        pcm::pcm16_to_i16(frame.data(), &mut samples);
        let timeout = write_timeout(Duration::from_secs_f64(frame.duration_secs()));
        queue_block(blocks, samples, timeout)
    }

    fn close(&mut self) -> Result<(), EngineError> {
        if self.blocks.take().is_some() && self.drained.recv_timeout(DRAIN_TIMEOUT).is_err() {
            log::warn!("Output did not drain within {:?}", DRAIN_TIMEOUT);
        }
        self.stream.close()
    }
}

/// Device-side adapter from cpal's sample buffer to the engine's byte render callback.
struct RenderAdapter {
    callback: RenderCallback,
    bytes: Vec<u8>,
    samples: Vec<i16>,
    finished: bool,
}

impl RenderAdapter {
    fn new(callback: RenderCallback, block_samples: usize) -> Self {
        Self {
            callback,
            bytes: vec![0u8; block_samples * 2],
            samples: vec![0i16; block_samples],
            finished: false,
        }
    }

    fn fill<T>(&mut self, out: &mut [T])
    where
        T: cpal::SizedSample + cpal::FromSample<i16>,
    {
        if self.finished {
            out.fill(T::EQUILIBRIUM);
            return;
        }
        self.bytes.resize(out.len() * 2, 0);
        self.samples.resize(out.len(), 0);

        let rendered = (self.callback)(&mut self.bytes);
        pcm::pcm16_to_i16(&self.bytes, &mut self.samples);
        for (slot, &sample) in out.iter_mut().zip(self.samples.iter()) {
            *slot = T::from_sample(sample);
        }
        self.finished = rendered.finished;
    }
}

/// Push-model output on a cpal device.
pub struct CpalCallbackStream {
    stream: StreamThread,
}

impl CpalCallbackStream {
    pub(crate) fn open(
        device_name: Option<String>,
        config: cpal::StreamConfig,
        callback: RenderCallback,
    ) -> Result<Self, EngineError> {
        let block_samples = match config.buffer_size {
            cpal::BufferSize::Fixed(frames) => frames as usize * config.channels as usize,
            cpal::BufferSize::Default => 0,
        };
        let adapter = RenderAdapter::new(callback, block_samples);

        let stream = StreamThread::spawn("cpal-render", move || {
            let device = find_output_device(device_name.as_deref())?;
            match output_sample_format(&device, &config)? {
                cpal::SampleFormat::I16 => build_render_stream::<i16>(&device, &config, adapter),
                cpal::SampleFormat::F32 => build_render_stream::<f32>(&device, &config, adapter),
                cpal::SampleFormat::U16 => build_render_stream::<u16>(&device, &config, adapter),
                other => Err(EngineError::UnsupportedFormat(format!(
                    "unsupported device sample format: {:?}",
                    other
                ))),
            }
        })?;

        log::debug!("cpal callback stream opened");
        Ok(Self { stream })
    }
}

fn build_render_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut adapter: RenderAdapter,
) -> Result<cpal::Stream, EngineError>
where
    T: cpal::SizedSample + cpal::FromSample<i16>,
{
    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| adapter.fill(data),
            |err| log::error!("Output stream error: {}", err),
            None,
        )
        .map_err(CpalError::from)?;
    Ok(stream)
}

impl CallbackStream for CpalCallbackStream {
    fn close(&mut self) -> Result<(), EngineError> {
        self.stream.close()
    }
}
