use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use audio_engine_core::processing::pcm;
use audio_engine_core::{AudioFormat, AudioFrame, BlockingInput, EngineError};
use cpal::traits::DeviceTrait;
use cpal::Sample;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::backend::{find_input_device, input_sample_format};
use crate::error::CpalError;
use crate::stream_thread::StreamThread;

/// Device buffers held between the capture callback and `read()`.
const QUEUED_BUFFERS: usize = 256;

/// Longest `read()` waits for the device to deliver anything.
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Reassembles device-sized sample buffers into reads of any size.
struct SampleQueue {
    buffers: Receiver<Vec<i16>>,
    pending: VecDeque<i16>,
}

impl SampleQueue {
    fn take(&mut self, samples: usize, timeout: Duration) -> Result<Vec<i16>, EngineError> {
        while self.pending.len() < samples {
            match self.buffers.recv_timeout(timeout) {
                Ok(buffer) => self.pending.extend(buffer),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(EngineError::Device(format!(
                        "no input received within {:?}",
                        timeout
                    )))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(EngineError::Device("input stream stopped".into()))
                }
            }
        }
        Ok(self.pending.drain(..samples).collect())
    }
}

/// Capture from a cpal input device.
pub struct CpalInput {
    format: AudioFormat,
    queue: SampleQueue,
    dropped_samples: Arc<AtomicU64>,
    stream: StreamThread,
}

impl CpalInput {
    pub(crate) fn open(
        device_name: Option<String>,
        format: AudioFormat,
        config: cpal::StreamConfig,
    ) -> Result<Self, EngineError> {
        let (buffers_tx, buffers_rx) = bounded::<Vec<i16>>(QUEUED_BUFFERS);
        let dropped_samples = Arc::new(AtomicU64::new(0));
        let callback_dropped = Arc::clone(&dropped_samples);

        let stream = StreamThread::spawn("cpal-input", move || {
            let device = find_input_device(device_name.as_deref())?;
            let (buffers, dropped) = (buffers_tx, callback_dropped);
            match input_sample_format(&device, &config)? {
                cpal::SampleFormat::I16 => build_input::<i16>(&device, &config, buffers, dropped),
                cpal::SampleFormat::F32 => build_input::<f32>(&device, &config, buffers, dropped),
                cpal::SampleFormat::U16 => build_input::<u16>(&device, &config, buffers, dropped),
                other => Err(EngineError::UnsupportedFormat(format!(
                    "unsupported device sample format: {:?}",
                    other
                ))),
            }
        })?;

        log::debug!("cpal input opened: {:?}", format);
        Ok(Self {
            format,
            queue: SampleQueue {
                buffers: buffers_rx,
                pending: VecDeque::new(),
            },
            dropped_samples,
            stream,
        })
    }
}

/// Converts a device buffer to `i16`.
fn to_i16<T>(data: &[T]) -> Vec<i16>
where
    T: cpal::SizedSample,
    i16: cpal::FromSample<T>,
{
    data.iter().map(|&sample| i16::from_sample(sample)).collect()
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    buffers: Sender<Vec<i16>>,
    dropped: Arc<AtomicU64>,
) -> Result<cpal::Stream, EngineError>
where
    T: cpal::SizedSample,
    i16: cpal::FromSample<T>,
{
    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if buffers.try_send(to_i16(data)).is_err() {
                    dropped.fetch_add(data.len() as u64, Ordering::Relaxed);
                }
            },
            |err| log::error!("Input stream error: {}", err),
            None,
        )
        .map_err(CpalError::from)?;
    Ok(stream)
}

impl BlockingInput for CpalInput {
    fn read(&mut self, frames: usize) -> Result<AudioFrame, EngineError> {
        let samples = self
            .queue
            .take(frames * self.format.channels as usize, READ_TIMEOUT)?;
        AudioFrame::new(pcm::i16_to_pcm16(&samples), self.format)
    }

    fn close(&mut self) -> Result<(), EngineError> {
        let dropped = self.dropped_samples.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            log::warn!("Input overflowed, {} samples dropped", dropped);
        }
        self.stream.close()
    }
}
