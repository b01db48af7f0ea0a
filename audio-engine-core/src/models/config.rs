use std::time::Duration;

use super::audio_frame::AudioFormat;

/// Configuration for file playback.
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Frames pulled from the source and written to the device per iteration (default: 1024).
    pub block_frames: usize,

    /// How long `pause()` waits for the worker to acknowledge (default: 500ms).
    pub pause_ack_timeout: Duration,
}

impl PlaybackConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.block_frames == 0 {
            return Err("block size must be positive".into());
        }
        Ok(())
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            block_frames: 1024,
            pause_ack_timeout: Duration::from_millis(500),
        }
    }
}

/// Configuration for streaming playback of incrementally produced audio.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Capacity of the relay queue between producer and device callback (default: 32).
    pub queue_capacity: usize,

    /// Frames pulled before the device is opened (default: 2).
    pub prebuffer_frames: usize,

    /// Silence appended after the last frame (default: 100ms).
    pub tail_silence: Duration,

    /// Longest the device callback waits on the relay queue before treating
    /// the stream as ended (default: 2s).
    pub relay_timeout: Duration,

    /// Frames requested per device callback (default: 512).
    pub block_frames: usize,

    /// Longest `start()` waits for the source's first frame (default: 30s).
    pub first_frame_timeout: Duration,
}

impl StreamingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.queue_capacity == 0 {
            return Err("relay queue capacity must be positive".into());
        }
        if self.block_frames == 0 {
            return Err("block size must be positive".into());
        }
        if self.relay_timeout.is_zero() {
            return Err("relay timeout must be positive".into());
        }
        if self.first_frame_timeout.is_zero() {
            return Err("first frame timeout must be positive".into());
        }
        Ok(())
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 32,
            prebuffer_frames: 2,
            tail_silence: Duration::from_millis(100),
            relay_timeout: Duration::from_secs(2),
            block_frames: 512,
            first_frame_timeout: Duration::from_secs(30),
        }
    }
}

/// Configuration for a capture session.
#[derive(Debug, Clone)]
pub struct CaptureConfiguration {
    /// Sample rate in Hz (default: 44100).
    pub sample_rate: u32,

    /// Bit depth for PCM output (default: 16). Valid values: 16, 24, 32.
    pub bit_depth: u16,

    /// Number of channels (default: 1).
    pub channels: u16,

    /// Frames read from the input device per iteration (default: 1024).
    pub block_frames: usize,

    /// How long `stop()` waits for the worker to finish (default: 5s).
    pub stop_timeout: Duration,

    /// Write a `<recording>.metadata.json` sidecar on completion (default: false).
    pub write_metadata: bool,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if ![16, 24, 32].contains(&self.bit_depth) {
            return Err(format!("unsupported bit depth: {}", self.bit_depth));
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        if self.block_frames == 0 {
            return Err("block size must be positive".into());
        }
        Ok(())
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat::new(self.sample_rate, self.channels, self.bit_depth / 8)
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            bit_depth: 16,
            channels: 1,
            block_frames: 1024,
            stop_timeout: Duration::from_secs(5),
            write_metadata: false,
        }
    }
}
