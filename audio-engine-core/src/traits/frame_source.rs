use std::fmt::Display;

use crate::models::audio_frame::{AudioFormat, AudioFrame};
use crate::models::error::EngineError;

/// Anything that yields successive blocks of PCM audio.
///
/// Implemented by:
/// - `WavFileSource` (pre-rendered files, fixed-size blocks, known length)
/// - `IterSource` (speech synthesis generators and other iterators)
pub trait FrameSource: Send {
    /// Next block of audio, `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<AudioFrame>, EngineError>;

    /// Format of every frame, if known before the first one is pulled.
    fn format(&self) -> Option<AudioFormat> {
        None
    }

    /// Total number of PCM frames, if known up front.
    fn total_frames(&self) -> Option<u64> {
        None
    }
}

/// Adapts an iterator of frames into a [`FrameSource`].
///
/// Iterator errors are converted into [`EngineError::Source`].
pub struct IterSource<I> {
    iter: I,
    format: Option<AudioFormat>,
    total_frames: Option<u64>,
}

impl<I, E> IterSource<I>
where
    I: Iterator<Item = Result<AudioFrame, E>> + Send,
    E: Display,
{
    pub fn new(iter: I) -> Self {
        Self {
            iter,
            format: None,
            total_frames: None,
        }
    }

    /// Declare the format up front, for consumers that need it before the first frame.
    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_total_frames(mut self, total_frames: u64) -> Self {
        self.total_frames = Some(total_frames);
        self
    }
}

impl IterSource<std::vec::IntoIter<Result<AudioFrame, EngineError>>> {
    /// A finite source over already-produced frames.
    pub fn from_frames(frames: Vec<AudioFrame>) -> Self {
        let format = frames.first().map(|f| f.format());
        let total = frames.iter().map(|f| f.frame_count() as u64).sum();
        let mut source = Self::new(frames.into_iter().map(Ok).collect::<Vec<_>>().into_iter())
            .with_total_frames(total);
        source.format = format;
        source
    }
}

impl<I, E> FrameSource for IterSource<I>
where
    I: Iterator<Item = Result<AudioFrame, E>> + Send,
    E: Display,
{
    fn next_frame(&mut self) -> Result<Option<AudioFrame>, EngineError> {
        match self.iter.next() {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) => Err(EngineError::Source(e.to_string())),
            None => Ok(None),
        }
    }

    fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_frames_reports_metadata() {
        let format = AudioFormat::pcm16(16000, 1);
        let frames = vec![AudioFrame::silence(100, format), AudioFrame::silence(50, format)];
        let mut source = IterSource::from_frames(frames);

        assert_eq!(source.format(), Some(format));
        assert_eq!(source.total_frames(), Some(150));
        assert_eq!(source.next_frame().unwrap().unwrap().frame_count(), 100);
        assert_eq!(source.next_frame().unwrap().unwrap().frame_count(), 50);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn iterator_errors_become_source_errors() {
        let items: Vec<Result<AudioFrame, String>> = vec![Err("voice model crashed".to_string())];
        let mut source = IterSource::new(items.into_iter());

        assert_eq!(
            source.next_frame().unwrap_err(),
            EngineError::Source("voice model crashed".into())
        );
    }
}
