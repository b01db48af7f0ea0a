//! RIFF/WAVE header layout for the capture sink.
//!
//! The sink writes a placeholder header when it opens and rewrites it with
//! the final sizes when it is finalized.
//!
//! ```text
//! [0-3]    "RIFF"
//! [4-7]    36 + data_size
//! [8-11]   "WAVE"
//! [12-15]  "fmt "
//! [16-19]  16 (PCM format chunk size)
//! [20-21]  1 (PCM format code)
//! [22-23]  channels
//! [24-27]  sample_rate
//! [28-31]  byte_rate = sample_rate * bytes_per_frame
//! [32-33]  block_align = bytes_per_frame
//! [34-35]  bits per sample
//! [36-39]  "data"
//! [40-43]  data_size
//! ```

use crate::models::audio_frame::AudioFormat;
use crate::models::error::EngineError;

/// Size of the canonical PCM WAV header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Largest data chunk a 32-bit RIFF header can describe.
pub const MAX_DATA_SIZE: u64 = u32::MAX as u64 - 36;

/// Encode the 44-byte header for `data_size` bytes of PCM in `format`.
pub fn encode_header(format: AudioFormat, data_size: u64) -> Result<[u8; WAV_HEADER_SIZE], EngineError> {
    if data_size > MAX_DATA_SIZE {
        return Err(EngineError::Storage(format!(
            "{} bytes of audio exceed the WAV size limit",
            data_size
        )));
    }
    let data_size = data_size as u32;
    let block_align = format.bytes_per_frame() as u16;
    let byte_rate = format.sample_rate * block_align as u32;

    let mut header = [0u8; WAV_HEADER_SIZE];
    let fields: [(usize, &[u8]); 13] = [
        (0, b"RIFF"),
        (4, &(36 + data_size).to_le_bytes()),
        (8, b"WAVE"),
        (12, b"fmt "),
        (16, &16u32.to_le_bytes()),
        (20, &1u16.to_le_bytes()),
        (22, &format.channels.to_le_bytes()),
        (24, &format.sample_rate.to_le_bytes()),
        (28, &byte_rate.to_le_bytes()),
        (32, &block_align.to_le_bytes()),
        (34, &format.bit_depth().to_le_bytes()),
        (36, b"data"),
        (40, &data_size.to_le_bytes()),
    ];
    for (offset, bytes) in fields {
        header[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16_at(header: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([header[offset], header[offset + 1]])
    }

    fn u32_at(header: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(header[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn chunk_tags() {
        let header = encode_header(AudioFormat::pcm16(44100, 1), 0).unwrap();
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(&header[36..40], b"data");
        assert_eq!(u16_at(&header, 20), 1);
        assert_eq!(u32_at(&header, 16), 16);
    }

    #[test]
    fn mono_16bit_fields() {
        let header = encode_header(AudioFormat::pcm16(44100, 1), 88200).unwrap();

        assert_eq!(u16_at(&header, 22), 1);
        assert_eq!(u32_at(&header, 24), 44100);
        assert_eq!(u32_at(&header, 28), 88200); // 44100 * 1 * 2
        assert_eq!(u16_at(&header, 32), 2);
        assert_eq!(u16_at(&header, 34), 16);
        assert_eq!(u32_at(&header, 40), 88200);
        assert_eq!(u32_at(&header, 4), 36 + 88200);
    }

    #[test]
    fn stereo_24bit_fields() {
        let header = encode_header(AudioFormat::new(48000, 2, 3), 0).unwrap();
        assert_eq!(u32_at(&header, 28), 288000);
        assert_eq!(u16_at(&header, 32), 6);
        assert_eq!(u16_at(&header, 34), 24);
    }

    #[test]
    fn oversized_data_is_rejected() {
        let err = encode_header(AudioFormat::pcm16(44100, 1), MAX_DATA_SIZE + 1).unwrap_err();
        assert!(matches!(err, EngineError::Storage(_)));
    }

    #[test]
    fn parses_back_with_hound() {
        let mut bytes = encode_header(AudioFormat::pcm16(16000, 1), 4).unwrap().to_vec();
        bytes.extend_from_slice(&[0x01, 0x00, 0xFF, 0x7F]);

        let reader = hound::WavReader::new(std::io::Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.duration(), 2);
    }
}
