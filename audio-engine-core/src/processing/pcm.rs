//! Sample conversions between in-memory sample types and PCM byte layouts.

/// Convert f32 samples `[-1.0, 1.0]` to 16-bit little-endian PCM.
///
/// Clamps out-of-range values. Output length = `samples.len() * 2` bytes.
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        data.extend_from_slice(&value.to_le_bytes());
    }
    data
}

/// Pack integer samples into little-endian PCM of `sample_width` bytes.
///
/// Samples are expected to already fit the target width (as decoded from a
/// file of that bit depth).
pub fn ints_to_pcm(samples: &[i32], sample_width: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * sample_width);
    for &sample in samples {
        data.extend_from_slice(&sample.to_le_bytes()[..sample_width]);
    }
    data
}

/// Decode 16-bit little-endian PCM into `out`, returning how many samples were written.
pub fn pcm16_to_i16(bytes: &[u8], out: &mut [i16]) -> usize {
    let count = (bytes.len() / 2).min(out.len());
    for (i, chunk) in bytes.chunks_exact(2).take(count).enumerate() {
        out[i] = i16::from_le_bytes([chunk[0], chunk[1]]);
    }
    count
}

/// Encode i16 samples as 16-bit little-endian PCM.
pub fn i16_to_pcm16(samples: &[i16]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        data.extend_from_slice(&sample.to_le_bytes());
    }
    data
}
