pub mod byte_accumulator;
pub mod pcm;
pub mod relay_queue;
pub mod stream_renderer;
pub mod wav_format;
