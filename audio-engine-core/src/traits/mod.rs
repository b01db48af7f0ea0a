pub mod callbacks;
pub mod device;
pub mod frame_source;
