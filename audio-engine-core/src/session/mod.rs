mod control;

pub mod capture;
pub mod file_playback;
pub mod streaming;
