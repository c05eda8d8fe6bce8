pub mod catalog;
pub mod liked;
pub mod log;
pub mod playback;
