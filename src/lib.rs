//! Supervised ffmpeg slideshow encoding.
//!
//! [`engine::Slideshow`] turns a numbered still sequence into a video,
//! streams progress to a callback, and only reports success once the output
//! file has been probed and checked.

pub mod config;
pub mod engine;
pub mod logging;
