// Slideshow encoding engine

pub mod core;
pub mod probe;

pub use self::core::*;
pub use probe::{FfprobeProbe, MediaInfo, MediaProbe};
