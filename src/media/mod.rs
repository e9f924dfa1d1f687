//! Media sources: what the frame clock, renderer and controls drive.
//!
//! A source is polled once per UI frame; it returns a [`Presentation`] each
//! time a new frame becomes visible (and once more when playback pauses or
//! a seek lands), which is what feeds [`crate::core::FrameClock::present`].

pub mod playback;
pub mod video;

use image::RgbaImage;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

pub use playback::SegmentLoop;
pub use video::VideoMedia;

/// A decoded frame made visible at `media_time`.
#[derive(Debug, Clone)]
pub struct Presentation {
    pub media_time: f64,
    pub image: Arc<RgbaImage>,
    pub playing: bool,
}

#[derive(Debug)]
pub enum MediaError {
    Open(String),
    Decode(String),
    EndOfStream,
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::Open(msg) => write!(f, "Cannot open video: {}", msg),
            MediaError::Decode(msg) => write!(f, "Decode error: {}", msg),
            MediaError::EndOfStream => write!(f, "End of stream"),
        }
    }
}

impl std::error::Error for MediaError {}

pub trait MediaSource {
    /// Enough data to play (controls are no-ops until then)
    fn is_ready(&self) -> bool;
    fn intrinsic_size(&self) -> Option<(u32, u32)>;
    fn fps(&self) -> f64;
    fn duration(&self) -> f64;
    fn current_time(&self) -> f64;
    fn is_playing(&self) -> bool;
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, t: f64);
    /// Advance playback; Some when a new frame is presented.
    fn poll(&mut self, now: Instant) -> Option<Presentation>;
}
