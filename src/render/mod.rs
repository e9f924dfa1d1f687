//! CPU canvas: video frame plus detection boxes and landmarks, rasterized
//! at the video's intrinsic resolution.

pub mod canvas;
pub mod raster;

pub use canvas::{CanvasRenderer, RenderContext};
