//! Viewport widget - video canvas with pan/zoom and the overlay editor

pub mod coords;
pub mod overlay;
mod viewport;
mod viewport_ui;

pub use overlay::{LandmarkCommit, OverlayContext, OverlayEditor, PointerCaptures};
pub use viewport::ViewportState;
pub use viewport_ui::{ViewportResponse, render, render_toolbar};
