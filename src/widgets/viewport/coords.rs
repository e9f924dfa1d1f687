//! Coordinate conversion between screen, video pixel and landmark spaces.
//!
//! Conventions:
//! - Screen and video pixel space: +Y is down, origin top-left.
//! - Stored annotations are always in video pixel space.
//! - Landmarks from the backend are relative to a task box cropped with a
//!   12.5% margin on each side, hence [`LANDMARK_INSET`].

use glam::{DAffine2, DVec2};

use crate::entities::BoxRect;

/// Fraction of the task box size trimmed off by the analysis crop.
pub const LANDMARK_INSET: f64 = 0.125;

/// Scale that fits `image` inside `panel`, preserving aspect.
pub fn fit_scale(image: DVec2, panel: DVec2) -> f64 {
    if image.x <= 0.0 || image.y <= 0.0 || panel.x <= 0.0 || panel.y <= 0.0 {
        return 1.0;
    }
    (panel.x / image.x).min(panel.y / image.y)
}

/// Video pixel space -> screen space.
///
/// The image is fitted and centered in the panel, then scaled by `zoom`
/// around the panel center and shifted by `pan` (screen pixels).
pub fn view_transform(image: DVec2, panel_min: DVec2, panel_size: DVec2, zoom: f64, pan: DVec2) -> DAffine2 {
    let scale = fit_scale(image, panel_size) * zoom;
    DAffine2::from_translation(panel_min + panel_size * 0.5 + pan)
        * DAffine2::from_scale(DVec2::splat(scale))
        * DAffine2::from_translation(-image * 0.5)
}

/// Map a pointer position into video pixel space.
///
/// Without a usable transform the raw pointer position is returned.
pub fn pointer_to_viewport(pointer: DVec2, transform: Option<&DAffine2>) -> DVec2 {
    match transform {
        Some(t) if t.matrix2.determinant().abs() > f64::EPSILON && t.is_finite() => t.inverse().transform_point2(pointer),
        _ => pointer,
    }
}

/// Backend landmark coordinate -> video pixel space.
pub fn task_local_to_landmark_local(point: DVec2, rect: &BoxRect) -> DVec2 {
    DVec2::new(
        point.x + rect.x - rect.width * LANDMARK_INSET,
        point.y + rect.y - rect.height * LANDMARK_INSET,
    )
}

/// Inverse of [`task_local_to_landmark_local`], used when a landmark is dragged.
pub fn landmark_local_to_task_local(local: DVec2, rect: &BoxRect) -> DVec2 {
    DVec2::new(
        local.x - rect.x + rect.width * LANDMARK_INSET,
        local.y - rect.y + rect.height * LANDMARK_INSET,
    )
}

/// Largest pan offset per axis at `zoom` for a container of `size`.
pub fn max_pan(zoom: f64, size: DVec2) -> DVec2 {
    (size * (zoom - 1.0).max(0.0) * 0.5).max(DVec2::ZERO)
}

pub fn clamp_pan(pan: DVec2, zoom: f64, size: DVec2) -> DVec2 {
    let limit = max_pan(zoom, size);
    pan.clamp(-limit, limit)
}

/// Keep the effective translation when zoom changes.
pub fn rescale_pan(pan: DVec2, old_zoom: f64, new_zoom: f64) -> DVec2 {
    if old_zoom <= 0.0 {
        return pan;
    }
    pan / old_zoom * new_zoom
}
