use eframe::egui;
use glam::{DAffine2, DVec2};
use log::debug;

use super::coords::{clamp_pan, pointer_to_viewport, rescale_pan, view_transform};

pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 10.0;
pub const ZOOM_STEP: f32 = 0.1;

/// Viewport state for pan/zoom
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct ViewportState {
    pub zoom: f32,
    pub pan: egui::Vec2,
    #[serde(skip)]
    pub image_size: egui::Vec2,
    /// Panel rect the video was last laid out in
    #[serde(skip)]
    pub panel: egui::Rect,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: egui::Vec2::ZERO,
            image_size: egui::Vec2::ZERO,
            panel: egui::Rect::NOTHING,
        }
    }
}

fn dvec(v: egui::Vec2) -> DVec2 {
    DVec2::new(v.x as f64, v.y as f64)
}

impl ViewportState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset viewport to default zoom and pan
    pub fn reset(&mut self) {
        self.zoom = 1.0;
        self.pan = egui::Vec2::ZERO;
    }

    pub fn set_image_size(&mut self, size: egui::Vec2) {
        self.image_size = size;
        self.clamp();
    }

    /// Update panel rect (called every frame before drawing)
    pub fn set_panel(&mut self, panel: egui::Rect) {
        if self.panel != panel {
            self.panel = panel;
            self.clamp();
        }
    }

    /// Size of the fitted video at zoom 1, which bounds panning.
    pub fn container_size(&self) -> DVec2 {
        if !self.has_geometry() {
            return DVec2::ZERO;
        }
        let image = dvec(self.image_size);
        image * super::coords::fit_scale(image, dvec(self.panel.size()))
    }

    fn has_geometry(&self) -> bool {
        self.image_size.x > 0.0 && self.image_size.y > 0.0 && self.panel.is_positive()
    }

    /// Set zoom (clamped to 1..10), keeping the effective translation.
    pub fn set_zoom(&mut self, zoom: f32) {
        let new_zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        if (new_zoom - self.zoom).abs() < f32::EPSILON {
            return;
        }
        let pan = rescale_pan(dvec(self.pan), self.zoom as f64, new_zoom as f64);
        self.zoom = new_zoom;
        self.pan = egui::vec2(pan.x as f32, pan.y as f32);
        self.clamp();
        debug!("Zoom: {:.1}x, Pan: ({:.1}, {:.1})", self.zoom, self.pan.x, self.pan.y);
    }

    /// Pan by a screen delta. Only allowed while zoomed in.
    pub fn handle_pan(&mut self, delta: egui::Vec2) -> bool {
        if self.zoom <= MIN_ZOOM {
            return false;
        }
        self.pan += delta;
        self.clamp();
        true
    }

    fn clamp(&mut self) {
        let pan = clamp_pan(dvec(self.pan), self.zoom as f64, self.container_size());
        self.pan = egui::vec2(pan.x as f32, pan.y as f32);
    }

    /// Video pixel space -> screen transform; None until both the image and
    /// the panel have a size.
    pub fn transform(&self) -> Option<DAffine2> {
        self.has_geometry().then(|| {
            view_transform(
                dvec(self.image_size),
                dvec(self.panel.min.to_vec2()),
                dvec(self.panel.size()),
                self.zoom as f64,
                dvec(self.pan),
            )
        })
    }

    pub fn image_to_screen(&self, p: DVec2) -> egui::Pos2 {
        let s = self.transform().map(|t| t.transform_point2(p)).unwrap_or(p);
        egui::pos2(s.x as f32, s.y as f32)
    }

    pub fn screen_to_image(&self, pos: egui::Pos2) -> DVec2 {
        pointer_to_viewport(DVec2::new(pos.x as f64, pos.y as f64), self.transform().as_ref())
    }

    /// Screen pixels per video pixel.
    pub fn scale(&self) -> f32 {
        self.transform().map(|t| t.matrix2.x_axis.x as f32).unwrap_or(1.0)
    }

    pub fn image_screen_rect(&self) -> egui::Rect {
        let min = self.image_to_screen(DVec2::ZERO);
        let max = self.image_to_screen(dvec(self.image_size));
        egui::Rect::from_min_max(min, max)
    }
}
