//! Viewport widget - video canvas plus the interactive overlay

use eframe::egui;
use glam::DVec2;
use log::trace;

use super::overlay::{HANDLE_SIZE, LANDMARK_RADIUS, LandmarkCommit, OverlayContext, OverlayEditor, OverlayHit, Side, handle_rect};
use super::viewport::{MAX_ZOOM, MIN_ZOOM, ZOOM_STEP};
use super::ViewportState;
use crate::entities::{AnnotationStore, BoxRect};

const BOX_COLOR: egui::Color32 = egui::Color32::from_rgb(0, 128, 0);
const HANDLE_COLOR: egui::Color32 = egui::Color32::from_rgb(255, 255, 255);
const LANDMARK_STROKE: egui::Color32 = egui::Color32::WHITE;

/// What the viewport asks of the app this frame.
#[derive(Debug, Default)]
pub struct ViewportResponse {
    /// Finished landmark drag to send to the backend
    pub commit: Option<LandmarkCommit>,
    pub hovered: bool,
}

fn screen_rect(state: &ViewportState, r: &BoxRect) -> egui::Rect {
    egui::Rect::from_two_pos(
        state.image_to_screen(DVec2::new(r.x, r.y)),
        state.image_to_screen(DVec2::new(r.x + r.width, r.y + r.height)),
    )
}

fn rgb(c: [u8; 3]) -> egui::Color32 {
    egui::Color32::from_rgb(c[0], c[1], c[2])
}

/// Zoom slider shown above the video
pub fn render_toolbar(ui: &mut egui::Ui, state: &mut ViewportState) {
    ui.horizontal(|ui| {
        let mut zoom = state.zoom;
        let slider = egui::Slider::new(&mut zoom, MIN_ZOOM..=MAX_ZOOM)
            .step_by(ZOOM_STEP as f64)
            .text("Zoom")
            .custom_formatter(|v, _| format!("{:.1}x", v));
        if ui.add(slider).changed() {
            state.set_zoom(zoom);
        }
        if ui.small_button("Reset").clicked() {
            state.reset();
        }
    });
}

/// Render the video texture and overlay inside the remaining space of `ui`.
pub fn render(
    ui: &mut egui::Ui,
    texture: Option<&egui::TextureHandle>,
    state: &mut ViewportState,
    overlay: &mut OverlayEditor,
    store: &mut AnnotationStore,
    ctx: &OverlayContext,
) -> ViewportResponse {
    let mut out = ViewportResponse::default();
    let panel_rect = ui.available_rect_before_wrap();
    let response = ui.allocate_rect(panel_rect, egui::Sense::click_and_drag());
    let painter = ui.painter_at(panel_rect);
    painter.rect_filled(panel_rect, 0.0, egui::Color32::BLACK);
    out.hovered = response.hovered();

    let Some(texture) = texture else {
        painter.text(
            panel_rect.center(),
            egui::Align2::CENTER_CENTER,
            "No video loaded",
            egui::FontId::proportional(20.0),
            egui::Color32::from_gray(160),
        );
        return out;
    };

    state.set_image_size(texture.size_vec2());
    state.set_panel(panel_rect);

    painter.image(
        texture.id(),
        state.image_screen_rect(),
        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
        egui::Color32::WHITE,
    );

    handle_input(ui, &response, state, overlay, store, ctx, &mut out);
    draw_overlay(&painter, state, overlay, store, ctx);
    out
}

fn handle_input(
    ui: &egui::Ui,
    response: &egui::Response,
    state: &mut ViewportState,
    overlay: &mut OverlayEditor,
    store: &mut AnnotationStore,
    ctx: &OverlayContext,
    out: &mut ViewportResponse,
) {
    if response.hovered() {
        let (scroll, ctrl) = ui.input(|i| (i.raw_scroll_delta.y, i.modifiers.command));
        if ctrl && scroll.abs() > 0.1 {
            state.set_zoom(state.zoom + ZOOM_STEP * scroll.signum());
        }
    }

    if let Some(pos) = response.hover_pos() {
        let p = state.screen_to_image(pos);
        let icon = match overlay.hit_test(store, ctx, p) {
            Some(OverlayHit::Handle(_, side)) if side.is_vertical() => Some(egui::CursorIcon::ResizeVertical),
            Some(OverlayHit::Handle(..)) => Some(egui::CursorIcon::ResizeHorizontal),
            Some(OverlayHit::Body(_)) | Some(OverlayHit::Landmark { .. }) => Some(egui::CursorIcon::Grab),
            None if state.zoom > MIN_ZOOM => Some(egui::CursorIcon::Move),
            None => None,
        };
        if let Some(icon) = icon {
            ui.ctx().set_cursor_icon(icon);
        }
    }

    if response.drag_started()
        && let Some(pos) = response.interact_pointer_pos()
    {
        let started = overlay.pointer_down(store, ctx, state.screen_to_image(pos));
        trace!("Viewport: pointer down at {:?}, gesture {}", pos, started);
    }
    if response.dragged() {
        if overlay.is_idle() {
            if state.handle_pan(response.drag_delta()) {
                ui.ctx().request_repaint();
            }
        } else if let Some(pos) = response.interact_pointer_pos() {
            overlay.pointer_move(store, state.screen_to_image(pos));
        }
    }
    if response.drag_stopped() {
        out.commit = overlay.pointer_up(store);
    }
    if !overlay.is_idle() && ui.input(|i| i.key_pressed(egui::Key::Escape)) {
        overlay.cancel(store);
    }
}

fn draw_overlay(
    painter: &egui::Painter,
    state: &ViewportState,
    overlay: &OverlayEditor,
    store: &AnnotationStore,
    ctx: &OverlayContext,
) {
    let scale = state.scale();

    if OverlayEditor::box_editable(ctx)
        && let Some(tb) = OverlayEditor::visible_task_box(store, ctx)
    {
        let rect = tb.rect();
        let stroke = egui::Stroke::new((super::overlay::BOX_STROKE as f32 * scale).max(1.0), BOX_COLOR);
        painter.rect_stroke(screen_rect(state, &rect), 0.0, stroke, egui::StrokeKind::Middle);
        for side in Side::ALL {
            let handle = screen_rect(state, &handle_rect(&rect, side, HANDLE_SIZE));
            painter.rect_filled(handle, 1.0, HANDLE_COLOR);
        }
    }

    if let Some((_, _, handles)) = overlay.landmark_handles(store, ctx) {
        let radius = (LANDMARK_RADIUS as f32 * scale).max(3.0);
        for h in handles {
            let center = state.image_to_screen(h.center);
            painter.circle(center, radius, rgb(h.color), egui::Stroke::new(2.0, LANDMARK_STROKE));
        }
    }
}
