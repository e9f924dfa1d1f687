//! Segment timeline rendering and pointer handling.

use eframe::egui::{self, Color32, Pos2, Rect, Sense, Stroke, Ui, Vec2};

use super::regions::{EDGE_THRESHOLD, MAX_ZOOM, MIN_ZOOM, SegmentTimeline, detect_region_tool};
use crate::entities::AnnotationStore;

const RULER_HEIGHT: f32 = 18.0;
const TRACK_HEIGHT: f32 = 64.0;
const REGION_FILL: Color32 = Color32::from_rgba_premultiplied(40, 70, 64, 90);
const REGION_STROKE: Color32 = Color32::from_rgb(74, 128, 116);
const SELECTION_FILL: Color32 = Color32::from_rgba_premultiplied(60, 60, 90, 80);
const PLAYHEAD: Color32 = Color32::from_rgb(255, 220, 100);

/// What the timeline asks of the player this frame.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct TimelineResponse {
    pub seek: Option<f64>,
    pub hovered: bool,
}

fn time_to_x(t: f64, origin_x: f32, px_per_sec: f64) -> f32 {
    origin_x + (t * px_per_sec) as f32
}

fn x_to_time(x: f32, origin_x: f32, px_per_sec: f64) -> f64 {
    ((x - origin_x) as f64 / px_per_sec).max(0.0)
}

/// Pick a ruler step that keeps labels roughly 60px apart.
fn ruler_step(px_per_sec: f64) -> f64 {
    const STEPS: [f64; 9] = [0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0];
    STEPS
        .iter()
        .copied()
        .find(|s| s * px_per_sec >= 60.0)
        .unwrap_or(120.0)
}

pub fn render_toolbar(ui: &mut Ui, timeline: &mut SegmentTimeline) {
    ui.horizontal(|ui| {
        ui.strong("Timeline");
        ui.separator();
        let mut zoom = timeline.zoom;
        let slider = egui::Slider::new(&mut zoom, MIN_ZOOM..=MAX_ZOOM)
            .step_by(0.1)
            .text("Zoom")
            .custom_formatter(|v, _| format!("{:.1}x", v));
        if ui.add(slider).changed() {
            timeline.set_zoom(zoom);
        }
        ui.weak("Drag on empty space to add a segment");
    });
}

pub fn render_timeline(
    ui: &mut Ui,
    timeline: &mut SegmentTimeline,
    store: &mut AnnotationStore,
    media_time: f64,
    duration: f64,
) -> TimelineResponse {
    let mut out = TimelineResponse::default();
    render_toolbar(ui, timeline);

    let px_per_sec = timeline.px_per_sec(duration);
    let content_width = (duration.max(0.0) * px_per_sec) as f32;

    egui::ScrollArea::horizontal().id_salt("segment_timeline").show(ui, |ui| {
        let width = content_width.max(ui.available_width());
        let (response, painter) = ui.allocate_painter(Vec2::new(width, RULER_HEIGHT + TRACK_HEIGHT), Sense::click_and_drag());
        let rect = response.rect;
        let origin_x = rect.min.x;
        let ruler = Rect::from_min_size(rect.min, Vec2::new(width, RULER_HEIGHT));
        let track = Rect::from_min_max(Pos2::new(rect.min.x, ruler.max.y), rect.max);

        // Ruler
        painter.rect_filled(ruler, 0.0, ui.visuals().faint_bg_color);
        painter.rect_filled(track, 2.0, ui.visuals().extreme_bg_color);
        let step = ruler_step(px_per_sec);
        let mut t = 0.0;
        while t <= duration {
            let x = time_to_x(t, origin_x, px_per_sec);
            painter.line_segment(
                [Pos2::new(x, ruler.max.y - 5.0), Pos2::new(x, ruler.max.y)],
                Stroke::new(1.0, Color32::GRAY),
            );
            painter.text(
                Pos2::new(x + 2.0, ruler.min.y + 1.0),
                egui::Align2::LEFT_TOP,
                format!("{:.2}s", t),
                egui::FontId::proportional(10.0),
                Color32::GRAY,
            );
            t += step;
        }

        // Regions
        for region in timeline.regions() {
            let x0 = time_to_x(region.start, origin_x, px_per_sec);
            let x1 = time_to_x(region.end, origin_x, px_per_sec);
            let r = Rect::from_min_max(Pos2::new(x0, track.min.y + 2.0), Pos2::new(x1, track.max.y - 2.0));
            painter.rect_filled(r, 3.0, REGION_FILL);
            painter.rect_stroke(r, 3.0, Stroke::new(1.5, REGION_STROKE), egui::StrokeKind::Inside);
            painter.text(
                r.left_top() + Vec2::new(4.0, 3.0),
                egui::Align2::LEFT_TOP,
                &region.label,
                egui::FontId::proportional(11.0),
                ui.visuals().strong_text_color(),
            );
        }
        if let Some((a, b)) = timeline.selection() {
            let r = Rect::from_min_max(
                Pos2::new(time_to_x(a, origin_x, px_per_sec), track.min.y),
                Pos2::new(time_to_x(b, origin_x, px_per_sec), track.max.y),
            );
            painter.rect_filled(r, 0.0, SELECTION_FILL);
        }

        // Playhead
        let x = time_to_x(media_time, origin_x, px_per_sec);
        painter.line_segment([Pos2::new(x, ruler.min.y), Pos2::new(x, track.max.y)], Stroke::new(2.0, PLAYHEAD));

        // Hover cursor
        let hover_tool = response.hover_pos().and_then(|pos| {
            track.contains(pos).then(|| {
                timeline.regions().iter().rev().find_map(|region| {
                    let x0 = time_to_x(region.start, origin_x, px_per_sec);
                    let x1 = time_to_x(region.end, origin_x, px_per_sec);
                    detect_region_tool(pos.x, x0, x1, EDGE_THRESHOLD).map(|tool| (region.id, tool))
                })
            })?
        });
        if let Some((_, tool)) = hover_tool {
            ui.ctx().set_cursor_icon(tool.cursor());
        }
        out.hovered = response.hovered();

        // Interaction
        if response.drag_started() {
            if let Some(pos) = response.interact_pointer_pos() {
                let t = x_to_time(pos.x, origin_x, px_per_sec);
                match hover_tool {
                    Some((id, tool)) => {
                        timeline.begin_region_drag(id, tool, t);
                    }
                    None => timeline.begin_select(t),
                }
            }
        }
        if response.dragged() {
            if let Some(pos) = response.interact_pointer_pos() {
                let t = x_to_time(pos.x, origin_x, px_per_sec);
                if let Some(seek) = timeline.update_drag(store, t, duration) {
                    out.seek = Some(seek);
                }
            }
        }
        if response.drag_stopped() {
            out.seek = timeline.end_drag(store).or(out.seek);
        }
        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                out.seek = Some(x_to_time(pos.x, origin_x, px_per_sec).min(duration));
            }
        }
        if timeline.drag.is_some() && ui.input(|i| i.key_pressed(egui::Key::Escape)) {
            timeline.cancel_drag(store);
        }
    });

    out
}
