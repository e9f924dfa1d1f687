//! Cycle plot: trace, cycle markers, playhead and the editing toolbar.

use eframe::egui::{self, Color32, Pos2, Rect, Sense, Shape, Stroke, Ui, Vec2};

use super::editor::{ClickOutcome, CycleEditor, CycleMode, Cycles, QuickAdd, line_plot, nearest_sample};
use crate::entities::{AnalysisPayload, Task};

const PLOT_HEIGHT: f32 = 320.0;
const MARGIN: f32 = 8.0;
const MARKER_RADIUS: f32 = 5.0;

const TRACE: Color32 = Color32::from_rgb(0x1f, 0x77, 0xb4);
const PEAK: Color32 = Color32::from_rgb(0x41, 0x33, 0x7a);
const VALLEY_START: Color32 = Color32::from_rgb(0x76, 0xb0, 0x41);
const VALLEY_END: Color32 = Color32::RED;
const SELECTED: Color32 = Color32::from_rgb(0x01, 0xfd, 0xf6);
const PENDING_START: Color32 = Color32::from_rgb(0, 128, 0);
const PENDING_PEAK: Color32 = Color32::from_rgb(128, 0, 128);
const SHADE: Color32 = Color32::from_rgba_premultiplied(51, 51, 51, 102);

/// Requests emitted by the cycle plot for this frame.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CyclesResponse {
    /// Seek target; the caller pauses playback too
    pub seek: Option<f64>,
    /// Edited series to commit to the task payload
    pub changed: Option<Cycles>,
}

/// Cycle editor plus the prompt/alert line shown under the plot.
#[derive(Debug, Default)]
pub struct CyclesPanel {
    pub editor: CycleEditor,
    message: Option<(String, bool)>,
}

impl CyclesPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_ref().map(|(m, _)| m.as_str())
    }

    fn prompt(&mut self, msg: impl Into<String>) {
        self.message = Some((msg.into(), false));
    }

    fn alert(&mut self, msg: impl Into<String>) {
        self.message = Some((msg.into(), true));
    }

    pub fn cancel(&mut self) {
        self.editor.cancel();
        self.message = None;
    }
}

struct PlotFrame {
    rect: Rect,
    x_range: (f64, f64),
    y_range: (f64, f64),
}

impl PlotFrame {
    fn to_screen(&self, x: f64, y: f64) -> Pos2 {
        let (x0, x1) = self.x_range;
        let (y0, y1) = self.y_range;
        let fx = ((x - x0) / (x1 - x0).max(f64::EPSILON)) as f32;
        let fy = ((y - y0) / (y1 - y0).max(f64::EPSILON)) as f32;
        Pos2::new(
            self.rect.min.x + fx * self.rect.width(),
            self.rect.max.y - fy * self.rect.height(),
        )
    }

    fn x_at(&self, sx: f32) -> f64 {
        let (x0, x1) = self.x_range;
        let f = ((sx - self.rect.min.x) / self.rect.width().max(1.0)) as f64;
        x0 + f.clamp(0.0, 1.0) * (x1 - x0)
    }

    fn shade(&self, painter: &egui::Painter, from: f64, to: f64) {
        if to <= from {
            return;
        }
        let a = self.to_screen(from.max(self.x_range.0), self.y_range.0);
        let b = self.to_screen(to.min(self.x_range.1), self.y_range.1);
        painter.rect_filled(Rect::from_two_pos(a, b), 0.0, SHADE);
    }
}

fn y_range(trace: &[f64]) -> (f64, f64) {
    let min = trace.iter().copied().fold(f64::INFINITY, f64::min);
    let max = trace.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON { (min - 0.5, max + 0.5) } else { (min, max) }
}

fn markers(painter: &egui::Painter, frame: &PlotFrame, pts: impl Iterator<Item = (f64, f64)>, color: Color32) {
    for (x, y) in pts {
        painter.circle_filled(frame.to_screen(x, y), MARKER_RADIUS, color);
    }
}

fn toolbar(ui: &mut Ui, panel: &mut CyclesPanel) {
    ui.horizontal(|ui| {
        if ui.button("Add Cycle").clicked() {
            panel.editor.start_add();
            panel.prompt("Please select the new valley start point.");
        }
        if ui.button("Remove Cycle").clicked() {
            panel.editor.start_remove();
            panel.prompt("Click on any point from the cycle you want to remove.");
        }
        ui.separator();
        ui.weak("Hold Q / W / E and click to add a peak / valley start / valley end");
    });
}

/// Draw the cycle plot for `task` and handle clicks. Returns None when the
/// payload has no trace or cycle series.
pub fn render_cycles(
    ui: &mut Ui,
    panel: &mut CyclesPanel,
    task: &Task,
    data: &AnalysisPayload,
    media_time: f64,
) -> Option<CyclesResponse> {
    let trace = line_plot(data)?;
    let mut cycles = Cycles::from_payload(data)?;
    let mut out = CyclesResponse::default();

    toolbar(ui, panel);

    let quick = ui.input(|i| {
        if i.key_down(egui::Key::Q) {
            Some(QuickAdd::Peak)
        } else if i.key_down(egui::Key::W) {
            Some(QuickAdd::ValleyStart)
        } else if i.key_down(egui::Key::E) {
            Some(QuickAdd::ValleyEnd)
        } else {
            None
        }
    });
    panel.editor.set_quick_add(quick);
    if ui.input(|i| i.key_pressed(egui::Key::Escape)) {
        panel.cancel();
    }

    let width = ui.available_width();
    let (response, painter) = ui.allocate_painter(Vec2::new(width, PLOT_HEIGHT), Sense::click());
    painter.rect_filled(response.rect, 6.0, Color32::WHITE);
    let frame = PlotFrame {
        rect: response.rect.shrink(MARGIN),
        x_range: (task.start, task.end.max(task.start + f64::EPSILON)),
        y_range: y_range(&trace.data),
    };

    // Playhead sits under everything else
    if media_time >= frame.x_range.0 && media_time <= frame.x_range.1 {
        let top = frame.to_screen(media_time, frame.y_range.1);
        let bottom = frame.to_screen(media_time, frame.y_range.0);
        painter.line_segment([top, bottom], Stroke::new(1.0, Color32::GRAY));
    }

    let line: Vec<Pos2> = trace
        .points()
        .filter(|(x, _)| *x >= frame.x_range.0 && *x <= frame.x_range.1)
        .map(|(x, y)| frame.to_screen(x, y))
        .collect();
    if line.len() >= 2 {
        painter.add(Shape::line(line, Stroke::new(1.5, TRACE)));
    }

    markers(&painter, &frame, cycles.peaks.points(), PEAK);
    markers(&painter, &frame, cycles.valleys_start.points(), VALLEY_START);
    markers(&painter, &frame, cycles.valleys_end.points(), VALLEY_END);

    match panel.editor.mode() {
        CycleMode::Reposition { idx } | CycleMode::ConfirmRemove { idx } => {
            if let (Some(&x), Some(&y)) = (cycles.peaks.time.get(idx), cycles.peaks.data.get(idx)) {
                painter.circle_filled(frame.to_screen(x, y), MARKER_RADIUS + 1.5, SELECTED);
            }
        }
        _ => {}
    }
    let (pending_start, pending_peak) = panel.editor.pending_points();
    if let Some((x, y)) = pending_start {
        painter.circle_stroke(frame.to_screen(x, y), MARKER_RADIUS + 1.0, Stroke::new(2.0, PENDING_START));
    }
    if let Some((x, y)) = pending_peak {
        painter.circle_stroke(frame.to_screen(x, y), MARKER_RADIUS + 1.0, Stroke::new(2.0, PENDING_PEAK));
    }
    if let Some((vs, ve)) = panel.editor.focus_span(&cycles) {
        frame.shade(&painter, frame.x_range.0, vs);
        frame.shade(&painter, ve, frame.x_range.1);
    }

    if response.clicked() {
        if let Some(pos) = response.interact_pointer_pos() {
            let x = frame.x_at(pos.x);
            // Clicks snap onto the trace
            let (x, y) = nearest_sample(&trace, x).unwrap_or((x, 0.0));
            out.seek = Some(x);
            match panel.editor.click(&mut cycles, x, y) {
                Ok(ClickOutcome::Changed) => {
                    panel.message = None;
                    out.changed = Some(cycles.clone());
                }
                Ok(ClickOutcome::Pending(msg)) => panel.prompt(msg),
                Ok(ClickOutcome::Selected(_)) => {
                    if matches!(panel.editor.mode(), CycleMode::ConfirmRemove { .. }) {
                        panel.alert("All points in this cycle will be removed. Are you sure?");
                    } else {
                        panel.prompt("Select the new peak position inside the highlighted cycle.");
                    }
                }
                Ok(ClickOutcome::Ignored) => {}
                Err(e) => panel.alert(e.to_string()),
            }
        }
    }

    if let Some((msg, is_alert)) = panel.message.clone() {
        ui.horizontal(|ui| {
            if is_alert {
                ui.colored_label(ui.visuals().warn_fg_color, msg);
            } else {
                ui.label(msg);
            }
            if matches!(panel.editor.mode(), CycleMode::ConfirmRemove { .. }) && ui.button("Remove").clicked() {
                match panel.editor.confirm_remove(&mut cycles) {
                    Ok(ClickOutcome::Changed) => {
                        panel.message = None;
                        out.changed = Some(cycles.clone());
                    }
                    Ok(_) => {}
                    Err(e) => panel.alert(e.to_string()),
                }
            }
            if ui.small_button("Cancel").clicked() {
                panel.cancel();
            }
        });
    }

    Some(out)
}
