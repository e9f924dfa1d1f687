//! Per-tick canvas renderer.
//!
//! Each render clears the canvas, draws the video frame clipped to a rounded
//! rectangle, then the detection boxes (outside task windows, when not on the
//! task-details screen) or the selected task's landmarks (task details while
//! playing). The output depends only on the frame image and the render
//! context, so rendering the same pair twice yields the same raster.

use glam::DVec2;
use image::RgbaImage;
use log::{debug, trace};

use super::raster::{self, Color};
use crate::core::frame_clock::landmark_frame_index;
use crate::entities::{AnnotationStore, LandmarkFrame, TaskId, bbox::detections_at};
use crate::screen::Screen;
use crate::widgets::viewport::coords::task_local_to_landmark_local;

pub const CORNER_RADIUS: f64 = 20.0;
pub const BOX_LINE_WIDTH: f64 = 10.0;
pub const LANDMARK_RADIUS: f64 = 12.5;
/// Side of the marker drawn for single-point landmark frames
pub const SINGLE_POINT_SIZE: f64 = 30.0;

const SUBJECT_COLOR: Color = [0, 128, 0, 255];
const OTHER_COLOR: Color = [255, 0, 0, 255];

/// Everything a render reads besides the frame image.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub frame: i64,
    pub media_time: f64,
    pub playing: bool,
    pub screen: Screen,
    pub selected_task: Option<TaskId>,
    pub store: &'a AnnotationStore,
    pub landmark_color: [u8; 3],
}

#[derive(Default)]
pub struct CanvasRenderer {
    canvas: Option<RgbaImage>,
    renders: u64,
}

impl CanvasRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the canvas from the video's intrinsic dimensions.
    ///
    /// Only the first call takes effect; later size changes are ignored.
    pub fn set_intrinsic_size(&mut self, width: u32, height: u32) -> bool {
        if self.canvas.is_some() || width == 0 || height == 0 {
            return false;
        }
        debug!("Canvas sized to {}x{}", width, height);
        self.canvas = Some(RgbaImage::new(width, height));
        true
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.canvas.as_ref().map(|c| c.dimensions())
    }

    pub fn canvas(&self) -> Option<&RgbaImage> {
        self.canvas.as_ref()
    }

    pub fn render_count(&self) -> u64 {
        self.renders
    }

    /// Forget the canvas (media swapped).
    pub fn reset(&mut self) {
        self.canvas = None;
    }

    pub fn render(&mut self, frame_image: &RgbaImage, ctx: &RenderContext) -> Option<&RgbaImage> {
        let canvas = self.canvas.as_mut()?;
        raster::clear(canvas);
        raster::blit_rounded(canvas, frame_image, CORNER_RADIUS);

        let store = ctx.store;
        let in_task_time = store.task_boxes().iter().any(|tb| tb.contains_time(ctx.media_time));
        if ctx.screen != Screen::TaskDetails && !in_task_time {
            draw_boxes(canvas, ctx);
        }
        if ctx.screen == Screen::TaskDetails && ctx.playing {
            draw_landmarks(canvas, ctx);
        }
        self.renders += 1;
        trace!("Canvas rendered frame {}", ctx.frame);
        self.canvas.as_ref()
    }
}

fn draw_boxes(canvas: &mut RgbaImage, ctx: &RenderContext) {
    let store = ctx.store;
    for det in detections_at(store.bounding_boxes(), ctx.frame) {
        let color = if store.is_subject(det.id) { SUBJECT_COLOR } else { OTHER_COLOR };
        raster::stroke_rect(
            canvas,
            det.x.round() + 0.5,
            det.y.round() + 0.5,
            det.width.round(),
            det.height.round(),
            BOX_LINE_WIDTH,
            color,
        );
    }
}

fn draw_landmarks(canvas: &mut RgbaImage, ctx: &RenderContext) {
    let Some(id) = ctx.selected_task else {
        return;
    };
    let store = ctx.store;
    let (Some(task), Some(tb)) = (store.task(id), store.task_box(id)) else {
        return;
    };
    let Some(data) = task.data.as_ref() else {
        return;
    };
    let index = landmark_frame_index(ctx.frame, task.start, store.fps());
    let rect = tb.rect();
    match data.landmark_frame(index) {
        Some(LandmarkFrame::Points(points)) if points.len() >= 2 => {
            for (i, [x, y]) in points.iter().enumerate() {
                let p = task_local_to_landmark_local(DVec2::new(*x, *y), &rect);
                let [r, g, b] = data.landmark_color(index, i).unwrap_or(ctx.landmark_color);
                raster::fill_circle(canvas, p.x, p.y, LANDMARK_RADIUS, [r, g, b, 255]);
            }
        }
        Some(LandmarkFrame::Single([x, y])) => {
            let [r, g, b] = ctx.landmark_color;
            let half = SINGLE_POINT_SIZE * 0.5;
            raster::fill_rect(canvas, x + rect.x - half, y + rect.y - half, SINGLE_POINT_SIZE, SINGLE_POINT_SIZE, [r, g, b, 255]);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AnalysisPayload, BoundingBoxFrame, Detection, TaskBoxPolicy, VideoSession};
    use image::Rgba;
    use serde_json::json;

    fn store() -> AnnotationStore {
        let mut store = AnnotationStore::new(TaskBoxPolicy::default());
        store.load_video(VideoSession {
            video_id: "v1".into(),
            fps: 10.0,
            file_name: "clip.mp4".into(),
            video_path: None,
        });
        let frames = (0..=40)
            .map(|n| BoundingBoxFrame {
                frame_number: n,
                data: vec![
                    Detection { id: 1, x: 10.0, y: 10.0, width: 40.0, height: 40.0 },
                    Detection { id: 2, x: 100.0, y: 10.0, width: 40.0, height: 40.0 },
                ],
            })
            .collect();
        store.replace_detections(frames, None);
        store.toggle_subject(1);
        store
    }

    fn ctx<'a>(store: &'a AnnotationStore, frame: i64, screen: Screen, playing: bool, selected: Option<TaskId>) -> RenderContext<'a> {
        RenderContext {
            frame,
            media_time: frame as f64 / store.fps(),
            playing,
            screen,
            selected_task: selected,
            store,
            landmark_color: [255, 0, 0],
        }
    }

    fn frame_image() -> RgbaImage {
        RgbaImage::from_pixel(200, 100, Rgba([20, 20, 20, 255]))
    }

    #[test]
    fn test_render_is_idempotent() {
        let store = store();
        let mut renderer = CanvasRenderer::new();
        assert!(renderer.render(&frame_image(), &ctx(&store, 3, Screen::Tasks, false, None)).is_none());
        renderer.set_intrinsic_size(200, 100);
        let c = ctx(&store, 3, Screen::Tasks, false, None);
        let first = renderer.render(&frame_image(), &c).cloned();
        let second = renderer.render(&frame_image(), &c).cloned();
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_box_colors() {
        let store = store();
        let mut renderer = CanvasRenderer::new();
        renderer.set_intrinsic_size(200, 100);
        let canvas = renderer.render(&frame_image(), &ctx(&store, 3, Screen::Tasks, false, None)).cloned();
        let canvas = canvas.expect("canvas");
        assert_eq!(canvas.get_pixel(10, 30).0, SUBJECT_COLOR);
        assert_eq!(canvas.get_pixel(100, 30).0, OTHER_COLOR);
        assert_eq!(canvas.get_pixel(30, 30).0, [20, 20, 20, 255]);
    }

    #[test]
    fn test_boxes_hidden_inside_task_window() {
        let mut store = store();
        let id = store.add_task("Walk", 1.0, 2.0);
        let mut renderer = CanvasRenderer::new();
        renderer.set_intrinsic_size(200, 100);
        let canvas = renderer
            .render(&frame_image(), &ctx(&store, 15, Screen::Tasks, false, Some(id)))
            .cloned()
            .expect("canvas");
        assert_eq!(canvas.get_pixel(10, 30).0, [20, 20, 20, 255]);
    }

    #[test]
    fn test_landmarks_only_while_playing_on_details() {
        let mut store = store();
        let id = store.add_task("Walk", 1.0, 2.0);
        let payload = AnalysisPayload::from_value(json!({
            "landMarks": [[[20.0, 20.0], [60.0, 20.0]]],
            "landmark_colors": [[[0, 0, 255], [0, 255, 255]]]
        }))
        .expect("object");
        store.replace_task_data(id, payload);
        let rect = store.task_box(id).expect("box").rect();
        let p = task_local_to_landmark_local(DVec2::new(20.0, 20.0), &rect);

        let mut renderer = CanvasRenderer::new();
        renderer.set_intrinsic_size(200, 100);
        let paused = renderer
            .render(&frame_image(), &ctx(&store, 10, Screen::TaskDetails, false, Some(id)))
            .cloned()
            .expect("canvas");
        assert_eq!(paused.get_pixel(p.x as u32, p.y as u32).0, [20, 20, 20, 255]);

        let playing = renderer
            .render(&frame_image(), &ctx(&store, 10, Screen::TaskDetails, true, Some(id)))
            .cloned()
            .expect("canvas");
        assert_eq!(playing.get_pixel(p.x as u32, p.y as u32).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_canvas_size_fixed_after_first_metadata() {
        let mut renderer = CanvasRenderer::new();
        assert!(renderer.set_intrinsic_size(200, 100));
        assert!(!renderer.set_intrinsic_size(640, 480));
        assert_eq!(renderer.size(), Some((200, 100)));
    }
}
