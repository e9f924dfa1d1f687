//! Interactive overlay editor.
//!
//! One gesture at a time: resizing the visible task box by an edge handle,
//! dragging the task box by its outline, or dragging a landmark. All input
//! points are in video pixel space (convert with
//! [`super::coords::pointer_to_viewport`] first).
//!
//! A gesture holds a [`PointerCapture`] for its whole lifetime, standing in
//! for window-level move/up listeners. Ending, cancelling or dropping the
//! editor releases it; [`PointerCaptures::live`] exposes the count.
//!
//! Box edits are local only. A landmark drag writes through the store on
//! every move and yields a [`LandmarkCommit`] on release, which the app sends
//! to the backend; the task stays in the processing set until the result
//! comes back.

use glam::DVec2;
use log::{debug, trace, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::coords::{landmark_local_to_task_local, task_local_to_landmark_local};
use crate::api::LandmarkUpdate;
use crate::entities::{AnnotationStore, BoxRect, LandmarkFrame, TaskBox, TaskId};
use crate::screen::Screen;

pub const HANDLE_SIZE: f64 = 10.0;
pub const MIN_BOX_SIZE: f64 = 10.0;
/// Outline thickness; the outline band is the drag target
pub const BOX_STROKE: f64 = 10.0;
pub const LANDMARK_RADIUS: f64 = 12.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Bottom, Side::Left, Side::Right];

    pub fn is_vertical(&self) -> bool {
        matches!(self, Side::Top | Side::Bottom)
    }
}

/// Hit targets centered on each edge midpoint: a quarter of the edge long,
/// `handle_size` thick.
pub fn handle_rect(rect: &BoxRect, side: Side, handle_size: f64) -> BoxRect {
    let (w4, h4) = (rect.width / 4.0, rect.height / 4.0);
    let half = handle_size / 2.0;
    match side {
        Side::Top => BoxRect::new(rect.x + (rect.width - w4) / 2.0, rect.y - half, w4, handle_size),
        Side::Bottom => BoxRect::new(rect.x + (rect.width - w4) / 2.0, rect.bottom() - half, w4, handle_size),
        Side::Left => BoxRect::new(rect.x - half, rect.y + (rect.height - h4) / 2.0, handle_size, h4),
        Side::Right => BoxRect::new(rect.right() - half, rect.y + (rect.height - h4) / 2.0, handle_size, h4),
    }
}

/// New rectangle after moving `side` by `delta` from `initial`.
///
/// Width and height never drop below [`MIN_BOX_SIZE`]; moving the top or
/// left edge keeps the opposite edge fixed.
pub fn resize_rect(initial: &BoxRect, side: Side, delta: DVec2) -> BoxRect {
    let mut out = *initial;
    match side {
        Side::Top => {
            out.height = (initial.height - delta.y).max(MIN_BOX_SIZE);
            out.y = initial.y + (initial.height - out.height);
        }
        Side::Bottom => out.height = (initial.height + delta.y).max(MIN_BOX_SIZE),
        Side::Left => {
            out.width = (initial.width - delta.x).max(MIN_BOX_SIZE);
            out.x = initial.x + (initial.width - out.width);
        }
        Side::Right => out.width = (initial.width + delta.x).max(MIN_BOX_SIZE),
    }
    out
}

fn on_outline(rect: &BoxRect, p: DVec2, stroke: f64) -> bool {
    let half = stroke / 2.0;
    let outer = BoxRect::new(rect.x - half, rect.y - half, rect.width + stroke, rect.height + stroke);
    let inner_w = rect.width - stroke;
    let inner_h = rect.height - stroke;
    let inside_inner =
        inner_w > 0.0 && inner_h > 0.0 && BoxRect::new(rect.x + half, rect.y + half, inner_w, inner_h).contains(p.x, p.y);
    outer.contains(p.x, p.y) && !inside_inner
}

// ========== Pointer capture ==========

/// Live count of pointer captures handed out by an editor.
#[derive(Debug, Clone, Default)]
pub struct PointerCaptures {
    live: Arc<AtomicUsize>,
}

impl PointerCaptures {
    pub fn capture(&self) -> PointerCapture {
        self.live.fetch_add(1, Ordering::SeqCst);
        PointerCapture {
            live: Arc::clone(&self.live),
        }
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// Released on drop.
#[derive(Debug)]
pub struct PointerCapture {
    live: Arc<AtomicUsize>,
}

impl Drop for PointerCapture {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

// ========== Editor ==========

/// Per-frame inputs the editor does not own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayContext {
    pub screen: Screen,
    pub playing: bool,
    pub media_time: f64,
    pub selected_task: Option<TaskId>,
    /// Landmark frame index for the selected task, from the frame clock
    pub landmark_index: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayHit {
    Handle(TaskId, Side),
    Body(TaskId),
    Landmark { task: TaskId, frame_index: i64, point: usize },
}

#[derive(Debug)]
enum Gesture {
    Idle,
    Resizing {
        task: TaskId,
        side: Side,
        start: DVec2,
        initial: BoxRect,
        _capture: PointerCapture,
    },
    DraggingBox {
        task: TaskId,
        start: DVec2,
        initial: BoxRect,
        _capture: PointerCapture,
    },
    DraggingLandmark {
        task: TaskId,
        frame_index: i64,
        point: usize,
        offset: DVec2,
        /// Stored point before the drag, restored on cancel
        original: [f64; 2],
        _capture: PointerCapture,
    },
}

/// Landmark edit ready for the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkCommit {
    pub task_id: TaskId,
    pub request: LandmarkUpdate,
}

/// A landmark drawn by the editor, in video pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkHandle {
    pub point: usize,
    pub center: DVec2,
    pub color: [u8; 3],
}

#[derive(Debug)]
pub struct OverlayEditor {
    gesture: Gesture,
    captures: PointerCaptures,
    processing: HashSet<TaskId>,
    landmark_color: [u8; 3],
}

impl Default for OverlayEditor {
    fn default() -> Self {
        Self::new(PointerCaptures::default())
    }
}

impl OverlayEditor {
    pub fn new(captures: PointerCaptures) -> Self {
        Self {
            gesture: Gesture::Idle,
            captures,
            processing: HashSet::new(),
            landmark_color: [255, 0, 0],
        }
    }

    pub fn set_landmark_color(&mut self, color: [u8; 3]) {
        self.landmark_color = color;
    }

    pub fn captures(&self) -> &PointerCaptures {
        &self.captures
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.gesture, Gesture::Idle)
    }

    /// Task affected by the active gesture
    pub fn active_task(&self) -> Option<TaskId> {
        match &self.gesture {
            Gesture::Idle => None,
            Gesture::Resizing { task, .. } | Gesture::DraggingBox { task, .. } | Gesture::DraggingLandmark { task, .. } => {
                Some(*task)
            }
        }
    }

    pub fn is_processing(&self, task: TaskId) -> bool {
        self.processing.contains(&task)
    }

    pub fn finish_processing(&mut self, task: TaskId) {
        self.processing.remove(&task);
    }

    /// Box edits are allowed on the task list while paused.
    pub fn box_editable(ctx: &OverlayContext) -> bool {
        !ctx.playing && ctx.screen == Screen::Tasks
    }

    /// Task box shown for the context: the first box containing the playhead
    /// on the task list, the selected task's box on task details.
    pub fn visible_task_box<'a>(store: &'a AnnotationStore, ctx: &OverlayContext) -> Option<&'a TaskBox> {
        match ctx.screen {
            Screen::Tasks => store.task_boxes().iter().find(|tb| tb.contains_time(ctx.media_time)),
            Screen::TaskDetails => ctx.selected_task.and_then(|id| store.task_box(id)),
            Screen::SubjectResolution => None,
        }
    }

    /// Landmarks of the current frame, shown while paused on task details.
    pub fn landmark_handles(&self, store: &AnnotationStore, ctx: &OverlayContext) -> Option<(TaskId, i64, Vec<LandmarkHandle>)> {
        if ctx.playing || ctx.screen != Screen::TaskDetails {
            return None;
        }
        let id = ctx.selected_task?;
        let index = ctx.landmark_index?;
        let task = store.task(id)?;
        let rect = store.task_box(id)?.rect();
        let data = task.data.as_ref()?;
        let LandmarkFrame::Points(points) = data.landmark_frame(index)? else {
            return None;
        };
        let handles = points
            .iter()
            .enumerate()
            .map(|(i, [x, y])| LandmarkHandle {
                point: i,
                center: task_local_to_landmark_local(DVec2::new(*x, *y), &rect),
                color: data.landmark_color(index, i).unwrap_or(self.landmark_color),
            })
            .collect();
        Some((id, index, handles))
    }

    /// What lies under `p`. Landmarks are on top, then handles, then the outline.
    pub fn hit_test(&self, store: &AnnotationStore, ctx: &OverlayContext, p: DVec2) -> Option<OverlayHit> {
        if let Some((task, frame_index, handles)) = self.landmark_handles(store, ctx) {
            let hit = handles
                .iter()
                .rev()
                .find(|h| (h.center - p).length() <= LANDMARK_RADIUS);
            if let Some(h) = hit {
                return Some(OverlayHit::Landmark {
                    task,
                    frame_index,
                    point: h.point,
                });
            }
        }
        if !Self::box_editable(ctx) {
            return None;
        }
        let tb = Self::visible_task_box(store, ctx)?;
        let rect = tb.rect();
        for side in Side::ALL {
            if handle_rect(&rect, side, HANDLE_SIZE).contains(p.x, p.y) {
                return Some(OverlayHit::Handle(tb.id, side));
            }
        }
        on_outline(&rect, p, BOX_STROKE).then_some(OverlayHit::Body(tb.id))
    }

    /// Start a gesture. Returns false when nothing editable is under `p`.
    pub fn pointer_down(&mut self, store: &AnnotationStore, ctx: &OverlayContext, p: DVec2) -> bool {
        if !self.is_idle() {
            trace!("Overlay: pointer down during active gesture ignored");
            return false;
        }
        let Some(hit) = self.hit_test(store, ctx, p) else {
            return false;
        };
        self.gesture = match hit {
            OverlayHit::Handle(task, side) => {
                let Some(initial) = store.task_box(task).map(|tb| tb.rect()) else {
                    return false;
                };
                debug!("Overlay: resize task {} from {:?}", task, side);
                Gesture::Resizing {
                    task,
                    side,
                    start: p,
                    initial,
                    _capture: self.captures.capture(),
                }
            }
            OverlayHit::Body(task) => {
                let Some(initial) = store.task_box(task).map(|tb| tb.rect()) else {
                    return false;
                };
                debug!("Overlay: drag task {}", task);
                Gesture::DraggingBox {
                    task,
                    start: p,
                    initial,
                    _capture: self.captures.capture(),
                }
            }
            OverlayHit::Landmark { task, frame_index, point } => {
                if self.is_processing(task) {
                    warn!("Overlay: task {} still processing, landmark drag refused", task);
                    return false;
                }
                let center = self
                    .landmark_handles(store, ctx)
                    .and_then(|(_, _, handles)| handles.into_iter().find(|h| h.point == point))
                    .map(|h| h.center);
                let Some(center) = center else {
                    return false;
                };
                let original = store
                    .task(task)
                    .and_then(|t| t.data.as_ref())
                    .and_then(|d| d.landmark_frame(frame_index));
                let Some(LandmarkFrame::Points(points)) = original else {
                    return false;
                };
                let Some(original) = points.get(point).copied() else {
                    return false;
                };
                debug!("Overlay: drag landmark {} of frame {} (task {})", point, frame_index, task);
                Gesture::DraggingLandmark {
                    task,
                    frame_index,
                    point,
                    offset: p - center,
                    original,
                    _capture: self.captures.capture(),
                }
            }
        };
        true
    }

    /// Apply the active gesture. Moves without a gesture are ignored.
    pub fn pointer_move(&mut self, store: &mut AnnotationStore, p: DVec2) -> bool {
        match &self.gesture {
            Gesture::Idle => false,
            Gesture::Resizing {
                task, side, start, initial, ..
            } => store.set_task_rect(*task, resize_rect(initial, *side, p - *start)),
            Gesture::DraggingBox { task, start, initial, .. } => {
                let d = p - *start;
                store.set_task_rect(*task, initial.translated(d.x, d.y))
            }
            Gesture::DraggingLandmark {
                task,
                frame_index,
                point,
                offset,
                ..
            } => {
                let Some(rect) = store.task_box(*task).map(|tb| tb.rect()) else {
                    return false;
                };
                let local = landmark_local_to_task_local(p - *offset, &rect);
                store.set_landmark(*task, *frame_index, *point, [local.x, local.y])
            }
        }
    }

    /// End the active gesture. A finished landmark drag yields the commit to send.
    pub fn pointer_up(&mut self, store: &AnnotationStore) -> Option<LandmarkCommit> {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        let Gesture::DraggingLandmark { task, .. } = gesture else {
            return None;
        };
        let Some(request) = store.task(task).and_then(|t| LandmarkUpdate::from_task(t, store.fps())) else {
            warn!("Overlay: task {} lost its landmarks during drag", task);
            return None;
        };
        self.processing.insert(task);
        Some(LandmarkCommit { task_id: task, request })
    }

    /// Abort any gesture without committing (Escape, screen change).
    ///
    /// A landmark drag is never sent, so the dragged point goes back to its
    /// stored position.
    pub fn cancel(&mut self, store: &mut AnnotationStore) {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        match gesture {
            Gesture::Idle => {}
            Gesture::DraggingLandmark {
                task,
                frame_index,
                point,
                original,
                ..
            } => {
                debug!("Overlay: landmark drag on task {} cancelled, point restored", task);
                store.set_landmark(task, frame_index, point, original);
            }
            _ => debug!("Overlay: gesture cancelled"),
        }
    }

    /// Drop the gesture and every in-flight marker. Used when the video
    /// changes, since the old session's task ids no longer apply.
    pub fn reset(&mut self) {
        self.gesture = Gesture::Idle;
        self.processing.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AnalysisPayload, BoundingBoxFrame, Detection, TaskBoxPolicy, VideoSession};
    use serde_json::json;

    /// Store with detections (100,100)-(300,400) on frames 0..=100 at 10 fps
    /// and one task over [1, 5] seconds.
    fn setup() -> (AnnotationStore, TaskId) {
        let mut store = AnnotationStore::new(TaskBoxPolicy::default());
        store.load_video(VideoSession {
            video_id: "v".into(),
            fps: 10.0,
            file_name: "walk.mp4".into(),
            video_path: None,
        });
        let frames = (0..=100)
            .map(|n| BoundingBoxFrame {
                frame_number: n,
                data: vec![Detection { id: 1, x: 100.0, y: 100.0, width: 200.0, height: 300.0 }],
            })
            .collect();
        store.replace_detections(frames, None);
        let id = store.add_task("Gait", 1.0, 5.0);
        (store, id)
    }

    fn tasks_ctx() -> OverlayContext {
        OverlayContext {
            screen: Screen::Tasks,
            playing: false,
            media_time: 2.0,
            selected_task: None,
            landmark_index: None,
        }
    }

    fn details_ctx(id: TaskId) -> OverlayContext {
        OverlayContext {
            screen: Screen::TaskDetails,
            playing: false,
            media_time: 1.0,
            selected_task: Some(id),
            landmark_index: Some(0),
        }
    }

    #[test]
    fn test_handles_centered_on_edges() {
        let rect = BoxRect::new(0.0, 0.0, 200.0, 100.0);
        assert_eq!(handle_rect(&rect, Side::Top, 10.0), BoxRect::new(75.0, -5.0, 50.0, 10.0));
        assert_eq!(handle_rect(&rect, Side::Right, 10.0), BoxRect::new(195.0, 37.5, 10.0, 25.0));
    }

    #[test]
    fn test_resize_floor() {
        let initial = BoxRect::new(100.0, 100.0, 50.0, 40.0);
        let top = resize_rect(&initial, Side::Top, DVec2::new(0.0, 500.0));
        assert_eq!(top.height, MIN_BOX_SIZE);
        assert_eq!(top.bottom(), initial.bottom());
        let left = resize_rect(&initial, Side::Left, DVec2::new(500.0, 0.0));
        assert_eq!(left.width, MIN_BOX_SIZE);
        assert_eq!(left.right(), initial.right());
        let right = resize_rect(&initial, Side::Right, DVec2::new(-500.0, 0.0));
        assert_eq!(right.width, MIN_BOX_SIZE);
        assert_eq!(right.x, initial.x);
        let bottom = resize_rect(&initial, Side::Bottom, DVec2::new(0.0, 30.0));
        assert_eq!(bottom.height, 70.0);
    }

    #[test]
    fn test_resize_gesture_keeps_minimum() {
        let (mut store, id) = setup();
        let mut editor = OverlayEditor::default();
        let ctx = tasks_ctx();
        // top handle center
        assert!(editor.pointer_down(&store, &ctx, DVec2::new(200.0, 100.0)));
        assert_eq!(editor.captures().live(), 1);
        editor.pointer_move(&mut store, DVec2::new(200.0, 900.0));
        assert!(editor.pointer_up(&store).is_none());
        assert_eq!(editor.captures().live(), 0);
        let rect = store.task_box(id).unwrap().rect();
        assert!(rect.width >= MIN_BOX_SIZE && rect.height >= MIN_BOX_SIZE);
        assert_eq!(rect.height, MIN_BOX_SIZE);
        assert_eq!(rect.bottom(), 400.0);
    }

    #[test]
    fn test_drag_idempotence() {
        let (mut store, id) = setup();
        let before = store.task_box(id).unwrap().rect();
        let mut editor = OverlayEditor::default();
        let ctx = tasks_ctx();
        let grab = DVec2::new(100.0, 250.0); // left outline, away from the handle
        let grab = grab + DVec2::new(0.0, 100.0);

        assert!(editor.pointer_down(&store, &ctx, grab));
        editor.pointer_move(&mut store, grab + DVec2::new(37.25, -12.5));
        editor.pointer_up(&store);
        let moved = store.task_box(id).unwrap().rect();
        assert_eq!(moved.x, before.x + 37.25);

        let grab = DVec2::new(moved.x, moved.y + 250.0);
        assert!(editor.pointer_down(&store, &ctx, grab));
        editor.pointer_move(&mut store, grab + DVec2::new(-37.25, 12.5));
        editor.pointer_up(&store);
        let after = store.task_box(id).unwrap().rect();
        assert!((after.x - before.x).abs() < 1e-9);
        assert!((after.y - before.y).abs() < 1e-9);
        assert_eq!((after.width, after.height), (before.width, before.height));
    }

    #[test]
    fn test_box_locked_while_playing_or_on_details() {
        let (store, id) = setup();
        let mut editor = OverlayEditor::default();
        let mut ctx = tasks_ctx();
        ctx.playing = true;
        assert!(!editor.pointer_down(&store, &ctx, DVec2::new(200.0, 100.0)));
        let ctx = OverlayContext { landmark_index: None, ..details_ctx(id) };
        assert!(!editor.pointer_down(&store, &ctx, DVec2::new(200.0, 100.0)));
        // interior is not a drag target
        assert!(!editor.pointer_down(&store, &tasks_ctx(), DVec2::new(200.0, 250.0)));
        assert_eq!(editor.captures().live(), 0);
    }

    #[test]
    fn test_visible_box_selection() {
        let (mut store, first) = setup();
        let second = store.add_task("Tapping", 6.0, 8.0);
        let mut ctx = tasks_ctx();
        ctx.media_time = 7.0;
        assert_eq!(OverlayEditor::visible_task_box(&store, &ctx).map(|b| b.id), Some(second));
        ctx.media_time = 5.5;
        assert!(OverlayEditor::visible_task_box(&store, &ctx).is_none());
        // Details shows the selected task regardless of the playhead
        let mut details = details_ctx(first);
        details.media_time = 9.0;
        assert_eq!(OverlayEditor::visible_task_box(&store, &details).map(|b| b.id), Some(first));
    }

    #[test]
    fn test_landmark_drag_commit() {
        let (mut store, id) = setup();
        store.replace_task_data(
            id,
            AnalysisPayload::from_value(json!({"landMarks": [[[50.0, 60.0], [80.0, 90.0]]]})).unwrap(),
        );
        let rect = store.task_box(id).unwrap().rect();
        let center = task_local_to_landmark_local(DVec2::new(50.0, 60.0), &rect);

        let mut editor = OverlayEditor::default();
        let ctx = details_ctx(id);
        // grab slightly off-center; the offset must not cause a jump
        let grab = center + DVec2::new(3.0, -2.0);
        assert!(editor.pointer_down(&store, &ctx, grab));
        assert!(editor.pointer_move(&mut store, grab + DVec2::new(10.0, 5.0)));
        let commit = editor.pointer_up(&store).expect("commit");
        assert_eq!(commit.task_id, id);
        assert_eq!(commit.request.landmarks, json!([[[60.0, 65.0], [80.0, 90.0]]]));
        assert!(editor.is_processing(id));
        assert_eq!(editor.captures().live(), 0);

        // A second drag waits for the first commit to resolve
        assert!(!editor.pointer_down(&store, &ctx, grab + DVec2::new(10.0, 5.0)));
        editor.finish_processing(id);
        assert!(editor.pointer_down(&store, &ctx, grab + DVec2::new(10.0, 5.0)));
        editor.cancel(&mut store);
    }

    #[test]
    fn test_cancel_mid_landmark_drag_restores_point() {
        let (mut store, id) = setup();
        store.replace_task_data(
            id,
            AnalysisPayload::from_value(json!({"landMarks": [[[50.0, 60.0], [80.0, 90.0]]]})).unwrap(),
        );
        let rect = store.task_box(id).unwrap().rect();
        let center = task_local_to_landmark_local(DVec2::new(80.0, 90.0), &rect);

        let mut editor = OverlayEditor::default();
        assert!(editor.pointer_down(&store, &details_ctx(id), center));
        assert!(editor.pointer_move(&mut store, center + DVec2::new(25.0, -15.0)));
        let moved = store.task(id).unwrap().data.as_ref().unwrap().get("landMarks").cloned();
        assert_eq!(moved, Some(json!([[[50.0, 60.0], [105.0, 75.0]]])));

        editor.cancel(&mut store);
        assert!(editor.is_idle());
        assert_eq!(editor.captures().live(), 0);
        assert!(!editor.is_processing(id));
        let data = store.task(id).unwrap().data.as_ref().unwrap();
        assert_eq!(data.get("landMarks"), Some(&json!([[[50.0, 60.0], [80.0, 90.0]]])));
        // Nothing to release afterwards
        assert!(editor.pointer_up(&store).is_none());
    }

    #[test]
    fn test_reset_clears_processing() {
        let (mut store, id) = setup();
        store.replace_task_data(id, AnalysisPayload::from_value(json!({"landMarks": [[[50.0, 60.0]]]})).unwrap());
        let rect = store.task_box(id).unwrap().rect();
        let center = task_local_to_landmark_local(DVec2::new(50.0, 60.0), &rect);
        let mut editor = OverlayEditor::default();
        assert!(editor.pointer_down(&store, &details_ctx(id), center));
        assert!(editor.pointer_up(&store).is_some());
        assert!(editor.is_processing(id));

        editor.reset();
        assert!(!editor.is_processing(id));
        assert!(editor.pointer_down(&store, &details_ctx(id), center));
    }

    #[test]
    fn test_landmarks_hidden_while_playing() {
        let (mut store, id) = setup();
        store.replace_task_data(id, AnalysisPayload::from_value(json!({"landMarks": [[[1.0, 1.0], [2.0, 2.0]]]})).unwrap());
        let editor = OverlayEditor::default();
        let mut ctx = details_ctx(id);
        assert!(editor.landmark_handles(&store, &ctx).is_some());
        ctx.playing = true;
        assert!(editor.landmark_handles(&store, &ctx).is_none());
    }

    #[test]
    fn test_teardown_mid_drag_releases_capture() {
        let (mut store, _) = setup();
        let captures = PointerCaptures::default();
        {
            let mut editor = OverlayEditor::new(captures.clone());
            assert!(editor.pointer_down(&store, &tasks_ctx(), DVec2::new(200.0, 100.0)));
            assert_eq!(captures.live(), 1);
        }
        assert_eq!(captures.live(), 0);

        let mut editor = OverlayEditor::new(captures.clone());
        editor.pointer_down(&store, &tasks_ctx(), DVec2::new(200.0, 100.0));
        editor.cancel(&mut store);
        assert_eq!(captures.live(), 0);
    }

    #[test]
    fn test_move_without_gesture_ignored() {
        let (mut store, id) = setup();
        let before = store.task_box(id).unwrap().rect();
        let mut editor = OverlayEditor::default();
        assert!(!editor.pointer_move(&mut store, DVec2::new(5.0, 5.0)));
        assert!(editor.pointer_up(&store).is_none());
        assert_eq!(store.task_box(id).unwrap().rect(), before);
    }
}
