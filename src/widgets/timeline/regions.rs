//! Segment timeline state: one region per task, drag-select to create,
//! drag/resize to edit.
//!
//! The task collection is the only source of truth. Regions are rebuilt from
//! it (clear and recreate) on a short debounce after every task change; a
//! drag-select never survives as a region of its own, it becomes a task.

use log::{debug, trace};
use std::time::Instant;

use crate::core::Debouncer;
use crate::entities::task::round_ms;
use crate::entities::{AnnotationStore, TaskId};

/// Timeline width in pixels at zoom 1, for the whole video
pub const BASE_WIDTH_PX: f64 = 670.0;
pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 10.0;
/// Start/end changes at or below this are rounding noise
pub const CHANGE_TOLERANCE: f64 = 0.001;
/// Seek offset into a segment after creating or editing it
pub const SEEK_NUDGE: f64 = 0.05;
/// Grab distance for region edges, in pixels
pub const EDGE_THRESHOLD: f32 = 6.0;

/// Visual copy of a task on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: TaskId,
    pub start: f64,
    pub end: f64,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionTool {
    AdjustStart,
    AdjustEnd,
    Move,
}

impl RegionTool {
    pub fn cursor(&self) -> eframe::egui::CursorIcon {
        match self {
            RegionTool::AdjustStart | RegionTool::AdjustEnd => eframe::egui::CursorIcon::ResizeHorizontal,
            RegionTool::Move => eframe::egui::CursorIcon::Grab,
        }
    }
}

/// Which part of a region bar spanning `[x0, x1]` is under `hover_x`.
pub fn detect_region_tool(hover_x: f32, x0: f32, x1: f32, edge_threshold: f32) -> Option<RegionTool> {
    if hover_x < x0 - edge_threshold || hover_x > x1 + edge_threshold {
        return None;
    }
    if (hover_x - x0).abs() < edge_threshold {
        Some(RegionTool::AdjustStart)
    } else if (hover_x - x1).abs() < edge_threshold {
        Some(RegionTool::AdjustEnd)
    } else if hover_x >= x0 && hover_x <= x1 {
        Some(RegionTool::Move)
    } else {
        None
    }
}

/// Active timeline drag
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineDragState {
    /// Drag-select on empty space
    Selecting { anchor: f64, current: f64 },
    /// Moving or resizing an existing region
    Region {
        id: TaskId,
        tool: RegionTool,
        initial_start: f64,
        initial_end: f64,
        drag_start_time: f64,
    },
}

/// Turn a drag-selection into a new task named "Region".
///
/// Returns the new id and where to seek, or None for selections under 1 ms.
pub fn create_segment(store: &mut AnnotationStore, a: f64, b: f64) -> Option<(TaskId, f64)> {
    let (start, end) = if a <= b { (a, b) } else { (b, a) };
    let (start, end) = (round_ms(start), round_ms(end));
    if end - start < CHANGE_TOLERANCE {
        trace!("Timeline: selection [{:.3}, {:.3}] too short, ignored", start, end);
        return None;
    }
    let id = store.add_segment(start, end);
    debug!("Timeline: segment {} created [{:.3}, {:.3}]", id, start, end);
    Some((id, start + SEEK_NUDGE))
}

/// Commit a region edit to its task.
///
/// A real change (over 1 ms on either edge) rewrites start/end and drops the
/// analysis payload. Returns the seek target: just after the start if the
/// start moved, otherwise just before the end.
pub fn apply_region_update(store: &mut AnnotationStore, id: TaskId, start: f64, end: f64) -> Option<f64> {
    let (start, end) = (round_ms(start), round_ms(end));
    let original = store.task(id)?;
    let start_moved = (original.start - start).abs() > CHANGE_TOLERANCE;
    let end_moved = (original.end - end).abs() > CHANGE_TOLERANCE;
    if start_moved || end_moved {
        store.update_task(id, |t| {
            t.set_times(start, end);
            t.data = None;
        });
        debug!("Timeline: task {} moved to [{:.3}, {:.3}]", id, start, end);
    }
    Some(if start_moved { start + SEEK_NUDGE } else { end - SEEK_NUDGE })
}

/// Seek target while a region edge is being dragged.
pub fn live_seek(store: &AnnotationStore, id: TaskId, start: f64, end: f64) -> Option<f64> {
    let (start, end) = (round_ms(start), round_ms(end));
    let original = store.task(id)?;
    if (original.start - start).abs() > CHANGE_TOLERANCE {
        Some(start)
    } else if (original.end - end).abs() > CHANGE_TOLERANCE {
        Some(end)
    } else {
        None
    }
}

#[derive(Debug)]
pub struct SegmentTimeline {
    regions: Vec<Region>,
    redraw: Debouncer<()>,
    seen_revision: Option<u64>,
    pub zoom: f32,
    pub drag: Option<TimelineDragState>,
}

impl SegmentTimeline {
    pub fn new(redraw_ms: u64) -> Self {
        Self {
            regions: Vec::new(),
            redraw: Debouncer::new(redraw_ms),
            seen_revision: None,
            zoom: 1.0,
            drag: None,
        }
    }

    pub fn set_redraw_ms(&mut self, ms: u64) {
        self.redraw.set_delay(ms);
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, id: TaskId) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn px_per_sec(&self, duration: f64) -> f64 {
        let duration = if duration > 0.0 { duration } else { 1.0 };
        BASE_WIDTH_PX / duration * self.zoom as f64
    }

    /// Schedule a redraw if the store changed since the last look.
    pub fn observe(&mut self, store: &AnnotationStore, now: Instant) {
        if self.seen_revision != Some(store.revision()) {
            self.seen_revision = Some(store.revision());
            self.redraw.schedule_at((), now);
        }
    }

    /// Rebuild regions once the debounce elapses. Waits while a drag is active.
    pub fn tick(&mut self, store: &AnnotationStore, now: Instant) -> bool {
        if self.drag.is_some() {
            return false;
        }
        if self.redraw.tick_at(now).is_none() {
            return false;
        }
        self.rebuild(store);
        true
    }

    pub fn is_redraw_pending(&self) -> bool {
        self.redraw.is_pending()
    }

    /// Clear and recreate every region from the tasks.
    pub fn rebuild(&mut self, store: &AnnotationStore) {
        self.regions = store
            .tasks()
            .iter()
            .map(|t| Region {
                id: t.id,
                start: t.start,
                end: t.end,
                label: format!("{} #{}", t.name, t.id),
            })
            .collect();
        trace!("Timeline: {} regions rebuilt", self.regions.len());
    }

    // ========== Gestures (time domain) ==========

    pub fn begin_select(&mut self, t: f64) {
        if self.drag.is_none() {
            self.drag = Some(TimelineDragState::Selecting { anchor: t, current: t });
        }
    }

    pub fn begin_region_drag(&mut self, id: TaskId, tool: RegionTool, t: f64) -> bool {
        if self.drag.is_some() {
            return false;
        }
        let Some(region) = self.region(id) else {
            return false;
        };
        self.drag = Some(TimelineDragState::Region {
            id,
            tool,
            initial_start: region.start,
            initial_end: region.end,
            drag_start_time: t,
        });
        true
    }

    /// Pointer moved to time `t`. Returns a live seek target while editing a region.
    pub fn update_drag(&mut self, store: &AnnotationStore, t: f64, duration: f64) -> Option<f64> {
        match self.drag.as_mut()? {
            TimelineDragState::Selecting { current, .. } => {
                *current = t.clamp(0.0, duration.max(0.0));
                None
            }
            TimelineDragState::Region {
                id,
                tool,
                initial_start,
                initial_end,
                drag_start_time,
            } => {
                let (id, tool) = (*id, *tool);
                let (start, end) = region_span(*initial_start, *initial_end, tool, t - *drag_start_time, duration);
                if let Some(region) = self.regions.iter_mut().find(|r| r.id == id) {
                    region.start = start;
                    region.end = end;
                }
                live_seek(store, id, start, end)
            }
        }
    }

    /// Finish the gesture, writing it to the store. Returns a seek target.
    pub fn end_drag(&mut self, store: &mut AnnotationStore) -> Option<f64> {
        match self.drag.take()? {
            TimelineDragState::Selecting { anchor, current } => create_segment(store, anchor, current).map(|(_, seek)| seek),
            TimelineDragState::Region { id, .. } => {
                let region = self.region(id)?.clone();
                apply_region_update(store, id, region.start, region.end)
            }
        }
    }

    pub fn cancel_drag(&mut self, store: &AnnotationStore) {
        if self.drag.take().is_some() {
            self.rebuild(store);
        }
    }

    /// Current drag-selection span, for drawing.
    pub fn selection(&self) -> Option<(f64, f64)> {
        match self.drag {
            Some(TimelineDragState::Selecting { anchor, current }) => Some((anchor.min(current), anchor.max(current))),
            _ => None,
        }
    }
}

/// Region span after dragging by `dt` seconds with `tool`.
fn region_span(start: f64, end: f64, tool: RegionTool, dt: f64, duration: f64) -> (f64, f64) {
    let max = duration.max(end);
    match tool {
        RegionTool::Move => {
            let len = end - start;
            let s = (start + dt).clamp(0.0, (max - len).max(0.0));
            (s, s + len)
        }
        RegionTool::AdjustStart => ((start + dt).clamp(0.0, end), end),
        RegionTool::AdjustEnd => (start, (end + dt).clamp(start, max)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AnalysisPayload, TaskBoxPolicy, VideoSession};
    use serde_json::json;
    use std::time::Duration;

    fn store() -> AnnotationStore {
        let mut store = AnnotationStore::new(TaskBoxPolicy::default());
        store.load_video(VideoSession {
            video_id: "v".into(),
            fps: 30.0,
            file_name: "a.mp4".into(),
            video_path: None,
        });
        store
    }

    #[test]
    fn test_drag_select_creates_task() {
        let mut store = store();
        let mut tl = SegmentTimeline::new(120);
        tl.begin_select(2.0);
        tl.update_drag(&store, 5.0, 10.0);
        assert_eq!(tl.selection(), Some((2.0, 5.0)));
        let seek = tl.end_drag(&mut store);

        assert_eq!(store.tasks().len(), 1);
        let task = &store.tasks()[0];
        assert_eq!(task.id, 1);
        assert_eq!((task.start, task.end), (2.0, 5.0));
        assert_eq!(task.name, "Region");
        assert!(task.data.is_none());
        assert_eq!(seek, Some(2.0 + SEEK_NUDGE));
        // The selection itself is not kept as a region
        assert!(tl.regions().is_empty());
    }

    #[test]
    fn test_new_id_follows_max() {
        let mut store = store();
        store.add_task("Gait", 0.0, 1.0);
        store.update_tasks(|tasks| tasks[0].id = 7);
        let (id, _) = create_segment(&mut store, 3.0004, 4.2).expect("created");
        assert_eq!(id, 8);
        assert_eq!(store.task(8).map(|t| t.start), Some(3.0));
        assert!(create_segment(&mut store, 1.0, 1.0004).is_none());
    }

    #[test]
    fn test_region_update_tolerance() {
        let mut store = store();
        let id = store.add_task("Tapping", 1.0, 3.0);
        store.replace_task_data(id, AnalysisPayload::from_value(json!({"peaks": {}})).unwrap());

        // Sub-millisecond change: no-op, still seeks near the end
        let seek = apply_region_update(&mut store, id, 1.0004, 3.0);
        assert_eq!(seek, Some(3.0 - SEEK_NUDGE));
        assert!(store.task(id).unwrap().data.is_some());

        let seek = apply_region_update(&mut store, id, 1.5, 3.0);
        assert_eq!(seek, Some(1.5 + SEEK_NUDGE));
        let task = store.task(id).unwrap();
        assert_eq!(task.start, 1.5);
        assert!(task.data.is_none());

        assert!(apply_region_update(&mut store, 99, 0.0, 1.0).is_none());
    }

    #[test]
    fn test_region_resize_gesture() {
        let mut store = store();
        let id = store.add_task("Gait", 1.0, 3.0);
        let mut tl = SegmentTimeline::new(120);
        tl.rebuild(&store);

        assert!(tl.begin_region_drag(id, RegionTool::AdjustEnd, 3.0));
        assert_eq!(tl.update_drag(&store, 4.25, 10.0), Some(4.25));
        assert_eq!(tl.region(id).map(|r| r.end), Some(4.25));
        // Store untouched until release
        assert_eq!(store.task(id).unwrap().end, 3.0);

        let seek = tl.end_drag(&mut store);
        assert_eq!(store.task(id).unwrap().end, 4.25);
        assert_eq!(seek, Some(4.25 - SEEK_NUDGE));
    }

    #[test]
    fn test_region_move_clamped() {
        assert_eq!(region_span(1.0, 3.0, RegionTool::Move, -5.0, 10.0), (0.0, 2.0));
        assert_eq!(region_span(1.0, 3.0, RegionTool::Move, 20.0, 10.0), (8.0, 10.0));
        assert_eq!(region_span(1.0, 3.0, RegionTool::AdjustStart, 5.0, 10.0), (3.0, 3.0));
    }

    #[test]
    fn test_redraw_debounced() {
        let mut store = store();
        let mut tl = SegmentTimeline::new(120);
        let t0 = Instant::now();
        tl.observe(&store, t0);
        store.add_task("Gait", 0.0, 1.0);
        tl.observe(&store, t0 + Duration::from_millis(50));
        assert!(!tl.tick(&store, t0 + Duration::from_millis(100)));
        assert!(tl.tick(&store, t0 + Duration::from_millis(200)));
        assert_eq!(tl.regions().len(), 1);
        assert_eq!(tl.regions()[0].label, "Gait #1");
    }

    #[test]
    fn test_detect_region_tool() {
        assert_eq!(detect_region_tool(101.0, 100.0, 200.0, 6.0), Some(RegionTool::AdjustStart));
        assert_eq!(detect_region_tool(198.0, 100.0, 200.0, 6.0), Some(RegionTool::AdjustEnd));
        assert_eq!(detect_region_tool(150.0, 100.0, 200.0, 6.0), Some(RegionTool::Move));
        assert_eq!(detect_region_tool(50.0, 100.0, 200.0, 6.0), None);
    }
}
