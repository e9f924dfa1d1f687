//! Tasks (named time segments) and their derived spatial envelopes.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::bbox::{BoundingBoxFrame, BoxRect};
use super::payload::AnalysisPayload;

pub type TaskId = u32;

/// Default name for segments created on the timeline
pub const DEFAULT_TASK_NAME: &str = "Region";

/// Slack for `ceil`/`floor` on `time * fps`, which rarely lands exactly on an integer.
const FRAME_EPSILON: f64 = 1e-6;

/// A named time interval to analyze. `start <= end` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub data: Option<AnalysisPayload>,
    /// Task-specific fields (calibration and the like), echoed to the backend
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    pub fn new(id: TaskId, name: impl Into<String>, start: f64, end: f64) -> Self {
        let (start, end) = ordered(start, end);
        Self {
            id,
            name: name.into(),
            start,
            end,
            data: None,
            extra: Map::new(),
        }
    }

    pub fn contains_time(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_analyzed(&self) -> bool {
        self.data.is_some()
    }

    pub fn set_times(&mut self, start: f64, end: f64) {
        let (start, end) = ordered(start, end);
        self.start = start;
        self.end = end;
    }

    /// Restore `start <= end` after a raw field edit.
    pub fn normalize(&mut self) {
        let (start, end) = ordered(self.start, self.end);
        self.start = start;
        self.end = end;
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}

/// A task plus its spatial rectangle: `{..Task, x, y, width, height}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskBox {
    pub id: TaskId,
    pub name: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub data: Option<AnalysisPayload>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskBox {
    pub fn from_task(task: &Task, rect: BoxRect) -> Self {
        Self {
            id: task.id,
            name: task.name.clone(),
            start: task.start,
            end: task.end,
            data: task.data.clone(),
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            extra: task.extra.clone(),
        }
    }

    pub fn rect(&self) -> BoxRect {
        BoxRect::new(self.x, self.y, self.width, self.height)
    }

    pub fn contains_time(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }
}

/// Inclusive frame window `[ceil(start*fps), floor(end*fps)]` of a task.
pub fn frame_window(start: f64, end: f64, fps: f64) -> (i64, i64) {
    let first = (start * fps - FRAME_EPSILON).ceil() as i64;
    let last = (end * fps + FRAME_EPSILON).floor() as i64;
    (first, last)
}

/// Union of every detection inside the task's frame window.
///
/// None when the window holds no detections.
pub fn union_box(task: &Task, frames: &[BoundingBoxFrame], fps: f64) -> Option<BoxRect> {
    let (first, last) = frame_window(task.start, task.end, fps);
    frames
        .iter()
        .filter(|f| f.frame_number >= first && f.frame_number <= last)
        .flat_map(|f| f.data.iter())
        .map(|d| d.rect())
        .reduce(|acc, r| acc.union(&r))
}

/// Derived task-box view: a pure function of tasks, detections and sticky rectangles.
///
/// A sticky rectangle wins over the computed union; tasks without either are
/// left out of the view.
pub fn derive_task_boxes(
    tasks: &[Task],
    frames: &[BoundingBoxFrame],
    fps: f64,
    sticky: &BTreeMap<TaskId, BoxRect>,
) -> Vec<TaskBox> {
    tasks
        .iter()
        .filter_map(|task| {
            let rect = sticky
                .get(&task.id)
                .copied()
                .or_else(|| union_box(task, frames, fps))?;
            Some(TaskBox::from_task(task, rect))
        })
        .collect()
}

/// `max(existing id) + 1`, starting from 1.
pub fn next_task_id(tasks: &[Task]) -> TaskId {
    tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1
}

/// Round seconds to millisecond precision.
pub fn round_ms(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9]").expect("static regex"));

/// Endpoint name for a task: non-alphanumerics become separators,
/// words are lowercased and joined with `_`.
///
/// `"Finger Tapping (Left)"` -> `"finger_tapping_left"`
pub fn sanitize_task_name(name: &str) -> String {
    NON_ALNUM
        .replace_all(name, " ")
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// First task whose interval contains `t`.
pub fn task_box_at_time(boxes: &[TaskBox], t: f64) -> Option<&TaskBox> {
    boxes.iter().find(|b| b.contains_time(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::bbox::Detection;

    fn frames_10_to_20() -> Vec<BoundingBoxFrame> {
        (10..=20)
            .map(|n| {
                // x sweeps from 5 to 25, right edge reaches 50 at frame 20
                let x = 5.0 + (n - 10) as f64 * 2.0;
                BoundingBoxFrame {
                    frame_number: n,
                    data: vec![Detection {
                        id: 1,
                        x,
                        y: 100.0,
                        width: if n == 20 { 50.0 - x } else { 10.0 },
                        height: 40.0,
                    }],
                }
            })
            .collect()
    }

    #[test]
    fn test_task_box_union_over_window() {
        let fps = 30.0;
        let task = Task::new(1, "Gait", 10.0 / fps, 20.0 / fps);
        let boxes = derive_task_boxes(&[task], &frames_10_to_20(), fps, &BTreeMap::new());
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].x, 5.0);
        assert_eq!(boxes[0].width, 45.0);
        assert_eq!(boxes[0].y, 100.0);
        assert_eq!(boxes[0].height, 40.0);
    }

    #[test]
    fn test_frame_window_bounds() {
        assert_eq!(frame_window(10.0 / 30.0, 20.0 / 30.0, 30.0), (10, 20));
        assert_eq!(frame_window(0.51, 0.99, 10.0), (6, 9));
        assert_eq!(frame_window(1.0 / 3.0, 2.0 / 3.0, 29.97), (10, 19));
    }

    #[test]
    fn test_window_excludes_outside_frames() {
        let fps = 30.0;
        let task = Task::new(1, "Gait", 12.0 / fps, 14.0 / fps);
        let rect = union_box(&task, &frames_10_to_20(), fps).unwrap();
        assert_eq!(rect.x, 9.0);
        assert_eq!(rect.right(), 23.0);
    }

    #[test]
    fn test_sticky_rect_wins_and_empty_window_skipped() {
        let fps = 30.0;
        let tasks = vec![
            Task::new(1, "A", 10.0 / fps, 20.0 / fps),
            Task::new(2, "B", 100.0, 101.0),
        ];
        let mut sticky = BTreeMap::new();
        sticky.insert(1, BoxRect::new(1.0, 2.0, 3.0, 4.0));
        let boxes = derive_task_boxes(&tasks, &frames_10_to_20(), fps, &sticky);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].rect(), BoxRect::new(1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn test_next_task_id() {
        assert_eq!(next_task_id(&[]), 1);
        let tasks = vec![Task::new(4, "a", 0.0, 1.0), Task::new(2, "b", 0.0, 1.0)];
        assert_eq!(next_task_id(&tasks), 5);
    }

    #[test]
    fn test_sanitize_task_name() {
        assert_eq!(sanitize_task_name("Gait"), "gait");
        assert_eq!(sanitize_task_name("Finger Tapping (Left)"), "finger_tapping_left");
        assert_eq!(sanitize_task_name("  hand--movement  "), "hand_movement");
        assert_eq!(sanitize_task_name("?!"), "");
    }

    #[test]
    fn test_task_serde_with_extra_fields() {
        let task: Task = serde_json::from_str(
            r#"{"id": 3, "name": "Gait", "start": 1.0, "end": 2.5, "data": null, "focal_length": 35}"#,
        )
        .unwrap();
        assert_eq!(task.extra.get("focal_length").and_then(|v| v.as_f64()), Some(35.0));
        assert!(task.data.is_none());

        let tb = TaskBox::from_task(&task, BoxRect::new(1.0, 2.0, 3.0, 4.0));
        let json = serde_json::to_value(&tb).unwrap();
        assert_eq!(json["width"], 3.0);
        assert_eq!(json["focal_length"], 35);
        assert_eq!(json["name"], "Gait");
    }

    #[test]
    fn test_new_task_orders_times() {
        let t = Task::new(1, "x", 5.0, 2.0);
        assert_eq!((t.start, t.end), (2.0, 5.0));
        assert_eq!(round_ms(2.00049), 2.0);
        assert_eq!(round_ms(1.23456), 1.235);
    }
}
