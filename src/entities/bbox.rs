//! Per-frame person detections and the rectangle type shared by the
//! overlay, renderer and task-box derivation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub type PersonId = i64;

/// Axis-aligned rectangle in native video pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoxRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoxRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_min_max(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn union(&self, other: &BoxRect) -> BoxRect {
        BoxRect::from_min_max(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }

    pub fn translated(&self, dx: f64, dy: f64) -> BoxRect {
        BoxRect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

/// One detected person rectangle: `{id, x, y, width, height}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: PersonId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Detection {
    pub fn rect(&self) -> BoxRect {
        BoxRect::new(self.x, self.y, self.width, self.height)
    }
}

/// Detections for one video frame. Frames without detections are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBoxFrame {
    pub frame_number: i64,
    #[serde(default)]
    pub data: Vec<Detection>,
}

/// Detections for `frame`, empty when the frame has none.
pub fn detections_at(frames: &[BoundingBoxFrame], frame: i64) -> &[Detection] {
    frames
        .iter()
        .find(|f| f.frame_number == frame)
        .map(|f| f.data.as_slice())
        .unwrap_or(&[])
}

/// Keep only subject detections. Frame entries survive even when emptied.
pub fn filter_to_subjects(frames: &[BoundingBoxFrame], subjects: &HashSet<PersonId>) -> Vec<BoundingBoxFrame> {
    frames
        .iter()
        .map(|f| BoundingBoxFrame {
            frame_number: f.frame_number,
            data: f.data.iter().filter(|d| subjects.contains(&d.id)).copied().collect(),
        })
        .collect()
}
