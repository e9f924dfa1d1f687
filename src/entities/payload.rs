//! Analysis payload: the backend's per-task result bundle.
//!
//! Treated as an opaque JSON object except for the fields the editors touch
//! directly: `landMarks`, `landmark_colors`, the cycle series
//! (`peaks`, `valleys_start`, `valleys_end`, `velocityPlot`) and `radarTable`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const LANDMARKS_KEY: &str = "landMarks";
pub const LANDMARK_COLORS_KEY: &str = "landmark_colors";
pub const RADAR_TABLE_KEY: &str = "radarTable";
pub const FILE_NAME_KEY: &str = "fileName";
pub const LINE_PLOT_KEY: &str = "linePlot";
pub const VELOCITY_PLOT_KEY: &str = "velocityPlot";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisPayload(Map<String, Value>);

/// Landmarks stored for one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum LandmarkFrame {
    /// `[[x, y], ...]`, one entry per keypoint
    Points(Vec<[f64; 2]>),
    /// Legacy single-point frames: `[x, y]`
    Single([f64; 2]),
}

/// A `{data, time}` signal series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub data: Vec<f64>,
    #[serde(default)]
    pub time: Vec<f64>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.time.len().min(self.data.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&mut self, time: f64, value: f64) {
        self.time.push(time);
        self.data.push(value);
    }

    pub fn remove(&mut self, idx: usize) {
        if idx < self.time.len() {
            self.time.remove(idx);
        }
        if idx < self.data.len() {
            self.data.remove(idx);
        }
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.time.iter().copied().zip(self.data.iter().copied())
    }
}

fn value_to_point(v: &Value) -> Option<[f64; 2]> {
    let arr = v.as_array()?;
    Some([arr.first()?.as_f64()?, arr.get(1)?.as_f64()?])
}

impl AnalysisPayload {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Wrap a JSON value; only objects qualify.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw `landMarks` array (frames relative to the task start).
    pub fn landmarks(&self) -> Option<&Vec<Value>> {
        self.0.get(LANDMARKS_KEY)?.as_array()
    }

    pub fn landmark_frame_count(&self) -> usize {
        self.landmarks().map(|l| l.len()).unwrap_or(0)
    }

    pub fn landmark_frame(&self, frame_index: i64) -> Option<LandmarkFrame> {
        let idx = usize::try_from(frame_index).ok()?;
        let frame = self.landmarks()?.get(idx)?.as_array()?;
        match frame.first()? {
            Value::Number(_) => {
                let x = frame.first()?.as_f64()?;
                let y = frame.get(1)?.as_f64()?;
                Some(LandmarkFrame::Single([x, y]))
            }
            _ => frame
                .iter()
                .map(value_to_point)
                .collect::<Option<Vec<_>>>()
                .map(LandmarkFrame::Points),
        }
    }

    /// Overwrite one keypoint. Returns false if the slot does not exist.
    pub fn set_landmark(&mut self, frame_index: i64, point_index: usize, point: [f64; 2]) -> bool {
        let Ok(idx) = usize::try_from(frame_index) else {
            return false;
        };
        let Some(slot) = self
            .0
            .get_mut(LANDMARKS_KEY)
            .and_then(Value::as_array_mut)
            .and_then(|frames| frames.get_mut(idx))
            .and_then(Value::as_array_mut)
            .and_then(|points| points.get_mut(point_index))
        else {
            return false;
        };
        if !slot.is_array() {
            return false;
        }
        *slot = Value::from(vec![point[0], point[1]]);
        true
    }

    /// `landmark_colors[frame][index] = [r, g, b]`
    pub fn landmark_color(&self, frame_index: i64, point_index: usize) -> Option<[u8; 3]> {
        let idx = usize::try_from(frame_index).ok()?;
        let rgb = self
            .0
            .get(LANDMARK_COLORS_KEY)?
            .as_array()?
            .get(idx)?
            .as_array()?
            .get(point_index)?
            .as_array()?;
        let channel = |i: usize| -> Option<u8> {
            let v = rgb.get(i)?.as_f64()?;
            Some(v.clamp(0.0, 255.0).round() as u8)
        };
        Some([channel(0)?, channel(1)?, channel(2)?])
    }

    pub fn series(&self, key: &str) -> Option<Series> {
        serde_json::from_value(self.0.get(key)?.clone()).ok()
    }

    pub fn set_series(&mut self, key: &str, series: &Series) {
        let value = serde_json::json!({ "data": series.data, "time": series.time });
        self.0.insert(key.to_string(), value);
    }

    pub fn radar_table(&self) -> Option<&Value> {
        self.0.get(RADAR_TABLE_KEY)
    }

    pub fn set_radar_table(&mut self, table: Value) {
        self.0.insert(RADAR_TABLE_KEY.to_string(), table);
    }

    pub fn file_name(&self) -> Option<&str> {
        self.0.get(FILE_NAME_KEY)?.as_str()
    }

    pub fn with_file_name(mut self, name: &str) -> Self {
        self.0.insert(FILE_NAME_KEY.to_string(), Value::from(name));
        self
    }
}
