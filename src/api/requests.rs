//! Request bodies for the analysis backend.
//!
//! Each builder snapshots what it needs from the store at call time, so the
//! request stays valid after the UI moves on.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::entities::payload::{LANDMARKS_KEY, VELOCITY_PLOT_KEY};
use crate::entities::task::sanitize_task_name;
use crate::entities::{AnalysisPayload, BoxRect, Series, Task, TaskId};

/// `POST /update_landmarks/` body.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkUpdate {
    pub task_id: TaskId,
    pub task_name: String,
    pub start_time: f64,
    pub end_time: f64,
    pub fps: f64,
    pub landmarks: Value,
    pub task_data: Map<String, Value>,
}

impl LandmarkUpdate {
    /// Snapshot a task whose payload carries landmarks.
    pub fn from_task(task: &Task, fps: f64) -> Option<Self> {
        let data = task.data.as_ref()?;
        let landmarks = data.get(LANDMARKS_KEY)?.clone();
        Some(Self {
            task_id: task.id,
            task_name: task.name.clone(),
            start_time: task.start,
            end_time: task.end,
            fps,
            landmarks,
            task_data: data.as_map().clone(),
        })
    }

    /// `{task_name, start_time, end_time, fps, landmarks, ...taskData}`
    ///
    /// Task data keys are spread last and win on collision.
    pub fn json_data(&self) -> Value {
        let mut body = Map::new();
        body.insert("task_name".into(), Value::from(self.task_name.clone()));
        body.insert("start_time".into(), Value::from(self.start_time));
        body.insert("end_time".into(), Value::from(self.end_time));
        body.insert("fps".into(), Value::from(self.fps));
        body.insert("landmarks".into(), self.landmarks.clone());
        for (k, v) in &self.task_data {
            body.insert(k.clone(), v.clone());
        }
        Value::Object(body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBoxField {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl From<BoxRect> for BoundingBoxField {
    fn from(r: BoxRect) -> Self {
        Self {
            x: r.x,
            y: r.y,
            width: r.width,
            height: r.height,
        }
    }
}

/// `POST /{sanitized_task_name}/?id={video_id}` multipart request.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskAnalysis {
    pub task_id: TaskId,
    pub video_id: String,
    pub endpoint: String,
    pub task_name: String,
    pub bounding_box: BoundingBoxField,
    pub start_time: f64,
    pub end_time: f64,
    pub fps: f64,
    /// Remaining task fields (everything except start, end, name, data)
    pub other_fields: Map<String, Value>,
}

impl TaskAnalysis {
    pub fn new(video_id: &str, task: &Task, rect: BoxRect, fps: f64) -> Self {
        Self {
            task_id: task.id,
            video_id: video_id.to_string(),
            endpoint: sanitize_task_name(&task.name),
            task_name: task.name.clone(),
            bounding_box: rect.into(),
            start_time: task.start,
            end_time: task.end,
            fps,
            other_fields: task.extra.clone(),
        }
    }

    pub fn json_data(&self) -> Value {
        let mut body = Map::new();
        body.insert("boundingBox".into(), json!(self.bounding_box));
        body.insert("task_name".into(), Value::from(self.task_name.clone()));
        body.insert("start_time".into(), Value::from(self.start_time));
        body.insert("end_time".into(), Value::from(self.end_time));
        body.insert("fps".into(), Value::from(self.fps));
        body.insert("id".into(), Value::from(self.task_id));
        for (k, v) in &self.other_fields {
            body.insert(k.clone(), v.clone());
        }
        Value::Object(body)
    }
}

/// `POST /update_plot/` body: flattened cycle and velocity series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotUpdate {
    #[serde(skip)]
    pub task_id: TaskId,
    #[serde(rename = "peaks_Data")]
    pub peaks_data: Vec<f64>,
    #[serde(rename = "peaks_Time")]
    pub peaks_time: Vec<f64>,
    #[serde(rename = "valleys_StartData")]
    pub valleys_start_data: Vec<f64>,
    #[serde(rename = "valleys_StartTime")]
    pub valleys_start_time: Vec<f64>,
    #[serde(rename = "valleys_EndData")]
    pub valleys_end_data: Vec<f64>,
    #[serde(rename = "valleys_EndTime")]
    pub valleys_end_time: Vec<f64>,
    #[serde(rename = "velocity_Data")]
    pub velocity_data: Vec<f64>,
    #[serde(rename = "velocity_Time")]
    pub velocity_time: Vec<f64>,
}

impl PlotUpdate {
    pub fn from_payload(task_id: TaskId, data: &AnalysisPayload) -> Self {
        let series = |key: &str| data.series(key).unwrap_or_default();
        let peaks = series("peaks");
        let vs = series("valleys_start");
        let ve = series("valleys_end");
        let velocity: Series = series(VELOCITY_PLOT_KEY);
        Self {
            task_id,
            peaks_data: peaks.data,
            peaks_time: peaks.time,
            valleys_start_data: vs.data,
            valleys_start_time: vs.time,
            valleys_end_data: ve.data,
            valleys_end_time: ve.time,
            velocity_data: velocity.data,
            velocity_time: velocity.time,
        }
    }

    pub fn json_data(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_with_data() -> Task {
        let mut task = Task::new(4, "Finger Tapping", 1.0, 3.0);
        task.extra.insert("hand".into(), json!("left"));
        task.data = AnalysisPayload::from_value(json!({
            "landMarks": [[[1, 2]]],
            "peaks": {"data": [0.9], "time": [1.5]},
            "velocityPlot": {"data": [0.1, 0.2], "time": [1.0, 1.1]},
            "fps": 99
        }));
        task
    }

    #[test]
    fn test_landmark_update_body() {
        let req = LandmarkUpdate::from_task(&task_with_data(), 30.0).unwrap();
        let body = req.json_data();
        assert_eq!(body["task_name"], "Finger Tapping");
        assert_eq!(body["start_time"], 1.0);
        assert_eq!(body["landmarks"], json!([[[1, 2]]]));
        assert_eq!(body["landMarks"], json!([[[1, 2]]]));
        // task data spread last
        assert_eq!(body["fps"], 99);
    }

    #[test]
    fn test_landmark_update_requires_landmarks() {
        let task = Task::new(1, "Gait", 0.0, 1.0);
        assert!(LandmarkUpdate::from_task(&task, 30.0).is_none());
    }

    #[test]
    fn test_task_analysis_body() {
        let req = TaskAnalysis::new("vid", &task_with_data(), BoxRect::new(1.0, 2.0, 3.0, 4.0), 25.0);
        assert_eq!(req.endpoint, "finger_tapping");
        let body = req.json_data();
        assert_eq!(body["boundingBox"], json!({"x": 1.0, "y": 2.0, "width": 3.0, "height": 4.0}));
        assert_eq!(body["hand"], "left");
        assert_eq!(body["fps"], 25.0);
        assert!(body.get("data").is_none());
        assert!(body.get("name").is_none());
    }

    #[test]
    fn test_plot_update_field_names() {
        let task = task_with_data();
        let req = PlotUpdate::from_payload(task.id, task.data.as_ref().unwrap());
        let body = req.json_data();
        assert_eq!(body["peaks_Time"], json!([1.5]));
        assert_eq!(body["valleys_StartData"], json!([]));
        assert_eq!(body["velocity_Data"], json!([0.1, 0.2]));
        assert!(body.get("task_id").is_none());
    }
}
