//! Validation of manually uploaded JSON documents.
//!
//! Every parser either returns a fully-typed document or an [`ImportError`];
//! callers apply the result to the store only on success, so a rejected
//! upload never leaves partial state behind.

use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

use super::bbox::{BoundingBoxFrame, BoxRect};
use super::payload::AnalysisPayload;
use super::person::Person;
use super::task::Task;

#[derive(Debug)]
pub enum ImportError {
    Io(String),
    Json(String),
    MissingField(&'static str),
    InvalidShape(String),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Io(msg) => write!(f, "Cannot read file: {}", msg),
            ImportError::Json(msg) => write!(f, "Invalid JSON: {}", msg),
            ImportError::MissingField(field) => write!(f, "Missing required field '{}'", field),
            ImportError::InvalidShape(msg) => write!(f, "Unexpected document shape: {}", msg),
        }
    }
}

impl std::error::Error for ImportError {}

/// A task read from a document, with its rectangle when one was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedTask {
    pub task: Task,
    pub rect: Option<BoxRect>,
}

/// Full annotation bundle for one video.
#[derive(Debug, Clone, Default)]
pub struct VideoBundle {
    pub fps: Option<f64>,
    pub video_name: Option<String>,
    pub persons: Vec<Person>,
    pub bounding_boxes: Vec<BoundingBoxFrame>,
    pub tasks: Vec<ImportedTask>,
}

/// Subject-screen upload: detections plus optional person list.
#[derive(Debug, Clone)]
pub struct SubjectUpload {
    pub bounding_boxes: Vec<BoundingBoxFrame>,
    pub persons: Option<Vec<Person>>,
}

/// Task-screen upload.
#[derive(Debug, Clone)]
pub enum TaskUpload {
    /// `{boundingBoxes, fps, tasks?}`
    Full {
        bounding_boxes: Vec<BoundingBoxFrame>,
        fps: f64,
        tasks: Option<Vec<ImportedTask>>,
    },
    /// `[{start, end, attributes: {label}}]`
    Legacy(Vec<Task>),
}

pub fn read_json(path: &Path) -> Result<Value, ImportError> {
    let text = std::fs::read_to_string(path).map_err(|e| ImportError::Io(format!("{}: {}", path.display(), e)))?;
    parse_json(&text)
}

pub fn parse_json(text: &str) -> Result<Value, ImportError> {
    serde_json::from_str(text).map_err(|e| ImportError::Json(e.to_string()))
}

fn typed<T: serde::de::DeserializeOwned>(value: &Value, field: &'static str) -> Result<T, ImportError> {
    serde_json::from_value(value.clone()).map_err(|e| ImportError::InvalidShape(format!("{}: {}", field, e)))
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>, ImportError> {
    value
        .as_object()
        .ok_or_else(|| ImportError::InvalidShape(format!("{} must be a JSON object", what)))
}

/// Split the rectangle fields off a stored task/task-box object.
pub fn parse_task_entry(value: &Value) -> Result<ImportedTask, ImportError> {
    let mut obj = as_object(value, "task")?.clone();
    let mut take = |key: &str| obj.remove(key).and_then(|v| v.as_f64());
    let (x, y, w, h) = (take("x"), take("y"), take("width"), take("height"));
    let rect = match (x, y, w, h) {
        (Some(x), Some(y), Some(w), Some(h)) => Some(BoxRect::new(x, y, w, h)).filter(BoxRect::is_finite),
        _ => None,
    };
    let mut task: Task = typed(&Value::Object(obj), "tasks")?;
    task.normalize();
    Ok(ImportedTask { task, rect })
}

fn parse_task_list(value: &Value) -> Result<Vec<ImportedTask>, ImportError> {
    let list = value
        .as_array()
        .ok_or_else(|| ImportError::InvalidShape("tasks must be an array".into()))?;
    list.iter().map(parse_task_entry).collect()
}

/// `{metadata: {fps, video_name}, persons, boundingBoxes, tasks}`
pub fn parse_bundle(value: &Value) -> Result<VideoBundle, ImportError> {
    let obj = as_object(value, "bundle")?;
    let metadata = obj.get("metadata");
    let fps = metadata
        .and_then(|m| m.get("fps"))
        .or_else(|| obj.get("fps"))
        .and_then(Value::as_f64)
        .filter(|fps| *fps > 0.0);
    let video_name = metadata
        .and_then(|m| m.get("video_name"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let persons = match obj.get("persons") {
        Some(v) => typed(v, "persons")?,
        None => Vec::new(),
    };
    let bounding_boxes = match obj.get("boundingBoxes") {
        Some(v) => typed(v, "boundingBoxes")?,
        None => Vec::new(),
    };
    // Saved task boxes carry the sticky rectangles; plain tasks do not.
    let tasks = match obj.get("taskBoxes").or_else(|| obj.get("tasks")) {
        Some(v) => parse_task_list(v)?,
        None => Vec::new(),
    };

    Ok(VideoBundle {
        fps,
        video_name,
        persons,
        bounding_boxes,
        tasks,
    })
}

pub fn parse_subject_upload(value: &Value) -> Result<SubjectUpload, ImportError> {
    let obj = as_object(value, "subject file")?;
    let boxes = obj.get("boundingBoxes").ok_or(ImportError::MissingField("boundingBoxes"))?;
    let bounding_boxes = typed(boxes, "boundingBoxes")?;
    let persons = obj.get("persons").map(|p| typed(p, "persons")).transpose()?;
    Ok(SubjectUpload {
        bounding_boxes,
        persons,
    })
}

pub fn parse_task_upload(value: &Value) -> Result<TaskUpload, ImportError> {
    match value {
        Value::Object(obj) => {
            let boxes = obj.get("boundingBoxes").ok_or(ImportError::MissingField("boundingBoxes"))?;
            let fps = obj
                .get("fps")
                .ok_or(ImportError::MissingField("fps"))?
                .as_f64()
                .filter(|f| *f > 0.0)
                .ok_or_else(|| ImportError::InvalidShape("fps must be a positive number".into()))?;
            let tasks = obj.get("tasks").map(parse_task_list).transpose()?;
            Ok(TaskUpload::Full {
                bounding_boxes: typed(boxes, "boundingBoxes")?,
                fps,
                tasks,
            })
        }
        Value::Array(items) => {
            let mut tasks = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let start = item.get("start").and_then(Value::as_f64).ok_or(ImportError::MissingField("start"))?;
                let end = item.get("end").and_then(Value::as_f64).ok_or(ImportError::MissingField("end"))?;
                let label = item
                    .get("attributes")
                    .and_then(|a| a.get("label"))
                    .and_then(Value::as_str)
                    .ok_or(ImportError::MissingField("attributes.label"))?;
                tasks.push(Task::new(i as u32 + 1, label, start, end));
            }
            Ok(TaskUpload::Legacy(tasks))
        }
        _ => Err(ImportError::InvalidShape(
            "expected {boundingBoxes, fps} or a list of segments".into(),
        )),
    }
}

/// Per-task analysis upload: any JSON object.
pub fn parse_task_payload(value: &Value) -> Result<AnalysisPayload, ImportError> {
    AnalysisPayload::from_value(value.clone())
        .ok_or_else(|| ImportError::InvalidShape("task data must be a JSON object".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subject_upload_requires_boxes() {
        let err = parse_subject_upload(&json!({"persons": []})).unwrap_err();
        assert!(matches!(err, ImportError::MissingField("boundingBoxes")));

        let ok = parse_subject_upload(&json!({
            "boundingBoxes": [{"frameNumber": 0, "data": [{"id": 1, "x": 0, "y": 0, "width": 5, "height": 5}]}]
        }))
        .unwrap();
        assert_eq!(ok.bounding_boxes.len(), 1);
        assert!(ok.persons.is_none());
    }

    #[test]
    fn test_task_upload_full_format() {
        let upload = parse_task_upload(&json!({
            "boundingBoxes": [],
            "fps": 30,
            "tasks": [{"id": 2, "name": "Gait", "start": 3.0, "end": 1.0, "data": null,
                       "x": 1, "y": 2, "width": 3, "height": 4}]
        }))
        .unwrap();
        let TaskUpload::Full { fps, tasks, .. } = upload else {
            panic!("expected full format");
        };
        assert_eq!(fps, 30.0);
        let tasks = tasks.unwrap();
        assert_eq!(tasks[0].rect, Some(BoxRect::new(1.0, 2.0, 3.0, 4.0)));
        assert_eq!((tasks[0].task.start, tasks[0].task.end), (1.0, 3.0));
        assert!(tasks[0].task.extra.is_empty());
    }

    #[test]
    fn test_task_upload_legacy_format() {
        let upload = parse_task_upload(&json!([
            {"start": 0.5, "end": 2.0, "attributes": {"label": "Gait"}},
            {"start": 3.0, "end": 4.0, "attributes": {"label": "Finger Tapping"}}
        ]))
        .unwrap();
        let TaskUpload::Legacy(tasks) = upload else {
            panic!("expected legacy format");
        };
        assert_eq!(tasks.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(tasks[1].name, "Finger Tapping");
        assert!(tasks.iter().all(|t| t.data.is_none()));
    }

    #[test]
    fn test_task_upload_rejects_other_shapes() {
        assert!(parse_task_upload(&json!("tasks")).is_err());
        assert!(matches!(
            parse_task_upload(&json!({"boundingBoxes": []})).unwrap_err(),
            ImportError::MissingField("fps")
        ));
        assert!(parse_task_upload(&json!([{"start": 1.0}])).is_err());
    }

    #[test]
    fn test_bundle_prefers_task_boxes() {
        let bundle = parse_bundle(&json!({
            "metadata": {"fps": 25.0, "video_name": "walk.mp4"},
            "tasks": [{"id": 1, "name": "A", "start": 0, "end": 1}],
            "taskBoxes": [{"id": 1, "name": "A", "start": 0, "end": 1, "x": 0, "y": 0, "width": 10, "height": 10}]
        }))
        .unwrap();
        assert_eq!(bundle.fps, Some(25.0));
        assert_eq!(bundle.video_name.as_deref(), Some("walk.mp4"));
        assert!(bundle.tasks[0].rect.is_some());
    }

    #[test]
    fn test_task_payload_must_be_object() {
        assert!(parse_task_payload(&json!({"peaks": {}})).is_ok());
        assert!(parse_task_payload(&json!([1])).is_err());
        assert!(matches!(parse_json("{oops").unwrap_err(), ImportError::Json(_)));
    }
}
