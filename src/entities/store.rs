//! Annotation store: sole owner of persons, detections, tasks, the derived
//! task-box view and the calibration slice.
//!
//! All mutation goes through setters that read the latest collection, apply
//! a change, and replace it (functional update). After every task-affecting
//! change the task-box view is recomputed from
//! `(tasks, detections, sticky rectangles)`; sticky rectangles are dropped
//! when a task's start/end moves (and on rename when configured).
//!
//! Every change bumps the revision and emits [`StoreChanged`] on the bus.

use log::{debug, info, trace, warn};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use crate::core::EventBus;

use super::bbox::{BoundingBoxFrame, BoxRect, PersonId, filter_to_subjects};
use super::calibration::Calibration;
use super::import::{ImportedTask, SubjectUpload, TaskUpload, VideoBundle};
use super::payload::AnalysisPayload;
use super::person::{Person, auto_mark_single_subject, derive_persons};
use super::task::{DEFAULT_TASK_NAME, Task, TaskBox, TaskId, derive_task_boxes, next_task_id};

/// Persisted slices of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slice {
    Persons,
    BoundingBoxes,
    TaskBoxes,
    Tasks,
    Calibration,
}

impl Slice {
    /// Slices written by autosave, in upload order.
    pub const PERSISTED: [Slice; 4] = [Slice::Persons, Slice::BoundingBoxes, Slice::TaskBoxes, Slice::Tasks];

    pub fn file_stem(&self) -> &'static str {
        match self {
            Slice::Persons => "persons",
            Slice::BoundingBoxes => "boundingBoxes",
            Slice::TaskBoxes => "taskBoxes",
            Slice::Tasks => "tasks",
            Slice::Calibration => "calibration",
        }
    }
}

/// Emitted after any store mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreChanged {
    pub slice: Slice,
    pub revision: u64,
}

/// Emitted when the active video changes and all slices are cleared.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoChanged {
    pub video_id: String,
}

/// Identity of the video being annotated.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSession {
    pub video_id: String,
    pub fps: f64,
    /// Display name of the video file, extension included
    pub file_name: String,
    pub video_path: Option<PathBuf>,
}

impl VideoSession {
    /// File name without extension, sanitized for result file names.
    pub fn base_name(&self) -> String {
        let stem = std::path::Path::new(&self.file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        safe_file_name(&stem)
    }
}

/// Replace characters that are unsafe in file names with `_`.
pub fn safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

/// How the derived task-box view reacts to task edits.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskBoxPolicy {
    /// Drop the sticky rectangle when a task is renamed
    pub reset_on_rename: bool,
    /// Task names that carry calibration fields
    pub calibrated_tasks: Vec<String>,
}

impl Default for TaskBoxPolicy {
    fn default() -> Self {
        Self {
            reset_on_rename: false,
            calibrated_tasks: vec!["Gait".to_string()],
        }
    }
}

#[derive(Debug, Default)]
pub struct AnnotationStore {
    session: Option<VideoSession>,
    persons: Vec<Person>,
    bounding_boxes: Vec<BoundingBoxFrame>,
    tasks: Vec<Task>,
    task_boxes: Vec<TaskBox>,
    sticky: BTreeMap<TaskId, BoxRect>,
    calibration: Calibration,
    subjects_finalized: bool,
    revision: u64,
    policy: TaskBoxPolicy,
    bus: Option<EventBus>,
}

impl AnnotationStore {
    pub fn new(policy: TaskBoxPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn set_policy(&mut self, policy: TaskBoxPolicy) {
        self.policy = policy;
    }

    // ========== Session ==========

    /// Switch to a new video: every collection and flag is reset.
    pub fn load_video(&mut self, session: VideoSession) {
        info!("Store: loading video '{}' ({} fps)", session.video_id, session.fps);
        let video_id = session.video_id.clone();
        self.session = Some(session);
        self.persons.clear();
        self.bounding_boxes.clear();
        self.tasks.clear();
        self.task_boxes.clear();
        self.sticky.clear();
        self.calibration = Calibration::default();
        self.subjects_finalized = false;
        self.revision += 1;
        if let Some(bus) = &self.bus {
            bus.emit(VideoChanged { video_id });
        }
    }

    /// Populate the fresh session from a saved bundle.
    pub fn apply_bundle(&mut self, bundle: VideoBundle) {
        if let (Some(fps), Some(session)) = (bundle.fps, self.session.as_mut()) {
            session.fps = fps;
        }
        if let (Some(name), Some(session)) = (bundle.video_name, self.session.as_mut()) {
            session.file_name = name;
        }
        let persons = if bundle.persons.is_empty() { None } else { Some(bundle.persons) };
        self.replace_detections(bundle.bounding_boxes, persons);
        self.replace_tasks(bundle.tasks);
        debug!(
            "Store: bundle applied ({} persons, {} frames, {} tasks)",
            self.persons.len(),
            self.bounding_boxes.len(),
            self.tasks.len()
        );
    }

    pub fn session(&self) -> Option<&VideoSession> {
        self.session.as_ref()
    }

    pub fn video_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.video_id.as_str())
    }

    pub fn fps(&self) -> f64 {
        self.session.as_ref().map(|s| s.fps).filter(|f| *f > 0.0).unwrap_or(30.0)
    }

    pub fn set_fps(&mut self, fps: f64) {
        if fps <= 0.0 {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.fps = fps;
        }
        self.refresh_task_boxes();
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    // ========== Read access ==========

    pub fn persons(&self) -> &[Person] {
        &self.persons
    }

    pub fn bounding_boxes(&self) -> &[BoundingBoxFrame] {
        &self.bounding_boxes
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_boxes(&self) -> &[TaskBox] {
        &self.task_boxes
    }

    pub fn task_box(&self, id: TaskId) -> Option<&TaskBox> {
        self.task_boxes.iter().find(|b| b.id == id)
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn subjects_finalized(&self) -> bool {
        self.subjects_finalized
    }

    pub fn subject_ids(&self) -> HashSet<PersonId> {
        self.persons.iter().filter(|p| p.is_subject).map(|p| p.id).collect()
    }

    pub fn is_subject(&self, id: PersonId) -> bool {
        self.persons.iter().any(|p| p.id == id && p.is_subject)
    }

    // ========== Persons & detections ==========

    /// Replace detections. Persons are taken as given or derived from the boxes.
    pub fn replace_detections(&mut self, frames: Vec<BoundingBoxFrame>, persons: Option<Vec<Person>>) {
        let fps = self.fps();
        self.persons = match persons {
            Some(mut given) => {
                auto_mark_single_subject(&mut given);
                given
            }
            None => derive_persons(&frames, fps),
        };
        self.bounding_boxes = frames;
        self.notify(Slice::Persons);
        self.refresh_task_boxes();
        self.notify(Slice::BoundingBoxes);
    }

    pub fn update_persons<F: FnOnce(&mut Vec<Person>)>(&mut self, f: F) {
        let mut next = self.persons.clone();
        f(&mut next);
        self.persons = next;
        self.notify(Slice::Persons);
    }

    pub fn toggle_subject(&mut self, id: PersonId) -> bool {
        let Some(person) = self.persons.iter_mut().find(|p| p.id == id) else {
            warn!("Store: toggle_subject for unknown person {}", id);
            return false;
        };
        person.is_subject = !person.is_subject;
        debug!("Store: person {} subject={}", id, person.is_subject);
        self.notify(Slice::Persons);
        true
    }

    /// Narrow detections to the chosen subjects. Irreversible for the session.
    ///
    /// Returns the number of detections removed.
    pub fn finalize_subjects(&mut self) -> usize {
        let subjects = self.subject_ids();
        let before: usize = self.bounding_boxes.iter().map(|f| f.data.len()).sum();
        self.bounding_boxes = filter_to_subjects(&self.bounding_boxes, &subjects);
        let after: usize = self.bounding_boxes.iter().map(|f| f.data.len()).sum();
        self.subjects_finalized = true;
        info!(
            "Store: subjects finalized ({:?}), {} detections removed",
            subjects,
            before - after
        );
        self.refresh_task_boxes();
        self.notify(Slice::BoundingBoxes);
        before - after
    }

    pub fn apply_subject_upload(&mut self, upload: SubjectUpload) {
        self.replace_detections(upload.bounding_boxes, upload.persons);
    }

    // ========== Tasks ==========

    /// Functional update of the task collection.
    ///
    /// Sticky rectangles are invalidated for tasks whose start/end moved,
    /// tasks that disappeared, and (by policy) renamed tasks.
    pub fn update_tasks<F: FnOnce(&mut Vec<Task>)>(&mut self, f: F) {
        let previous = self.tasks.clone();
        let mut next = previous.clone();
        f(&mut next);
        for task in &mut next {
            task.normalize();
        }

        let mut dropped = Vec::new();
        self.sticky.retain(|id, _| {
            let keep = match (previous.iter().find(|t| t.id == *id), next.iter().find(|t| t.id == *id)) {
                (Some(old), Some(new)) => {
                    let moved = old.start != new.start || old.end != new.end;
                    let renamed = self.policy.reset_on_rename && old.name != new.name;
                    !(moved || renamed)
                }
                (None, Some(_)) => true,
                _ => false,
            };
            if !keep {
                dropped.push(*id);
            }
            keep
        });
        if !dropped.is_empty() {
            trace!("Store: sticky rectangles invalidated for {:?}", dropped);
        }

        self.tasks = next;
        self.refresh_task_boxes();
        self.notify(Slice::Tasks);
    }

    /// Replace every task (and seed sticky rectangles from stored boxes).
    pub fn replace_tasks(&mut self, tasks: Vec<ImportedTask>) {
        self.sticky = tasks
            .iter()
            .filter_map(|t| t.rect.map(|r| (t.task.id, r)))
            .collect();
        self.tasks = tasks.into_iter().map(|t| t.task).collect();
        for task in &mut self.tasks {
            task.normalize();
        }
        self.apply_calibration_to_tasks();
        self.refresh_task_boxes();
        self.notify(Slice::Tasks);
    }

    pub fn apply_task_upload(&mut self, upload: TaskUpload) {
        match upload {
            TaskUpload::Full { bounding_boxes, fps, tasks } => {
                self.set_fps(fps);
                self.replace_detections(bounding_boxes, None);
                if let Some(tasks) = tasks {
                    self.replace_tasks(tasks);
                }
            }
            TaskUpload::Legacy(tasks) => {
                self.replace_tasks(tasks.into_iter().map(|task| ImportedTask { task, rect: None }).collect());
            }
        }
    }

    /// Append a new task with `id = max + 1`. Returns its id.
    pub fn add_task(&mut self, name: &str, start: f64, end: f64) -> TaskId {
        let mut created = 0;
        let calibration = self.calibration;
        let calibrated = self.is_calibrated_name(name);
        self.update_tasks(|tasks| {
            created = next_task_id(tasks);
            let mut task = Task::new(created, name, start, end);
            if calibrated {
                calibration.apply_to(&mut task);
            }
            tasks.push(task);
        });
        debug!("Store: task {} '{}' added [{:.3}, {:.3}]", created, name, start, end);
        created
    }

    /// Add a timeline segment with the default name.
    pub fn add_segment(&mut self, start: f64, end: f64) -> TaskId {
        self.add_task(DEFAULT_TASK_NAME, start, end)
    }

    /// Edit one task. Returns false if the task is gone.
    pub fn update_task<F: FnOnce(&mut Task)>(&mut self, id: TaskId, f: F) -> bool {
        if self.task(id).is_none() {
            warn!("Store: update for missing task {}", id);
            return false;
        }
        let calibration = self.calibration;
        let calibrated_names = self.policy.calibrated_tasks.clone();
        self.update_tasks(|tasks| {
            if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
                f(task);
                if calibrated_names.iter().any(|n| n == &task.name) {
                    calibration.apply_to(task);
                }
            }
        });
        true
    }

    pub fn delete_task(&mut self, id: TaskId) -> bool {
        if self.task(id).is_none() {
            return false;
        }
        self.update_tasks(|tasks| tasks.retain(|t| t.id != id));
        debug!("Store: task {} deleted", id);
        true
    }

    pub fn clear_tasks(&mut self) {
        self.update_tasks(|tasks| tasks.clear());
    }

    /// Null a task's analysis payload without touching the task itself.
    pub fn reset_task_data(&mut self, id: TaskId) -> bool {
        self.update_task(id, |t| t.data = None)
    }

    /// Replace a task's payload wholesale (backend responses, uploads).
    pub fn replace_task_data(&mut self, id: TaskId, payload: AnalysisPayload) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            warn!("Store: payload for missing task {} dropped", id);
            return false;
        };
        task.data = Some(payload);
        self.refresh_task_boxes();
        self.notify(Slice::Tasks);
        true
    }

    /// Modify a task's payload in place (optimistic local edits).
    pub fn update_task_data<F: FnOnce(&mut AnalysisPayload)>(&mut self, id: TaskId, f: F) -> bool {
        let Some(data) = self.tasks.iter_mut().find(|t| t.id == id).and_then(|t| t.data.as_mut()) else {
            return false;
        };
        f(data);
        self.refresh_task_boxes();
        self.notify(Slice::Tasks);
        true
    }

    /// Move one landmark of one frame.
    pub fn set_landmark(&mut self, id: TaskId, frame_index: i64, point_index: usize, point: [f64; 2]) -> bool {
        let mut written = false;
        self.update_task_data(id, |data| {
            written = data.set_landmark(frame_index, point_index, point);
        });
        written
    }

    // ========== Task boxes ==========

    /// Pin a task's rectangle (overlay drag/resize).
    pub fn set_task_rect(&mut self, id: TaskId, rect: BoxRect) -> bool {
        if self.task(id).is_none() {
            return false;
        }
        self.sticky.insert(id, rect);
        self.refresh_task_boxes();
        self.notify(Slice::TaskBoxes);
        true
    }

    pub fn sticky_rect(&self, id: TaskId) -> Option<BoxRect> {
        self.sticky.get(&id).copied()
    }

    /// Recompute the derived view. Only user-placed or imported rectangles are pinned.
    fn refresh_task_boxes(&mut self) {
        let fps = self.fps();
        self.task_boxes = derive_task_boxes(&self.tasks, &self.bounding_boxes, fps, &self.sticky);
    }

    // ========== Calibration ==========

    fn is_calibrated_name(&self, name: &str) -> bool {
        self.policy.calibrated_tasks.iter().any(|n| n == name)
    }

    fn apply_calibration_to_tasks(&mut self) -> usize {
        let calibration = self.calibration;
        let names = &self.policy.calibrated_tasks;
        self.tasks
            .iter_mut()
            .filter(|t| names.iter().any(|n| n == &t.name))
            .map(|t| calibration.apply_to(t))
            .filter(|changed| *changed)
            .count()
    }

    /// Set the shared calibration and push it into every calibrated task.
    pub fn set_calibration(&mut self, calibration: Calibration) {
        if self.calibration == calibration {
            return;
        }
        self.calibration = calibration;
        let changed = self.apply_calibration_to_tasks();
        debug!("Store: calibration {:?} applied to {} task(s)", calibration, changed);
        self.notify(Slice::Calibration);
        if changed > 0 {
            self.refresh_task_boxes();
            self.notify(Slice::Tasks);
        }
    }

    // ========== Serialization ==========

    /// JSON value of a persisted slice.
    pub fn slice_value(&self, slice: Slice) -> Value {
        fn to_value<T: Serialize>(v: &T) -> Value {
            serde_json::to_value(v).unwrap_or(Value::Null)
        }
        match slice {
            Slice::Persons => to_value(&self.persons),
            Slice::BoundingBoxes => to_value(&self.bounding_boxes),
            Slice::TaskBoxes => to_value(&self.task_boxes),
            Slice::Tasks => to_value(&self.tasks),
            Slice::Calibration => to_value(&self.calibration),
        }
    }

    pub fn slice_is_empty(&self, slice: Slice) -> bool {
        match slice {
            Slice::Persons => self.persons.is_empty(),
            Slice::BoundingBoxes => self.bounding_boxes.is_empty(),
            Slice::TaskBoxes => self.task_boxes.is_empty(),
            Slice::Tasks => self.tasks.is_empty(),
            Slice::Calibration => self.calibration.is_empty(),
        }
    }

    fn notify(&mut self, slice: Slice) {
        self.revision += 1;
        if let Some(bus) = &self.bus {
            bus.emit(StoreChanged {
                slice,
                revision: self.revision,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downcast_event;
    use crate::entities::bbox::Detection;

    fn det(id: PersonId, x: f64) -> Detection {
        Detection { id, x, y: 0.0, width: 10.0, height: 10.0 }
    }

    fn session() -> VideoSession {
        VideoSession {
            video_id: "vid-1".into(),
            fps: 10.0,
            file_name: "walk test.mp4".into(),
            video_path: None,
        }
    }

    fn store_with_frames() -> AnnotationStore {
        let mut store = AnnotationStore::new(TaskBoxPolicy::default());
        store.load_video(session());
        store.replace_detections(
            (0..30)
                .map(|n| BoundingBoxFrame { frame_number: n, data: vec![det(1, n as f64), det(2, 100.0)] })
                .collect(),
            None,
        );
        store
    }

    #[test]
    fn test_subject_filtering_scenario() {
        let mut store = store_with_frames();
        store.update_persons(|persons| {
            for p in persons.iter_mut() {
                p.is_subject = p.id == 2;
            }
        });
        let removed = store.finalize_subjects();

        assert_eq!(removed, 30);
        assert!(store.subjects_finalized());
        assert_eq!(store.bounding_boxes().len(), 30);
        for (n, frame) in store.bounding_boxes().iter().enumerate() {
            assert_eq!(frame.frame_number, n as i64);
            assert_eq!(frame.data, vec![det(2, 100.0)]);
        }
    }

    #[test]
    fn test_sticky_rect_survives_rename_not_move() {
        let mut store = store_with_frames();
        let id = store.add_task("Gait", 0.5, 1.0);
        let computed = store.task_box(id).unwrap().rect();
        assert_eq!(computed.x, 5.0);

        let pinned = BoxRect::new(40.0, 40.0, 20.0, 20.0);
        store.set_task_rect(id, pinned);
        store.update_task(id, |t| t.name = "Finger Tapping".into());
        assert_eq!(store.task_box(id).unwrap().rect(), pinned);

        store.update_task(id, |t| t.end = 1.5);
        let recomputed = store.task_box(id).unwrap().rect();
        assert_eq!(recomputed.x, 5.0);
        assert_eq!(recomputed.right(), 110.0);
    }

    #[test]
    fn test_rename_resets_when_configured() {
        let mut store = store_with_frames();
        store.set_policy(TaskBoxPolicy {
            reset_on_rename: true,
            ..TaskBoxPolicy::default()
        });
        let id = store.add_task("Gait", 0.5, 1.0);
        store.set_task_rect(id, BoxRect::new(40.0, 40.0, 20.0, 20.0));
        store.update_task(id, |t| t.name = "Other".into());
        assert_eq!(store.task_box(id).unwrap().x, 5.0);
    }

    #[test]
    fn test_video_change_resets_everything() {
        let mut store = store_with_frames();
        store.add_task("Gait", 0.0, 1.0);
        store.set_calibration(Calibration { focal_length: Some(4.0), height: None });
        store.load_video(VideoSession { video_id: "vid-2".into(), ..session() });

        assert!(store.persons().is_empty());
        assert!(store.bounding_boxes().is_empty());
        assert!(store.tasks().is_empty());
        assert!(store.task_boxes().is_empty());
        assert!(store.calibration().is_empty());
        assert_eq!(store.video_id(), Some("vid-2"));
    }

    #[test]
    fn test_calibration_reaches_calibrated_tasks() {
        let mut store = store_with_frames();
        let gait = store.add_task("Gait", 0.0, 1.0);
        let other = store.add_task("Finger Tapping", 1.0, 2.0);
        store.replace_task_data(gait, AnalysisPayload::new());

        store.set_calibration(Calibration { focal_length: Some(35.0), height: Some(1.8) });
        assert!(store.task(gait).unwrap().data.is_none());
        assert_eq!(store.task(gait).unwrap().extra["height"], 1.8);
        assert!(store.task(other).unwrap().extra.is_empty());

        let later = store.add_task("Gait", 2.0, 3.0);
        assert_eq!(store.task(later).unwrap().extra["focal_length"], 35.0);
    }

    #[test]
    fn test_functional_updates_do_not_lose_writes() {
        let mut store = store_with_frames();
        let a = store.add_task("A", 0.0, 1.0);
        let b = store.add_task("B", 1.0, 2.0);
        store.update_task(a, |t| t.name = "A2".into());
        store.update_task(b, |t| t.set_times(1.5, 2.5));
        assert_eq!(store.task(a).unwrap().name, "A2");
        assert_eq!(store.task(b).unwrap().start, 1.5);
        assert_eq!(store.tasks().len(), 2);
        assert!(store.delete_task(a));
        assert!(!store.delete_task(a));
        assert!(store.task_box(a).is_none());
    }

    #[test]
    fn test_notifications_on_bus() {
        let bus = EventBus::new();
        let mut store = AnnotationStore::new(TaskBoxPolicy::default()).with_bus(bus.clone());
        store.load_video(session());
        bus.poll();
        store.add_task("Gait", 0.0, 1.0);
        let events = bus.poll();
        let changed: Vec<_> = events.iter().filter_map(downcast_event::<StoreChanged>).collect();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].slice, Slice::Tasks);
        assert_eq!(changed[0].revision, store.revision());
    }

    #[test]
    fn test_base_name() {
        assert_eq!(session().base_name(), "walk_test");
    }
}
