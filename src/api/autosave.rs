//! Debounced, deduplicating persistence of store slices.
//!
//! Each persisted slice is serialized with sorted keys; a slice is uploaded
//! only when that text differs from the last snapshot the backend accepted
//! for the current video (and from any upload still in flight). Empty slices
//! are never sent. Failed uploads leave the last-saved snapshot untouched,
//! so the next flush retries them.

use log::{debug, error, info, trace};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Instant;

use super::client::AnalysisBackend;
use crate::core::Debouncer;
use crate::entities::{AnnotationStore, Slice};

/// One slice ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceSnapshot {
    pub video_id: String,
    pub slice: Slice,
    pub file_name: String,
    pub body: String,
}

/// Serialize with object keys sorted at every level.
pub fn stable_json(value: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let mut out = Map::new();
                for key in keys {
                    out.insert(key.clone(), sorted(&map[key]));
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    sorted(value).to_string()
}

#[derive(Debug)]
pub struct AutoSave {
    video_id: Option<String>,
    saved: HashMap<Slice, String>,
    in_flight: HashMap<Slice, String>,
    debounce: Debouncer<()>,
    last_saved_at: Option<Instant>,
}

impl AutoSave {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            video_id: None,
            saved: HashMap::new(),
            in_flight: HashMap::new(),
            debounce: Debouncer::new(debounce_ms),
            last_saved_at: None,
        }
    }

    pub fn set_debounce_ms(&mut self, ms: u64) {
        self.debounce.set_delay(ms);
    }

    /// Forget all snapshots when the active video changes.
    pub fn reset_for_video(&mut self, video_id: &str) {
        debug!("AutoSave: reset for video {}", video_id);
        self.video_id = Some(video_id.to_string());
        self.saved.clear();
        self.in_flight.clear();
        self.debounce.cancel();
    }

    /// Screen change: schedule a debounced flush.
    pub fn on_navigation(&mut self, now: Instant) {
        self.debounce.schedule_at((), now);
    }

    /// True once the debounced flush is due.
    pub fn due(&mut self, now: Instant) -> bool {
        self.debounce.tick_at(now).is_some()
    }

    pub fn is_scheduled(&self) -> bool {
        self.debounce.is_pending()
    }

    pub fn last_saved_at(&self) -> Option<Instant> {
        self.last_saved_at
    }

    /// Slices whose serialized form changed since the last accepted upload.
    pub fn pending_snapshots(&self, store: &AnnotationStore) -> Vec<SliceSnapshot> {
        let Some(video_id) = store.video_id() else {
            return Vec::new();
        };
        if self.video_id.as_deref() != Some(video_id) {
            trace!("AutoSave: store video {} not tracked yet", video_id);
        }
        Slice::PERSISTED
            .iter()
            .filter(|slice| !store.slice_is_empty(**slice))
            .filter_map(|&slice| {
                let body = stable_json(&store.slice_value(slice));
                let unchanged = self.saved.get(&slice) == Some(&body) || self.in_flight.get(&slice) == Some(&body);
                (!unchanged).then(|| SliceSnapshot {
                    video_id: video_id.to_string(),
                    slice,
                    file_name: format!("{}.json", slice.file_stem()),
                    body,
                })
            })
            .collect()
    }

    pub fn mark_in_flight(&mut self, snapshot: &SliceSnapshot) {
        self.in_flight.insert(snapshot.slice, snapshot.body.clone());
    }

    /// Record a successful upload. Results for a previous video are ignored.
    pub fn mark_saved(&mut self, snapshot: &SliceSnapshot) {
        if self.video_id.as_deref() != Some(snapshot.video_id.as_str()) {
            trace!("AutoSave: stale save result for {} ignored", snapshot.video_id);
            return;
        }
        if self.in_flight.get(&snapshot.slice) == Some(&snapshot.body) {
            self.in_flight.remove(&snapshot.slice);
        }
        self.saved.insert(snapshot.slice, snapshot.body.clone());
        self.last_saved_at = Some(Instant::now());
        info!("AutoSave: {} saved", snapshot.file_name);
    }

    pub fn mark_failed(&mut self, snapshot: &SliceSnapshot) {
        if self.in_flight.get(&snapshot.slice) == Some(&snapshot.body) {
            self.in_flight.remove(&snapshot.slice);
        }
    }

    /// Upload one snapshot on the calling thread.
    pub fn upload(backend: &dyn AnalysisBackend, snapshot: &SliceSnapshot) -> bool {
        match backend.save_video_data(&snapshot.video_id, &snapshot.file_name, snapshot.body.clone()) {
            Ok(()) => true,
            Err(e) => {
                error!("AutoSave: saving {} failed: {}", snapshot.file_name, e);
                false
            }
        }
    }

    /// Flush every changed slice synchronously (exit path and tests).
    ///
    /// Returns the number of network calls issued.
    pub fn flush_blocking(&mut self, store: &AnnotationStore, backend: &dyn AnalysisBackend) -> usize {
        self.debounce.cancel();
        let snapshots = self.pending_snapshots(store);
        for snapshot in &snapshots {
            if Self::upload(backend, snapshot) {
                self.mark_saved(snapshot);
            }
        }
        snapshots.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::error::ApiError;
    use crate::api::requests::{LandmarkUpdate, PlotUpdate, TaskAnalysis};
    use crate::entities::{AnalysisPayload, TaskBoxPolicy, VideoSession};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every call; fails saves while `fail_saves` is set.
    #[derive(Default)]
    pub(crate) struct RecordingBackend {
        pub saves: Mutex<Vec<(String, String, String)>>,
        pub fail_saves: Mutex<bool>,
    }

    impl AnalysisBackend for RecordingBackend {
        fn update_landmarks(&self, _: &LandmarkUpdate) -> Result<AnalysisPayload, ApiError> {
            Ok(AnalysisPayload::new())
        }
        fn analyze_task(&self, req: &TaskAnalysis, _: Vec<u8>) -> Result<AnalysisPayload, ApiError> {
            Err(ApiError::NoAnalyzer(req.task_name.clone()))
        }
        fn update_plot(&self, _: &PlotUpdate) -> Result<Value, ApiError> {
            Ok(Value::Null)
        }
        fn save_video_data(&self, video_id: &str, file_name: &str, body: String) -> Result<(), ApiError> {
            if *self.fail_saves.lock().unwrap() {
                return Err(ApiError::Transport("offline".into()));
            }
            self.saves
                .lock()
                .unwrap()
                .push((video_id.to_string(), file_name.to_string(), body));
            Ok(())
        }
    }

    fn store() -> AnnotationStore {
        let mut store = AnnotationStore::new(TaskBoxPolicy::default());
        store.load_video(VideoSession {
            video_id: "v1".into(),
            fps: 30.0,
            file_name: "v1.mp4".into(),
            video_path: None,
        });
        store
    }

    #[test]
    fn test_stable_json_sorts_keys() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": {"z": 0, "y": [{"d": 1, "c": 2}]}}"#).unwrap();
        assert_eq!(stable_json(&a), r#"{"a":{"y":[{"c":2,"d":1}],"z":0},"b":1}"#);
    }

    #[test]
    fn test_dedup_identical_payloads() {
        let mut store = store();
        store.add_task("Gait", 0.0, 1.0);
        let backend = RecordingBackend::default();
        let mut autosave = AutoSave::new(500);
        autosave.reset_for_video("v1");

        assert_eq!(autosave.flush_blocking(&store, &backend), 1);
        assert_eq!(autosave.flush_blocking(&store, &backend), 0);

        let saves = backend.saves.lock().unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].0, "v1");
        assert_eq!(saves[0].1, "tasks.json");
    }

    #[test]
    fn test_changed_slice_is_resent() {
        let mut store = store();
        let id = store.add_task("Gait", 0.0, 1.0);
        let backend = RecordingBackend::default();
        let mut autosave = AutoSave::new(500);
        autosave.reset_for_video("v1");
        autosave.flush_blocking(&store, &backend);

        store.update_task(id, |t| t.name = "Other".into());
        assert_eq!(autosave.flush_blocking(&store, &backend), 1);
        assert_eq!(backend.saves.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_failed_save_is_retried() {
        let mut store = store();
        store.add_task("Gait", 0.0, 1.0);
        let backend = RecordingBackend::default();
        *backend.fail_saves.lock().unwrap() = true;
        let mut autosave = AutoSave::new(500);
        autosave.reset_for_video("v1");

        autosave.flush_blocking(&store, &backend);
        assert!(autosave.last_saved_at().is_none());

        *backend.fail_saves.lock().unwrap() = false;
        assert_eq!(autosave.flush_blocking(&store, &backend), 1);
        assert_eq!(backend.saves.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_in_flight_suppresses_duplicates_and_stale_results() {
        let mut store = store();
        store.add_task("Gait", 0.0, 1.0);
        let mut autosave = AutoSave::new(500);
        autosave.reset_for_video("v1");

        let snaps = autosave.pending_snapshots(&store);
        assert_eq!(snaps.len(), 1);
        autosave.mark_in_flight(&snaps[0]);
        assert!(autosave.pending_snapshots(&store).is_empty());

        autosave.reset_for_video("v2");
        autosave.mark_saved(&snaps[0]);
        assert!(autosave.last_saved_at().is_none());
    }

    #[test]
    fn test_navigation_debounce() {
        let mut autosave = AutoSave::new(500);
        let t0 = Instant::now();
        autosave.on_navigation(t0);
        autosave.on_navigation(t0 + Duration::from_millis(300));
        assert!(!autosave.due(t0 + Duration::from_millis(700)));
        assert!(autosave.due(t0 + Duration::from_millis(800)));
        assert!(!autosave.is_scheduled());
    }
}
