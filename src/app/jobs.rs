//! Background backend calls and how their results land in the store.
//!
//! Jobs run on the worker pool with snapshot data only; results come back
//! through a channel drained once per UI frame and are applied here.

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, error, info, warn};
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::{AnalysisBackend, ApiError, AutoSave, LandmarkUpdate, PlotUpdate, SliceSnapshot, TaskAnalysis};
use crate::core::Workers;
use crate::entities::{AnalysisPayload, AnnotationStore, TaskId};
use crate::widgets::viewport::OverlayEditor;

/// Outcome of one background call.
///
/// Task ids restart with every video, so task results also carry the video
/// they were requested for.
#[derive(Debug)]
pub enum JobResult {
    Landmarks {
        video_id: String,
        task_id: TaskId,
        result: Result<AnalysisPayload, ApiError>,
    },
    Analysis {
        video_id: String,
        task_id: TaskId,
        result: Result<AnalysisPayload, ApiError>,
    },
    Plot {
        video_id: String,
        task_id: TaskId,
        result: Result<Value, ApiError>,
    },
    Saved {
        snapshot: SliceSnapshot,
        ok: bool,
    },
}

impl JobResult {
    /// Video a task result belongs to; None for autosave results, which
    /// carry their own snapshot.
    pub fn video_id(&self) -> Option<&str> {
        match self {
            JobResult::Landmarks { video_id, .. } | JobResult::Analysis { video_id, .. } | JobResult::Plot { video_id, .. } => {
                Some(video_id)
            }
            JobResult::Saved { .. } => None,
        }
    }

    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            JobResult::Landmarks { task_id, .. } | JobResult::Analysis { task_id, .. } | JobResult::Plot { task_id, .. } => {
                Some(*task_id)
            }
            JobResult::Saved { .. } => None,
        }
    }
}

/// Job dispatch plus bookkeeping of what is in flight.
pub struct Jobs {
    tx: Sender<JobResult>,
    rx: Receiver<JobResult>,
    analyzing: HashSet<TaskId>,
}

impl Default for Jobs {
    fn default() -> Self {
        Self::new()
    }
}

impl Jobs {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            analyzing: HashSet::new(),
        }
    }

    pub fn is_analyzing(&self, id: TaskId) -> bool {
        self.analyzing.contains(&id)
    }

    pub fn analyzing_count(&self) -> usize {
        self.analyzing.len()
    }

    /// Forget in-flight analyses. Their results are dropped on arrival
    /// once the video has changed.
    pub fn reset(&mut self) {
        if !self.analyzing.is_empty() {
            debug!("Jobs: {} in-flight analysis result(s) orphaned", self.analyzing.len());
        }
        self.analyzing.clear();
    }

    pub fn landmarks(
        &self,
        workers: &Workers,
        backend: &Arc<dyn AnalysisBackend>,
        video_id: String,
        task_id: TaskId,
        request: LandmarkUpdate,
    ) {
        let backend = Arc::clone(backend);
        let tx = self.tx.clone();
        workers.execute(move || {
            let result = backend.update_landmarks(&request);
            let _ = tx.send(JobResult::Landmarks { video_id, task_id, result });
        });
    }

    /// Analyze tasks one after another on a single worker. Each result is
    /// reported as soon as it arrives; failures do not stop the batch.
    pub fn analyze(
        &mut self,
        workers: &Workers,
        backend: &Arc<dyn AnalysisBackend>,
        video_path: PathBuf,
        requests: Vec<TaskAnalysis>,
    ) {
        let requests: Vec<TaskAnalysis> = requests
            .into_iter()
            .filter(|r| {
                let fresh = self.analyzing.insert(r.task_id);
                if !fresh {
                    debug!("Jobs: task {} already being analyzed", r.task_id);
                }
                fresh
            })
            .collect();
        if requests.is_empty() {
            return;
        }
        info!("Jobs: analyzing {} task(s)", requests.len());
        let backend = Arc::clone(backend);
        let tx = self.tx.clone();
        workers.execute(move || {
            let video = match std::fs::read(&video_path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    for r in requests {
                        let err = ApiError::Transport(format!("cannot read {}: {}", video_path.display(), e));
                        let _ = tx.send(JobResult::Analysis {
                            video_id: r.video_id,
                            task_id: r.task_id,
                            result: Err(err),
                        });
                    }
                    return;
                }
            };
            for r in requests {
                let result = backend.analyze_task(&r, video.clone());
                let _ = tx.send(JobResult::Analysis {
                    video_id: r.video_id,
                    task_id: r.task_id,
                    result,
                });
            }
        });
    }

    pub fn plot(&self, workers: &Workers, backend: &Arc<dyn AnalysisBackend>, video_id: String, request: PlotUpdate) {
        let backend = Arc::clone(backend);
        let tx = self.tx.clone();
        workers.execute(move || {
            let task_id = request.task_id;
            let result = backend.update_plot(&request);
            let _ = tx.send(JobResult::Plot { video_id, task_id, result });
        });
    }

    /// Upload every changed slice. Returns the number of uploads started.
    pub fn autosave(
        &self,
        workers: &Workers,
        backend: &Arc<dyn AnalysisBackend>,
        autosave: &mut AutoSave,
        store: &AnnotationStore,
    ) -> usize {
        let snapshots = autosave.pending_snapshots(store);
        for snapshot in &snapshots {
            autosave.mark_in_flight(snapshot);
            let snapshot = snapshot.clone();
            let backend = Arc::clone(backend);
            let tx = self.tx.clone();
            workers.execute(move || {
                let ok = AutoSave::upload(backend.as_ref(), &snapshot);
                let _ = tx.send(JobResult::Saved { snapshot, ok });
            });
        }
        snapshots.len()
    }

    /// Results that arrived since the last call.
    pub fn drain(&self) -> Vec<JobResult> {
        self.rx.try_iter().collect()
    }

    /// Apply one result. Returns a user-facing status line when there is
    /// something to report.
    pub fn apply(
        &mut self,
        result: JobResult,
        store: &mut AnnotationStore,
        overlay: &mut OverlayEditor,
        autosave: &mut AutoSave,
    ) -> Option<String> {
        let file_name = store.session().map(|s| s.base_name()).unwrap_or_default();
        if let Some(origin) = result.video_id()
            && store.video_id() != Some(origin)
        {
            debug!("Jobs: result for task {} of video '{}' dropped", result.task_id().unwrap_or_default(), origin);
            return None;
        }
        match result {
            JobResult::Landmarks { task_id, result, .. } => {
                overlay.finish_processing(task_id);
                match result {
                    Ok(payload) => {
                        store.replace_task_data(task_id, payload.with_file_name(&file_name));
                        debug!("Jobs: landmarks of task {} recomputed", task_id);
                        None
                    }
                    Err(e) => {
                        error!("Jobs: landmark update for task {} failed: {}", task_id, e);
                        Some(format!("Landmark update failed: {}", e))
                    }
                }
            }
            JobResult::Analysis { task_id, result, .. } => {
                self.analyzing.remove(&task_id);
                match result {
                    Ok(payload) => {
                        store.replace_task_data(task_id, payload.with_file_name(&file_name));
                        info!("Jobs: task {} analyzed", task_id);
                        None
                    }
                    Err(e) if e.is_no_analyzer() => {
                        warn!("Jobs: {}", e);
                        Some(e.to_string())
                    }
                    Err(e) => {
                        error!("Jobs: analysis of task {} failed: {}", task_id, e);
                        Some(format!("Analysis failed: {}", e))
                    }
                }
            }
            JobResult::Plot { task_id, result, .. } => match result {
                Ok(table) => {
                    store.update_task_data(task_id, |data| data.set_radar_table(table));
                    None
                }
                Err(e) => {
                    error!("Jobs: plot update for task {} failed: {}", task_id, e);
                    Some(format!("Plot update failed: {}", e))
                }
            },
            JobResult::Saved { snapshot, ok } => {
                if ok {
                    autosave.mark_saved(&snapshot);
                } else {
                    autosave.mark_failed(&snapshot);
                }
                None
            }
        }
    }
}
