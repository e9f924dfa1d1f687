//! Video session and JSON document loading for AnnotatorApp.
//!
//! - Opening a video (reset of every session-scoped component)
//! - Annotation bundles, subject uploads, task config and payload uploads
//! - File dialogs

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

use super::{AnnotatorApp, Notice};
use crate::entities::import::{self, ImportError};
use crate::entities::{TaskId, VideoSession};
use crate::media::{SegmentLoop, VideoMedia};
use crate::screen::Screen;

pub const VIDEO_EXTS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];

pub fn video_dialog(title: &str) -> rfd::FileDialog {
    rfd::FileDialog::new().add_filter("Video Files", VIDEO_EXTS).set_title(title)
}

pub fn json_dialog(title: &str) -> rfd::FileDialog {
    rfd::FileDialog::new().add_filter("JSON", &["json"]).set_title(title)
}

impl AnnotatorApp {
    /// Open a video and start a fresh session for it.
    ///
    /// The video id defaults to the file stem; fps comes from the override,
    /// then the bundle, then the decoder.
    pub fn open_video(&mut self, path: &Path, video_id: Option<String>, bundle: Option<&Path>, fps: Option<f64>) -> Result<()> {
        let bundle = bundle
            .map(|p| {
                import::read_json(p)
                    .and_then(|v| import::parse_bundle(&v))
                    .with_context(|| format!("Failed to load annotations from {}", p.display()))
            })
            .transpose()?;
        let media = VideoMedia::open(path).with_context(|| format!("Failed to open video {}", path.display()))?;
        let info = media.info();

        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let video_id = video_id.unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_name.clone())
        });

        self.reset_session();
        self.store.load_video(VideoSession {
            video_id: video_id.clone(),
            fps: info.fps,
            file_name,
            video_path: Some(path.to_path_buf()),
        });
        if let Some(bundle) = bundle {
            self.store.apply_bundle(bundle);
        }
        if let Some(fps) = fps {
            self.store.set_fps(fps);
        }
        self.autosave.reset_for_video(&video_id);
        self.clock.attach(self.store.fps());
        self.renderer.set_intrinsic_size(info.width, info.height);
        self.media = Some(Box::new(media));
        self.video_path = Some(path.to_path_buf());
        info!("Session started for video '{}' ({:.3} fps)", video_id, self.store.fps());
        Ok(())
    }

    /// Tear down everything tied to the previous video.
    fn reset_session(&mut self) {
        self.overlay.reset();
        self.jobs.reset();
        self.cycles.cancel();
        self.clock.detach();
        self.media = None;
        self.video_path = None;
        self.frame_image = None;
        self.texture = None;
        self.rendered_inputs = None;
        self.renderer.reset();
        self.viewport.reset();
        self.segment_loop = SegmentLoop::new();
        self.timeline.cancel_drag(&self.store);
        self.selected_task = None;
        self.upload_notice = None;
        // Entering the first screen of a session is not a navigation
        self.screen = Screen::SubjectResolution;
    }

    pub fn show_open_video_dialog(&mut self) {
        let Some(path) = video_dialog("Open Video").pick_file() else {
            return;
        };
        self.open_dropped(path);
    }

    /// Open a video, picking up a sibling `<stem>.json` bundle if present.
    pub fn open_dropped(&mut self, path: PathBuf) {
        let sibling = path.with_extension("json");
        let bundle = sibling.exists().then_some(sibling);
        if let Err(e) = self.open_video(&path, None, bundle.as_deref(), None) {
            log::error!("{:#}", e);
            self.status = Some(Notice::error(format!("{:#}", e)));
        }
    }

    pub fn show_load_bundle_dialog(&mut self) {
        let Some(video) = self.video_path.clone() else {
            self.status = Some(Notice::error("Open a video before loading annotations"));
            return;
        };
        let Some(path) = json_dialog("Load Annotations").pick_file() else {
            return;
        };
        let video_id = self.store.video_id().map(str::to_string);
        if let Err(e) = self.open_video(&video, video_id, Some(&path), None) {
            log::error!("{:#}", e);
            self.status = Some(Notice::error(format!("{:#}", e)));
        }
    }

    fn report_upload(&mut self, what: &str, result: Result<(), ImportError>) {
        match result {
            Ok(()) => {
                info!("{} uploaded", what);
                self.upload_notice = Some(Notice::info(format!("{} loaded", what)));
            }
            Err(e) => {
                warn!("{} rejected: {}", what, e);
                self.upload_notice = Some(Notice::error(e.to_string()));
            }
        }
    }

    /// Subject screen upload: `{boundingBoxes, persons?}`.
    pub fn upload_subjects(&mut self, path: &Path) {
        let result = import::read_json(path)
            .and_then(|v| import::parse_subject_upload(&v))
            .map(|upload| self.store.apply_subject_upload(upload));
        self.report_upload("Subject file", result);
    }

    /// Task screen upload: new `{boundingBoxes, fps, tasks?}` or legacy array.
    pub fn upload_task_config(&mut self, path: &Path) {
        let result = import::read_json(path)
            .and_then(|v| import::parse_task_upload(&v))
            .map(|upload| self.store.apply_task_upload(upload));
        if result.is_ok() {
            self.clock.set_fps(self.store.fps());
        }
        self.report_upload("Task configuration", result);
    }

    /// Details screen upload: replaces one task's analysis payload.
    pub fn upload_task_payload(&mut self, id: TaskId, path: &Path) {
        let file_name = self.store.session().map(|s| s.base_name()).unwrap_or_default();
        let result = import::read_json(path)
            .and_then(|v| import::parse_task_payload(&v))
            .map(|payload| {
                self.store.replace_task_data(id, payload.with_file_name(&file_name));
            });
        self.report_upload("Task data", result);
    }

    pub fn pick_json(&self, title: &str) -> Option<PathBuf> {
        json_dialog(title).pick_file()
    }
}
