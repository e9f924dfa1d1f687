//! Application module - AnnotatorApp and related functionality.
//!
//! - `session` - opening videos, bundles and JSON uploads
//! - `screens` - side panels for the three workspace screens
//! - `events` - event bus drain and keyboard input
//! - `jobs` - backend calls on the worker pool
//! - `run` - eframe::App implementation

mod events;
pub mod jobs;
mod run;
mod screens;
mod session;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use eframe::egui;
use image::RgbaImage;
use log::{debug, info};

use crate::api::{AnalysisBackend, AutoSave, HttpBackend};
use crate::config::{self, AppSettings, PathConfig};
use crate::core::{EventBus, FrameClock, Subscription, Workers};
use crate::entities::{AnnotationStore, TaskId};
use crate::media::{MediaSource, SegmentLoop};
use crate::render::{CanvasRenderer, RenderContext};
use crate::screen::Screen;
use crate::widgets::cycles::CyclesPanel;
use crate::widgets::timeline::SegmentTimeline;
use crate::widgets::viewport::{OverlayContext, OverlayEditor, ViewportState};

pub use jobs::{JobResult, Jobs};

/// What the app should open on startup (from the command line).
#[derive(Debug, Clone, Default)]
pub struct StartupRequest {
    pub video_path: Option<PathBuf>,
    pub video_id: Option<String>,
    pub bundle: Option<PathBuf>,
    pub fps: Option<f64>,
    pub autoplay: bool,
}

/// Inline message under a panel.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub text: String,
    pub is_error: bool,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// Main application state.
pub struct AnnotatorApp {
    pub settings: AppSettings,
    pub path_config: PathConfig,
    pub event_bus: EventBus,
    pub store: AnnotationStore,
    pub clock: FrameClock,
    /// Set by the frame clock subscription on every presented frame
    frame_presented: Arc<AtomicBool>,
    _tick_subscription: Subscription,

    pub media: Option<Box<dyn MediaSource>>,
    pub video_path: Option<PathBuf>,
    pub segment_loop: SegmentLoop,
    frame_image: Option<Arc<RgbaImage>>,
    pub renderer: CanvasRenderer,
    texture: Option<egui::TextureHandle>,
    /// (store revision, screen, selected task) of the last canvas render
    rendered_inputs: Option<(u64, Screen, Option<TaskId>)>,

    pub viewport: ViewportState,
    pub overlay: OverlayEditor,
    pub timeline: SegmentTimeline,
    pub cycles: CyclesPanel,

    pub autosave: AutoSave,
    pub backend: Arc<dyn AnalysisBackend>,
    pub workers: Workers,
    pub jobs: Jobs,

    pub screen: Screen,
    pub selected_task: Option<TaskId>,
    pub status: Option<Notice>,
    pub upload_notice: Option<Notice>,
    pub frame_entry: String,
    autoplay_pending: bool,
    exit_flushed: bool,
}

impl AnnotatorApp {
    pub fn new(settings: AppSettings, path_config: PathConfig) -> Result<Self> {
        let backend = HttpBackend::new(&settings.api_base_url, settings.request_timeout())
            .with_context(|| format!("Failed to create HTTP client for {}", settings.api_base_url))?;
        Self::with_backend(settings, path_config, Arc::new(backend))
    }

    /// Build the app around any backend implementation.
    pub fn with_backend(settings: AppSettings, path_config: PathConfig, backend: Arc<dyn AnalysisBackend>) -> Result<Self> {
        let event_bus = EventBus::new();
        let clock = FrameClock::new(event_bus.clone());
        let frame_presented = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&frame_presented);
        let tick_subscription = clock.subscribe(move |_| flag.store(true, Ordering::Relaxed));
        let workers = Workers::with_default_threads().context("Failed to start worker threads")?;

        let mut overlay = OverlayEditor::default();
        overlay.set_landmark_color(settings.landmark_default_color);

        Ok(Self {
            store: AnnotationStore::new(settings.task_box_policy()).with_bus(event_bus.clone()),
            clock,
            frame_presented,
            _tick_subscription: tick_subscription,
            media: None,
            video_path: None,
            segment_loop: SegmentLoop::new(),
            frame_image: None,
            renderer: CanvasRenderer::new(),
            texture: None,
            rendered_inputs: None,
            viewport: ViewportState::new(),
            overlay,
            timeline: SegmentTimeline::new(settings.region_redraw_debounce_ms),
            cycles: CyclesPanel::new(),
            autosave: AutoSave::new(settings.autosave_debounce_ms),
            backend,
            workers,
            jobs: Jobs::new(),
            screen: Screen::default(),
            selected_task: None,
            status: None,
            upload_notice: None,
            frame_entry: String::new(),
            autoplay_pending: false,
            exit_flushed: false,
            event_bus,
            path_config,
            settings,
        })
    }

    /// Open whatever the command line asked for.
    pub fn apply_startup(&mut self, request: StartupRequest) {
        let Some(path) = request.video_path else {
            info!("No video provided, starting with empty workspace");
            return;
        };
        if let Err(e) = self.open_video(&path, request.video_id, request.bundle.as_deref(), request.fps) {
            log::error!("{:#}", e);
            self.status = Some(Notice::error(format!("{:#}", e)));
            return;
        }
        self.autoplay_pending = request.autoplay;
    }

    pub fn settings_path(&self) -> PathBuf {
        config::config_file(config::SETTINGS_FILE, &self.path_config)
    }

    pub fn media_ready(&self) -> bool {
        self.media.as_ref().is_some_and(|m| m.is_ready())
    }

    pub fn media_time(&self) -> f64 {
        self.media.as_ref().map(|m| m.current_time()).unwrap_or(0.0)
    }

    pub fn is_playing(&self) -> bool {
        self.media.as_ref().is_some_and(|m| m.is_playing())
    }

    pub fn duration(&self) -> f64 {
        self.media.as_ref().map(|m| m.duration()).unwrap_or(0.0)
    }

    pub fn overlay_context(&self) -> OverlayContext {
        let task_start = self.selected_task.and_then(|id| self.store.task(id)).map(|t| t.start);
        OverlayContext {
            screen: self.screen,
            playing: self.is_playing(),
            media_time: self.media_time(),
            selected_task: self.selected_task,
            landmark_index: self.clock.landmark_frame_index(task_start),
        }
    }

    /// Move to another screen. Every real navigation schedules an autosave.
    pub fn navigate(&mut self, to: Screen) {
        if self.screen == to {
            return;
        }
        debug!("Navigate: {:?} -> {:?}", self.screen, to);
        self.overlay.cancel(&mut self.store);
        self.cycles.cancel();
        self.screen = to;
        self.autosave.on_navigation(Instant::now());
        self.sync_segment_loop();
    }

    /// Open the details screen for one task.
    pub fn open_task(&mut self, id: TaskId) {
        self.selected_task = Some(id);
        self.cycles.cancel();
        self.navigate(Screen::TaskDetails);
        self.sync_segment_loop();
    }

    /// Subject screen "proceed": narrow detections then move on.
    pub fn finalize_subjects(&mut self) {
        let removed = self.store.finalize_subjects();
        info!("Subjects finalized, {} detections dropped", removed);
        self.navigate(Screen::Tasks);
    }

    /// Loop playback inside the selected task while on the details screen.
    fn sync_segment_loop(&mut self) {
        let range = match self.screen {
            Screen::TaskDetails => self
                .selected_task
                .and_then(|id| self.store.task(id))
                .map(|t| (t.start, t.end)),
            _ => None,
        };
        if let Some(media) = self.media.as_deref_mut() {
            self.segment_loop.set(media, range);
        }
    }

    /// Advance the media and publish presented frames on the clock.
    fn pump_media(&mut self) {
        let Some(media) = self.media.as_deref_mut() else {
            return;
        };
        self.segment_loop.enforce(media);
        if let Some(p) = media.poll(Instant::now()) {
            self.frame_image = Some(p.image);
            self.clock.present(p.media_time, p.playing);
        }
        if self.autoplay_pending && media.is_ready() {
            media.play();
            self.autoplay_pending = false;
        }
    }

    /// Redraw the canvas when a frame was presented or its inputs changed,
    /// then upload it as the viewport texture.
    fn refresh_canvas(&mut self, ctx: &egui::Context) {
        let Some(image) = self.frame_image.clone() else {
            return;
        };
        let inputs = (self.store.revision(), self.screen, self.selected_task);
        let presented = self.frame_presented.swap(false, Ordering::Relaxed);
        if !presented && self.rendered_inputs == Some(inputs) {
            return;
        }
        let Some(tick) = self.clock.last_tick() else {
            return;
        };
        let render_ctx = RenderContext {
            frame: tick.frame,
            media_time: tick.media_time,
            playing: self.is_playing(),
            screen: self.screen,
            selected_task: self.selected_task,
            store: &self.store,
            landmark_color: self.settings.landmark_default_color,
        };
        let Some(canvas) = self.renderer.render(&image, &render_ctx) else {
            return;
        };
        let size = [canvas.width() as usize, canvas.height() as usize];
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, canvas.as_raw());
        match &mut self.texture {
            Some(texture) => texture.set(color_image, egui::TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("video_canvas", color_image, egui::TextureOptions::LINEAR));
            }
        }
        self.rendered_inputs = Some(inputs);
    }

    /// Start uploads for changed slices.
    pub fn save_now(&mut self) {
        let started = self.jobs.autosave(&self.workers, &self.backend, &mut self.autosave, &self.store);
        if started > 0 {
            debug!("AutoSave: {} upload(s) started", started);
        }
    }
}
