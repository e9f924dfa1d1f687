//! Panels for AnnotatorApp: menu bar, transport bar and the three
//! workspace screens around the central viewport.

use eframe::egui::{self, Color32};
use egui_extras::{Column, TableBuilder};
use log::{debug, info, warn};

use super::{AnnotatorApp, Notice};
use crate::api::{PlotUpdate, TaskAnalysis};
use crate::entities::task::round_ms;
use crate::entities::{BoxRect, Calibration, Task, TaskId};
use crate::media::playback;
use crate::screen::Screen;
use crate::widgets::cycles::{self, Cycles};
use crate::widgets::{timeline, viewport};

const ROW_HEIGHT: f32 = 22.0;
const DEFAULT_TASK_LENGTH: f64 = 5.0;

fn notice_label(ui: &mut egui::Ui, notice: &Notice) {
    let color = if notice.is_error {
        Color32::from_rgb(230, 80, 80)
    } else {
        ui.visuals().text_color()
    };
    ui.colored_label(color, &notice.text);
}

fn format_time(secs: f64) -> String {
    let secs = secs.max(0.0);
    let minutes = (secs / 60.0).floor() as u64;
    format!("{:02}:{:06.3}", minutes, secs - minutes as f64 * 60.0)
}

/// Edits collected while drawing the task table, applied after it.
enum TaskAction {
    Rename(TaskId, String),
    SetTimes(TaskId, f64, f64),
    Delete(TaskId),
    Analyze(TaskId),
    Open(TaskId),
}

impl AnnotatorApp {
    /// Analysis request for one task. Tasks without a box use the full frame.
    fn analysis_request(&self, task: &Task) -> Option<TaskAnalysis> {
        let video_id = self.store.video_id()?;
        let rect = match self.store.task_box(task.id) {
            Some(task_box) => task_box.rect(),
            None => {
                let (w, h) = self.renderer.size()?;
                BoxRect::new(0.0, 0.0, w as f64, h as f64)
            }
        };
        Some(TaskAnalysis::new(video_id, task, rect, self.store.fps()))
    }

    fn start_analysis(&mut self, ids: &[TaskId]) {
        let Some(video_path) = self.video_path.clone() else {
            self.status = Some(Notice::error("No video loaded"));
            return;
        };
        let requests: Vec<TaskAnalysis> = ids
            .iter()
            .filter_map(|id| self.store.task(*id))
            .filter_map(|task| self.analysis_request(task))
            .collect();
        if requests.is_empty() {
            return;
        }
        self.jobs.analyze(&self.workers, &self.backend, video_path, requests);
    }

    fn seek_to(&mut self, t: f64) {
        if let Some(media) = self.media.as_deref_mut() {
            playback::seek_time(media, t);
        }
    }

    pub(super) fn render_menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open Video...").clicked() {
                        ui.close();
                        self.show_open_video_dialog();
                    }
                    if ui.button("Load Annotations...").clicked() {
                        ui.close();
                        self.show_load_bundle_dialog();
                    }
                    ui.separator();
                    if ui.add_enabled(self.store.session().is_some(), egui::Button::new("Save Now")).clicked() {
                        ui.close();
                        self.save_now();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ui.close();
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
                ui.separator();

                let has_session = self.store.session().is_some();
                for screen in Screen::ALL {
                    let enabled = has_session && (screen != Screen::TaskDetails || self.selected_task.is_some());
                    let selected = self.screen == screen;
                    let clicked = ui
                        .add_enabled_ui(enabled, |ui| ui.selectable_label(selected, screen.title()))
                        .inner
                        .clicked();
                    if clicked {
                        self.navigate(screen);
                    }
                }

                ui.separator();
                if let Some(session) = self.store.session() {
                    ui.monospace(&session.video_id);
                }
                let analyzing = self.jobs.analyzing_count();
                if analyzing > 0 {
                    ui.spinner();
                    ui.label(format!("Analyzing {} task(s)", analyzing));
                }
                if let Some(notice) = &self.status {
                    ui.separator();
                    notice_label(ui, notice);
                    if ui.small_button("x").clicked() {
                        self.status = None;
                    }
                }
            });
        });
    }

    pub(super) fn render_transport(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("transport").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let ready = self.media_ready();
                let fps = self.store.fps();
                let duration = self.duration();
                let playing = self.is_playing();
                let Some(media) = self.media.as_deref_mut() else {
                    ui.weak("Open a video (File > Open Video, or drop a file)");
                    return;
                };
                ui.add_enabled_ui(ready, |ui| {
                    if ui.button("|<").on_hover_text("Previous 5 frames").clicked() {
                        playback::step_frames(media, -playback::FRAME_JUMP);
                    }
                    if ui.button("<").on_hover_text("Previous frame").clicked() {
                        playback::step_frames(media, -playback::FRAME_STEP);
                    }
                    if ui.button(if playing { "Pause" } else { "Play" }).clicked() {
                        playback::toggle_play(media);
                    }
                    if ui.button(">").on_hover_text("Next frame").clicked() {
                        playback::step_frames(media, playback::FRAME_STEP);
                    }
                    if ui.button(">|").on_hover_text("Next 5 frames").clicked() {
                        playback::step_frames(media, playback::FRAME_JUMP);
                    }
                });
                ui.separator();

                let t = media.current_time();
                ui.monospace(format!("{} / {}", format_time(t), format_time(duration)));
                ui.separator();

                let total = playback::total_frames(fps, duration);
                let frame = self.clock.last_tick().map(|tick| tick.frame).unwrap_or(0);
                ui.label("Frame");
                let entry = ui.add(
                    egui::TextEdit::singleline(&mut self.frame_entry)
                        .desired_width(60.0)
                        .hint_text(frame.to_string()),
                );
                if entry.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    match self.frame_entry.trim().parse::<i64>() {
                        Ok(target) => {
                            playback::seek_frame(media, target);
                        }
                        Err(_) => warn!("Frame entry '{}' is not a number", self.frame_entry),
                    }
                    self.frame_entry.clear();
                }
                ui.monospace(format!("{} / {}", frame, total));
                ui.separator();
                ui.monospace(format!("{:.3} fps", fps));
            });
        });
    }

    pub(super) fn render_subjects_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("subjects_panel")
            .default_width(340.0)
            .resizable(true)
            .show(ctx, |ui| {
                ui.heading("Subjects");
                ui.label("Tick the person to analyze, then proceed.");
                ui.separator();

                let persons = self.store.persons().to_vec();
                let media_ready = self.media_ready();
                let mut toggle = None;
                let mut seek = None;

                if persons.is_empty() {
                    ui.weak("No detections loaded");
                } else {
                    TableBuilder::new(ui)
                        .id_salt("subjects_table")
                        .striped(true)
                        .column(Column::auto())
                        .column(Column::remainder())
                        .column(Column::auto())
                        .column(Column::auto())
                        .header(ROW_HEIGHT, |mut header| {
                            header.col(|ui| {
                                ui.strong("Subject");
                            });
                            header.col(|ui| {
                                ui.strong("Person");
                            });
                            header.col(|ui| {
                                ui.strong("First seen");
                            });
                            header.col(|ui| {
                                ui.strong("Frame");
                            });
                        })
                        .body(|mut body| {
                            for person in &persons {
                                body.row(ROW_HEIGHT, |mut row| {
                                    row.col(|ui| {
                                        let mut checked = person.is_subject;
                                        if ui.checkbox(&mut checked, "").changed() {
                                            toggle = Some(person.id);
                                        }
                                    });
                                    row.col(|ui| {
                                        ui.label(&person.name);
                                    });
                                    row.col(|ui| {
                                        let button = egui::Button::new(format!("{}s", person.timestamp));
                                        if ui
                                            .add_enabled(media_ready, button)
                                            .on_hover_text("Go to first appearance")
                                            .clicked()
                                        {
                                            seek = Some(person.first_seen_secs());
                                        }
                                    });
                                    row.col(|ui| {
                                        ui.monospace(person.frame_number.to_string());
                                    });
                                });
                            }
                        });
                }

                if let Some(id) = toggle {
                    self.store.toggle_subject(id);
                }
                if let Some(t) = seek {
                    self.seek_to(t);
                }

                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("Upload Subjects...").clicked()
                        && let Some(path) = self.pick_json("Upload Subjects")
                    {
                        self.upload_subjects(&path);
                    }
                    let any_subject = self.store.persons().iter().any(|p| p.is_subject);
                    if ui
                        .add_enabled(self.store.session().is_some(), egui::Button::new("Proceed"))
                        .on_hover_text(if any_subject {
                            "Keep only the marked subjects"
                        } else {
                            "No subject marked, every detection is kept"
                        })
                        .clicked()
                    {
                        self.finalize_subjects();
                    }
                });
                if let Some(notice) = &self.upload_notice {
                    notice_label(ui, notice);
                }
            });
    }

    pub(super) fn render_tasks_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("timeline")
            .resizable(true)
            .default_height(130.0)
            .show(ctx, |ui| {
                let media_time = self.media_time();
                let duration = self.duration();
                let response = timeline::render_timeline(ui, &mut self.timeline, &mut self.store, media_time, duration);
                if let Some(t) = response.seek {
                    self.seek_to(t);
                }
            });

        egui::SidePanel::left("tasks_panel")
            .default_width(520.0)
            .resizable(true)
            .show(ctx, |ui| {
                ui.heading("Tasks");
                let playhead = round_ms(self.media_time());
                ui.horizontal(|ui| {
                    if ui.button("Add Task").on_hover_text("New task starting at the playhead").clicked() {
                        let name = self.settings.task_names.first().cloned().unwrap_or_else(|| "Task".to_string());
                        let end = round_ms((playhead + DEFAULT_TASK_LENGTH).min(self.duration().max(playhead)));
                        let id = self.store.add_task(&name, playhead, end);
                        info!("Task {} added at {:.3}s", id, playhead);
                    }
                    let pending: Vec<TaskId> =
                        self.store.tasks().iter().filter(|t| !t.is_analyzed()).map(|t| t.id).collect();
                    if ui
                        .add_enabled(!pending.is_empty(), egui::Button::new("Analyze All"))
                        .on_hover_text("Analyze every task without data")
                        .clicked()
                    {
                        self.start_analysis(&pending);
                    }
                    if ui.button("Reset All").clicked() {
                        self.store.clear_tasks();
                        self.selected_task = None;
                    }
                    if ui.button("Upload Config...").clicked()
                        && let Some(path) = self.pick_json("Upload Task Configuration")
                    {
                        self.upload_task_config(&path);
                    }
                });
                if let Some(notice) = &self.upload_notice {
                    notice_label(ui, notice);
                }
                ui.separator();

                let actions = self.task_table(ui, playhead);
                for action in actions {
                    self.apply_task_action(action);
                }
            });
    }

    fn task_table(&mut self, ui: &mut egui::Ui, playhead: f64) -> Vec<TaskAction> {
        let tasks = self.store.tasks().to_vec();
        let names = self.settings.task_names.clone();
        let mut actions = Vec::new();
        if tasks.is_empty() {
            ui.weak("No tasks. Drag on the timeline or press Add Task.");
            return actions;
        }

        TableBuilder::new(ui)
            .id_salt("tasks_table")
            .striped(true)
            .column(Column::auto().at_least(120.0))
            .column(Column::auto())
            .column(Column::auto())
            .column(Column::auto())
            .column(Column::remainder())
            .header(ROW_HEIGHT, |mut header| {
                for title in ["Task", "Start", "End", "Data", "Actions"] {
                    header.col(|ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|mut body| {
                for task in &tasks {
                    let analyzing = self.jobs.is_analyzing(task.id);
                    body.row(ROW_HEIGHT + 4.0, |mut row| {
                        row.col(|ui| {
                            let mut name = task.name.clone();
                            egui::ComboBox::from_id_salt(("task_name", task.id))
                                .selected_text(&name)
                                .show_ui(ui, |ui| {
                                    for option in &names {
                                        ui.selectable_value(&mut name, option.clone(), option);
                                    }
                                });
                            if name != task.name {
                                actions.push(TaskAction::Rename(task.id, name));
                            }
                        });
                        row.col(|ui| {
                            let mut start = task.start;
                            let changed = ui
                                .add(egui::DragValue::new(&mut start).speed(0.01).max_decimals(3).suffix("s"))
                                .changed();
                            if ui.small_button("@").on_hover_text("Start at playhead").clicked() {
                                actions.push(TaskAction::SetTimes(task.id, playhead, task.end));
                            } else if changed {
                                actions.push(TaskAction::SetTimes(task.id, round_ms(start), task.end));
                            }
                        });
                        row.col(|ui| {
                            let mut end = task.end;
                            let changed = ui
                                .add(egui::DragValue::new(&mut end).speed(0.01).max_decimals(3).suffix("s"))
                                .changed();
                            if ui.small_button("@").on_hover_text("End at playhead").clicked() {
                                actions.push(TaskAction::SetTimes(task.id, task.start, playhead));
                            } else if changed {
                                actions.push(TaskAction::SetTimes(task.id, task.start, round_ms(end)));
                            }
                        });
                        row.col(|ui| {
                            if analyzing {
                                ui.spinner();
                            } else if task.is_analyzed() {
                                ui.label("yes");
                            } else {
                                ui.weak("none");
                            }
                        });
                        row.col(|ui| {
                            if ui.add_enabled(!analyzing, egui::Button::new("Analyze")).clicked() {
                                actions.push(TaskAction::Analyze(task.id));
                            }
                            if ui.button("Details").clicked() {
                                actions.push(TaskAction::Open(task.id));
                            }
                            if ui.button("Delete").clicked() {
                                actions.push(TaskAction::Delete(task.id));
                            }
                        });
                    });
                }
            });
        actions
    }

    fn apply_task_action(&mut self, action: TaskAction) {
        match action {
            TaskAction::Rename(id, name) => {
                debug!("Task {} renamed to '{}'", id, name);
                self.store.update_task(id, |t| {
                    t.name = name;
                    t.data = None;
                });
            }
            TaskAction::SetTimes(id, start, end) => {
                self.store.update_task(id, |t| {
                    t.set_times(start, end);
                    t.data = None;
                });
            }
            TaskAction::Delete(id) => {
                self.store.delete_task(id);
                if self.selected_task == Some(id) {
                    self.selected_task = None;
                }
            }
            TaskAction::Analyze(id) => self.start_analysis(&[id]),
            TaskAction::Open(id) => self.open_task(id),
        }
    }

    pub(super) fn render_details_panel(&mut self, ctx: &egui::Context) {
        let Some(task) = self.selected_task.and_then(|id| self.store.task(id)).cloned() else {
            egui::SidePanel::left("details_panel").show(ctx, |ui| {
                ui.weak("The selected task no longer exists");
                if ui.button("Back to Tasks").clicked() {
                    self.navigate(Screen::Tasks);
                }
            });
            return;
        };

        if let Some(data) = task.data.as_ref() {
            let media_time = self.media_time();
            let mut response = None;
            egui::TopBottomPanel::bottom("cycles_panel").resizable(true).show(ctx, |ui| {
                response = cycles::render_cycles(ui, &mut self.cycles, &task, data, media_time);
                if response.is_none() {
                    ui.weak("This task has no cycle data");
                }
            });
            if let Some(response) = response {
                if let Some(cycles) = response.changed {
                    self.commit_cycles(task.id, &cycles);
                }
                if let Some(t) = response.seek {
                    if let Some(media) = self.media.as_deref_mut() {
                        media.pause();
                    }
                    self.seek_to(t);
                }
            }
        }

        egui::SidePanel::left("details_panel")
            .default_width(300.0)
            .resizable(true)
            .show(ctx, |ui| {
                ui.heading(&task.name);
                ui.monospace(format!(
                    "{} - {} ({:.3}s)",
                    format_time(task.start),
                    format_time(task.end),
                    task.duration()
                ));
                ui.separator();

                if self.settings.calibrated_tasks.iter().any(|n| n == &task.name) {
                    self.calibration_editor(ui);
                    ui.separator();
                }

                let analyzing = self.jobs.is_analyzing(task.id);
                let processing = self.overlay.is_processing(task.id);
                ui.horizontal(|ui| {
                    if ui.add_enabled(!analyzing, egui::Button::new("Analyze")).clicked() {
                        self.start_analysis(&[task.id]);
                    }
                    if ui.add_enabled(task.is_analyzed(), egui::Button::new("Reset Data")).clicked() {
                        self.store.reset_task_data(task.id);
                        self.cycles.cancel();
                    }
                    if ui.button("Upload Data...").clicked()
                        && let Some(path) = self.pick_json("Upload Task Data")
                    {
                        self.upload_task_payload(task.id, &path);
                    }
                });
                if analyzing {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Analyzing...");
                    });
                }
                if processing {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Recomputing landmarks...");
                    });
                }
                if let Some(notice) = &self.upload_notice {
                    notice_label(ui, notice);
                }
                ui.separator();

                match task.data.as_ref() {
                    Some(data) => {
                        ui.label(format!("Landmark frames: {}", data.landmark_frame_count()));
                        if data.radar_table().is_some() {
                            ui.label("Radar table available");
                        }
                        ui.weak("Pause and drag a landmark to correct it");
                    }
                    None => {
                        ui.weak("No analysis data yet");
                    }
                }
                ui.separator();
                if ui.button("Back to Tasks").clicked() {
                    self.navigate(Screen::Tasks);
                }
            });
    }

    fn calibration_editor(&mut self, ui: &mut egui::Ui) {
        let mut calibration: Calibration = self.store.calibration();
        ui.strong("Calibration");
        let mut changed = false;
        egui::Grid::new("calibration_grid").num_columns(2).show(ui, |ui| {
            for (label, value, suffix) in [
                ("Focal length", &mut calibration.focal_length, " px"),
                ("Subject height", &mut calibration.height, " cm"),
            ] {
                ui.label(label);
                ui.horizontal(|ui| {
                    let mut set = value.is_some();
                    if ui.checkbox(&mut set, "").changed() {
                        *value = set.then_some(0.0);
                        changed = true;
                    }
                    if let Some(v) = value.as_mut() {
                        changed |= ui
                            .add(egui::DragValue::new(v).speed(0.5).range(0.0..=f64::MAX).suffix(suffix))
                            .changed();
                    }
                });
                ui.end_row();
            }
        });
        if changed {
            self.store.set_calibration(calibration);
        }
    }

    /// Commit edited cycles to the payload and refresh the derived plot data.
    fn commit_cycles(&mut self, id: TaskId, cycles: &Cycles) {
        if !self.store.update_task_data(id, |data| cycles.write_to(data)) {
            return;
        }
        debug!("Task {}: {} cycle(s) committed", id, cycles.len());
        let Some(video_id) = self.store.video_id().map(str::to_string) else {
            return;
        };
        if let Some(data) = self.store.task(id).and_then(|t| t.data.as_ref()) {
            let request = PlotUpdate::from_payload(id, data);
            self.jobs.plot(&self.workers, &self.backend, video_id, request);
        }
    }

    pub(super) fn render_viewport(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                viewport::render_toolbar(ui, &mut self.viewport);
                let overlay_ctx = self.overlay_context();
                let response = viewport::render(
                    ui,
                    self.texture.as_ref(),
                    &mut self.viewport,
                    &mut self.overlay,
                    &mut self.store,
                    &overlay_ctx,
                );
                if let Some(commit) = response.commit
                    && let Some(video_id) = self.store.video_id().map(str::to_string)
                {
                    self.jobs.landmarks(&self.workers, &self.backend, video_id, commit.task_id, commit.request);
                }
            });
    }
}
