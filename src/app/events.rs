//! Event handling for AnnotatorApp: bus drain, job results and keyboard.

use std::time::Instant;

use eframe::egui;
use log::{debug, trace};

use super::{AnnotatorApp, Notice};
use crate::core::{FrameTick, downcast_event};
use crate::entities::{StoreChanged, VideoChanged};
use crate::media::playback::{self, FRAME_JUMP, FRAME_STEP};

impl AnnotatorApp {
    /// Drain the event bus and the job channel.
    pub fn handle_events(&mut self) {
        let now = Instant::now();
        for event in self.event_bus.poll() {
            if let Some(e) = downcast_event::<StoreChanged>(&event) {
                trace!("Store changed: {:?} rev={}", e.slice, e.revision);
                continue;
            }
            if let Some(e) = downcast_event::<VideoChanged>(&event) {
                debug!("Video changed to '{}'", e.video_id);
                self.timeline.rebuild(&self.store);
                continue;
            }
            if let Some(tick) = downcast_event::<FrameTick>(&event) {
                trace!("Frame {} at {:.3}s (gen {})", tick.frame, tick.media_time, tick.generation);
                continue;
            }
        }
        // Revision-based, so one call covers every StoreChanged drained above
        self.timeline.observe(&self.store, now);
        self.timeline.tick(&self.store, now);

        for result in self.jobs.drain() {
            if let Some(msg) = self.jobs.apply(result, &mut self.store, &mut self.overlay, &mut self.autosave) {
                self.status = Some(Notice::error(msg));
            }
        }

        if self.autosave.due(now) {
            self.save_now();
        }
    }

    /// Space toggles playback, arrows step one frame, shift+arrows five.
    pub fn handle_keyboard_input(&mut self, ctx: &egui::Context) {
        // Don't process hotkeys when text input is active (typing in fields)
        if ctx.wants_keyboard_input() {
            return;
        }
        let Some(media) = self.media.as_deref_mut() else {
            return;
        };
        let (space, left, right, shift) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::Space),
                i.key_pressed(egui::Key::ArrowLeft),
                i.key_pressed(egui::Key::ArrowRight),
                i.modifiers.shift,
            )
        });
        let step = if shift { FRAME_JUMP } else { FRAME_STEP };
        if space {
            if let Some(playing) = playback::toggle_play(media) {
                trace!("Hotkey: Space -> playing={}", playing);
            }
        }
        if left {
            playback::step_frames(media, -step);
        }
        if right {
            playback::step_frames(media, step);
        }
    }
}
