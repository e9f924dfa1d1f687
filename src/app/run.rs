//! Main application loop - eframe::App implementation.
//!
//! Each frame: apply theme, advance media, drain events and jobs, lay out
//! the panels for the current screen, then refresh the canvas texture.

use eframe::{egui, glow};
use log::{error, info, trace};

use crate::app::AnnotatorApp;
use crate::screen::Screen;

impl eframe::App for AnnotatorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.settings.dark_mode {
            ctx.set_visuals(egui::Visuals::dark());
        } else {
            ctx.set_visuals(egui::Visuals::light());
        }
        let mut style = (*ctx.style()).clone();
        for (_, font_id) in style.text_styles.iter_mut() {
            font_id.size = self.settings.font_size;
        }
        ctx.set_style(style);

        // First dropped video wins; a sibling .json is picked up as the bundle
        let dropped = ctx.input(|i| i.raw.dropped_files.iter().find_map(|f| f.path.clone()));
        if let Some(path) = dropped {
            info!("File dropped: {}", path.display());
            self.open_dropped(path);
        }

        // Frame clock first so events emitted by present() are drained below
        self.pump_media();
        self.handle_events();
        self.handle_keyboard_input(ctx);

        self.render_menu_bar(ctx);
        self.render_transport(ctx);
        match self.screen {
            Screen::SubjectResolution => self.render_subjects_panel(ctx),
            Screen::Tasks => self.render_tasks_panel(ctx),
            Screen::TaskDetails => self.render_details_panel(ctx),
        }
        self.refresh_canvas(ctx);
        self.render_viewport(ctx);

        // Keep polling while frames advance or background work is pending
        if self.is_playing()
            || self.autosave.is_scheduled()
            || self.jobs.analyzing_count() > 0
            || self.timeline.is_redraw_pending()
        {
            ctx.request_repaint();
        } else if self.media.is_some() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }

    fn save(&mut self, _storage: &mut dyn eframe::Storage) {
        let path = self.settings_path();
        match self.settings.save(&path) {
            Ok(()) => trace!("Settings saved to {}", path.display()),
            Err(e) => error!("{:#}", e),
        }
    }

    /// Flush pending autosave uploads before the window goes away.
    fn on_exit(&mut self, _gl: Option<&glow::Context>) {
        if self.exit_flushed {
            return;
        }
        self.exit_flushed = true;
        let flushed = self.autosave.flush_blocking(&self.store, self.backend.as_ref());
        info!("Exit: {} slice(s) flushed", flushed);
    }
}
