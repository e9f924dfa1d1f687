use kinemark::app::{AnnotatorApp, StartupRequest};
use kinemark::cli::Args;
use kinemark::config::{self, AppSettings};

use clap::Parser;
use eframe::egui;
use log::{debug, info, warn};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize FFmpeg
    playa_ffmpeg::init()?;

    // Parse command-line arguments first (needed for log setup)
    let args = Args::parse();

    let path_config = config::PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = config::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {:#}", e);
    }

    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = args.log_level();
    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| config::data_file(config::LOG_FILE, &path_config));
        let file = std::fs::File::create(&log_path)?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .filter_module("egui", log::LevelFilter::Info) // Suppress egui DEBUG spam
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging (respects RUST_LOG if set)
        let default_level = log_level.as_str().to_ascii_lowercase();
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .filter_module("egui", log::LevelFilter::Info)
            .format_timestamp_millis()
            .init();
    }

    info!("Kinemark annotation workstation starting...");
    debug!("Command-line args: {:?}", args);

    let settings_path = config::config_file(config::SETTINGS_FILE, &path_config);
    info!("Settings path: {}", settings_path.display());
    let mut settings = AppSettings::load(&settings_path).unwrap_or_else(|e| {
        warn!("{:#}, using defaults", e);
        AppSettings::default()
    });
    if let Some(url) = &args.api_url {
        info!("Backend URL overridden: {}", url);
        settings.api_base_url = url.clone();
    }

    match &args.video_path {
        Some(path) => info!("Input video: {}", path.display()),
        None => info!("No input video provided, starting empty (drag-and-drop supported)"),
    }

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(format!("Kinemark v{}", env!("CARGO_PKG_VERSION")))
            .with_inner_size([1400.0, 860.0])
            .with_resizable(true)
            .with_drag_and_drop(true),
        persist_window: true,
        #[cfg(not(target_arch = "wasm32"))]
        persistence_path: Some(config::config_file(config::WINDOW_STATE_FILE, &path_config)),
        ..Default::default()
    };

    let startup = StartupRequest {
        video_id: args.resolved_video_id(),
        video_path: args.video_path.clone(),
        bundle: args.data.clone(),
        fps: args.fps,
        autoplay: args.autoplay,
    };

    eframe::run_native(
        "Kinemark",
        native_options,
        Box::new(move |_cc| {
            let mut app = AnnotatorApp::new(settings, path_config)?;
            app.apply_startup(startup);
            Ok(Box::new(app))
        }),
    )?;

    info!("Kinemark exited");
    Ok(())
}
