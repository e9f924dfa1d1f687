use clap::Parser;
use std::path::PathBuf;

// Build version with backend info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Video:  playa-ffmpeg 8.0 (static)\n",
    "HTTP:   reqwest 0.12 (blocking)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Frame-synchronized video annotation workstation
#[derive(Parser, Debug, Default)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Video to annotate (MP4, MOV, AVI, MKV) - optional, can also drag-and-drop
    #[arg(value_name = "VIDEO")]
    pub video_path: Option<PathBuf>,

    /// Backend id of the video (defaults to the file stem)
    #[arg(long = "video-id", value_name = "ID")]
    pub video_id: Option<String>,

    /// Annotation bundle JSON to load with the video
    #[arg(short = 'd', long = "data", value_name = "JSON")]
    pub data: Option<PathBuf>,

    /// Override the frame rate reported by the decoder / bundle
    #[arg(long = "fps", value_name = "FPS")]
    pub fps: Option<f64>,

    /// Analysis backend base URL (overrides settings)
    #[arg(long = "api-url", value_name = "URL")]
    pub api_url: Option<String>,

    /// Start playback once the video is ready
    #[arg(short = 'a', long = "autoplay")]
    pub autoplay: bool,

    /// Enable debug logging to file (default: kinemark.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

impl Args {
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbosity {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    /// Video id from `--video-id`, else the file stem.
    pub fn resolved_video_id(&self) -> Option<String> {
        self.video_id.clone().or_else(|| {
            self.video_path
                .as_ref()
                .and_then(|p| p.file_stem())
                .map(|s| s.to_string_lossy().into_owned())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let args = Args::try_parse_from([
            "kinemark",
            "clip.mp4",
            "--data",
            "bundle.json",
            "--fps",
            "25",
            "--api-url",
            "http://h:1/api",
            "-vv",
            "--log",
        ])
        .unwrap();
        assert_eq!(args.video_path, Some(PathBuf::from("clip.mp4")));
        assert_eq!(args.data, Some(PathBuf::from("bundle.json")));
        assert_eq!(args.fps, Some(25.0));
        assert_eq!(args.api_url.as_deref(), Some("http://h:1/api"));
        assert_eq!(args.log_level(), log::LevelFilter::Debug);
        assert_eq!(args.log_file, Some(None));
        assert_eq!(args.resolved_video_id().as_deref(), Some("clip"));
    }

    #[test]
    fn test_explicit_video_id() {
        let args = Args::try_parse_from(["kinemark", "a/b.mov", "--video-id", "42"]).unwrap();
        assert_eq!(args.resolved_video_id().as_deref(), Some("42"));
        assert!(Args::try_parse_from(["kinemark"]).unwrap().resolved_video_id().is_none());
    }
}
