use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::entities::TaskBoxPolicy;

/// Settings file name (config dir)
pub const SETTINGS_FILE: &str = "kinemark.json";
/// Window state persisted by eframe (config dir)
pub const WINDOW_STATE_FILE: &str = "kinemark_window.json";
/// Default log file name (data dir)
pub const LOG_FILE: &str = "kinemark.log";

const APP_DIR: &str = "kinemark";
const CONFIG_DIR_ENV: &str = "KINEMARK_CONFIG_DIR";

/// Configuration for overriding default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args → ENV var (KINEMARK_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));
        Self { config_dir }
    }
}

/// Path to a configuration file.
///
/// Priority:
/// 1. CLI --config-dir argument
/// 2. KINEMARK_CONFIG_DIR environment variable
/// 3. Local folder if `kinemark.json` exists there
/// 4. `dirs_next::config_dir()/kinemark`
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    get_config_dir(config).join(name)
}

/// Path to a data file (logs). Same priority as [`config_file`], with
/// `dirs_next::data_dir()` as the platform default.
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    get_data_dir(config).join(name)
}

/// Create the config and data directories if missing.
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = get_config_dir(config);
    let data_dir = get_data_dir(config);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
    }
    if data_dir != config_dir && !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    }
    Ok(())
}

fn local_dir() -> Option<PathBuf> {
    let dir = std::env::current_dir().ok()?;
    dir.join(SETTINGS_FILE).exists().then_some(dir)
}

fn get_config_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    if let Some(dir) = local_dir() {
        return dir;
    }
    if let Some(dir) = dirs_next::config_dir() {
        return dir.join(APP_DIR);
    }
    PathBuf::from(".")
}

fn get_data_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    if let Some(dir) = local_dir() {
        return dir;
    }
    if let Some(dir) = dirs_next::data_dir() {
        return dir.join(APP_DIR);
    }
    PathBuf::from(".")
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Backend root; endpoints are appended to it
    pub api_base_url: String,
    pub autosave_debounce_ms: u64,
    pub region_redraw_debounce_ms: u64,
    pub request_timeout_secs: u64,
    /// Drop a task's sticky rectangle when it is renamed
    pub reset_box_on_rename: bool,
    /// Task names that receive calibration fields
    pub calibrated_tasks: Vec<String>,
    pub landmark_default_color: [u8; 3],
    /// Names offered by the task list
    pub task_names: Vec<String>,
    pub dark_mode: bool,
    pub font_size: f32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            autosave_debounce_ms: 500,
            region_redraw_debounce_ms: 120,
            request_timeout_secs: 120,
            reset_box_on_rename: false,
            calibrated_tasks: vec!["Gait".to_string()],
            landmark_default_color: [255, 0, 0],
            task_names: [
                "Gait",
                "Finger Tap Left",
                "Finger Tap Right",
                "Hand Movement Left",
                "Hand Movement Right",
                "Toe tapping Left",
                "Toe tapping Right",
                "Leg agility Left",
                "Leg agility Right",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            dark_mode: true,
            font_size: 13.0,
        }
    }
}

impl AppSettings {
    /// Read settings; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid settings file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write settings: {}", path.display()))
    }

    pub fn task_box_policy(&self) -> TaskBoxPolicy {
        TaskBoxPolicy {
            reset_on_rename: self.reset_box_on_rename,
            calibrated_tasks: self.calibrated_tasks.clone(),
        }
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_with_custom_dir() {
        let config = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };
        assert_eq!(config_file("test.json", &config), PathBuf::from("/custom/test.json"));
        assert_eq!(data_file(LOG_FILE, &config), PathBuf::from("/custom/kinemark.log"));
    }

    #[test]
    fn test_cli_dir_wins() {
        let config = PathConfig::from_env_and_cli(Some(PathBuf::from("/from/cli")));
        assert_eq!(config.config_dir, Some(PathBuf::from("/from/cli")));
    }

    #[test]
    fn test_ensure_dirs_creates_custom_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("cfg");
        let config = PathConfig {
            config_dir: Some(dir.clone()),
        };
        ensure_dirs(&config).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_settings_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(SETTINGS_FILE);
        assert_eq!(AppSettings::load(&path).unwrap(), AppSettings::default());

        let mut settings = AppSettings::default();
        settings.api_base_url = "http://backend:9000/api".into();
        settings.reset_box_on_rename = true;
        settings.save(&path).unwrap();
        assert_eq!(AppSettings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{"autosave_debounce_ms": 900}"#).unwrap();
        let settings = AppSettings::load(&path).unwrap();
        assert_eq!(settings.autosave_debounce_ms, 900);
        assert_eq!(settings.region_redraw_debounce_ms, 120);
        assert_eq!(settings.calibrated_tasks, vec!["Gait".to_string()]);
        assert!(settings.task_box_policy().calibrated_tasks.contains(&"Gait".to_string()));
    }

    #[test]
    fn test_invalid_settings_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(SETTINGS_FILE);
        std::fs::write(&path, "not json").unwrap();
        assert!(AppSettings::load(&path).is_err());
    }
}
