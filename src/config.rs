use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::pairing::{ContainerSize, PAIRING_EPSILON, ViewMode};
use crate::progress::PROGRESS_THROTTLE_DELAY;
use crate::store::STORE_DEBOUNCE_DELAY;

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
pub const APP_NAME: &str = "eriri";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_progress_throttle_ms")]
    pub progress_throttle_ms: u64,

    #[serde(default = "default_store_debounce_ms")]
    pub store_debounce_ms: u64,

    #[serde(default = "default_image_cache_capacity")]
    pub image_cache_capacity: usize,

    #[serde(default = "default_pairing_epsilon")]
    pub pairing_epsilon: f64,

    #[serde(default)]
    pub view_mode: ViewMode,

    #[serde(default = "default_container_width")]
    pub container_width: u32,

    #[serde(default = "default_container_height")]
    pub container_height: u32,

    /// Overrides where progress and tags are kept
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_progress_throttle_ms() -> u64 {
    PROGRESS_THROTTLE_DELAY.as_millis() as u64
}

fn default_store_debounce_ms() -> u64 {
    STORE_DEBOUNCE_DELAY.as_millis() as u64
}

fn default_image_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_pairing_epsilon() -> f64 {
    PAIRING_EPSILON
}

fn default_container_width() -> u32 {
    1600
}

fn default_container_height() -> u32 {
    1000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            progress_throttle_ms: default_progress_throttle_ms(),
            store_debounce_ms: default_store_debounce_ms(),
            image_cache_capacity: default_image_cache_capacity(),
            pairing_epsilon: default_pairing_epsilon(),
            view_mode: ViewMode::default(),
            container_width: default_container_width(),
            container_height: default_container_height(),
            data_dir: None,
        }
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    load_settings_from_path(&path);
}

/// Load `path` into the global settings, writing defaults when it is missing.
pub fn load_settings_from_path(path: &Path) {
    if !path.exists() {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, path);
        }
        return;
    }

    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }

                if let Ok(mut global) = SETTINGS.write() {
                    *global = settings;
                }
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let content = generate_settings_yaml(settings);

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(&format!("version: {}\n", settings.version));
    content.push('\n');
    content.push_str("# Delay before a reading position is recorded (ms)\n");
    content.push_str(&format!(
        "progress_throttle_ms: {}\n",
        settings.progress_throttle_ms
    ));
    content.push_str("# Delay before recorded progress is written to disk (ms)\n");
    content.push_str(&format!("store_debounce_ms: {}\n", settings.store_debounce_ms));
    content.push_str(&format!(
        "image_cache_capacity: {}\n",
        settings.image_cache_capacity
    ));
    content.push('\n');
    content.push_str("# Comic layout: single or double\n");
    content.push_str(&format!("view_mode: {}\n", settings.view_mode.as_str()));
    content.push_str(&format!("pairing_epsilon: {:?}\n", settings.pairing_epsilon));
    content.push_str(&format!("container_width: {}\n", settings.container_width));
    content.push_str(&format!("container_height: {}\n", settings.container_height));
    content.push('\n');
    match &settings.data_dir {
        Some(dir) => content.push_str(&format!("data_dir: {:?}\n", dir.to_string_lossy())),
        None => content.push_str("# data_dir: /path/to/eriri/data\n"),
    }

    content
}

pub fn current_settings() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

pub fn get_progress_throttle() -> Duration {
    let ms = SETTINGS
        .read()
        .map(|s| s.progress_throttle_ms)
        .unwrap_or_else(|_| default_progress_throttle_ms());
    Duration::from_millis(ms)
}

pub fn get_store_debounce() -> Duration {
    let ms = SETTINGS
        .read()
        .map(|s| s.store_debounce_ms)
        .unwrap_or_else(|_| default_store_debounce_ms());
    Duration::from_millis(ms)
}

pub fn get_image_cache_capacity() -> usize {
    SETTINGS
        .read()
        .map(|s| s.image_cache_capacity)
        .unwrap_or_else(|_| default_image_cache_capacity())
}

pub fn get_pairing_epsilon() -> f64 {
    SETTINGS
        .read()
        .map(|s| s.pairing_epsilon)
        .unwrap_or_else(|_| default_pairing_epsilon())
}

pub fn get_view_mode() -> ViewMode {
    SETTINGS.read().map(|s| s.view_mode).unwrap_or_default()
}

pub fn get_container_size() -> ContainerSize {
    SETTINGS
        .read()
        .map(|s| ContainerSize::new(s.container_width, s.container_height))
        .unwrap_or_else(|_| {
            ContainerSize::new(default_container_width(), default_container_height())
        })
}

pub fn get_data_dir() -> Option<PathBuf> {
    SETTINGS.read().ok().and_then(|s| s.data_dir.clone())
}

#[cfg(test)]
pub(crate) fn reset_settings() {
    if let Ok(mut settings) = SETTINGS.write() {
        *settings = Settings::default();
    }
}
