// Dashboard settings
// Loaded from ~/.config/nbdash/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Grid layout
    #[serde(rename = "dashboard.maxColumns")]
    pub max_columns: u32,

    #[serde(rename = "dashboard.cellHeight")]
    pub cell_height: u32,

    #[serde(rename = "dashboard.cellMargin")]
    pub cell_margin: u32,

    #[serde(rename = "dashboard.layoutDebounceMs")]
    pub layout_debounce_ms: u64,

    // Standalone viewer
    #[serde(rename = "viewer.thebeUrl")]
    pub thebe_url: Option<String>,  // None = no kernel server configured

    #[serde(rename = "viewer.tmpnbMode")]
    pub tmpnb_mode: bool,

    #[serde(rename = "viewer.kernelName")]
    pub kernel_name: String,

    #[serde(rename = "viewer.imageName")]
    pub image_name: String,

    #[serde(rename = "viewer.busyDebounceMs")]
    pub busy_debounce_ms: u64,

    #[serde(rename = "viewer.requestTimeoutSecs")]
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Grid
            max_columns: 12,
            cell_height: 20,
            cell_margin: 10,
            layout_debounce_ms: 250,
            // Viewer
            thebe_url: None,
            tmpnb_mode: false,
            kernel_name: "python3".to_string(),
            image_name: "jupyter/notebook".to_string(),
            busy_debounce_ms: 500,
            request_timeout_secs: 30,
        }
    }
}

const DEFAULT_CONFIG: &str = r#"{
    // Grid layout (used when a notebook has no stored grid settings)
    "dashboard.maxColumns": 12,
    "dashboard.cellHeight": 20,
    "dashboard.cellMargin": 10,
    "dashboard.layoutDebounceMs": 250,

    // Standalone viewer
    // thebeUrl: notebook server (or container provisioning server with tmpnbMode)
    "viewer.thebeUrl": null,
    "viewer.tmpnbMode": false,
    "viewer.kernelName": "python3",
    "viewer.imageName": "jupyter/notebook",
    "viewer.busyDebounceMs": 500,
    "viewer.requestTimeoutSecs": 30
}
"#;

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nbdash");
        config_dir.join("settings.json")
    }

    /// Load settings from the default path, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load settings from `path`. A missing or unreadable file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("Error parsing {}: {}; using default settings", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON. Lines starting with `//` are comments.
    pub fn parse(contents: &str) -> Result<Self, String> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned).map_err(|e| e.to_string())
    }

    /// Save current settings to the default path
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| e.to_string())?;

        fs::write(path, json).map_err(|e| e.to_string())
    }

    /// Write the commented default settings file, unless one exists.
    /// Returns true if a file was written.
    pub fn write_default_file(path: &Path) -> Result<bool, String> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        fs::write(path, DEFAULT_CONFIG).map_err(|e| e.to_string())?;
        Ok(true)
    }

    pub fn layout_debounce(&self) -> Duration {
        Duration::from_millis(self.layout_debounce_ms)
    }

    pub fn busy_debounce(&self) -> Duration {
        Duration::from_millis(self.busy_debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get the config file path for display
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}
