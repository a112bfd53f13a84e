use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::components::DEFAULT_HISTORY_LIMIT;
use crate::raster::Connectivity;

const SETTINGS_FILE: &str = "flowfill_settings.cfg";

/// Fill engine settings that persist across sessions
#[derive(Clone, Debug, PartialEq)]
pub struct FillSettings {
    /// Tolerance used when a request does not specify one (0-100)
    pub default_tolerance: u8,
    /// Pixels processed per progress snapshot in animated mode
    pub batch_limit: usize,
    /// Neighbor set of the synchronous fill
    pub sync_connectivity: Connectivity,
    /// Neighbor set of the animated fill
    pub animated_connectivity: Connectivity,
    /// Maximum number of history snapshots
    pub max_history: usize,
    /// Watchdog deadline for an animated fill, in milliseconds
    pub fill_timeout_ms: u64,
    /// Extra deadline per megapixel of image area (0 = fixed deadline)
    pub timeout_ms_per_megapixel: u64,
}

impl Default for FillSettings {
    fn default() -> Self {
        Self {
            default_tolerance: 32,
            batch_limit: 500,
            sync_connectivity: Connectivity::Four,
            animated_connectivity: Connectivity::Eight,
            max_history: DEFAULT_HISTORY_LIMIT,
            fill_timeout_ms: 10_000,
            timeout_ms_per_megapixel: 0,
        }
    }
}

impl FillSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/flowfill/flowfill_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\FlowFill\flowfill_settings.cfg
    /// On macOS:   ~/Library/Application Support/FlowFill/flowfill_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("flowfill");
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("FlowFill").join(SETTINGS_FILE));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("FlowFill")
                    .join(SETTINGS_FILE),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join(SETTINGS_FILE)))
        }
    }

    /// Watchdog deadline for a fill over a `width`×`height` image.
    pub fn timeout_for(&self, width: u32, height: u32) -> Duration {
        let megapixels = (width as u64 * height as u64) / 1_000_000;
        Duration::from_millis(
            self.fill_timeout_ms
                .saturating_add(self.timeout_ms_per_megapixel.saturating_mul(megapixels)),
        )
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "default_tolerance={}\n\
             batch_limit={}\n\
             sync_connectivity={}\n\
             animated_connectivity={}\n\
             max_history={}\n\
             fill_timeout_ms={}\n\
             timeout_ms_per_megapixel={}\n",
            self.default_tolerance,
            self.batch_limit,
            self.sync_connectivity.count(),
            self.animated_connectivity.count(),
            self.max_history,
            self.fill_timeout_ms,
            self.timeout_ms_per_megapixel,
        )
    }

    /// Parse `key=value` lines. Unknown keys are skipped and malformed values
    /// keep their defaults.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "default_tolerance" => {
                    s.default_tolerance = val.parse::<u8>().map_or(s.default_tolerance, |t| t.min(100));
                }
                "batch_limit" => {
                    s.batch_limit = val.parse::<usize>().ok().filter(|&b| b > 0).unwrap_or(s.batch_limit);
                }
                "sync_connectivity" => {
                    if let Some(c) = val.parse().ok().and_then(Connectivity::from_count) {
                        s.sync_connectivity = c;
                    }
                }
                "animated_connectivity" => {
                    if let Some(c) = val.parse().ok().and_then(Connectivity::from_count) {
                        s.animated_connectivity = c;
                    }
                }
                "max_history" => {
                    s.max_history = val.parse::<usize>().ok().filter(|&m| m > 0).unwrap_or(s.max_history);
                }
                "fill_timeout_ms" => {
                    s.fill_timeout_ms = val.parse().unwrap_or(s.fill_timeout_ms);
                }
                "timeout_ms_per_megapixel" => {
                    s.timeout_ms_per_megapixel = val.parse().unwrap_or(s.timeout_ms_per_megapixel);
                }
                _ => {}
            }
        }
        s
    }

    /// Save settings to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(path, self.to_config_string())
            .map_err(|e| format!("could not write '{}': {}", path.display(), e))
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }
}
