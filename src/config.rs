use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::fretboard::DISPLAY_FRETS;
use crate::landmarks::PositionLandmark;
use crate::scales::ScaleType;
use crate::smoothing::DEFAULT_WINDOW;
use crate::theory::NoteName;

/// Application configuration loaded from TOML config file.
/// All fields have defaults; the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Custom database path (overrides XDG default).
    pub db_path: Option<PathBuf>,
    /// Initial user settings.
    pub settings: SettingsConfig,
    /// Audio gating thresholds.
    pub audio: AudioConfig,
    /// Hand tracking parameters.
    pub vision: VisionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub left_handed: bool,
    /// Resolver window half-width in frets (1-4 in practice).
    pub fret_tolerance: u8,
    pub show_hand_region: bool,
    pub show_all_positions: bool,
    pub practice_root: NoteName,
    pub practice_scale: ScaleType,
    pub display_frets: u8,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            left_handed: false,
            fret_tolerance: 2,
            show_hand_region: true,
            show_all_positions: false,
            practice_root: NoteName::A,
            practice_scale: ScaleType::PentatonicMinor,
            display_frets: DISPLAY_FRETS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Minimum pitch-detector clarity to accept a frequency.
    pub clarity_threshold: f64,
    /// Minimum buffer RMS before pitch detection runs.
    pub min_volume: f64,
    /// Samples per analysis buffer.
    pub buffer_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            clarity_threshold: 0.9,
            min_volume: 0.01,
            buffer_size: 4096,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Minimum time between landmark detections (50 ms ≈ 20 detections/s).
    pub min_interval_ms: u64,
    /// Moving-average window over the hand x-coordinate.
    pub smoothing_window: usize,
    /// Landmark used as the hand position.
    pub position_landmark: PositionLandmark,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 50,
            smoothing_window: DEFAULT_WINDOW,
            position_landmark: PositionLandmark::IndexMcp,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/fretsight/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => Self::from_toml(&contents).unwrap_or_else(|e| {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }),
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        let config = toml::from_str::<AppConfig>(contents)?;
        log::info!("Loaded config");
        Ok(config)
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default database path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("fretsight.db")
    } else {
        // Fallback: current directory
        PathBuf::from("fretsight.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert!(config.db_path.is_none());
        assert_eq!(config.settings.fret_tolerance, 2);
        assert_eq!(config.audio.clarity_threshold, 0.9);
        assert_eq!(config.vision.min_interval_ms, 50);
        assert_eq!(config.vision.smoothing_window, 5);
        assert_eq!(config.vision.position_landmark, PositionLandmark::IndexMcp);
    }

    #[test]
    fn test_partial_config() {
        let config = AppConfig::from_toml(
            r#"
            [settings]
            left_handed = true
            practice_root = "C#"
            practice_scale = "blues"

            [vision]
            smoothing_window = 8
            position_landmark = "wrist"
            "#,
        )
        .unwrap();
        assert!(config.settings.left_handed);
        assert_eq!(config.settings.fret_tolerance, 2);
        assert_eq!(config.settings.practice_root, NoteName::CSharp);
        assert_eq!(config.settings.practice_scale, ScaleType::Blues);
        assert_eq!(config.vision.smoothing_window, 8);
        assert_eq!(config.vision.min_interval_ms, 50);
        assert_eq!(config.vision.position_landmark, PositionLandmark::Wrist);
    }

    #[test]
    fn test_bad_config_is_error() {
        assert!(AppConfig::from_toml("[settings]\nfret_tolerance = \"lots\"").is_err());
    }
}
