//! Configuration loading, resolution, and fail-fast validation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use skywatch::{ActiveWindow, ConfigError};

use crate::fetch::LocatorTemplate;

/// Top-level daemon configuration. Each loop is optional; at least one must
/// be configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub tile: Option<TileLoopConfig>,
    #[serde(default)]
    pub camera: Option<CameraLoopConfig>,
}

/// Remote imagery tile loop (latest-snapshot store).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileLoopConfig {
    /// URL template with `{year}{month}{day}{hour}{minute}` placeholders.
    pub url_template: String,
    pub interval_secs: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    pub output_dir: PathBuf,
    #[serde(default = "default_tile_file")]
    pub file_name: String,
    /// `[start, end)` UTC hours; omit to fetch around the clock.
    #[serde(default)]
    pub active_window: Option<[u32; 2]>,
}

/// Local camera loop (rolling store + retention).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraLoopConfig {
    /// External still-capture command (e.g. `libcamera-still`).
    pub command: String,
    /// Device settings (resolution, exposure, white balance, focus, …),
    /// passed through to the command verbatim and never interpreted.
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    pub interval_secs: u64,
    pub output_dir: PathBuf,
    #[serde(default = "default_frame_prefix")]
    pub prefix: String,
    #[serde(default = "default_frame_extension")]
    pub extension: String,
    /// Maximum number of unpinned frames kept by retention.
    pub max_count: usize,
    /// File-name prefix marking frames exempt from eviction.
    #[serde(default = "default_pin_prefix")]
    pub pin_prefix: String,
    #[serde(default)]
    pub active_window: Option<[u32; 2]>,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_tile_file() -> String {
    "latest.png".to_string()
}

fn default_frame_prefix() -> String {
    "sky_".to_string()
}

fn default_frame_extension() -> String {
    "jpg".to_string()
}

fn default_pin_prefix() -> String {
    "THUNDER_".to_string()
}

/// Resolve the config file path: explicit flag, then `SKYWATCH_CONFIG`,
/// then `./skywatch.json`, then `~/.skywatch/config.json`.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(env_path) = std::env::var("SKYWATCH_CONFIG") {
        return PathBuf::from(env_path);
    }

    let cwd_config = PathBuf::from("skywatch.json");
    if cwd_config.exists() {
        return cwd_config;
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".skywatch")
        .join("config.json")
}

impl DaemonConfig {
    /// Load a config file and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: Self = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Operational knobs may be overridden per deployment without editing
    /// the config file.
    fn apply_env_overrides(&mut self) {
        if let Some(tile) = self.tile.as_mut() {
            tile.interval_secs = read_env_u64("SKYWATCH_TILE_INTERVAL_SECS", tile.interval_secs);
            tile.timeout_ms = read_env_u64("SKYWATCH_TILE_TIMEOUT_MS", tile.timeout_ms);
        }
        if let Some(camera) = self.camera.as_mut() {
            camera.interval_secs =
                read_env_u64("SKYWATCH_CAMERA_INTERVAL_SECS", camera.interval_secs);
            camera.max_count = read_env_usize("SKYWATCH_CAMERA_MAX_COUNT", camera.max_count);
        }
    }

    /// Fail fast on configuration the loops cannot run with. The loops
    /// themselves never re-validate: everything fatal surfaces here, before
    /// any cycle starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile.is_none() && self.camera.is_none() {
            return Err(ConfigError::NothingConfigured);
        }
        if let Some(tile) = &self.tile {
            if tile.interval_secs == 0 {
                return Err(ConfigError::NonPositiveInterval);
            }
            LocatorTemplate::parse(&tile.url_template)?;
            build_window(tile.active_window)?;
        }
        if let Some(camera) = &self.camera {
            if camera.interval_secs == 0 {
                return Err(ConfigError::NonPositiveInterval);
            }
            if camera.max_count == 0 {
                return Err(ConfigError::ZeroRetention);
            }
            if camera.command.trim().is_empty() {
                return Err(ConfigError::EmptyCommand);
            }
            build_window(camera.active_window)?;
        }
        Ok(())
    }
}

/// Turn raw `[start, end)` bounds into a validated window.
pub fn build_window(raw: Option<[u32; 2]>) -> Result<Option<ActiveWindow>, ConfigError> {
    raw.map(|[start, end]| ActiveWindow::new(start, end))
        .transpose()
}

fn read_env_u64(name: &str, default_value: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default_value)
}

fn read_env_usize(name: &str, default_value: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile_config(interval_secs: u64, template: &str) -> DaemonConfig {
        DaemonConfig {
            tile: Some(TileLoopConfig {
                url_template: template.to_string(),
                interval_secs,
                timeout_ms: 5000,
                output_dir: PathBuf::from("/tmp/tiles"),
                file_name: "latest.png".to_string(),
                active_window: None,
            }),
            camera: None,
        }
    }

    #[test]
    fn test_validate_accepts_tile_loop() {
        let config = tile_config(900, "https://radar.example/{year}{month}{day}{hour}{minute}.png");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = tile_config(0, "https://radar.example/{year}{month}{day}{hour}{minute}.png");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveInterval)
        ));
    }

    #[test]
    fn test_validate_rejects_bad_template() {
        let config = tile_config(900, "https://radar.example/{epoch}.png");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MalformedTemplate(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_config() {
        let config = DaemonConfig {
            tile: None,
            camera: None,
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NothingConfigured)
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let mut config =
            tile_config(900, "https://radar.example/{year}{month}{day}{hour}{minute}.png");
        config.tile.as_mut().unwrap().active_window = Some([18, 3]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn test_camera_defaults_applied() {
        let json = r#"{
            "camera": {
                "command": "libcamera-still",
                "interval_secs": 120,
                "output_dir": "/tmp/sky",
                "max_count": 30
            }
        }"#;
        let config: DaemonConfig = serde_json::from_str(json).unwrap();
        let camera = config.camera.unwrap();
        assert_eq!(camera.prefix, "sky_");
        assert_eq!(camera.extension, "jpg");
        assert_eq!(camera.pin_prefix, "THUNDER_");
        assert!(camera.settings.is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_retention() {
        let json = r#"{
            "camera": {
                "command": "libcamera-still",
                "interval_secs": 120,
                "output_dir": "/tmp/sky",
                "max_count": 0
            }
        }"#;
        let config: DaemonConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::ZeroRetention)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skywatch.json");
        std::fs::write(
            &path,
            r#"{
                "tile": {
                    "url_template": "https://radar.example/{year}{month}{day}{hour}{minute}.png",
                    "interval_secs": 900,
                    "output_dir": "/tmp/tiles"
                }
            }"#,
        )
        .unwrap();

        let config = DaemonConfig::load(&path).unwrap();
        let tile = config.tile.unwrap();
        assert_eq!(tile.interval_secs, 900);
        assert_eq!(tile.file_name, "latest.png");
        assert_eq!(tile.timeout_ms, 10_000);
    }

    #[test]
    fn test_resolve_explicit_path_wins() {
        let explicit = PathBuf::from("/etc/skywatch/custom.json");
        assert_eq!(resolve_config_path(Some(&explicit)), explicit);
    }
}
