//! Capture configuration.
//!
//! Loads settings from config.json. Provides the tile size, output location,
//! scan markers and timing. Every field has a default, so a partial file (or
//! no file at all) is fine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::sequencer::CaptureSettings;
use crate::error::CaptureError;
use crate::grid::{TileSize, WorldPoint};

/// Complete capture configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Tile (viewport) width in pixels
    pub tile_width: i64,
    /// Tile (viewport) height in pixels
    pub tile_height: i64,
    /// Output directory name, relative to the project root
    pub directory: String,
    /// Output file name without extension
    pub filename: String,
    /// Bottom-left corner of the scan; the device position when absent
    pub start_marker: Option<[f64; 2]>,
    /// Top-right corner of the scan; a single tile when absent
    pub end_marker: Option<[f64; 2]>,
    /// Delay between moving the device and reading pixels back (milliseconds)
    pub settle_delay_ms: u64,
    /// Initial device position
    pub camera_position: [f64; 2],
    /// Also write `<filename>.json` next to the image
    pub write_manifest: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            tile_width: 800,
            tile_height: 600,
            directory: "ScreenCapture".to_string(),
            filename: "level_".to_string(),
            start_marker: None,
            end_marker: None,
            settle_delay_ms: 200,
            camera_position: [0.0, 0.0],
            write_manifest: false,
        }
    }
}

impl CaptureConfig {
    pub fn tile_size(&self) -> Result<TileSize, CaptureError> {
        TileSize::new(self.tile_width, self.tile_height)
    }

    pub fn camera_position(&self) -> WorldPoint {
        to_point(self.camera_position)
    }

    /// Validates the config and builds the sequencer settings.
    pub fn to_settings(&self) -> Result<CaptureSettings, CaptureError> {
        if self.filename.trim().is_empty() {
            return Err(CaptureError::InvalidConfiguration(
                "output filename is empty".to_string(),
            ));
        }
        for (name, marker) in [("start", self.start_marker), ("end", self.end_marker)] {
            if let Some(marker) = marker {
                to_point(marker).validate(name)?;
            }
        }
        self.camera_position().validate("camera")?;

        Ok(CaptureSettings {
            tile: self.tile_size()?,
            start_marker: self.start_marker.map(to_point),
            end_marker: self.end_marker.map(to_point),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        })
    }
}

fn to_point([x, y]: [f64; 2]) -> WorldPoint {
    WorldPoint::new(x, y)
}

/// Reads and parses a config file.
pub fn read_config(path: &Path) -> Result<CaptureConfig> {
    let contents = fs::read_to_string(path)
        .context(format!("Failed to read config: {}", path.display()))?;
    serde_json::from_str(&contents).context(format!("Failed to parse config: {}", path.display()))
}

/// Loads configuration.
///
/// An explicit path must exist and parse. Otherwise config.json next to the
/// executable is tried, then the user config directory; unreadable files are
/// logged and skipped, and defaults are used when nothing is found.
pub fn load_config(explicit: Option<&Path>) -> Result<CaptureConfig> {
    if let Some(path) = explicit {
        let config = read_config(path)?;
        crate::log(&format!("Config loaded from {}", path.display()));
        return Ok(config);
    }

    Ok(load_first(&search_paths()))
}

/// Candidate config locations, in lookup order.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![crate::paths::get_exe_dir().join("config.json")];
    if let Some(path) = crate::paths::get_user_config_path() {
        paths.push(path);
    }
    paths
}

fn load_first(candidates: &[PathBuf]) -> CaptureConfig {
    for path in candidates {
        crate::log(&format!("Looking for config at: {}", path.display()));
        if !path.exists() {
            continue;
        }
        match read_config(path) {
            Ok(config) => {
                crate::log(&format!("Config loaded from {}", path.display()));
                return config;
            }
            Err(e) => {
                crate::log(&format!("{:#}. Using defaults.", e));
                return CaptureConfig::default();
            }
        }
    }

    crate::log("config.json not found. Using default config.");
    CaptureConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = CaptureConfig::default();
        let settings = config.to_settings().unwrap();
        assert_eq!(
            settings.tile,
            TileSize {
                width: 800,
                height: 600
            }
        );
        assert_eq!(settings.settle_delay, Duration::from_millis(200));
        assert!(settings.start_marker.is_none());
        assert!(settings.end_marker.is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults_for_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "tile_width": 640, "tile_height": 480, "end_marker": [1280.0, 480.0] }"#,
        )
        .unwrap();

        let config = read_config(&path).unwrap();
        assert_eq!(config.tile_width, 640);
        assert_eq!(config.directory, "ScreenCapture");
        assert_eq!(config.filename, "level_");

        let settings = config.to_settings().unwrap();
        assert_eq!(settings.end_marker, Some(WorldPoint::new(1280.0, 480.0)));
    }

    #[test]
    fn test_non_positive_tile_is_invalid() {
        let config = CaptureConfig {
            tile_width: -800,
            ..CaptureConfig::default()
        };
        assert!(matches!(
            config.to_settings(),
            Err(CaptureError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_empty_filename_is_invalid() {
        let config = CaptureConfig {
            filename: "  ".to_string(),
            ..CaptureConfig::default()
        };
        assert!(config.to_settings().is_err());
    }

    #[test]
    fn test_far_positions_are_invalid() {
        let far = [
            CaptureConfig {
                start_marker: Some([-1e300, 0.0]),
                end_marker: Some([0.0, 0.0]),
                ..CaptureConfig::default()
            },
            CaptureConfig {
                end_marker: Some([4e9, 4e9]),
                ..CaptureConfig::default()
            },
            CaptureConfig {
                camera_position: [0.0, f64::INFINITY],
                ..CaptureConfig::default()
            },
        ];
        for config in far {
            assert!(matches!(
                config.to_settings(),
                Err(CaptureError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("missing.json"))).is_err());
    }

    #[test]
    fn test_load_first_skips_missing_and_falls_back_on_parse_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let good = dir.path().join("good.json");
        let bad = dir.path().join("bad.json");
        fs::write(&good, r#"{ "filename": "map" }"#).unwrap();
        fs::write(&bad, "{ not json").unwrap();

        let config = load_first(&[missing.clone(), good.clone()]);
        assert_eq!(config.filename, "map");

        let config = load_first(&[bad, good]);
        assert_eq!(config, CaptureConfig::default());

        let config = load_first(&[missing]);
        assert_eq!(config, CaptureConfig::default());
    }

    #[test]
    fn test_round_trips_through_json() {
        let config = CaptureConfig {
            start_marker: Some([1.5, -2.0]),
            write_manifest: true,
            ..CaptureConfig::default()
        };
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: CaptureConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
