// SPDX: CC0-1.0

//! Startup configuration, read from a JSON file.
//!
//! Every field has a default, so a config file only needs the settings it
//! changes and a missing file is the same as an empty one.

use crate::{pipeline::SamplingSettings, viewport::Viewport, PlotMode};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{
    env, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "FN_PLOT_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config file '{}'", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Initial viewport.
    pub viewport: Viewport,
    pub sampling: SamplingConfig,
    pub debounce: DebounceConfig,
    pub output: OutputConfig,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub plot_mode: PlotMode,
    #[serde(flatten)]
    pub settings: SamplingSettings,
    /// Samples per function for background intersection searches.
    pub max_resolution: Option<u32>,
}

/// Quiet periods, in milliseconds, before a burst of edits is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    pub typing_ms: u64,
    pub range_ms: u64,
    pub pan_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            typing_ms: 300,
            range_ms: 400,
            pan_ms: 100,
        }
    }
}

impl DebounceConfig {
    pub const fn typing(&self) -> Duration {
        Duration::from_millis(self.typing_ms)
    }

    pub const fn range(&self) -> Duration {
        Duration::from_millis(self.range_ms)
    }

    pub const fn pan(&self) -> Duration {
        Duration::from_millis(self.pan_ms)
    }
}

/// Size of images rendered through gnuplot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

impl Config {
    pub fn from_json(path: &Path, text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads the config at `path`; a missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => {
                let config = Self::from_json(path, &text)?;
                info!("loaded config from '{}'", path.display());
                Ok(config)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!("no config at '{}', using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Loads from `path` if given, else from the file named by
    /// [`CONFIG_ENV`], else returns the defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => {
                debug!("{CONFIG_ENV} is not set, using defaults");
                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AngleMode;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn empty_object_is_default() {
        let config = Config::from_json(Path::new("x.json"), "{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.debounce.typing(), Duration::from_millis(300));
        assert_eq!(config.debounce.range(), Duration::from_millis(400));
        assert_eq!(config.debounce.pan(), Duration::from_millis(100));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_json(
            Path::new("x.json"),
            r#"{
                "sampling": { "plot_mode": "polar", "angle_mode": "degrees", "max_resolution": 4000 },
                "debounce": { "pan_ms": 16 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.sampling.plot_mode, PlotMode::Polar);
        assert_eq!(config.sampling.settings.angle_mode, AngleMode::Degrees);
        assert_eq!(config.sampling.settings.polar_steps, 1000);
        assert_eq!(config.sampling.max_resolution, Some(4000));
        assert_eq!(config.debounce.pan_ms, 16);
        assert_eq!(config.debounce.typing_ms, 300);
    }

    #[test]
    fn invalid_viewport_is_rejected() {
        let err = Config::from_json(
            Path::new("bad.json"),
            r#"{ "viewport": { "min_x": 5, "max_x": -5, "min_y": -1, "max_y": 1, "width": 10, "height": 10 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.to_string(), "invalid config file 'bad.json'");
    }

    #[test]
    fn load_reads_file_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fn_plot.json");
        assert_eq!(Config::load(&path).unwrap(), Config::default());

        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, r#"{{ "output": {{ "width": 640 }} }}"#).unwrap();
        drop(file);
        let config = Config::resolve(Some(&path)).unwrap();
        assert_eq!(config.output.width, 640);
        assert_eq!(config.output.height, 1080);
    }
}
