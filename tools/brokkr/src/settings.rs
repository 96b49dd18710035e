use std::path::{Path, PathBuf};

use serde::Deserialize;
use settings::Config;

use crate::error::Result;

/// Directory containing `brokkr.toml`, relative to the working directory.
pub const SETTINGS_DIR: &str = "config";

/// Worker count used when the settings do not specify one.
pub const DEFAULT_WORKERS: usize = 4;

/// Settings for the `brokkr` tool, stored in `config/brokkr.toml`.
///
/// A robot specific overlay in `config/overlay/<robot>/brokkr.toml` is applied on top when a robot
/// is selected with `--robot`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BrokkrSettings {
    pub retarget: RetargetSettings,
    pub batch: BatchSettings,
    pub report: ReportSettings,
}

impl Config for BrokkrSettings {
    const PATH: &'static str = "brokkr.toml";
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetargetSettings {
    /// Configuration used when none is given on the command line.
    pub config: PathBuf,
    /// Height of the recorded subject, for motion files that do not carry one.
    pub subject_height: Option<f64>,
}

impl Default for RetargetSettings {
    fn default() -> Self {
        Self {
            config: PathBuf::from("config/dash/smplx_to_dash.json"),
            subject_height: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub workers: usize,
    pub output_dir: PathBuf,
    /// Appended to the motion file stem to name the target file.
    pub suffix: String,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            output_dir: PathBuf::from("output/targets"),
            suffix: "_targets".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Print the dropped target summary after every run.
    pub summary: bool,
}

impl BrokkrSettings {
    /// Load the settings from `dir`, with the overlay of `robot` applied if given.
    ///
    /// Without a settings file the defaults are used.
    pub fn load_from(dir: impl AsRef<Path>, robot: Option<&str>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.join(Self::PATH).exists() {
            tracing::debug!(dir = %dir.display(), "no brokkr settings, using defaults");
            return Ok(Self::default());
        }

        let settings = match robot {
            Some(robot) => Self::load_with_overlay(dir, dir.join("overlay").join(robot))?,
            None => Self::load(dir)?,
        };
        Ok(settings)
    }

    /// Load the settings from [`SETTINGS_DIR`].
    pub fn load_for(robot: Option<&str>) -> Result<Self> {
        Self::load_from(SETTINGS_DIR, robot)
    }
}
