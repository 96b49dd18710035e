//! Result and Error types for the crate.
use std::{fmt, path::PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Result containing an error variant from this module.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a retargeting run before any frame is processed.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// IO error while reading or writing `path`.
    #[error("Failed to access `{}`", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// The document is not valid JSON, or could not be serialized.
    #[error("Malformed JSON: {0}")]
    #[diagnostic(code(retarget::json))]
    Json(#[from] serde_json::Error),

    /// The configuration is incomplete or contains values outside their allowed range.
    #[error("Invalid configuration at `{key_path}`: {reason}")]
    #[diagnostic(
        code(retarget::config),
        help(
            "Match table entries have the layout [human_body, pos_weight, rot_weight, [x, y, z], [w, x, y, z]]"
        )
    )]
    Config { key_path: KeyPath, reason: String },

    /// A rotation offset that cannot be normalized.
    #[error("Degenerate rotation offset at `{key_path}`: {quaternion:?} cannot be normalized")]
    #[diagnostic(
        code(retarget::orientation_degenerate),
        help("Rotation offsets are unit quaternions in [w, x, y, z] order, e.g. [1.0, 0.0, 0.0, 0.0]")
    )]
    OrientationDegenerate {
        key_path: KeyPath,
        quaternion: [f64; 4],
    },

    /// A robot model that could not be read.
    #[error("Invalid robot model: {reason}")]
    #[diagnostic(
        code(retarget::model),
        help("Robot models are MJCF files with a <mujoco> root and bodies below <worldbody>")
    )]
    Model { reason: String },

    /// A motion file that does not follow the motion document layout.
    #[error("Invalid motion data at `{key_path}`: {reason}")]
    #[diagnostic(code(retarget::motion))]
    Motion { key_path: KeyPath, reason: String },
}

impl Error {
    pub(crate) fn config(key_path: &KeyPath, reason: impl Into<String>) -> Self {
        Self::Config {
            key_path: key_path.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn motion(key_path: &KeyPath, reason: impl Into<String>) -> Self {
        Self::Motion {
            key_path: key_path.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn model(reason: impl Into<String>) -> Self {
        Self::Model {
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { source, path }
    }

    /// The JSON key path this error points at, if it has one.
    #[must_use]
    pub fn key_path(&self) -> Option<&KeyPath> {
        match self {
            Self::Config { key_path, .. }
            | Self::OrientationDegenerate { key_path, .. }
            | Self::Motion { key_path, .. } => Some(key_path),
            Self::Io { .. } | Self::Json(_) | Self::Model { .. } => None,
        }
    }
}

/// Dotted path to a value inside a JSON document, e.g. `ik_match_table1.r_foot[4]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyPath(String);

impl KeyPath {
    /// The path of the document itself.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}.{name}", self.0))
        }
    }

    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}[{index}]", self.0))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<document>")
        } else {
            f.write_str(&self.0)
        }
    }
}
