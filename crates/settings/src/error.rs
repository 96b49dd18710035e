//! Result and Error types for the crate.
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result containing an error variant from this module.
pub type Result<T> = std::result::Result<T, Error>;

/// Settings error variants
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// IO error while reading `path`.
    #[error("Failed to access settings file `{}`", path.display())]
    #[diagnostic(code(settings::io))]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Deserialize error, this wraps a [`toml::de::Error`]
    #[error("Failed to parse settings file `{}`", path.display())]
    #[diagnostic(
        code(settings::deserialize),
        help("Keys in an overlay replace the same keys in the main settings file")
    )]
    Deserialize {
        #[source]
        source: toml::de::Error,
        path: PathBuf,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { source, path }
    }

    pub(crate) fn deserialize(path: impl Into<PathBuf>) -> impl FnOnce(toml::de::Error) -> Self {
        let path = path.into();
        move |source| Self::Deserialize { source, path }
    }
}
