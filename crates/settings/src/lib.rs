//! Settings files with per robot overlays.
//!
//! Every settings type lives in its own TOML file inside a settings directory. A robot specific
//! overlay directory may contain a file with the same name, whose keys replace the keys of the
//! main file. Nested tables are merged key by key, so an overlay only needs to contain what differs.

use std::{fs, path::Path};

use serde::de::DeserializeOwned;
use toml::Table;

pub mod error;

pub use error::{Error, Result};

/// A settings type stored at [`Config::PATH`] inside a settings directory.
pub trait Config: DeserializeOwned {
    /// File name relative to the settings directory.
    const PATH: &'static str;

    /// Load the settings from `dir`.
    fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(Self::PATH);
        from_table(read_table(&path)?, &path)
    }

    /// Load the settings from `dir`, with the overlay in `overlay_dir` applied on top.
    ///
    /// A missing overlay file is not an error, the main settings are used as they are. Overlay keys
    /// absent from the main file are added, so an overlay can set optional values.
    fn load_with_overlay(dir: impl AsRef<Path>, overlay_dir: impl AsRef<Path>) -> Result<Self> {
        let main_path = dir.as_ref().join(Self::PATH);
        let overlay_path = overlay_dir.as_ref().join(Self::PATH);

        let main = read_table(&main_path)?;
        if !overlay_path.exists() {
            tracing::debug!(path = %overlay_path.display(), "no settings overlay");
            return from_table(main, &main_path);
        }

        let overlay = read_table(&overlay_path)?;
        tracing::debug!(path = %overlay_path.display(), "applying settings overlay");
        from_table(generate_config(main, overlay, true), &overlay_path)
    }
}

fn read_table(path: &Path) -> Result<Table> {
    let contents = fs::read_to_string(path).map_err(Error::io(path))?;
    contents.parse().map_err(Error::deserialize(path))
}

fn from_table<T: DeserializeOwned>(table: Table, path: &Path) -> Result<T> {
    toml::Value::Table(table)
        .try_into()
        .map_err(Error::deserialize(path))
}

/// Merge `overlay` into `main`.
///
/// Overlay values replace main values, tables present in both are merged recursively. Keys that
/// only exist in the overlay are kept when `add_key` is set, and dropped otherwise.
#[must_use]
pub fn generate_config(main: Table, mut overlay: Table, add_key: bool) -> Table {
    let mut generated = Table::new();

    for (key, value) in main {
        let merged = match (value, overlay.remove(&key)) {
            (toml::Value::Table(main), Some(toml::Value::Table(overlay))) => {
                toml::Value::Table(generate_config(main, overlay, add_key))
            }
            (_, Some(overlay)) => overlay,
            (main, None) => main,
        };
        generated.insert(key, merged);
    }

    if add_key {
        generated.extend(overlay);
    }

    generated
}
