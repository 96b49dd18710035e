use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Type alias for [`std::result::Result`] containing a brokkr [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Enum describing the possible errors that can occur in brokkr.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Retarget(#[from] retarget::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Settings(#[from] settings::Error),

    #[error("Invalid input pattern `{pattern}`")]
    Pattern {
        #[source]
        source: glob::PatternError,
        pattern: String,
    },

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error("No motion files found in {}", inputs.join(", "))]
    #[diagnostic(
        code(brokkr::no_inputs),
        help("Inputs are motion files, directories containing `.json` files, or glob patterns")
    )]
    NoInputs { inputs: Vec<String> },

    #[error("Refusing to overwrite `{}`", path.display())]
    #[diagnostic(code(brokkr::exists), help("Pass `--force` to overwrite the existing file"))]
    OutputExists { path: PathBuf },

    #[error("Failed to create output directory `{}`", path.display())]
    OutputDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error(
        "`{}` and `{}` would both be written to `{}`",
        first.display(),
        second.display(),
        output.display()
    )]
    #[diagnostic(
        code(brokkr::duplicate_output),
        help("Pass the common parent directory, so the targets keep the input directory layout")
    )]
    DuplicateOutput {
        output: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("{failed} of {total} motion files failed to retarget")]
    #[diagnostic(code(brokkr::batch))]
    BatchFailed { failed: usize, total: usize },

    #[error("Invalid derived body `{0}`")]
    #[diagnostic(
        code(brokkr::derived_body),
        help("Derived bodies are written as `name=position_body:orientation_body`")
    )]
    DerivedBody(String),
}
