use std::path::PathBuf;

use thiserror::Error;

/// Every fallible outcome a single component can produce while building or
/// comparing a structure. Most variants are recoverable: the component logs
/// a warning and continues (see the call sites in `master` and `closure`).
/// Only [`Error::InputLoadFailure`] is treated as fatal by its caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("search path or fstab file does not exist: {0}")]
    FileOrDirMissing(PathBuf),

    #[error("permission denied opening unit file: {0}")]
    PermissionDenied(PathBuf),

    #[error("{0} was expected to be a symbolic link but is not")]
    MalformedSymlink(PathBuf),

    #[error("\"{0}\" is not a recognized unit kind; treating as target")]
    UnknownUnitKind(String),

    #[error("\"{0}\" is not a known directive for unit kind {1}")]
    UnknownDirective(String, String),

    #[error("\"{0}\" does not map to any reverse-dependency attribute")]
    UnknownReverseKind(String),

    #[error("external tool {tool} failed while inspecting {path}")]
    ExternalToolFailure { tool: &'static str, path: PathBuf },

    #[error("referenced command binary does not exist under the alternative root: {0}")]
    MissingBinary(String),

    #[error("failed to load input for comparison: {0}")]
    InputLoadFailure(String),
}

pub type Result<T> = std::result::Result<T, Error>;
