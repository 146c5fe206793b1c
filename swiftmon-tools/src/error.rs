//! Pipeline error types.

use crate::runner::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline error types.
#[derive(Error, Debug)]
pub enum Error {
    /// An external tool exited unsuccessfully.
    #[error(
        "{stage} failed (exit {}) running `{command}`{}: {stderr}",
        exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
        artifact.as_ref().map(|p| format!(" for {}", p.display())).unwrap_or_default()
    )]
    ExternalToolFailure {
        stage: Stage,
        command: String,
        artifact: Option<PathBuf>,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The ARF generator did not report which CALDB RMF it used.
    #[error("no RMF filename found in output of `{command}` (ARF {})", artifact.display())]
    MissingCalibrationReference { command: String, artifact: PathBuf },

    /// A centroid image holds no finite pixel.
    #[error("no finite pixels in image {}", path.display())]
    EmptyImage { path: PathBuf },

    /// Staging a file into the workspace failed.
    #[error("failed to copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Spawning a tool or touching a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// FITS access error.
    #[error("FITS error: {0}")]
    Fits(#[from] swiftmon_io::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] swiftmon_core::Error),
}
