//! Error types for swiftmon-core.

use thiserror::Error;

/// Result type alias for swiftmon core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for swiftmon operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Shape name is not one of the supported region shapes.
    #[error("invalid region shape '{0}' (expected 'circle' or 'annulus')")]
    InvalidShape(String),

    /// Dimensions do not satisfy the shape's invariants.
    #[error("invalid {shape} dimensions {dimensions:?}: {reason}")]
    InvalidDimensions {
        shape: &'static str,
        dimensions: Vec<f64>,
        reason: &'static str,
    },

    /// Region file or expression could not be parsed.
    #[error("region parse error: {0}")]
    Parse(String),

    /// Coordinate system label cannot be written to a region file.
    #[error("invalid region coordinate system '{0}'")]
    InvalidCoordSystem(String),

    /// Background-scale correction needs a circle source and an annulus background.
    #[error(
        "background-scale correction requires a circle source and an annulus background, \
         got {source_shape} and {background_shape}"
    )]
    UnsupportedRegionShape {
        source_shape: &'static str,
        background_shape: &'static str,
    },

    /// Channel bounds are inverted or outside the detector range.
    #[error("invalid channel range {low}..={high}")]
    InvalidChannelRange { low: i64, high: i64 },

    /// Exposure times cannot be normalized into stack weights.
    #[error("invalid exposure set: {0}")]
    InvalidExposure(String),

    /// Folded profile is unusable.
    #[error("invalid pulse profile: {0}")]
    InvalidProfile(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
