//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or truncated FITS structure.
    #[error("invalid FITS file {path}: {reason}")]
    InvalidFormat { path: String, reason: String },

    /// No extension with the requested EXTNAME.
    #[error("{path} has no {extname} extension")]
    MissingExtension { path: String, extname: String },

    /// HDU index beyond the end of the file.
    #[error("{path} has no HDU {index}")]
    MissingHdu { path: String, index: usize },

    /// Keyword absent from the header.
    #[error("keyword {keyword} not found in HDU {hdu} of {path}")]
    MissingKeyword {
        path: String,
        hdu: usize,
        keyword: String,
    },

    /// Keyword value has the wrong type.
    #[error("keyword {keyword} in {path} is not {expected}")]
    KeywordType {
        path: String,
        keyword: String,
        expected: &'static str,
    },
}
