//! swiftmon-io: FITS access and scratch-file handling for swiftmon.
//!
//! This crate reads FITS headers and images through memory-mapped files,
//! patches header keywords in place, and provides the workspace and
//! scoped scratch files that pipeline stages share.
//!

#[cfg(any(test, feature = "test-util"))]
mod builder;
pub mod card;
mod error;
mod reader;
mod workspace;
mod writer;

pub use card::{Card, Header, Value};
pub use error::{Error, Result};
pub use reader::{FitsFile, Hdu};
pub use workspace::{ScratchFile, Workspace};
pub use writer::update_keywords;

#[cfg(any(test, feature = "test-util"))]
pub use builder::{write_fits, HduBuilder};
