//! swiftmon-tools: HEASoft orchestration for Swift XRT reductions.
//!
//! Each workflow builds tool command lines, runs them through a
//! [`ToolRunner`] inside a [`Workspace`](swiftmon_io::Workspace), and returns
//! a manifest of the files it produced. Scratch files are removed when the
//! workflow returns, whether it succeeded or not.
//!
//! # Workflows
//!
//! - [`extract`]: one `extractor` call
//! - [`find_centroid`]: max-pixel source position
//! - [`extract_spectrum`]: source/background spectra, ARF and RMF
//! - [`split_by_gti`]: one event file per good time interval
//! - [`stack_spectra`]: exposure-weighted spectral stack
//! - [`correct_backscal`] and [`make_wt_regions`]: WT-mode regions
//! - [`make_expomap`]: exposure maps
//! - [`prepfold`], [`swiftfold`] and [`get_toas`]: folding and TOAs
//!

mod backscal;
mod centroid;
mod error;
mod expomap;
mod extractor;
mod fold;
mod grouping;
mod gti;
pub mod runner;
mod spectrum;
mod stack;

pub use backscal::{
    correct_backscal, make_wt_regions, WtRegionFiles, BACKGROUND_REGION_FILE, SOURCE_REGION_FILE,
    WT_BACKGROUND_CENTER,
};
pub use centroid::{find_centroid, max_pixel, CentroidSource};
pub use error::{Error, Result};
pub use expomap::{make_expomap, ExposureMapOptions};
pub use extractor::{extract, ExtractOptions, RegionFilter, NONE};
pub use fold::{get_toas, prepfold, swiftfold};
pub use grouping::GrpphaScript;
pub use gti::{split_by_gti, BADPIX_EXTENSION, GTI_EXTENSION};
pub use runner::{ShellRunner, Stage, ToolCommand, ToolOutput, ToolRunner};
pub use spectrum::{caldb_rmf, extract_spectrum, SpectrumOptions, DEFAULT_GROUPING};
pub use stack::{stack_spectra, SpectrumHeader};
