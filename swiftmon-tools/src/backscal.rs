//! WT-mode region files and BACKSCAL correction.

use crate::centroid::{find_centroid, CentroidSource};
use crate::runner::ToolRunner;
use crate::Result;
use std::path::{Path, PathBuf};
use swiftmon_core::{BackgroundScale, Region, WtRegions};
use swiftmon_io::{update_keywords, Value, Workspace};
use tracing::info;

/// Centre radius of the default WT background annulus, in pixels.
pub const WT_BACKGROUND_CENTER: f64 = 100.0;

/// Default source region written by [`make_wt_regions`].
pub const SOURCE_REGION_FILE: &str = "source.reg";

/// Default background region written by [`make_wt_regions`].
pub const BACKGROUND_REGION_FILE: &str = "back.reg";

/// Writes BACKSCAL into extension 1 of a source and background spectrum.
///
/// # Errors
/// Returns an error unless the regions are a source circle and a background
/// annulus, or if either spectrum cannot be updated.
pub fn correct_backscal(
    source_spectrum: &Path,
    background_spectrum: &Path,
    source_region: &Region,
    background_region: &Region,
) -> Result<BackgroundScale> {
    let scale = BackgroundScale::for_wt_regions(source_region, background_region)?;
    update_keywords(source_spectrum, 1, &[("BACKSCAL", Value::Real(scale.source))])?;
    update_keywords(background_spectrum, 1, &[("BACKSCAL", Value::Real(scale.background))])?;
    info!(
        source = scale.source,
        background = scale.background,
        "corrected BACKSCAL"
    );
    Ok(scale)
}

/// Where [`make_wt_regions`] writes its region files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WtRegionFiles {
    pub source: PathBuf,
    pub background: PathBuf,
}

impl Default for WtRegionFiles {
    fn default() -> Self {
        Self {
            source: SOURCE_REGION_FILE.into(),
            background: BACKGROUND_REGION_FILE.into(),
        }
    }
}

/// Writes the default WT regions centred on the brightest pixel.
///
/// The source is a circle of `source_radius` pixels; the background is an
/// annulus from `100 - background_half_width` to
/// `100 + background_half_width` pixels.
///
/// # Errors
/// Returns an error if centroiding fails, the radii do not form valid
/// regions, or a region file cannot be written.
pub fn make_wt_regions<R: ToolRunner + ?Sized>(
    workspace: &Workspace,
    runner: &R,
    events: &Path,
    source_radius: f64,
    background_half_width: f64,
    files: &WtRegionFiles,
) -> Result<WtRegions> {
    let center = find_centroid(workspace, runner, &CentroidSource::Events(events.to_path_buf()))?;

    let source = Region::circle(center, source_radius)?;
    let background = Region::annulus(
        center,
        WT_BACKGROUND_CENTER - background_half_width,
        WT_BACKGROUND_CENTER + background_half_width,
    )?;

    let source_file = workspace.resolve(&files.source);
    let background_file = workspace.resolve(&files.background);
    source.write(&source_file)?;
    background.write(&background_file)?;
    info!(%source, %background, "wrote WT regions");

    Ok(WtRegions {
        source_file,
        source,
        background_file,
        background,
    })
}
