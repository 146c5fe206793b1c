//! Source spectrum with background, ARF and matched CALDB RMF.

use crate::centroid::{find_centroid, CentroidSource};
use crate::extractor::{extract, ExtractOptions, RegionFilter};
use crate::grouping::GrpphaScript;
use crate::runner::{Stage, ToolCommand, ToolRunner};
use crate::{Error, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use swiftmon_core::{SpectralBand, SpectrumProducts};
use swiftmon_io::Workspace;
use tracing::{info, warn};

static RMF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Processing '(?P<rmf>.*)\.rmf' CALDB file\.").expect("RMF pattern is valid")
});

/// Minimum counts per grouped bin unless configured otherwise.
pub const DEFAULT_GROUPING: u32 = 20;

/// Options for [`extract_spectrum`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumOptions {
    pub band: SpectralBand,
    /// Minimum counts per bin; `None` leaves the spectrum ungrouped.
    pub grouping: Option<u32>,
    /// Exposure map passed to `xrtmkarf` as `expofile`.
    pub exposure_map: Option<PathBuf>,
    pub source_region: Option<RegionFilter>,
    pub background_region: Option<RegionFilter>,
    /// Grade selection; also tags the output root with `_g<grade>`.
    pub grade: Option<String>,
}

impl Default for SpectrumOptions {
    fn default() -> Self {
        Self {
            band: SpectralBand::Full,
            grouping: Some(DEFAULT_GROUPING),
            exposure_map: None,
            source_region: None,
            background_region: None,
            grade: None,
        }
    }
}

impl SpectrumOptions {
    #[must_use]
    pub fn with_band(mut self, band: SpectralBand) -> Self {
        self.band = band;
        self
    }

    #[must_use]
    pub fn with_grouping(mut self, grouping: Option<u32>) -> Self {
        self.grouping = grouping;
        self
    }

    #[must_use]
    pub fn with_exposure_map(mut self, exposure_map: impl Into<PathBuf>) -> Self {
        self.exposure_map = Some(exposure_map.into());
        self
    }

    #[must_use]
    pub fn with_source_region(mut self, region: impl Into<RegionFilter>) -> Self {
        self.source_region = Some(region.into());
        self
    }

    #[must_use]
    pub fn with_background_region(mut self, region: impl Into<RegionFilter>) -> Self {
        self.background_region = Some(region.into());
        self
    }

    #[must_use]
    pub fn with_grade(mut self, grade: impl Into<String>) -> Self {
        self.grade = Some(grade.into());
        self
    }
}

/// Extracts a grouped source spectrum with background and responses.
///
/// Writes `<root>_source.pha`, `<root>_back.pha` and `<root>_source.arf`,
/// where `<root>` is `output_root` with `_g<grade>` appended when a grade
/// is selected. The source spectrum header points at the background, the
/// ARF and the CALDB RMF reported by `xrtmkarf`.
///
/// # Errors
/// Returns an error if the band is invalid, any tool fails, or `xrtmkarf`
/// does not report an RMF ([`Error::MissingCalibrationReference`]).
pub fn extract_spectrum<R: ToolRunner + ?Sized>(
    workspace: &Workspace,
    runner: &R,
    output_root: &str,
    input: &Path,
    options: &SpectrumOptions,
) -> Result<SpectrumProducts> {
    let channels = options.band.resolve()?;
    info!(input = %input.display(), %channels, "extracting spectrum");

    let centroid = find_centroid(workspace, runner, &CentroidSource::Events(input.to_path_buf()))?;

    let root = match &options.grade {
        Some(grade) => format!("{output_root}_g{grade}"),
        None => output_root.to_string(),
    };
    let back_root = format!("{root}_back");
    let arf = format!("{root}_source.arf");
    let source = format!("{root}_source.pha");

    let base = ExtractOptions::spectrum_only()
        .with_channels(channels)
        .with_grade(options.grade.clone());
    let scratch = workspace.scratch_product("temp_source", ".pha");
    extract(
        workspace,
        runner,
        scratch.root(),
        input,
        &base.clone().with_region(options.source_region.clone()),
    )?;
    extract(
        workspace,
        runner,
        &back_root,
        input,
        &base.with_region(options.background_region.clone()),
    )?;

    let mut command = ToolCommand::new(Stage::Arf, "xrtmkarf")
        .kv("outfile", &arf)
        .kv("phafile", scratch.name())
        .kv("psfflag", "yes")
        .kv("srcx", centroid.x)
        .kv("srcy", centroid.y)
        .kv("clobber", "yes");
    if let Some(map) = &options.exposure_map {
        command = command.kv("expofile", map.display());
    }
    let command = command.producing(workspace.resolve(&arf));
    let output = runner.run(workspace, &command)?;

    let rmf = caldb_rmf(&output.stdout).ok_or_else(|| Error::MissingCalibrationReference {
        command: command.command_line(),
        artifact: workspace.resolve(&arf),
    })?;
    if options.grade.as_deref().is_some_and(|g| g != "0") {
        warn!(grade = ?options.grade, %rmf, "grade selection is not 0; RESPFILE may not match the selected grades");
    }

    let group = GrpphaScript::new()
        .chkey("backfile", format!("{back_root}.pha"))
        .chkey("ancrfile", &arf)
        .chkey("respfile", &rmf)
        .group_min(options.grouping)
        .command(scratch.name(), &source)
        .producing(workspace.resolve(&source));
    runner.run(workspace, &group)?;

    Ok(SpectrumProducts {
        source: workspace.resolve(&source),
        background: workspace.resolve(format!("{back_root}.pha")),
        arf: workspace.resolve(&arf),
        rmf,
        centroid,
    })
}

/// CALDB RMF named in `xrtmkarf` output.
#[must_use]
pub fn caldb_rmf(stdout: &str) -> Option<String> {
    RMF_PATTERN
        .captures(stdout)
        .map(|caps| format!("{}.rmf", &caps["rmf"]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caldb_rmf_found() {
        let stdout = "xrtmkarf_0.6.3: Info: Processing \
                      '/caldb/data/swift/xrt/cpf/rmf/swxwt0to2s6_20131212v015.rmf' CALDB file.\n\
                      xrtmkarf_0.6.3: Info: Exit with success.";
        assert_eq!(
            caldb_rmf(stdout).as_deref(),
            Some("/caldb/data/swift/xrt/cpf/rmf/swxwt0to2s6_20131212v015.rmf")
        );
    }

    #[test]
    fn test_caldb_rmf_missing() {
        assert_eq!(caldb_rmf("xrtmkarf_0.6.3: Error: unable to find CALDB"), None);
    }

    #[test]
    fn test_default_options() {
        let options = SpectrumOptions::default();
        assert_eq!(options.band, SpectralBand::Full);
        assert_eq!(options.grouping, Some(20));
        assert!(options.grade.is_none());
    }
}
