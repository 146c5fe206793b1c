//! Event selection with the `extractor` tool.

use crate::runner::{Stage, ToolCommand, ToolRunner};
use crate::Result;
use std::path::{Path, PathBuf};
use swiftmon_core::{ChannelRange, ExtractedProducts, Region};
use swiftmon_io::Workspace;
use tracing::debug;

/// Placeholder the HEASoft tools accept for a disabled product.
pub const NONE: &str = "NONE";

/// Spatial filter applied during extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionFilter {
    /// An existing region file, relative to the workspace.
    File(PathBuf),
    /// A region written to a scratch file for the duration of the call.
    Shape(Region),
}

impl From<Region> for RegionFilter {
    fn from(region: Region) -> Self {
        RegionFilter::Shape(region)
    }
}

impl From<PathBuf> for RegionFilter {
    fn from(path: PathBuf) -> Self {
        RegionFilter::File(path)
    }
}

/// What to extract and how to filter the events.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    pub events: bool,
    pub image: bool,
    pub spectrum: bool,
    pub lightcurve: bool,
    pub region: Option<RegionFilter>,
    /// Grade selection string passed as `gstring`.
    pub grade: Option<String>,
    /// GTI file restricting the time range.
    pub gti_file: Option<PathBuf>,
    pub channels: ChannelRange,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            events: true,
            image: false,
            spectrum: false,
            lightcurve: false,
            region: None,
            grade: None,
            gti_file: None,
            channels: ChannelRange::full(),
        }
    }
}

impl ExtractOptions {
    /// Only an image, as used for centroiding.
    #[must_use]
    pub fn image_only() -> Self {
        Self::default().with_events(false).with_image(true)
    }

    /// Only a spectrum.
    #[must_use]
    pub fn spectrum_only() -> Self {
        Self::default().with_events(false).with_spectrum(true)
    }

    #[must_use]
    pub fn with_events(mut self, events: bool) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub fn with_image(mut self, image: bool) -> Self {
        self.image = image;
        self
    }

    #[must_use]
    pub fn with_spectrum(mut self, spectrum: bool) -> Self {
        self.spectrum = spectrum;
        self
    }

    #[must_use]
    pub fn with_lightcurve(mut self, lightcurve: bool) -> Self {
        self.lightcurve = lightcurve;
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: Option<RegionFilter>) -> Self {
        self.region = region;
        self
    }

    #[must_use]
    pub fn with_grade(mut self, grade: Option<String>) -> Self {
        self.grade = grade;
        self
    }

    #[must_use]
    pub fn with_gti_file(mut self, gti_file: impl Into<PathBuf>) -> Self {
        self.gti_file = Some(gti_file.into());
        self
    }

    #[must_use]
    pub fn with_channels(mut self, channels: ChannelRange) -> Self {
        self.channels = channels;
        self
    }
}

/// Runs `extractor` once on `input`, writing `<output_root>.{evt,img,pha,lc}`.
///
/// Output names are relative to the workspace; the returned manifest holds
/// resolved paths for the enabled products only.
///
/// # Errors
/// Returns an error if a scratch region file cannot be written or the tool
/// fails.
pub fn extract<R: ToolRunner + ?Sized>(
    workspace: &Workspace,
    runner: &R,
    output_root: &str,
    input: &Path,
    options: &ExtractOptions,
) -> Result<ExtractedProducts> {
    let product = |enabled: bool, suffix: &str| enabled.then(|| format!("{output_root}{suffix}"));
    let events = product(options.events, ".evt");
    let image = product(options.image, ".img");
    let spectrum = product(options.spectrum, ".pha");
    let lightcurve = product(options.lightcurve, ".lc");

    // Kept alive until the tool has run.
    let mut region_scratch = None;
    let region_file = match &options.region {
        Some(RegionFilter::File(path)) => path.display().to_string(),
        Some(RegionFilter::Shape(region)) => {
            let scratch = workspace.scratch(&format!("{}.reg", scratch_stem(output_root)));
            region.write(scratch.path())?;
            debug!(region = %region.expression(), file = scratch.name(), "wrote extraction region");
            let name = scratch.name().to_string();
            region_scratch = Some(scratch);
            name
        }
        None => NONE.to_string(),
    };

    let or_none = |name: &Option<String>| name.clone().unwrap_or_else(|| NONE.to_string());
    let mut command = ToolCommand::new(Stage::Extract, "extractor")
        .arg(format!("{}{}", input.display(), options.channels.pi_filter()))
        .kv("xcolf", "X")
        .kv("ycolf", "Y")
        .kv("tcol", "TIME")
        .kv("ecol", "PI")
        .kv("gcol", "GRADE")
        .kv("xcolh", "X")
        .kv("ycolh", "Y")
        .kv("gti", "GTI")
        .kv("imgfile", or_none(&image))
        .kv("phafile", or_none(&spectrum))
        .kv("fitsbinlc", or_none(&lightcurve))
        .kv("eventsout", or_none(&events))
        .kv("regionfile", region_file)
        .kv(
            "timefile",
            options
                .gti_file
                .as_ref()
                .map_or_else(|| NONE.to_string(), |p| p.display().to_string()),
        );
    if let Some(grade) = &options.grade {
        command = command.kv("gstring", grade);
    }
    command = command.kv("clobber", "yes");

    if let Some(primary) = [&events, &spectrum, &image, &lightcurve].into_iter().flatten().next() {
        command = command.producing(workspace.resolve(primary));
    }

    runner.run(workspace, &command)?;
    drop(region_scratch);

    let resolve = |name: Option<String>| name.map(|n| workspace.resolve(n));
    Ok(ExtractedProducts {
        events: resolve(events),
        image: resolve(image),
        spectrum: resolve(spectrum),
        lightcurve: resolve(lightcurve),
    })
}

fn scratch_stem(output_root: &str) -> String {
    let base = Path::new(output_root)
        .file_name()
        .map_or_else(|| output_root.to_string(), |n| n.to_string_lossy().into_owned());
    format!("temp_{base}")
}
