//! Exposure maps with `xrtexpomap`.

use crate::runner::{Stage, ToolCommand, ToolRunner};
use crate::Result;
use std::path::{Path, PathBuf};
use swiftmon_core::ExposureMap;
use swiftmon_io::Workspace;

/// Inputs and output naming for [`make_expomap`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExposureMapOptions {
    /// Cleaned event file.
    pub events: PathBuf,
    /// Attitude file.
    pub attitude: PathBuf,
    /// Housekeeping header packets file.
    pub housekeeping: PathBuf,
    /// Output stem, defaulting to the event file stem.
    pub stem: Option<String>,
    /// Output directory.
    pub outdir: Option<PathBuf>,
}

impl ExposureMapOptions {
    #[must_use]
    pub fn new(
        events: impl Into<PathBuf>,
        attitude: impl Into<PathBuf>,
        housekeeping: impl Into<PathBuf>,
    ) -> Self {
        Self {
            events: events.into(),
            attitude: attitude.into(),
            housekeeping: housekeeping.into(),
            stem: None,
            outdir: None,
        }
    }

    #[must_use]
    pub fn with_stem(mut self, stem: impl Into<String>) -> Self {
        self.stem = Some(stem.into());
        self
    }

    #[must_use]
    pub fn with_outdir(mut self, outdir: impl Into<PathBuf>) -> Self {
        self.outdir = Some(outdir.into());
        self
    }

    /// Stem and directory passed to the tool.
    ///
    /// With only a stem the map goes to the workspace directory; with
    /// neither it goes next to the event file under the event file's stem.
    #[must_use]
    pub fn output_location(&self) -> (String, PathBuf) {
        let input_stem = || {
            self.events
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        let input_dir = || match self.events.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("./"),
        };

        match (&self.stem, &self.outdir) {
            (Some(stem), Some(outdir)) => (stem.clone(), outdir.clone()),
            (Some(stem), None) => (stem.clone(), PathBuf::from("./")),
            (None, Some(outdir)) => (input_stem(), outdir.clone()),
            (None, None) => (input_stem(), input_dir()),
        }
    }
}

/// Runs `xrtexpomap` and returns where the exposure map is written.
///
/// # Errors
/// Returns an error if the tool fails.
pub fn make_expomap<R: ToolRunner + ?Sized>(
    workspace: &Workspace,
    runner: &R,
    options: &ExposureMapOptions,
) -> Result<ExposureMap> {
    let (stem, outdir) = options.output_location();
    let image = workspace.resolve(outdir.join(format!("{stem}_ex.img")));

    let command = ToolCommand::new(Stage::ExposureMap, "xrtexpomap")
        .kv("infile", options.events.display())
        .kv("attfile", options.attitude.display())
        .kv("hdfile", options.housekeeping.display())
        .kv("clobber", "yes")
        .kv("stemout", &stem)
        .kv("outdir", outdir.display())
        .producing(&image);
    runner.run(workspace, &command)?;

    Ok(ExposureMap {
        stem,
        outdir,
        image,
    })
}
