//! Pulse folding and TOA wrappers around PRESTO and `swiftfold`.

use crate::runner::{Stage, ToolCommand, ToolOutput, ToolRunner};
use crate::Result;
use std::path::{Path, PathBuf};
use swiftmon_io::Workspace;
use tracing::info;

/// Folds a barycentred time series with a timing ephemeris.
///
/// `prepfold` takes the ephemeris as the value of `-timing`.
///
/// # Errors
/// Returns an error if `prepfold` fails.
pub fn prepfold<R: ToolRunner + ?Sized>(
    workspace: &Workspace,
    runner: &R,
    datfile: &Path,
    parfile: &Path,
    bins: u32,
) -> Result<ToolOutput> {
    let command = ToolCommand::new(Stage::Fold, "prepfold")
        .arg("-timing")
        .arg(parfile.display().to_string())
        .arg("-n")
        .arg(bins.to_string())
        .arg(datfile.display().to_string());
    runner.run(workspace, &command)
}

/// Folds an event file at a fixed frequency into `<output_root>.fold`.
///
/// `frequency` is in Hz and `epoch` is the reference MJD; both are passed
/// with six decimals.
///
/// # Errors
/// Returns an error if `swiftfold` fails.
pub fn swiftfold<R: ToolRunner + ?Sized>(
    workspace: &Workspace,
    runner: &R,
    events: &Path,
    output_root: &str,
    frequency: f64,
    epoch: f64,
    bins: u32,
) -> Result<PathBuf> {
    let output = format!("{output_root}.fold");
    let command = ToolCommand::new(Stage::Fold, "swiftfold")
        .arg("-i")
        .arg(events.display().to_string())
        .arg("-o")
        .arg(&output)
        .arg("-f")
        .arg(format!("{frequency:.6}"))
        .arg("-r")
        .arg(format!("{epoch:.6}"))
        .arg("-b")
        .arg(bins.to_string())
        .producing(workspace.resolve(&output));
    runner.run(workspace, &command)?;
    Ok(workspace.resolve(output))
}

/// Measures times of arrival of a folded time series against a template.
///
/// Returns the TOA lines `get_TOAs.py` prints, skipping blank lines.
///
/// # Errors
/// Returns an error if `get_TOAs.py` fails.
pub fn get_toas<R: ToolRunner + ?Sized>(
    workspace: &Workspace,
    runner: &R,
    datfile: &Path,
    template: &Path,
) -> Result<Vec<String>> {
    let command = ToolCommand::new(Stage::Toa, "get_TOAs.py")
        .arg("-e")
        .arg("-f")
        .arg("-t")
        .arg(template.display().to_string())
        .arg(datfile.display().to_string());
    let output = runner.run(workspace, &command)?;

    let toas: Vec<String> = output
        .stdout
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect();
    info!(datfile = %datfile.display(), toas = toas.len(), "measured TOAs");
    Ok(toas)
}
