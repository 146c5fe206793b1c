//! Exposure-weighted stacking of spectra and their responses.
//!
//! Every input is copied into the workspace before any tool sees it, so the
//! originals are never modified. The ARF and RMF of each input are folded
//! into one response with `marfrmf`, the responses are averaged with
//! exposure weights by `addrmf`, and the counts are summed with `mathpha`.

use crate::grouping::GrpphaScript;
use crate::runner::{Stage, ToolCommand, ToolRunner};
use crate::{Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use swiftmon_core::{StackWeights, StackedSpectrum};
use swiftmon_io::{FitsFile, ScratchFile, Workspace};
use tracing::{debug, info};

/// Auxiliary files and exposure recorded in a spectrum header.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumHeader {
    pub backfile: PathBuf,
    pub ancrfile: PathBuf,
    pub respfile: PathBuf,
    pub exposure: f64,
}

impl SpectrumHeader {
    /// Reads BACKFILE, ANCRFILE, RESPFILE and EXPOSURE from extension 1.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or a keyword is missing.
    pub fn read(path: &Path) -> Result<Self> {
        let fits = FitsFile::open(path)?;
        Ok(Self {
            backfile: fits.read_str(1, "BACKFILE")?.into(),
            ancrfile: fits.read_str(1, "ANCRFILE")?.into(),
            respfile: fits.read_str(1, "RESPFILE")?.into(),
            exposure: fits.read_f64(1, "EXPOSURE")?,
        })
    }
}

struct StagedSpectrum {
    source: ScratchFile,
    background: ScratchFile,
    response: ScratchFile,
}

/// Sums `spectra` into `<root>.pha`, `<root>.bak` and `<root>.rsp`.
///
/// Responses are weighted by exposure; the summed spectrum points at the
/// summed background and the stacked response, and is grouped to
/// `grouping` counts per bin when set.
///
/// # Errors
/// Returns an error if no spectra are given, their exposures do not sum to
/// a positive value, a header or auxiliary file cannot be read, or any tool
/// fails. Exposures are checked before any tool runs.
pub fn stack_spectra<R: ToolRunner + ?Sized>(
    workspace: &Workspace,
    runner: &R,
    spectra: &[PathBuf],
    output_root: &str,
    grouping: Option<u32>,
) -> Result<StackedSpectrum> {
    let headers = spectra
        .iter()
        .map(|spectrum| SpectrumHeader::read(&workspace.resolve(spectrum)))
        .collect::<Result<Vec<_>>>()?;
    let weights = StackWeights::from_exposures(headers.iter().map(|h| h.exposure).collect())?;
    info!(
        spectra = spectra.len(),
        exposure = weights.total_exposure(),
        "stacking spectra"
    );

    let mut staged = Vec::with_capacity(spectra.len());
    let mut stems = HashSet::new();
    for (i, (spectrum, header)) in spectra.iter().zip(&headers).enumerate() {
        let index = i + 1;
        let stem = spectrum
            .file_stem()
            .map_or_else(|| format!("temp_spec{index}"), |s| s.to_string_lossy().into_owned());
        // Inputs from different directories may share a file name.
        let response = if stems.insert(stem.clone()) {
            format!("{stem}.rsp_tmp")
        } else {
            format!("{stem}_{index}.rsp_tmp")
        };
        staged.push(stage_spectrum(workspace, runner, index, spectrum, header, &response)?);
    }

    let response = format!("{output_root}.rsp");
    let combine = ToolCommand::new(Stage::ResponseStack, "addrmf")
        .kv("list", join_names(staged.iter().map(|s| &s.response), ","))
        .kv("weights", weights.to_list())
        .kv("rmffile", &response)
        .producing(workspace.resolve(&response));
    runner.run(workspace, &combine)?;

    let summed_background = workspace.scratch("temp_final_spec.bak");
    runner.run(
        workspace,
        &sum_command(
            join_names(staged.iter().map(|s| &s.background), "+"),
            &summed_background,
        ),
    )?;
    let summed_source = workspace.scratch("temp_final_spec.pha");
    runner.run(
        workspace,
        &sum_command(join_names(staged.iter().map(|s| &s.source), "+"), &summed_source),
    )?;

    let spectrum = format!("{output_root}.pha");
    let background = format!("{output_root}.bak");
    let group = GrpphaScript::new()
        .chkey("backfile", &background)
        .chkey("respfile", &response)
        .group_min(grouping)
        .command(summed_source.name(), &spectrum)
        .producing(workspace.resolve(&spectrum));
    runner.run(workspace, &group)?;

    copy_file(summed_background.path(), &workspace.resolve(&background))?;

    Ok(StackedSpectrum {
        spectrum: workspace.resolve(spectrum),
        background: workspace.resolve(background),
        response: workspace.resolve(response),
        weights,
    })
}

fn stage_spectrum<R: ToolRunner + ?Sized>(
    workspace: &Workspace,
    runner: &R,
    index: usize,
    spectrum: &Path,
    header: &SpectrumHeader,
    response: &str,
) -> Result<StagedSpectrum> {
    let root = format!("temp_spec{index}");
    let copy = |from: &Path, suffix: &str| -> Result<ScratchFile> {
        let scratch = workspace.scratch(&format!("{root}{suffix}"));
        copy_file(&workspace.resolve(from), scratch.path())?;
        debug!(from = %from.display(), to = scratch.name(), "staged copy");
        Ok(scratch)
    };

    let source = copy(spectrum, ".pha")?;
    let background = copy(&header.backfile, ".bak")?;
    let arf = copy(&header.ancrfile, ".arf")?;
    let rmf = copy(&header.respfile, ".rmf")?;

    let response = workspace.scratch(response);
    let fold = ToolCommand::new(Stage::ResponseCombine, "marfrmf")
        .kv("rmfil", rmf.name())
        .kv("arfil", arf.name())
        .kv("outfil", response.name())
        .producing(response.path());
    runner.run(workspace, &fold)?;

    Ok(StagedSpectrum {
        source,
        background,
        response,
    })
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    std::fs::copy(from, to).map_err(|source| Error::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn sum_command(expression: String, output: &ScratchFile) -> ToolCommand {
    ToolCommand::new(Stage::SpectrumSum, "mathpha")
        .kv("expr", expression)
        .kv("units", "C")
        .kv("outfil", output.name())
        .kv("exposure", "CALC")
        .kv("areascal", "%")
        .kv("backscal", "%")
        .kv("ncomment", 0)
        .producing(output.path())
}

fn join_names<'a>(files: impl Iterator<Item = &'a ScratchFile>, separator: &str) -> String {
    files.map(ScratchFile::name).collect::<Vec<_>>().join(separator)
}
