//! Splitting an event file into one file per good time interval.

use crate::extractor::{extract, ExtractOptions};
use crate::runner::{Stage, ToolCommand, ToolRunner};
use crate::Result;
use std::path::Path;
use swiftmon_core::GtiPartition;
use swiftmon_io::{FitsFile, Workspace};
use tracing::info;

/// Extension holding the good time intervals.
pub const GTI_EXTENSION: &str = "GTI";

/// Extension appended to every split file.
pub const BADPIX_EXTENSION: &str = "BADPIX";

/// Writes `<stem>_s<i>.evt` for every row `i` of the `GTI` extension.
///
/// Rows are processed in table order, which is taken to be chronological.
/// Each output keeps the parent's bad-pixel table.
///
/// # Errors
/// Returns an error if the input has no `GTI` extension or any tool fails.
pub fn split_by_gti<R: ToolRunner + ?Sized>(
    workspace: &Workspace,
    runner: &R,
    input: &Path,
) -> Result<GtiPartition> {
    let rows = FitsFile::open(workspace.resolve(input))?.row_count(GTI_EXTENSION)?;
    info!(input = %input.display(), intervals = rows, "splitting by GTI");

    let stem = input.with_extension("").display().to_string();
    let mut partition = GtiPartition::default();
    for i in 1..=rows {
        let gti = workspace.scratch(&format!("tempGTI_{i}.fits"));
        let copy = ToolCommand::new(Stage::GtiCopy, "fcopy")
            .arg(format!("{}[{GTI_EXTENSION}][#row=={i}]", input.display()))
            .arg(gti.name())
            .producing(gti.path());
        runner.run(workspace, &copy)?;

        let root = format!("{stem}_s{i}");
        let options = ExtractOptions::default().with_gti_file(gti.name());
        extract(workspace, runner, &root, input, &options)?;

        let events = format!("{root}.evt");
        let append = ToolCommand::new(Stage::BadPixAppend, "fappend")
            .arg(format!("{}[{BADPIX_EXTENSION}]", input.display()))
            .arg(&events)
            .producing(workspace.resolve(&events));
        runner.run(workspace, &append)?;

        partition.intervals.push(workspace.resolve(&events));
    }

    Ok(partition)
}
