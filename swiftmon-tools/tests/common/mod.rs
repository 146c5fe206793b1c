//! Scripted stand-in for the HEASoft tools.
#![allow(dead_code)]

use ndarray::Array2;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use swiftmon_io::{write_fits, HduBuilder, Workspace};
use swiftmon_tools::{Result, Stage, ToolCommand, ToolOutput, ToolRunner, NONE};

pub const CALDB_RMF: &str = "/caldb/data/swift/xrt/cpf/rmf/swxwt0to2s6_20131212v015.rmf";

/// Princeton-format TOAs reported by `get_TOAs.py`.
pub const TOA_LINES: [&str; 2] = [
    "3                   55123.4567890123456     12.34                   0.00000",
    "3                   55123.5567890123456     15.02                   0.00000",
];

/// Records every command and writes plausible output files.
pub struct FakeHeasoft {
    pub commands: RefCell<Vec<ToolCommand>>,
    /// Image written for `imgfile`.
    pub image: Array2<f64>,
    /// Whether `xrtmkarf` reports its CALDB RMF.
    pub report_rmf: bool,
    /// Stage that exits with status 1.
    pub fail_on: Option<Stage>,
}

impl Default for FakeHeasoft {
    fn default() -> Self {
        let mut image = Array2::zeros((600, 600));
        image[[497, 511]] = 230.0;
        Self {
            commands: RefCell::new(Vec::new()),
            image,
            report_rmf: true,
            fail_on: None,
        }
    }
}

impl FakeHeasoft {
    pub fn failing_on(stage: Stage) -> Self {
        Self {
            fail_on: Some(stage),
            ..Self::default()
        }
    }

    pub fn programs(&self) -> Vec<String> {
        self.commands
            .borrow()
            .iter()
            .map(|c| c.program().to_string())
            .collect()
    }

    pub fn with_program(&self, program: &str) -> Vec<ToolCommand> {
        self.commands
            .borrow()
            .iter()
            .filter(|c| c.program() == program)
            .cloned()
            .collect()
    }

    fn write_products(&self, workspace: &Workspace, command: &ToolCommand) {
        let output = |key: &str| {
            command
                .value_of(key)
                .filter(|name| *name != NONE)
                .map(|name| workspace.resolve(name))
        };

        match command.program() {
            "extractor" => {
                if let Some(image) = output("imgfile") {
                    write_fits(&image, &[HduBuilder::image(&self.image)]).unwrap();
                }
                for key in ["phafile", "eventsout", "fitsbinlc"] {
                    if let Some(path) = output(key) {
                        write_spectrum(&path, 1000.0);
                    }
                }
            }
            "xrtmkarf" => touch(&output("outfile").unwrap()),
            "grppha" => touch(&output("outfile").unwrap()),
            "marfrmf" | "mathpha" => touch(&output("outfil").unwrap()),
            "addrmf" => touch(&output("rmffile").unwrap()),
            "swiftfold" => touch(&workspace.resolve(&command.args()[3])),
            "fcopy" => touch(&workspace.resolve(&command.args()[1])),
            _ => {}
        }
    }
}

impl ToolRunner for FakeHeasoft {
    fn run(&self, workspace: &Workspace, command: &ToolCommand) -> Result<ToolOutput> {
        self.commands.borrow_mut().push(command.clone());

        if self.fail_on == Some(command.stage()) {
            let output = ToolOutput {
                exit_code: Some(1),
                stderr: format!("{}: simulated failure", command.program()),
                ..ToolOutput::success("")
            };
            return output.check(command);
        }

        self.write_products(workspace, command);
        let stdout = match command.program() {
            "xrtmkarf" if self.report_rmf => {
                format!("xrtmkarf_0.6.3: Info: Processing '{CALDB_RMF}' CALDB file.\n")
            }
            "get_TOAs.py" => format!("\n{}\n\n", TOA_LINES.join("\n")),
            _ => String::new(),
        };
        Ok(ToolOutput::success(stdout))
    }
}

pub fn touch(path: &Path) {
    std::fs::write(path, b"fake product").unwrap();
}

/// Minimal PHA file with a SPECTRUM extension.
pub fn write_spectrum(path: &Path, exposure: f64) {
    write_fits(
        path,
        &[
            HduBuilder::empty_primary(),
            HduBuilder::table("SPECTRUM", 1024, 6)
                .keyword("EXPOSURE", exposure)
                .keyword("BACKSCAL", 1.0),
        ],
    )
    .unwrap();
}

/// PHA file whose header points at auxiliary files.
pub fn write_linked_spectrum(path: &Path, exposure: f64, backfile: &str, ancrfile: &str, respfile: &str) {
    write_fits(
        path,
        &[
            HduBuilder::empty_primary(),
            HduBuilder::table("SPECTRUM", 1024, 6)
                .keyword("EXPOSURE", exposure)
                .keyword("BACKFILE", backfile)
                .keyword("ANCRFILE", ancrfile)
                .keyword("RESPFILE", respfile),
        ],
    )
    .unwrap();
}

/// Event file with `gti_rows` good time intervals and a bad-pixel table.
pub fn write_events(path: &Path, gti_rows: usize) {
    write_fits(
        path,
        &[
            HduBuilder::empty_primary(),
            HduBuilder::table("EVENTS", 50, 16),
            HduBuilder::table("GTI", gti_rows, 16),
            HduBuilder::table("BADPIX", 2, 12),
        ],
    )
    .unwrap();
}

/// Names of scratch files left in `dir`.
pub fn leftover_scratch(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            let name = path.file_name().unwrap().to_string_lossy();
            name.contains("temp") || name.ends_with(".rsp_tmp")
        })
        .collect()
}
