mod common;

use common::{FakeHeasoft, TOA_LINES};
use std::path::Path;
use swiftmon_io::Workspace;
use swiftmon_tools::{get_toas, prepfold, swiftfold, Error, Stage};
use tempfile::tempdir;

#[test]
fn test_prepfold_command() {
    let dir = tempdir().unwrap();
    let workspace = Workspace::new(dir.path());
    let runner = FakeHeasoft::default();

    prepfold(
        &workspace,
        &runner,
        Path::new("obs_bary.dat"),
        Path::new("1E2259.par"),
        32,
    )
    .unwrap();

    assert_eq!(
        runner.commands.borrow()[0].command_line(),
        "prepfold -timing 1E2259.par -n 32 obs_bary.dat"
    );
}

#[test]
fn test_swiftfold_command() {
    let dir = tempdir().unwrap();
    let workspace = Workspace::new(dir.path());
    let runner = FakeHeasoft::default();

    let folded = swiftfold(
        &workspace,
        &runner,
        Path::new("obs_reg.evt"),
        "obs",
        0.143_285_8,
        55_123.5,
        16,
    )
    .unwrap();

    assert_eq!(folded, dir.path().join("obs.fold"));
    assert!(folded.exists());
    let commands = runner.commands.borrow();
    assert_eq!(commands[0].stage(), Stage::Fold);
    assert_eq!(
        commands[0].command_line(),
        "swiftfold -i obs_reg.evt -o obs.fold -f 0.143286 -r 55123.500000 -b 16"
    );
}

#[test]
fn test_get_toas_returns_reported_lines() {
    let dir = tempdir().unwrap();
    let workspace = Workspace::new(dir.path());
    let runner = FakeHeasoft::default();

    let toas = get_toas(
        &workspace,
        &runner,
        Path::new("obs_bary.dat"),
        Path::new("1E2259.gaussians"),
    )
    .unwrap();

    assert_eq!(toas, TOA_LINES);
    assert_eq!(
        runner.commands.borrow()[0].command_line(),
        "get_TOAs.py -e -f -t 1E2259.gaussians obs_bary.dat"
    );
}

#[test]
fn test_get_toas_failure_names_stage() {
    let dir = tempdir().unwrap();
    let workspace = Workspace::new(dir.path());
    let runner = FakeHeasoft::failing_on(Stage::Toa);

    let err = get_toas(
        &workspace,
        &runner,
        Path::new("obs_bary.dat"),
        Path::new("1E2259.gaussians"),
    )
    .unwrap_err();

    assert!(matches!(err, Error::ExternalToolFailure { stage: Stage::Toa, .. }));
    assert!(err.to_string().starts_with("TOA measurement failed"));
}
