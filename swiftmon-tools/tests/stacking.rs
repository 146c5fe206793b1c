mod common;

use approx::assert_relative_eq;
use common::{leftover_scratch, touch, write_linked_spectrum, FakeHeasoft};
use std::path::{Path, PathBuf};
use swiftmon_tools::{stack_spectra, Error, Stage};
use swiftmon_io::Workspace;
use tempfile::tempdir;

fn observation(dir: &Path, name: &str, exposure: f64) -> PathBuf {
    for suffix in ["_back.pha", "_source.arf"] {
        touch(&dir.join(format!("{name}{suffix}")));
    }
    touch(&dir.join("swxwt0to2s6_20131212v015.rmf"));
    let spectrum = dir.join(format!("{name}_source.pha"));
    write_linked_spectrum(
        &spectrum,
        exposure,
        &format!("{name}_back.pha"),
        &format!("{name}_source.arf"),
        "swxwt0to2s6_20131212v015.rmf",
    );
    PathBuf::from(format!("{name}_source.pha"))
}

#[test]
fn test_stack_two_spectra() {
    let dir = tempdir().unwrap();
    let spectra = vec![
        observation(dir.path(), "obs1", 100.0),
        observation(dir.path(), "obs2", 300.0),
    ];
    let workspace = Workspace::new(dir.path());
    let runner = FakeHeasoft::default();

    let stacked = stack_spectra(&workspace, &runner, &spectra, "stack", Some(25)).unwrap();

    assert_eq!(stacked.weights.weights(), &[0.25, 0.75]);
    assert_relative_eq!(stacked.exposure(), 400.0);
    assert_eq!(stacked.spectrum, dir.path().join("stack.pha"));
    assert_eq!(stacked.background, dir.path().join("stack.bak"));
    assert_eq!(stacked.response, dir.path().join("stack.rsp"));
    assert!(stacked.background.exists());

    assert_eq!(
        runner.programs(),
        ["marfrmf", "marfrmf", "addrmf", "mathpha", "mathpha", "grppha"]
    );

    let folds = runner.with_program("marfrmf");
    assert_eq!(
        folds[0].command_line(),
        "marfrmf rmfil=temp_spec1.rmf arfil=temp_spec1.arf outfil=obs1_source.rsp_tmp"
    );
    assert_eq!(folds[1].value_of("outfil"), Some("obs2_source.rsp_tmp"));

    let combine = &runner.with_program("addrmf")[0];
    assert_eq!(
        combine.command_line(),
        "addrmf list=obs1_source.rsp_tmp,obs2_source.rsp_tmp weights=0.25,0.75 rmffile=stack.rsp"
    );

    let sums = runner.with_program("mathpha");
    assert_eq!(
        sums[0].command_line(),
        "mathpha expr=temp_spec1.bak+temp_spec2.bak units=C outfil=temp_final_spec.bak \
         exposure=CALC areascal=% backscal=% ncomment=0"
    );
    assert_eq!(sums[1].value_of("expr"), Some("temp_spec1.pha+temp_spec2.pha"));
    assert_eq!(sums[1].value_of("outfil"), Some("temp_final_spec.pha"));

    let group = &runner.with_program("grppha")[0];
    assert_eq!(group.value_of("infile"), Some("temp_final_spec.pha"));
    assert_eq!(
        group.value_of("comm"),
        Some("chkey backfile stack.bak & chkey respfile stack.rsp & group min 25 & exit")
    );

    assert!(leftover_scratch(dir.path()).is_empty());
}

#[test]
fn test_response_order_follows_input() {
    let dir = tempdir().unwrap();
    let spectra = vec![
        observation(dir.path(), "late", 300.0),
        observation(dir.path(), "early", 100.0),
    ];
    let workspace = Workspace::new(dir.path());
    let runner = FakeHeasoft::default();

    let stacked = stack_spectra(&workspace, &runner, &spectra, "stack", None).unwrap();

    assert_eq!(stacked.weights.weights(), &[0.75, 0.25]);
    assert_relative_eq!(stacked.exposure(), 400.0);
    let combine = &runner.with_program("addrmf")[0];
    assert_eq!(
        combine.value_of("list"),
        Some("late_source.rsp_tmp,early_source.rsp_tmp")
    );
    assert_eq!(combine.value_of("weights"), Some("0.75,0.25"));
    assert_eq!(
        runner.with_program("grppha")[0].value_of("comm"),
        Some("chkey backfile stack.bak & chkey respfile stack.rsp & exit")
    );
}

#[test]
fn test_shared_file_names_do_not_collide() {
    let dir = tempdir().unwrap();
    for sub in ["a", "b"] {
        std::fs::create_dir(dir.path().join(sub)).unwrap();
        observation(&dir.path().join(sub), "obs", 200.0);
    }
    // Auxiliary names in the headers are relative to the workspace.
    for sub in ["a", "b"] {
        write_linked_spectrum(
            &dir.path().join(sub).join("obs_source.pha"),
            200.0,
            &format!("{sub}/obs_back.pha"),
            &format!("{sub}/obs_source.arf"),
            &format!("{sub}/swxwt0to2s6_20131212v015.rmf"),
        );
    }
    let spectra = vec![PathBuf::from("a/obs_source.pha"), PathBuf::from("b/obs_source.pha")];
    let workspace = Workspace::new(dir.path());
    let runner = FakeHeasoft::default();

    stack_spectra(&workspace, &runner, &spectra, "stack", None).unwrap();

    assert_eq!(
        runner.with_program("addrmf")[0].value_of("list"),
        Some("obs_source.rsp_tmp,obs_source_2.rsp_tmp")
    );
}

#[test]
fn test_zero_exposure_fails_before_tools() {
    let dir = tempdir().unwrap();
    let spectra = vec![
        observation(dir.path(), "obs1", 0.0),
        observation(dir.path(), "obs2", 0.0),
    ];
    let workspace = Workspace::new(dir.path());
    let runner = FakeHeasoft::default();

    let err = stack_spectra(&workspace, &runner, &spectra, "stack", None).unwrap_err();

    assert!(matches!(
        err,
        Error::Core(swiftmon_core::Error::InvalidExposure(_))
    ));
    assert!(runner.programs().is_empty());
}

#[test]
fn test_empty_input_fails() {
    let dir = tempdir().unwrap();
    let workspace = Workspace::new(dir.path());
    let runner = FakeHeasoft::default();

    let err = stack_spectra(&workspace, &runner, &[], "stack", None).unwrap_err();

    assert!(matches!(
        err,
        Error::Core(swiftmon_core::Error::InvalidExposure(_))
    ));
    assert!(runner.programs().is_empty());
}

#[test]
fn test_failure_removes_all_scratch() {
    let dir = tempdir().unwrap();
    let spectra = vec![
        observation(dir.path(), "obs1", 100.0),
        observation(dir.path(), "obs2", 300.0),
    ];
    let workspace = Workspace::new(dir.path());
    let runner = FakeHeasoft::failing_on(Stage::Grouping);

    let err = stack_spectra(&workspace, &runner, &spectra, "stack", Some(20)).unwrap_err();

    assert!(matches!(
        err,
        Error::ExternalToolFailure {
            stage: Stage::Grouping,
            ..
        }
    ));
    assert!(leftover_scratch(dir.path()).is_empty());
    assert!(!dir.path().join("stack.bak").exists());
}

#[test]
fn test_missing_background_names_file() {
    let dir = tempdir().unwrap();
    touch(&dir.path().join("obs1_source.arf"));
    touch(&dir.path().join("obs1.rmf"));
    write_linked_spectrum(
        &dir.path().join("obs1_source.pha"),
        100.0,
        "missing_back.pha",
        "obs1_source.arf",
        "obs1.rmf",
    );
    let workspace = Workspace::new(dir.path());
    let runner = FakeHeasoft::default();

    let err = stack_spectra(
        &workspace,
        &runner,
        &[PathBuf::from("obs1_source.pha")],
        "stack",
        None,
    )
    .unwrap_err();

    match &err {
        Error::Copy { from, .. } => assert_eq!(from, &dir.path().join("missing_back.pha")),
        other => panic!("expected copy error, got {other:?}"),
    }
    assert!(err.to_string().contains("missing_back.pha"));
    assert!(runner.programs().is_empty());
    assert!(leftover_scratch(dir.path()).is_empty());
}
