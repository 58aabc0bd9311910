//! CLI integration tests

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

/// Build command for the waferscan-cli binary.
fn waferscan_cli() -> Command {
    Command::cargo_bin("waferscan-cli").unwrap()
}

/// Path to waferscan library test fixtures (relative to workspace).
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("waferscan")
        .join("tests")
        .join("fixtures")
}

#[test]
fn test_cli_help() {
    let mut cmd = waferscan_cli();

    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("KLARF"));
}

#[test]
fn test_cli_version() {
    let mut cmd = waferscan_cli();

    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_info_valid_file() {
    let mut cmd = waferscan_cli();
    let path = fixtures_dir().join("valid_inspection.klarf");

    cmd.arg("info").arg(path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("LOT-4411"))
        .stdout(predicate::str::contains("W07"));
}

#[test]
fn test_cli_info_json_output() {
    let mut cmd = waferscan_cli();
    let path = fixtures_dir().join("valid_inspection.klarf");

    cmd.arg("info").arg(path).arg("--format").arg("json");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("{"))
        .stdout(predicate::str::contains("stats"))
        .stdout(predicate::str::contains("defect_count"));
}

#[test]
fn test_cli_info_no_die_map() {
    let mut cmd = waferscan_cli();
    let path = fixtures_dir().join("valid_inspection.klarf");

    cmd.arg("info").arg(path).arg("--no-die-map");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Dies:               0"));
}

#[test]
fn test_cli_info_nonexistent_file() {
    let mut cmd = waferscan_cli();

    cmd.arg("info").arg("does_not_exist.klarf");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_cli_info_rejects_foreign_format() {
    let mut cmd = waferscan_cli();
    let path = fixtures_dir().join("not_klarf.txt");

    cmd.arg("info").arg(path);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_cli_info_fail_on_mismatch_with_consistent_file() {
    let mut cmd = waferscan_cli();
    let path = fixtures_dir().join("valid_inspection.klarf");

    cmd.arg("info").arg(path).arg("--fail-on-mismatch");

    // fixture summary agrees with its defect list
    cmd.assert().success();
}

#[test]
fn test_cli_info_fail_on_mismatch_detects_bad_summary() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad_summary.klarf");
    std::fs::write(
        &path,
        "FileVersion 1 0;\n\
         SampleSize 1 50;\n\
         DiePitch 5000.0 5000.0;\n\
         SampleCenterLocation 0.0 0.0;\n\
         DefectRecordSpec 5 DEFECTID XREL YREL XINDEX YINDEX ;\n\
         DefectList\n\
          1 10.0 5.0 0 0;\n\
         SummarySpec 5 TESTNO NDEFECT DEFDENSITY NDIE NDEFDIE ;\n\
         SummaryList\n\
          1 9 0.1 60 9;\n\
         EndOfFile;\n",
    )
    .unwrap();

    let mut cmd = waferscan_cli();
    cmd.arg("info").arg(&path).arg("--fail-on-mismatch");
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("NDEFECT"));
}

#[test]
fn test_cli_lot_command() {
    let mut cmd = waferscan_cli();
    let dir = fixtures_dir();

    cmd.arg("lot").arg(dir);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("LOT-4411"))
        .stdout(predicate::str::contains("LOT-0001"));
}

#[test]
fn test_cli_map_command() {
    let mut cmd = waferscan_cli();
    let path = fixtures_dir().join("valid_inspection.klarf");

    cmd.arg("map").arg(path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("dies"))
        .stdout(predicate::str::contains("Legend"));
}

#[test]
fn test_cli_export_roundtrip() {
    let path = fixtures_dir().join("valid_inspection.klarf");

    let mut cmd = waferscan_cli();
    cmd.arg("export").arg(&path);
    let output = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(output).unwrap();

    assert!(text.starts_with("FileVersion"));
    assert!(text.trim_end().ends_with("EndOfFile;"));
    assert!(text.contains("LotID \"LOT-4411\";"));

    // exported text is itself a loadable KLARF file
    let dir = tempfile::tempdir().unwrap();
    let exported = dir.path().join("exported.klarf");
    std::fs::write(&exported, &text).unwrap();

    let mut cmd = waferscan_cli();
    cmd.arg("info").arg(&exported);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("LOT-4411"));
}

#[test]
fn test_cli_export_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("out.klarf");
    let path = fixtures_dir().join("valid_inspection.klarf");

    let mut cmd = waferscan_cli();
    cmd.arg("export")
        .arg(&path)
        .arg("--output")
        .arg(&out_path);
    cmd.assert().success();

    let written = std::fs::read_to_string(&out_path).unwrap();
    assert!(written.starts_with("FileVersion"));
}

#[test]
fn test_cli_exit_codes() {
    let valid_path = fixtures_dir().join("valid_inspection.klarf");

    let mut cmd = waferscan_cli();
    cmd.arg("info").arg(&valid_path);
    cmd.assert().code(0);

    let mut cmd = waferscan_cli();
    cmd.arg("info").arg("nonexistent.klarf");
    cmd.assert().code(1);
}
