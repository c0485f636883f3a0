use assert_cmd::cargo::cargo_bin_cmd;
use ekg_lib::signal::Beat;
use serde::Deserialize;
use std::{error::Error, fs, path::PathBuf};

#[derive(Deserialize)]
struct DetectOutput {
    fs: f64,
    sample_count: usize,
    beats: Vec<Beat>,
    summary: String,
    mean_heart_rate_bpm: Option<f64>,
}

const EXPECTED_R: [usize; 12] = [
    100, 300, 500, 700, 900, 1100, 1300, 1500, 1700, 1900, 2100, 2300,
];

#[test]
fn report_beats_have_q_before_and_s_after_r() -> Result<(), Box<dyn Error>> {
    let report = workspace_root().join("test_data/station_report.txt");
    let mut cmd = cargo_bin_cmd!("ekg");
    cmd.args(["qrs-detect", "--report", report.to_str().expect("utf8 path")]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let actual: DetectOutput = serde_json::from_slice(&output)?;

    assert_close(actual.fs, 250.0, 1e-9);
    assert_eq!(actual.sample_count, 2500);
    assert_eq!(actual.summary, "12 QRS complexes detected");
    assert_eq!(actual.beats.len(), EXPECTED_R.len());
    for (beat, &r) in actual.beats.iter().zip(EXPECTED_R.iter()) {
        assert!(beat.r.abs_diff(r) <= 1, "R at {} expected {}", beat.r, r);
        assert!(beat.q < beat.r && beat.r - beat.q <= 12, "{:?}", beat);
        assert!(beat.s > beat.r && beat.s - beat.r <= 12, "{:?}", beat);
    }
    assert_close(actual.mean_heart_rate_bpm.expect("hr"), 75.0, 0.5);
    Ok(())
}

#[test]
fn raw_samples_with_duration_match_report() -> Result<(), Box<dyn Error>> {
    let samples = workspace_root().join("test_data/ecg_250hz.txt");
    let mut cmd = cargo_bin_cmd!("ekg");
    cmd.args([
        "qrs-detect",
        "--input",
        samples.to_str().expect("utf8 path"),
        "--duration-s",
        "10",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let actual: DetectOutput = serde_json::from_slice(&output)?;
    let r: Vec<usize> = actual.beats.iter().map(|b| b.r).collect();
    assert_eq!(r.len(), 12);
    assert!(r.iter().zip(EXPECTED_R).all(|(&a, b)| a.abs_diff(b) <= 1));
    Ok(())
}

#[test]
fn summary_flag_prints_count_line() {
    let samples = workspace_root().join("test_data/ecg_250hz.txt");
    let mut cmd = cargo_bin_cmd!("ekg");
    cmd.args([
        "qrs-detect",
        "--input",
        samples.to_str().expect("utf8 path"),
        "--fs",
        "250",
        "--summary",
    ]);
    cmd.assert()
        .success()
        .stdout("12 QRS complexes detected\n");
}

#[test]
fn merge_flag_keeps_distinct_beats() {
    let report = workspace_root().join("test_data/station_report.txt");
    let mut cmd = cargo_bin_cmd!("ekg");
    cmd.args([
        "qrs-detect",
        "--report",
        report.to_str().expect("utf8 path"),
        "--merge-duplicate-peaks",
        "--summary",
    ]);
    cmd.assert()
        .success()
        .stdout("12 QRS complexes detected\n");
}

#[test]
fn stdin_and_config_file_are_accepted() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("detector.toml");
    fs::write(&config, "fiducial_source = \"conditioned\"\nqs_window = 20\n")?;
    let input = fs::read_to_string(workspace_root().join("test_data/ecg_250hz.txt"))?;

    let mut cmd = cargo_bin_cmd!("ekg");
    cmd.args([
        "qrs-detect",
        "--fs",
        "250",
        "--config",
        config.to_str().expect("utf8 path"),
    ])
    .write_stdin(input);
    let output = cmd.assert().success().get_output().stdout.clone();
    let actual: DetectOutput = serde_json::from_slice(&output)?;
    assert_eq!(actual.beats.len(), 12);
    for beat in &actual.beats {
        assert!(beat.r - beat.q <= 20 && beat.s - beat.r <= 20, "{:?}", beat);
    }
    Ok(())
}

#[test]
fn too_few_samples_fail_with_clear_error() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("ekg");
    cmd.args(["qrs-detect", "--fs", "1000"]).write_stdin("1\n2\n3\n");
    let output = cmd.assert().failure().get_output().stderr.clone();
    let stderr = String::from_utf8(output)?;
    assert!(stderr.contains("need at least 28 samples, got 3"), "{}", stderr);
    Ok(())
}

#[test]
fn raw_samples_need_a_rate() {
    let mut cmd = cargo_bin_cmd!("ekg");
    cmd.args(["qrs-detect"]).write_stdin("1\n2\n3\n");
    cmd.assert().failure();
}

#[test]
fn highcut_above_nyquist_is_rejected() -> Result<(), Box<dyn Error>> {
    let samples = workspace_root().join("test_data/ecg_250hz.txt");
    let mut cmd = cargo_bin_cmd!("ekg");
    cmd.args([
        "qrs-detect",
        "--input",
        samples.to_str().expect("utf8 path"),
        "--fs",
        "30",
    ]);
    let output = cmd.assert().failure().get_output().stderr.clone();
    let stderr = String::from_utf8(output)?;
    assert!(stderr.contains("sampling rate"), "{}", stderr);
    Ok(())
}

fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() <= tol,
        "expected {expected}, got {actual}"
    );
}

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}
