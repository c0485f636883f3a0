use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::{error::Error, fs, path::PathBuf};

#[derive(Deserialize)]
struct BatchLine {
    file: String,
    beats: Option<usize>,
    mean_heart_rate_bpm: Option<f64>,
    error: Option<String>,
}

#[test]
fn batch_reports_each_file_and_keeps_going() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let fixture = workspace_root().join("test_data/station_report.txt");
    fs::copy(&fixture, dir.path().join("a_stage1.txt"))?;
    fs::write(
        dir.path().join("b_flat.txt"),
        format!("этап 2, продолжительность 0:02\nCARDIO_RAW\n{}", "0.5\n".repeat(500)),
    )?;
    fs::copy(&fixture, dir.path().join("c_stage3.TXT"))?;
    fs::write(dir.path().join("notes.md"), "not a report")?;

    let mut cmd = cargo_bin_cmd!("ekg");
    cmd.args(["qrs-batch", "--dir", dir.path().to_str().expect("utf8 path")]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let lines: Vec<BatchLine> = String::from_utf8(output)?
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;

    assert_eq!(lines.len(), 3);
    assert!(lines[0].file.ends_with("a_stage1.txt"));
    assert_eq!(lines[0].beats, Some(12));
    assert!(lines[0].mean_heart_rate_bpm.is_some());
    assert!(lines[0].error.is_none());

    assert!(lines[1].file.ends_with("b_flat.txt"));
    assert_eq!(lines[1].beats, None);
    let err = lines[1].error.as_deref().expect("flat report error");
    assert!(err.contains("flat"), "{}", err);

    assert!(lines[2].file.ends_with("c_stage3.TXT"));
    assert_eq!(lines[2].beats, Some(12));
    Ok(())
}

#[test]
fn missing_directory_fails() {
    let mut cmd = cargo_bin_cmd!("ekg");
    cmd.args(["qrs-batch", "--dir", "/nonexistent/ekg-reports"]);
    cmd.assert().failure();
}

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}
