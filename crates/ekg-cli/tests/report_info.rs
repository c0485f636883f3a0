use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::{error::Error, fs, path::PathBuf};

#[derive(Deserialize)]
struct ChannelInfo {
    marker: String,
    samples: usize,
    fs: f64,
}

#[derive(Deserialize)]
struct ReportInfo {
    duration_s: f64,
    eeg: ChannelInfo,
    pulse: ChannelInfo,
    ecg: ChannelInfo,
}

#[test]
fn report_info_lists_channel_rates() -> Result<(), Box<dyn Error>> {
    let report = workspace_root().join("test_data/station_report.txt");
    let mut cmd = cargo_bin_cmd!("ekg");
    cmd.args(["report-info", "--report", report.to_str().expect("utf8 path")]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let info: ReportInfo = serde_json::from_slice(&output)?;

    assert_eq!(info.duration_s, 10.0);
    assert_eq!(info.eeg.marker, "EEG1_A");
    assert_eq!(info.eeg.samples, 1000);
    assert_eq!(info.eeg.fs, 100.0);
    assert_eq!(info.pulse.marker, "CARDIO_S1");
    assert_eq!(info.pulse.samples, 50);
    assert_eq!(info.pulse.fs, 5.0);
    assert_eq!(info.ecg.marker, "CARDIO_RAW");
    assert_eq!(info.ecg.samples, 2500);
    assert_eq!(info.ecg.fs, 250.0);
    Ok(())
}

#[test]
fn report_without_duration_fails() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let report = dir.path().join("broken.txt");
    fs::write(&report, "CARDIO_RAW\n0.1\n0.2\n")?;

    let mut cmd = cargo_bin_cmd!("ekg");
    cmd.args(["report-info", "--report", report.to_str().expect("utf8 path")]);
    cmd.assert().failure();
    Ok(())
}

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}
