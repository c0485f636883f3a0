use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ekg_lib::{
    config::{read_config, DetectorConfig, FiducialSource},
    detectors::ecg::{detect_qrs_with_config, QrsDetection},
    io::{
        report::{read_report, Channel, Recording},
        text as text_io,
    },
    plot::{figure_from_detection, Figure, MarkerShape, Series},
    signal::TimeSeries,
};
use env_logger::Env;
use log::{info, warn};
use plotters::prelude::*;
use serde::Serialize;
use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "ekg",
    version,
    about = "EKG: QRS complex detection for station recording reports"
)]
struct Cli {
    /// Logging verbosity (e.g., debug, info, warn)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect QRS complexes (Q, R, S indices) in a report or a raw sample list
    QrsDetect {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        detector: DetectorArgs,
        /// Print only the "<N> QRS complexes detected" line
        #[arg(long)]
        summary: bool,
    },
    /// Show duration and per-channel sample counts of a report
    ReportInfo {
        #[arg(long)]
        report: PathBuf,
    },
    /// Run detection over every report in a directory, one JSON line per file
    QrsBatch {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long, default_value = "txt")]
        extension: String,
        #[command(flatten)]
        detector: DetectorArgs,
    },
    /// Render the ECG trace with R/Q/S markers to a PNG via plotters
    QrsPlot {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        detector: DetectorArgs,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 4000)]
        max_points: usize,
        /// Leave out the title and axis text (renders without system fonts)
        #[arg(long)]
        bare: bool,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Station report with EEG1_A / CARDIO_S1 / CARDIO_RAW sections
    #[arg(long, conflicts_with = "input")]
    report: Option<PathBuf>,
    /// Newline-delimited ECG samples (stdin when omitted)
    #[arg(long)]
    input: Option<PathBuf>,
    /// Sampling rate of --input samples
    #[arg(long, conflicts_with = "duration_s")]
    fs: Option<f64>,
    /// Total duration of --input samples; the rate is samples / duration
    #[arg(long)]
    duration_s: Option<f64>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FiducialArg {
    Raw,
    Conditioned,
}

#[derive(Args)]
struct DetectorArgs {
    /// TOML file with detector parameters; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    lowcut_hz: Option<f64>,
    #[arg(long)]
    highcut_hz: Option<f64>,
    #[arg(long)]
    threshold_percentile: Option<f64>,
    #[arg(long)]
    min_rr_s: Option<f64>,
    #[arg(long)]
    search_radius_s: Option<f64>,
    #[arg(long)]
    qs_window: Option<usize>,
    #[arg(long, value_enum)]
    fiducials: Option<FiducialArg>,
    /// Collapse refined R-peaks that land on the same sample
    #[arg(long)]
    merge_duplicate_peaks: bool,
}

impl DetectorArgs {
    fn resolve(&self) -> Result<DetectorConfig> {
        let mut cfg = match &self.config {
            Some(path) => read_config(path)?,
            None => DetectorConfig::default(),
        };
        if let Some(v) = self.lowcut_hz {
            cfg.lowcut_hz = v;
        }
        if let Some(v) = self.highcut_hz {
            cfg.highcut_hz = v;
        }
        if let Some(v) = self.threshold_percentile {
            cfg.threshold_percentile = v;
        }
        if let Some(v) = self.min_rr_s {
            cfg.min_rr_s = v;
        }
        if let Some(v) = self.search_radius_s {
            cfg.search_radius_s = v;
        }
        if let Some(v) = self.qs_window {
            cfg.qs_window = v;
        }
        if let Some(source) = self.fiducials {
            cfg.fiducial_source = match source {
                FiducialArg::Raw => FiducialSource::Raw,
                FiducialArg::Conditioned => FiducialSource::Conditioned,
            };
        }
        if self.merge_duplicate_peaks {
            cfg.merge_duplicate_peaks = true;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Serialize)]
struct DetectOutput<'a> {
    #[serde(flatten)]
    detection: &'a QrsDetection,
    summary: String,
    mean_heart_rate_bpm: Option<f64>,
}

#[derive(Serialize)]
struct ChannelInfo {
    marker: &'static str,
    samples: usize,
    fs: f64,
}

#[derive(Serialize)]
struct ReportInfo {
    duration_s: f64,
    eeg: ChannelInfo,
    pulse: ChannelInfo,
    ecg: ChannelInfo,
}

#[derive(Serialize)]
struct BatchLine {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    beats: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mean_heart_rate_bpm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();
    match cli.command {
        Commands::QrsDetect {
            source,
            detector,
            summary,
        } => cmd_qrs_detect(&source, &detector, summary)?,
        Commands::ReportInfo { report } => cmd_report_info(&report)?,
        Commands::QrsBatch {
            dir,
            extension,
            detector,
        } => cmd_qrs_batch(&dir, &extension, &detector)?,
        Commands::QrsPlot {
            source,
            detector,
            out,
            max_points,
            bare,
        } => cmd_qrs_plot(&source, &detector, &out, max_points, bare)?,
    }
    Ok(())
}

fn read_samples(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => text_io::read_f64_series(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text_io::parse_f64_series(&buf)
        }
    }
}

fn load_ecg(source: &SourceArgs) -> Result<TimeSeries> {
    if let Some(report) = &source.report {
        let recording = read_report(report)?;
        return Ok(recording.ecg_series()?.clone());
    }
    let data = read_samples(source.input.as_deref())?;
    match (source.fs, source.duration_s) {
        (Some(fs), _) => Ok(TimeSeries { fs, data }),
        (None, Some(duration)) => Ok(TimeSeries::from_duration(data, duration)?),
        (None, None) => bail!("raw samples need --fs or --duration-s"),
    }
}

fn detect(ts: &TimeSeries, cfg: &DetectorConfig) -> Result<QrsDetection> {
    detect_qrs_with_config(&ts.data, ts.fs, cfg)
        .with_context(|| format!("QRS detection on {} samples at {:.3} Hz", ts.len(), ts.fs))
}

fn cmd_qrs_detect(source: &SourceArgs, detector: &DetectorArgs, summary_only: bool) -> Result<()> {
    let cfg = detector.resolve()?;
    let ts = load_ecg(source)?;
    let detection = detect(&ts, &cfg)?;
    if summary_only {
        println!("{}", detection.summary());
        return Ok(());
    }
    let out = DetectOutput {
        detection: &detection,
        summary: detection.summary(),
        mean_heart_rate_bpm: detection.mean_heart_rate_bpm(),
    };
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}

fn cmd_report_info(path: &Path) -> Result<()> {
    let recording = read_report(path)?;
    let info_for = |channel: Channel| {
        let ts = recording.channel(channel);
        ChannelInfo {
            marker: channel.marker(),
            samples: ts.len(),
            fs: ts.fs,
        }
    };
    let info = ReportInfo {
        duration_s: recording.duration_s,
        eeg: info_for(Channel::Eeg),
        pulse: info_for(Channel::Pulse),
        ecg: info_for(Channel::Ecg),
    };
    println!("{}", serde_json::to_string(&info)?);
    Ok(())
}

fn cmd_qrs_batch(dir: &Path, extension: &str, detector: &DetectorArgs) -> Result<()> {
    let cfg = detector.resolve()?;
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        })
        .collect();
    files.sort();
    info!("{} report(s) in {}", files.len(), dir.display());

    for path in files {
        let file = path.display().to_string();
        let line = match read_report(&path)
            .and_then(|rec: Recording| Ok(rec.ecg_series()?.clone()))
            .and_then(|ts| detect(&ts, &cfg))
        {
            Ok(detection) => BatchLine {
                file,
                beats: Some(detection.len()),
                mean_heart_rate_bpm: detection.mean_heart_rate_bpm(),
                error: None,
            },
            Err(err) => {
                warn!("{}: {:#}", file, err);
                BatchLine {
                    file,
                    beats: None,
                    mean_heart_rate_bpm: None,
                    error: Some(format!("{:#}", err)),
                }
            }
        };
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}

fn cmd_qrs_plot(
    source: &SourceArgs,
    detector: &DetectorArgs,
    out: &Path,
    max_points: usize,
    bare: bool,
) -> Result<()> {
    let cfg = detector.resolve()?;
    let ts = load_ecg(source)?;
    let detection = detect(&ts, &cfg)?;
    let mut fig = figure_from_detection(&ts, &detection, max_points);
    if bare {
        fig.title = None;
        fig.x.label = None;
        fig.y.label = None;
    }
    draw_plotters_figure(out, &fig)?;
    println!("{}", detection.summary());
    Ok(())
}

fn draw_plotters_figure(path: &Path, fig: &Figure) -> Result<()> {
    let (x_min, mut x_max, mut y_min, mut y_max) =
        fig.bounds().ok_or_else(|| anyhow!("figure has no points"))?;
    if x_max <= x_min {
        x_max = x_min + 1.0;
    }
    if y_max <= y_min {
        y_min -= 0.5;
        y_max += 0.5;
    }
    let backend = BitMapBackend::new(path, (1200, 480));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    // Text goes through system fonts; an unannotated figure draws none.
    let annotated = fig.title.is_some() || fig.x.label.is_some() || fig.y.label.is_some();
    let mut builder = ChartBuilder::on(&root);
    builder.margin(10);
    if let Some(title) = &fig.title {
        builder.caption(title.as_str(), ("sans-serif", 24));
    }
    if annotated {
        builder.x_label_area_size(30).y_label_area_size(50);
    }
    let mut chart = builder.build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    if annotated {
        let mut mesh = chart.configure_mesh();
        if let Some(label) = &fig.x.label {
            mesh.x_desc(label.as_str());
        }
        if let Some(label) = &fig.y.label {
            mesh.y_desc(label.as_str());
        }
        mesh.draw()?;
    }

    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                chart.draw_series(LineSeries::new(
                    line.points.iter().map(|p| (p[0], p[1])),
                    RGBColor(r, g, b).stroke_width(line.style.width.round().max(1.0) as u32),
                ))?;
            }
            Series::Markers(markers) => {
                let (r, g, b) = markers.color.rgb();
                let style = RGBColor(r, g, b).filled();
                match markers.shape {
                    MarkerShape::Circle => {
                        chart.draw_series(
                            markers
                                .points
                                .iter()
                                .map(|p| Circle::new((p[0], p[1]), 4, style)),
                        )?;
                    }
                    MarkerShape::TriangleLeft | MarkerShape::TriangleRight => {
                        let tip = if markers.shape == MarkerShape::TriangleLeft {
                            -6
                        } else {
                            6
                        };
                        chart.draw_series(markers.points.iter().map(|p| {
                            EmptyElement::at((p[0], p[1]))
                                + Polygon::new(vec![(0, -5), (tip, 0), (0, 5)], style)
                        }))?;
                    }
                }
            }
        }
    }
    root.present()?;
    Ok(())
}
