use crate::{
    config::{DetectorConfig, FiducialSource},
    dsp::{argmax, argmin, find_peaks, gradient, median_filter, percentile, savgol_filter, BandPass},
    error::{QrsError, QrsResult},
    signal::{Beat, Events, RRSeries},
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Beats found in one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrsDetection {
    pub fs: f64,
    pub sample_count: usize,
    pub beats: Vec<Beat>,
}

impl QrsDetection {
    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    pub fn r_peaks(&self) -> Events {
        Events::from_indices(self.beats.iter().map(|b| b.r).collect())
    }

    pub fn rr(&self) -> RRSeries {
        RRSeries::from_events(&self.r_peaks(), self.fs)
    }

    pub fn mean_heart_rate_bpm(&self) -> Option<f64> {
        self.rr().mean_heart_rate_bpm()
    }

    /// Display line for status bars and terminals.
    pub fn summary(&self) -> String {
        qrs_summary(self.beats.len())
    }
}

pub fn qrs_summary(count: usize) -> String {
    format!("{} QRS complexes detected", count)
}

/// Run the full pipeline with default parameters.
pub fn detect_qrs(raw: &[f64], fs: f64) -> QrsResult<QrsDetection> {
    detect_qrs_with_config(raw, fs, &DetectorConfig::default())
}

/// R-peak indices only, for callers that just count beats.
pub fn detect_r_peaks(raw: &[f64], fs: f64) -> QrsResult<Events> {
    detect_qrs(raw, fs).map(|d| d.r_peaks())
}

/// Condition -> candidates -> refinement -> Q/S for every refined R-peak.
///
/// Any stage failure is returned as-is; there is no fallback detector.
pub fn detect_qrs_with_config(
    raw: &[f64],
    fs: f64,
    cfg: &DetectorConfig,
) -> QrsResult<QrsDetection> {
    let conditioned = condition_with_config(raw, fs, cfg)?;
    let candidates = extract_candidates_with_config(&conditioned, fs, cfg)?;
    let mut r_peaks = refine_with_config(&candidates, &conditioned, fs, cfg)?;
    if cfg.merge_duplicate_peaks {
        let before = r_peaks.len();
        r_peaks.sort_unstable();
        r_peaks.dedup();
        if r_peaks.len() < before {
            debug!("merged {} duplicate R-peaks", before - r_peaks.len());
        }
    }

    let fiducial_signal = match cfg.fiducial_source {
        FiducialSource::Raw => raw,
        FiducialSource::Conditioned => conditioned.as_slice(),
    };
    let beats = r_peaks
        .iter()
        .map(|&r| {
            locate_qs_with_window(r, fiducial_signal, cfg.qs_window).map(|(q, s)| Beat { q, r, s })
        })
        .collect::<QrsResult<Vec<_>>>()?;
    debug!("{} beats in {} samples at {:.2} Hz", beats.len(), raw.len(), fs);

    Ok(QrsDetection {
        fs,
        sample_count: raw.len(),
        beats,
    })
}

pub fn condition(raw: &[f64], fs: f64) -> QrsResult<Vec<f64>> {
    condition_with_config(raw, fs, &DetectorConfig::default())
}

/// Median-filter impulse noise away, then zero-phase band-pass to the QRS band.
pub fn condition_with_config(raw: &[f64], fs: f64, cfg: &DetectorConfig) -> QrsResult<Vec<f64>> {
    cfg.validate()?;
    let band = BandPass::butterworth(cfg.filter_order, cfg.lowcut_hz, cfg.highcut_hz, fs)?;
    if raw.len() < band.min_len() {
        return Err(QrsError::InsufficientSamples {
            stage: "signal conditioner",
            required: band.min_len(),
            actual: raw.len(),
        });
    }
    if let Some(index) = raw.iter().position(|v| !v.is_finite()) {
        return Err(QrsError::NonFiniteSample { index });
    }

    let despiked = median_filter(raw, cfg.median_window);
    if is_flat(&despiked) {
        return Err(QrsError::DegenerateSignal {
            stage: "signal conditioner",
        });
    }
    let conditioned = band.filtfilt(&despiked)?;
    debug!(
        "conditioned {} samples, {}..{} Hz band, {} sections",
        conditioned.len(),
        cfg.lowcut_hz,
        cfg.highcut_hz,
        band.sections().len()
    );
    Ok(conditioned)
}

pub fn extract_candidates(conditioned: &[f64], fs: f64) -> QrsResult<Vec<usize>> {
    extract_candidates_with_config(conditioned, fs, &DetectorConfig::default())
}

/// Peaks of the smoothed derivative above a per-recording percentile threshold,
/// at least one refractory distance apart.
pub fn extract_candidates_with_config(
    conditioned: &[f64],
    fs: f64,
    cfg: &DetectorConfig,
) -> QrsResult<Vec<usize>> {
    cfg.validate()?;
    check_sampling_rate(fs)?;
    let window = fit_savgol_window(conditioned.len(), cfg.savgol_window, cfg.savgol_order)?;

    let slope = gradient(conditioned);
    let emphasis = savgol_filter(&slope, window, cfg.savgol_order)?;
    if is_flat(&emphasis) {
        return Err(QrsError::DegenerateSignal {
            stage: "candidate extractor",
        });
    }
    let threshold = percentile(&emphasis, cfg.threshold_percentile).ok_or(
        QrsError::DegenerateSignal {
            stage: "candidate extractor",
        },
    )?;
    let distance = refractory_samples(fs, cfg.min_rr_s);
    let candidates = find_peaks(&emphasis, Some(threshold), distance);
    debug!(
        "{} candidates above {:.4e} (p{}), window {}, refractory {} samples",
        candidates.len(),
        threshold,
        cfg.threshold_percentile,
        window,
        distance
    );
    Ok(candidates)
}

pub fn refine(candidates: &[usize], conditioned: &[f64], fs: f64) -> QrsResult<Vec<usize>> {
    refine_with_config(candidates, conditioned, fs, &DetectorConfig::default())
}

/// Snap each candidate to the conditioned-signal maximum within the search radius.
///
/// Order follows the candidates. Refined indices are not deduplicated: two
/// candidates may land on the same maximum, which is logged. This happens with
/// wide complexes at higher rates, where the band-pass recovery after a beat
/// can reach the percentile threshold more than one refractory distance later
/// and then snaps back onto that beat's R-peak. Set
/// `DetectorConfig::merge_duplicate_peaks` to collapse such pairs.
pub fn refine_with_config(
    candidates: &[usize],
    conditioned: &[f64],
    fs: f64,
    cfg: &DetectorConfig,
) -> QrsResult<Vec<usize>> {
    cfg.validate()?;
    check_sampling_rate(fs)?;
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    if conditioned.is_empty() {
        return Err(QrsError::InsufficientSamples {
            stage: "peak refiner",
            required: 1,
            actual: 0,
        });
    }

    let last = conditioned.len() - 1;
    let radius = (cfg.search_radius_s * fs) as usize;
    let refined: Vec<usize> = candidates
        .iter()
        .map(|&c| {
            let c = c.min(last);
            let start = c.saturating_sub(radius);
            let end = (c + radius).min(last);
            start + argmax(&conditioned[start..=end]).unwrap_or(0)
        })
        .collect();

    for pair in refined.windows(2) {
        if pair[1] <= pair[0] {
            warn!(
                "refined R-peaks out of order or merged: {} then {}",
                pair[0], pair[1]
            );
        }
    }
    Ok(refined)
}

pub fn locate_qs(r_index: usize, signal: &[f64]) -> QrsResult<(usize, usize)> {
    locate_qs_with_window(r_index, signal, DetectorConfig::default().qs_window)
}

/// Q: lowest sample in `[r - window, r)`. S: lowest sample in `(r, r + window]`.
///
/// Windows are clipped at the signal ends; an empty window yields `r` itself.
/// Ties go to the sample nearest the R-peak.
pub fn locate_qs_with_window(
    r_index: usize,
    signal: &[f64],
    window: usize,
) -> QrsResult<(usize, usize)> {
    if r_index >= signal.len() {
        return Err(QrsError::InsufficientSamples {
            stage: "fiducial locator",
            required: r_index + 1,
            actual: signal.len(),
        });
    }

    let start = r_index.saturating_sub(window);
    let q = signal[start..r_index]
        .iter()
        .enumerate()
        .rev()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v >= b => best,
            _ => Some((i, v)),
        })
        .map_or(r_index, |(i, _)| start + i);

    let end = (r_index + window).min(signal.len() - 1);
    let s = argmin(&signal[r_index + 1..=end]).map_or(r_index, |i| r_index + 1 + i);

    Ok((q, s))
}

fn check_sampling_rate(fs: f64) -> QrsResult<()> {
    if fs.is_finite() && fs > 0.0 {
        Ok(())
    } else {
        Err(QrsError::InvalidSamplingRate {
            fs,
            reason: "must be a positive finite number".into(),
        })
    }
}

fn refractory_samples(fs: f64, min_rr_s: f64) -> usize {
    ((min_rr_s * fs) as usize).max(1)
}

/// Largest usable odd window no wider than the signal.
fn fit_savgol_window(len: usize, window: usize, order: usize) -> QrsResult<usize> {
    let mut w = window.min(len);
    if w % 2 == 0 {
        w = w.saturating_sub(1);
    }
    if w < order + 2 {
        let required = if (order + 2) % 2 == 0 { order + 3 } else { order + 2 };
        return Err(QrsError::InsufficientSamples {
            stage: "candidate extractor",
            required,
            actual: len,
        });
    }
    Ok(w)
}

fn is_flat(data: &[f64]) -> bool {
    let (lo, hi) = data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    hi <= lo
}
