use crate::error::{QrsError, QrsResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Which signal the Q/S trough search runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FiducialSource {
    /// The samples handed to the detector, as recorded.
    Raw,
    /// The band-passed signal the R-peaks were refined on.
    Conditioned,
}

/// Tunables for the QRS detection pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Odd width of the impulse-removal median filter (samples).
    pub median_window: usize,
    /// Butterworth prototype order; the band-pass has twice as many poles.
    pub filter_order: usize,
    /// Lower band edge (Hz).
    pub lowcut_hz: f64,
    /// Upper band edge (Hz). Must sit below Nyquist.
    pub highcut_hz: f64,
    /// Savitzky-Golay window applied to the derivative (samples, odd).
    pub savgol_window: usize,
    /// Savitzky-Golay polynomial order.
    pub savgol_order: usize,
    /// Percentile of the emphasis signal used as the candidate height threshold.
    pub threshold_percentile: f64,
    /// Refractory distance between candidates (seconds).
    pub min_rr_s: f64,
    /// Half-width of the refinement window around each candidate (seconds).
    pub search_radius_s: f64,
    /// Q/S search window on either side of the R-peak (samples).
    pub qs_window: usize,
    pub fiducial_source: FiducialSource,
    /// Collapse refined R-peaks that land on the same sample into one beat.
    pub merge_duplicate_peaks: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            median_window: 5,
            filter_order: 4,
            lowcut_hz: 1.0,
            highcut_hz: 20.0,
            savgol_window: 21,
            savgol_order: 3,
            threshold_percentile: 95.0,
            min_rr_s: 0.2,
            search_radius_s: 0.3,
            qs_window: 50,
            fiducial_source: FiducialSource::Raw,
            merge_duplicate_peaks: false,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> QrsResult<()> {
        let fail = |msg: String| Err(QrsError::InvalidConfig(msg));
        if self.median_window == 0 || self.median_window % 2 == 0 {
            return fail(format!(
                "median_window must be odd, got {}",
                self.median_window
            ));
        }
        if self.filter_order == 0 {
            return fail("filter_order must be at least 1".into());
        }
        if !(self.lowcut_hz > 0.0 && self.lowcut_hz < self.highcut_hz) || !self.highcut_hz.is_finite()
        {
            return fail(format!(
                "band edges must satisfy 0 < lowcut < highcut, got {}..{} Hz",
                self.lowcut_hz, self.highcut_hz
            ));
        }
        if self.savgol_window % 2 == 0 || self.savgol_window < self.savgol_order + 2 {
            return fail(format!(
                "savgol_window must be odd and >= savgol_order + 2, got window {} order {}",
                self.savgol_window, self.savgol_order
            ));
        }
        if !(0.0..=100.0).contains(&self.threshold_percentile) {
            return fail(format!(
                "threshold_percentile must be within [0, 100], got {}",
                self.threshold_percentile
            ));
        }
        if !(self.min_rr_s > 0.0) || !(self.search_radius_s >= 0.0) {
            return fail(format!(
                "min_rr_s must be positive and search_radius_s non-negative, got {} / {}",
                self.min_rr_s, self.search_radius_s
            ));
        }
        if self.qs_window == 0 {
            return fail("qs_window must be at least 1".into());
        }
        Ok(())
    }

    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: DetectorConfig = toml::from_str(text).context("parsing detector config")?;
        cfg.validate()?;
        Ok(cfg)
    }
}

pub fn read_config(path: &Path) -> Result<DetectorConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    DetectorConfig::from_toml_str(&contents).with_context(|| format!("in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(DetectorConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = DetectorConfig::from_toml_str(
            "highcut_hz = 25.0\nmin_rr_s = 0.25\nfiducial_source = \"conditioned\"\n",
        )
        .unwrap();
        assert_eq!(cfg.highcut_hz, 25.0);
        assert_eq!(cfg.min_rr_s, 0.25);
        assert_eq!(cfg.fiducial_source, FiducialSource::Conditioned);
        assert!(!cfg.merge_duplicate_peaks);
        assert_eq!(cfg.savgol_window, 21);
        assert_eq!(cfg.median_window, 5);
    }

    #[test]
    fn rejects_even_windows_and_inverted_band() {
        let mut cfg = DetectorConfig {
            median_window: 4,
            ..DetectorConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(QrsError::InvalidConfig(_))));
        cfg.median_window = 5;
        cfg.lowcut_hz = 30.0;
        assert!(matches!(cfg.validate(), Err(QrsError::InvalidConfig(_))));
        assert!(DetectorConfig::from_toml_str("savgol_window = 20").is_err());
    }

    #[test]
    fn reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detector.toml");
        fs::write(&path, "threshold_percentile = 90.0\nqs_window = 30\n").unwrap();
        let cfg = read_config(&path).unwrap();
        assert_eq!(cfg.threshold_percentile, 90.0);
        assert_eq!(cfg.qs_window, 30);
    }
}
