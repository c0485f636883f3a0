use crate::error::{QrsError, QrsResult};
use serde::{Deserialize, Serialize};

/// Uniformly sampled channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Sampling frequency in Hz
    pub fs: f64,
    /// Samples
    pub data: Vec<f64>,
}

impl TimeSeries {
    /// Build a series whose rate is derived from its total duration.
    pub fn from_duration(data: Vec<f64>, total_duration_s: f64) -> QrsResult<Self> {
        let fs = sampling_rate(data.len(), total_duration_s)?;
        Ok(Self { fs, data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.fs
    }
    /// Time in seconds of sample `index`.
    pub fn time_of(&self, index: usize) -> f64 {
        index as f64 / self.fs
    }
}

/// `samples / duration`, rejecting durations that cannot describe a recording.
pub fn sampling_rate(sample_count: usize, total_duration_s: f64) -> QrsResult<f64> {
    if !(total_duration_s.is_finite() && total_duration_s > 0.0) {
        return Err(QrsError::InvalidSamplingRate {
            fs: sample_count as f64 / total_duration_s,
            reason: format!("recording duration {} s is not positive", total_duration_s),
        });
    }
    if sample_count == 0 {
        return Err(QrsError::InsufficientSamples {
            stage: "sampling rate",
            required: 1,
            actual: 0,
        });
    }
    Ok(sample_count as f64 / total_duration_s)
}

/// Point events on a timeline (e.g., R-peak indices)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Events {
    pub indices: Vec<usize>,
}

impl Events {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }
    pub fn len(&self) -> usize {
        self.indices.len()
    }
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// One QRS complex: Q-trough, R-peak and S-trough sample indices.
///
/// `q <= r <= s` always holds; `q == r` or `r == s` only happens when the
/// R-peak sits on the first or last sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Beat {
    pub q: usize,
    pub r: usize,
    pub s: usize,
}

/// RR intervals (seconds)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RRSeries {
    pub rr: Vec<f64>,
}

impl RRSeries {
    pub fn from_events(events: &Events, fs: f64) -> Self {
        let rr = events
            .indices
            .windows(2)
            .map(|w| (w[1] as f64 - w[0] as f64) / fs)
            .collect();
        Self { rr }
    }

    /// Mean instantaneous heart rate, ignoring non-positive intervals.
    pub fn mean_heart_rate_bpm(&self) -> Option<f64> {
        let rates: Vec<f64> = self
            .rr
            .iter()
            .filter(|&&dt| dt > 0.0)
            .map(|dt| 60.0 / dt)
            .collect();
        if rates.is_empty() {
            None
        } else {
            Some(rates.iter().sum::<f64>() / rates.len() as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_rate_is_samples_over_duration() {
        assert_eq!(sampling_rate(2500, 10.0).unwrap(), 250.0);
        let ts = TimeSeries::from_duration(vec![0.0; 120], 2.0).unwrap();
        assert_eq!(ts.fs, 60.0);
        assert!((ts.duration() - 2.0).abs() < 1e-12);
        assert!((ts.time_of(30) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn sampling_rate_rejects_bad_durations() {
        assert!(matches!(
            sampling_rate(100, 0.0),
            Err(QrsError::InvalidSamplingRate { .. })
        ));
        assert!(matches!(
            sampling_rate(100, -3.0),
            Err(QrsError::InvalidSamplingRate { .. })
        ));
        assert!(matches!(
            sampling_rate(0, 3.0),
            Err(QrsError::InsufficientSamples { .. })
        ));
    }

    #[test]
    fn rr_and_heart_rate_from_events() {
        let events = Events::from_indices(vec![100, 350, 600, 850]);
        let rr = RRSeries::from_events(&events, 250.0);
        assert_eq!(rr.rr, vec![1.0, 1.0, 1.0]);
        assert!((rr.mean_heart_rate_bpm().unwrap() - 60.0).abs() < 1e-9);
        assert_eq!(RRSeries::default().mean_heart_rate_bpm(), None);
    }
}
