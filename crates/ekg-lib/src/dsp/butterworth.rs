//! Butterworth band-pass design and zero-phase filtering.
//!
//! The analog prototype is shifted to a band-pass, mapped through the bilinear
//! transform with pre-warped band edges, and stored as second-order sections.
//! Cascaded sections stay well conditioned even when the low edge sits very
//! close to DC relative to the sampling rate (1 Hz at 1 kHz, for example),
//! which a single high-order transfer function does not.

use crate::error::{QrsError, QrsResult};
use num_complex::Complex64;
use std::f64::consts::PI;

/// One biquad section with `a[0] == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sos {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Sos {
    fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (self.a[0] + self.a[1] + self.a[2])
    }

    /// Transposed direct-form II state reached after an infinitely long unit input.
    fn steady_state(&self) -> [f64; 2] {
        let g = self.dc_gain();
        let z1 = self.b[2] - self.a[2] * g;
        let z0 = self.b[1] - self.a[1] * g + z1;
        [z0, z1]
    }

    #[inline]
    fn step(&self, x: f64, z: &mut [f64; 2]) -> f64 {
        let y = self.b[0] * x + z[0];
        z[0] = self.b[1] * x - self.a[1] * y + z[1];
        z[1] = self.b[2] * x - self.a[2] * y;
        y
    }

    fn response(&self, z_inv: Complex64) -> Complex64 {
        let z_inv2 = z_inv * z_inv;
        (self.b[0] + z_inv * self.b[1] + z_inv2 * self.b[2])
            / (self.a[0] + z_inv * self.a[1] + z_inv2 * self.a[2])
    }
}

/// Digital Butterworth band-pass as a cascade of biquads.
#[derive(Debug, Clone)]
pub struct BandPass {
    sections: Vec<Sos>,
}

impl BandPass {
    /// Design an `order`-pole-pair band-pass between `low_hz` and `high_hz`.
    ///
    /// Band edges are taken relative to Nyquist; a sampling rate whose Nyquist
    /// frequency does not clear `high_hz` is rejected.
    pub fn butterworth(order: usize, low_hz: f64, high_hz: f64, fs: f64) -> QrsResult<Self> {
        if !(fs.is_finite() && fs > 0.0) {
            return Err(QrsError::InvalidSamplingRate {
                fs,
                reason: "must be a positive finite number".into(),
            });
        }
        let nyquist = 0.5 * fs;
        if nyquist <= high_hz {
            return Err(QrsError::InvalidSamplingRate {
                fs,
                reason: format!(
                    "Nyquist frequency {} Hz does not exceed the {} Hz band edge",
                    nyquist, high_hz
                ),
            });
        }
        if order == 0 || !(low_hz > 0.0 && low_hz < high_hz) {
            return Err(QrsError::InvalidConfig(format!(
                "band-pass needs order >= 1 and 0 < low < high, got order {} band {}..{} Hz",
                order, low_hz, high_hz
            )));
        }

        // Design on the normalised axis (Nyquist == 1, design rate 2).
        let design_fs = 2.0;
        let warp = |hz: f64| 2.0 * design_fs * (PI * (hz / nyquist) / design_fs).tan();
        let (lo, hi) = (warp(low_hz), warp(high_hz));
        let bw = hi - lo;
        let w0_sq = lo * hi;

        let mut poles = Vec::with_capacity(2 * order);
        for k in 0..order {
            let m = 2 * k as isize + 1 - order as isize;
            let proto = -Complex64::from_polar(1.0, PI * m as f64 / (2 * order) as f64);
            let shifted = proto * (bw / 2.0);
            let disc = (shifted * shifted - w0_sq).sqrt();
            poles.push(shifted + disc);
            poles.push(shifted - disc);
        }

        // Bilinear transform: analog zeros at s = 0 land on z = 1, the ones at
        // infinity on z = -1. One of each goes into every section.
        let k2 = 2.0 * design_fs;
        let mut gain = bw.powi(order as i32) * k2.powi(order as i32);
        let mut denom = Complex64::new(1.0, 0.0);
        let digital: Vec<Complex64> = poles
            .iter()
            .map(|&p| {
                denom *= k2 - p;
                (k2 + p) / (k2 - p)
            })
            .collect();
        gain /= denom.re;

        let sections = pair_poles(&digital)
            .into_iter()
            .enumerate()
            .map(|(i, a)| {
                let g = if i == 0 { gain } else { 1.0 };
                Sos {
                    b: [g, 0.0, -g],
                    a,
                }
            })
            .collect();
        Ok(Self { sections })
    }

    pub fn sections(&self) -> &[Sos] {
        &self.sections
    }

    /// Samples of odd extension added to each end before forward-backward filtering.
    pub fn pad_len(&self) -> usize {
        3 * (2 * self.sections.len() + 1)
    }

    /// Shortest input [`filtfilt`](Self::filtfilt) accepts.
    pub fn min_len(&self) -> usize {
        self.pad_len() + 1
    }

    /// Magnitude response at `freq_hz` for a filter designed at `fs`.
    pub fn gain_at(&self, freq_hz: f64, fs: f64) -> f64 {
        let z_inv = Complex64::from_polar(1.0, -2.0 * PI * freq_hz / fs);
        self.sections
            .iter()
            .fold(Complex64::new(1.0, 0.0), |acc, s| acc * s.response(z_inv))
            .norm()
    }

    /// Zero-phase filtering: forward pass, then a pass over the reversed output.
    ///
    /// Both ends are padded with an odd reflection and every section starts from
    /// its steady state for the first padded sample, which keeps start-up
    /// transients out of the returned window. Output length equals input length.
    pub fn filtfilt(&self, data: &[f64]) -> QrsResult<Vec<f64>> {
        let n = data.len();
        let pad = self.pad_len();
        if n <= pad {
            return Err(QrsError::InsufficientSamples {
                stage: "band-pass",
                required: self.min_len(),
                actual: n,
            });
        }

        let extended = odd_extend(data, pad);
        let forward = self.run(&extended);
        let reversed: Vec<f64> = forward.into_iter().rev().collect();
        let backward = self.run(&reversed);
        Ok(backward.into_iter().rev().skip(pad).take(n).collect())
    }

    fn run(&self, data: &[f64]) -> Vec<f64> {
        let x0 = data.first().copied().unwrap_or(0.0);
        let mut scale = x0;
        let mut states: Vec<[f64; 2]> = self
            .sections
            .iter()
            .map(|s| {
                let zi = s.steady_state();
                let state = [zi[0] * scale, zi[1] * scale];
                scale *= s.dc_gain();
                state
            })
            .collect();

        data.iter()
            .map(|&x| {
                self.sections
                    .iter()
                    .zip(states.iter_mut())
                    .fold(x, |acc, (section, z)| section.step(acc, z))
            })
            .collect()
    }
}

/// Group poles into conjugate pairs (or pairs of real poles) and return each
/// pair's denominator `[1, -(p + p*), |p|^2]`.
fn pair_poles(poles: &[Complex64]) -> Vec<[f64; 3]> {
    const EPS: f64 = 1e-12;
    let mut out = Vec::with_capacity(poles.len() / 2);
    let mut reals = Vec::new();
    for p in poles {
        if p.im > EPS {
            out.push([1.0, -2.0 * p.re, p.norm_sqr()]);
        } else if p.im.abs() <= EPS {
            reals.push(p.re);
        }
    }
    for pair in reals.chunks(2) {
        match *pair {
            [r1, r2] => out.push([1.0, -(r1 + r2), r1 * r2]),
            [r] => out.push([1.0, -r, 0.0]),
            _ => {}
        }
    }
    out
}

fn odd_extend(data: &[f64], pad: usize) -> Vec<f64> {
    let n = data.len();
    let first = data[0];
    let last = data[n - 1];
    let mut out = Vec::with_capacity(n + 2 * pad);
    out.extend((1..=pad).rev().map(|j| 2.0 * first - data[j]));
    out.extend_from_slice(data);
    out.extend((1..=pad).map(|j| 2.0 * last - data[n - 1 - j]));
    out
}
