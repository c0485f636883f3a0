//! Offline signal primitives used by the QRS pipeline.
//!
//! Everything here works on whole slices and returns fresh vectors; nothing keeps
//! state between calls.

pub mod butterworth;
pub mod median;
pub mod peaks;
pub mod savgol;

pub use butterworth::{BandPass, Sos};
pub use median::median_filter;
pub use peaks::{argmax, argmin, find_peaks, gradient, percentile};
pub use savgol::{savgol_filter, savgol_weights};
