pub mod config;
pub mod detectors;
pub mod dsp;
pub mod error;
pub mod io;
pub mod plot;
pub mod signal;

pub use config::*;
pub use detectors::*;
pub use error::*;
pub use signal::*;
