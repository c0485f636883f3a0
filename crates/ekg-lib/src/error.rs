use thiserror::Error;

/// Failures raised by the signal-processing core.
///
/// Parse and I/O problems live on the `anyhow` side (see [`crate::io`]); everything
/// here is about the samples themselves or the parameters used to process them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QrsError {
    #[error("{stage}: need at least {required} samples, got {actual}")]
    InsufficientSamples {
        stage: &'static str,
        required: usize,
        actual: usize,
    },
    #[error("invalid sampling rate {fs} Hz: {reason}")]
    InvalidSamplingRate { fs: f64, reason: String },
    #[error("{stage}: signal is flat, nothing to detect")]
    DegenerateSignal { stage: &'static str },
    #[error("sample {index} is not a finite number")]
    NonFiniteSample { index: usize },
    #[error("invalid detector config: {0}")]
    InvalidConfig(String),
}

pub type QrsResult<T> = Result<T, QrsError>;
