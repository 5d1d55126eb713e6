use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("Insufficient samples: need {needed}, got {got}")]
    InsufficientSamples { needed: usize, got: usize },
    #[error("Invalid band [{low}, {high}] Hz for Nyquist {nyquist} Hz")]
    InvalidBand { low: f64, high: f64, nyquist: f64 },
    #[error("Invalid filter order: {0}")]
    InvalidOrder(usize),
    #[error("Empty image crop")]
    EmptyCrop,
}
