//! DSP (Digital Signal Processing) module
//!
//! - `SosFilter` - zero-phase Butterworth band-pass
//! - `Spectrum` - one-sided FFT magnitude spectrum with band peak picking
//! - moment helpers shared by the rPPG and seizure analysis paths

mod butterworth;
mod spectrum;

pub use butterworth::{Biquad, SosFilter};
pub use spectrum::{diff, mean, std_dev, variance, BandPeak, Spectrum};
