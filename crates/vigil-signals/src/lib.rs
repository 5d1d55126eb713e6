//! # vigil-signals
//!
//! Numerical signal processing for the Vigil monitoring engine.
//!
//! This crate provides:
//! - **Frames**: RGB8 images with bounded crops and channel means
//! - **DSP**: zero-phase Butterworth band-pass, one-sided FFT spectra, band peak picking
//! - **rPPG**: CHROM, POS and ICA pulse extraction with heart and respiratory rate estimation
//!
//! ## Example
//!
//! ```
//! use vigil_signals::{RppgProcessor, Frame};
//!
//! let processor = RppgProcessor::new().unwrap();
//! let crops: Vec<Frame> = (0..300)
//!     .map(|i| {
//!         let t = i as f64 / 30.0;
//!         let g = 120.0 + 3.0 * (2.0 * std::f64::consts::PI * 1.2 * t).sin();
//!         Frame::filled(8, 8, [150, g.round() as u8, 100])
//!     })
//!     .collect();
//!
//! if let Some(vitals) = processor.process(&crops) {
//!     println!("HR {:.0} bpm, quality {:.2}", vitals.heart_rate, vitals.signal_quality);
//! }
//! ```

pub mod dsp;
pub mod error;
pub mod frame;
pub mod rppg;

pub use dsp::{BandPeak, SosFilter, Spectrum};
pub use error::SignalError;
pub use frame::Frame;
pub use rppg::{RppgAlgorithm, RppgConfig, RppgProcessor, VitalSigns};
