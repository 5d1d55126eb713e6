//! Remote Photoplethysmography (rPPG) vital sign extraction
//!
//! Estimates heart rate and respiratory rate from the subtle color changes
//! of facial skin across a window of face crops.
//!
//! Implements:
//! - **CHROM**: Chrominance-based method (De Haan & Jeanne, 2013)
//! - **POS**: Plane-Orthogonal-to-Skin (Wang et al., 2017)
//! - **ICA**: simplified to the normalized green channel
//!
//! Every pulse signal is band-passed with a zero-phase 4th-order
//! Butterworth before peak picking so the spectral peak is not biased by
//! filter phase lag.

use std::fmt;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::dsp::{diff, variance, SosFilter, Spectrum};
use crate::error::SignalError;
use crate::frame::Frame;

/// Pulse extraction method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RppgAlgorithm {
    #[default]
    Chrom,
    Pos,
    Ica,
}

impl fmt::Display for RppgAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Chrom => "CHROM",
            Self::Pos => "POS",
            Self::Ica => "ICA",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RppgConfig {
    pub algorithm: RppgAlgorithm,
    /// Sample rate in Hz
    pub fps: f64,
    /// Samples required per analysis window
    pub window_size: usize,
    pub filter_order: usize,
    /// Pulse band-pass (Hz)
    pub pulse_band: (f64, f64),
    /// Heart rate search band (Hz), 40-180 bpm
    pub hr_band: (f64, f64),
    /// Respiratory component band-pass (Hz)
    pub respiration_filter_band: (f64, f64),
    /// Respiratory rate search band (Hz), 8-30 breaths/min
    pub rr_band: (f64, f64),
    pub hr_confidence_scale: f64,
    pub rr_confidence_scale: f64,
    /// Divisor mapping the variance ratio onto [0, 1]
    pub quality_scale: f64,
}

impl Default for RppgConfig {
    fn default() -> Self {
        Self {
            algorithm: RppgAlgorithm::Chrom,
            fps: 30.0,
            window_size: 300,
            filter_order: 4,
            pulse_band: (0.7, 3.0),
            hr_band: (0.67, 3.0),
            respiration_filter_band: (0.1, 0.5),
            rr_band: (0.13, 0.5),
            hr_confidence_scale: 10.0,
            rr_confidence_scale: 5.0,
            quality_scale: 100.0,
        }
    }
}

/// One window's vital sign estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    /// Beats per minute
    pub heart_rate: f64,
    /// Breaths per minute
    pub respiratory_rate: f64,
    pub signal_quality: f64,
    pub hr_confidence: f64,
    pub rr_confidence: f64,
}

/// rPPG Processor
///
/// Stateless over windows: each call analyses exactly the samples it is given.
#[derive(Debug, Clone)]
pub struct RppgProcessor {
    config: RppgConfig,
    pulse_filter: SosFilter,
    respiration_filter: SosFilter,
}

impl RppgProcessor {
    pub fn new() -> Result<Self, SignalError> {
        Self::with_config(RppgConfig::default())
    }

    /// Build a processor, designing both band-pass filters up front.
    pub fn with_config(config: RppgConfig) -> Result<Self, SignalError> {
        let pulse_filter = SosFilter::bandpass(
            config.filter_order,
            config.pulse_band.0,
            config.pulse_band.1,
            config.fps,
        )?;
        let respiration_filter = SosFilter::bandpass(
            config.filter_order,
            config.respiration_filter_band.0,
            config.respiration_filter_band.1,
            config.fps,
        )?;
        log::debug!(
            "rPPG processor ready: {} @ {} fps, window {}",
            config.algorithm,
            config.fps,
            config.window_size
        );
        Ok(Self {
            config,
            pulse_filter,
            respiration_filter,
        })
    }

    pub fn config(&self) -> &RppgConfig {
        &self.config
    }

    /// Analyse a window of face crops.
    ///
    /// Empty crops are skipped; `None` when fewer than `window_size` usable
    /// crops remain.
    pub fn process(&self, crops: &[Frame]) -> Option<VitalSigns> {
        let samples: Vec<[f64; 3]> = crops.iter().filter_map(Frame::mean_rgb).collect();
        self.process_rgb(&samples)
    }

    /// Analyse a window of per-frame mean `[R, G, B]` samples.
    pub fn process_rgb(&self, samples: &[[f64; 3]]) -> Option<VitalSigns> {
        if samples.len() < self.config.window_size.max(2) {
            log::trace!(
                "rPPG window short: {} of {} samples",
                samples.len(),
                self.config.window_size
            );
            return None;
        }

        let pulse = self.extract_pulse(samples);
        let pulse = self.pulse_filter.filtfilt(&pulse.to_vec());

        let (heart_rate, hr_confidence) = self.dominant_rate(
            &pulse,
            self.config.hr_band,
            self.config.hr_confidence_scale,
        );

        let respiration = self.respiration_filter.filtfilt(&pulse);
        let (respiratory_rate, rr_confidence) = self.dominant_rate(
            &respiration,
            self.config.rr_band,
            self.config.rr_confidence_scale,
        );

        let signal_quality = self.signal_quality(&pulse);

        Some(VitalSigns {
            heart_rate,
            respiratory_rate,
            signal_quality,
            hr_confidence,
            rr_confidence,
        })
    }

    /// Unfiltered pulse signal from temporally normalized channels.
    fn extract_pulse(&self, samples: &[[f64; 3]]) -> Array1<f64> {
        let channel = |c: usize| Array1::from_iter(samples.iter().map(|s| s[c]));
        let (r, g, b) = (
            Self::normalize(channel(0)),
            Self::normalize(channel(1)),
            Self::normalize(channel(2)),
        );

        match self.config.algorithm {
            RppgAlgorithm::Chrom => Self::chrom_method(&r, &g, &b),
            RppgAlgorithm::Pos => Self::pos_method(&r, &g, &b),
            RppgAlgorithm::Ica => g,
        }
    }

    fn normalize(x: Array1<f64>) -> Array1<f64> {
        let m = x.mean().unwrap_or(0.0);
        x / (m + 1e-6)
    }

    /// X = 3R - 2G, Y = 1.5R + G - 1.5B, S = X - (std X / std Y) Y
    fn chrom_method(r: &Array1<f64>, g: &Array1<f64>, b: &Array1<f64>) -> Array1<f64> {
        let x = r * 3.0 - g * 2.0;
        let y = r * 1.5 + g - b * 1.5;
        let alpha = x.std(0.0) / (y.std(0.0) + 1e-6);
        &x - &(&y * alpha)
    }

    /// S1 = G - B, S2 = G + B - 2R, H = S1 + (std S1 / std S2) S2
    fn pos_method(r: &Array1<f64>, g: &Array1<f64>, b: &Array1<f64>) -> Array1<f64> {
        let s1 = g - b;
        let s2 = g + b - r * 2.0;
        let alpha = s1.std(0.0) / (s2.std(0.0) + 1e-6);
        &s1 + &(&s2 * alpha)
    }

    /// (rate per minute, confidence) of the strongest in-band component.
    fn dominant_rate(&self, signal: &[f64], band: (f64, f64), scale: f64) -> (f64, f64) {
        Spectrum::positive(signal, self.config.fps)
            .band_peak(band.0, band.1)
            .map(|peak| (peak.frequency * 60.0, peak.prominence(scale)))
            .unwrap_or((0.0, 0.0))
    }

    /// Variance of the signal over variance of its first difference.
    fn signal_quality(&self, pulse: &[f64]) -> f64 {
        let noise = variance(&diff(pulse));
        if noise < 1e-6 {
            return 1.0;
        }
        (variance(pulse) / noise / self.config.quality_scale).min(1.0)
    }
}
