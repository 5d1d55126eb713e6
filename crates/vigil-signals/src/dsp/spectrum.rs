//! Magnitude spectra and band peak picking

use num_complex::Complex64;
use rustfft::FftPlanner;

/// One-sided magnitude spectrum: strictly positive frequencies only.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub freqs: Vec<f64>,
    pub magnitudes: Vec<f64>,
}

/// Strongest bin inside a frequency band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandPeak {
    pub frequency: f64,
    pub magnitude: f64,
    /// Mean magnitude over all bins in the band
    pub mean_magnitude: f64,
}

impl BandPeak {
    /// Peak prominence over the in-band mean, divided by `scale` and capped at 1.
    pub fn prominence(&self, scale: f64) -> f64 {
        (self.magnitude / (self.mean_magnitude + 1e-6) / scale).min(1.0)
    }
}

impl Spectrum {
    /// FFT `signal` sampled at `fs` Hz and keep bins `1..=(n-1)/2`.
    pub fn positive(signal: &[f64], fs: f64) -> Self {
        let n = signal.len();
        if n < 2 || fs <= 0.0 {
            return Self {
                freqs: Vec::new(),
                magnitudes: Vec::new(),
            };
        }

        let mut buffer: Vec<Complex64> = signal.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n);
        fft.process(&mut buffer);

        let last = (n - 1) / 2;
        let freqs = (1..=last).map(|k| k as f64 * fs / n as f64).collect();
        let magnitudes = buffer[1..=last].iter().map(|c| c.norm()).collect();

        Self { freqs, magnitudes }
    }

    pub fn len(&self) -> usize {
        self.freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }

    /// Peak over bins with `low <= f <= high`; the first bin wins ties.
    pub fn band_peak(&self, low: f64, high: f64) -> Option<BandPeak> {
        let mut count = 0usize;
        let mut total = 0.0;
        let mut best: Option<(f64, f64)> = None;

        for (&f, &m) in self.freqs.iter().zip(&self.magnitudes) {
            if f < low || f > high {
                continue;
            }
            count += 1;
            total += m;
            if best.map_or(true, |(_, bm)| m > bm) {
                best = Some((f, m));
            }
        }

        best.map(|(frequency, magnitude)| BandPeak {
            frequency,
            magnitude,
            mean_magnitude: total / count as f64,
        })
    }
}

pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Population variance.
pub fn variance(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let m = mean(x);
    x.iter().map(|v| (v - m).powi(2)).sum::<f64>() / x.len() as f64
}

pub fn std_dev(x: &[f64]) -> f64 {
    variance(x).sqrt()
}

/// First difference, `n - 1` samples.
pub fn diff(x: &[f64]) -> Vec<f64> {
    x.windows(2).map(|w| w[1] - w[0]).collect()
}
