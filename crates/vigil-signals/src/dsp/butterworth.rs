//! Butterworth band-pass filtering
//!
//! Digital band-pass designed by prewarped bilinear transform of the analog
//! Butterworth prototype, realised as cascaded second-order sections.
//! [`SosFilter::filtfilt`] runs the cascade forward and backward for a
//! zero-phase response, padding both ends by odd reflection and starting
//! each pass from the steady state of its first sample.

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::error::SignalError;

const MAX_ORDER: usize = 8;

/// One second-order section, `a[0]` normalised to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Biquad {
    /// Initial state giving a steady-state response to a unit step.
    fn step_state(&self) -> [f64; 2] {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        let r0 = b1 - a1 * b0;
        let r1 = b2 - a2 * b0;
        let z0 = (r0 + r1) / (1.0 + a1 + a2);
        [z0, r1 - a2 * z0]
    }

    fn dc_gain(&self) -> f64 {
        self.b.iter().sum::<f64>() / self.a.iter().sum::<f64>()
    }

    fn response(&self, z_inv: Complex64) -> Complex64 {
        let z_inv2 = z_inv * z_inv;
        let num = z_inv2 * self.b[2] + z_inv * self.b[1] + self.b[0];
        let den = z_inv2 * self.a[2] + z_inv * self.a[1] + self.a[0];
        num / den
    }
}

/// Cascade of second-order sections.
#[derive(Debug, Clone, PartialEq)]
pub struct SosFilter {
    sections: Vec<Biquad>,
}

impl SosFilter {
    /// Order-`order` Butterworth band-pass for `[low_hz, high_hz]` at sample rate `fs`.
    ///
    /// The cascade has `order` sections (a `2 * order` pole filter) with unit
    /// gain at the geometric band center.
    pub fn bandpass(order: usize, low_hz: f64, high_hz: f64, fs: f64) -> Result<Self, SignalError> {
        if order == 0 || order > MAX_ORDER {
            return Err(SignalError::InvalidOrder(order));
        }
        let nyquist = fs / 2.0;
        let band_ok = fs > 0.0 && low_hz > 0.0 && low_hz < high_hz && high_hz < nyquist;
        if !band_ok {
            return Err(SignalError::InvalidBand {
                low: low_hz,
                high: high_hz,
                nyquist,
            });
        }

        let fs2 = 2.0 * fs;
        let wl = fs2 * (PI * low_hz / fs).tan();
        let wh = fs2 * (PI * high_hz / fs).tan();
        let w0 = (wl * wh).sqrt();
        let bw = wh - wl;

        // Analog prototype poles -> band-pass poles -> z-plane, keeping one of
        // each conjugate pair.
        let mut poles = Vec::with_capacity(order);
        for k in 0..order {
            let theta = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
            let p = Complex64::from_polar(1.0, theta) * bw;
            let disc = (p * p - 4.0 * w0 * w0).sqrt();
            for s in [(p + disc) / 2.0, (p - disc) / 2.0] {
                let z = (Complex64::new(fs2, 0.0) + s) / (Complex64::new(fs2, 0.0) - s);
                if z.im > 1e-12 {
                    poles.push(z);
                }
            }
        }
        if poles.len() != order {
            return Err(SignalError::InvalidBand {
                low: low_hz,
                high: high_hz,
                nyquist,
            });
        }

        let mut sections: Vec<Biquad> = poles
            .iter()
            .map(|z| Biquad {
                b: [1.0, 0.0, -1.0],
                a: [1.0, -2.0 * z.re, z.norm_sqr()],
            })
            .collect();

        let center = 2.0 * (w0 / fs2).atan();
        let gain = Self::cascade_response(&sections, center).norm();
        if gain > 0.0 && gain.is_finite() {
            let per_section = gain.powf(-1.0 / sections.len() as f64);
            for section in &mut sections {
                for coeff in &mut section.b {
                    *coeff *= per_section;
                }
            }
        }

        Ok(Self { sections })
    }

    #[cfg(test)]
    fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Magnitude response at `freq_hz`.
    #[cfg(test)]
    fn magnitude(&self, freq_hz: f64, fs: f64) -> f64 {
        Self::cascade_response(&self.sections, 2.0 * PI * freq_hz / fs).norm()
    }

    fn cascade_response(sections: &[Biquad], omega: f64) -> Complex64 {
        let z_inv = Complex64::from_polar(1.0, -omega);
        sections
            .iter()
            .fold(Complex64::new(1.0, 0.0), |acc, s| acc * s.response(z_inv))
    }

    /// Per-section step steady state, scaled through the cascade.
    fn steady_state(&self) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        self.sections
            .iter()
            .map(|s| {
                let [z0, z1] = s.step_state();
                let zi = [scale * z0, scale * z1];
                scale *= s.dc_gain();
                zi
            })
            .collect()
    }

    /// Direct form II transposed pass from `state`.
    fn run(&self, x: &[f64], mut state: Vec<[f64; 2]>) -> Vec<f64> {
        let mut y = x.to_vec();
        for (section, z) in self.sections.iter().zip(state.iter_mut()) {
            let [b0, b1, b2] = section.b;
            let [_, a1, a2] = section.a;
            for v in y.iter_mut() {
                let input = *v;
                let out = b0 * input + z[0];
                z[0] = b1 * input - a1 * out + z[1];
                z[1] = b2 * input - a2 * out;
                *v = out;
            }
        }
        y
    }

    /// Zero-phase forward-backward filtering.
    pub fn filtfilt(&self, x: &[f64]) -> Vec<f64> {
        let n = x.len();
        if n == 0 {
            return Vec::new();
        }
        let padlen = (3 * (2 * self.sections.len() + 1)).min(n - 1);
        let ext = odd_extend(x, padlen);
        let zi = self.steady_state();

        let scaled = |v: f64| zi.iter().map(|z| [z[0] * v, z[1] * v]).collect::<Vec<_>>();

        let mut forward = self.run(&ext, scaled(ext[0]));
        forward.reverse();
        let mut backward = self.run(&forward, scaled(forward[0]));
        backward.reverse();

        backward[padlen..padlen + n].to_vec()
    }
}

/// Extend by point reflection about each endpoint.
fn odd_extend(x: &[f64], padlen: usize) -> Vec<f64> {
    let n = x.len();
    let first = x[0];
    let last = x[n - 1];

    let mut ext = Vec::with_capacity(n + 2 * padlen);
    ext.extend((1..=padlen).rev().map(|i| 2.0 * first - x[i]));
    ext.extend_from_slice(x);
    ext.extend((1..=padlen).map(|i| 2.0 * last - x[n - 1 - i]));
    ext
}
