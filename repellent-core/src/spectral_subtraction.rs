//! Per-bin suppression gains for spectral noise reduction
//!
//! Given the current frame's spectrum and the captured noise estimate the
//! gain computer produces one gain per bin in `[0, 1]`, using either a
//! Wiener rule or power subtraction. The reduction amount, in dB, scales
//! the noise estimate before the rule is evaluated. Gains are then applied
//! to both halves of the half-complex spectrum so the phase of every bin
//! is preserved.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::noise_profile::SpectrumDomain;
use crate::utils::{db_to_linear, sanitize_denormal, SPECTRAL_EPSILON};

/// Suppression law used to turn signal and noise spectra into gains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SuppressionMethod {
    /// `S / (S + r * N)`
    #[default]
    Wiener,
    /// `1 - r * sqrt(N / S)`
    PowerSubtraction,
}

/// Wiener gain for one bin; a bin with no scaled noise passes unchanged
#[inline]
pub fn wiener_gain(signal: f32, noise: f32, reduction_factor: f32) -> f32 {
    let scaled_noise = reduction_factor * noise;
    if scaled_noise <= 0.0 {
        return 1.0;
    }
    (signal / (signal + scaled_noise).max(SPECTRAL_EPSILON)).clamp(0.0, 1.0)
}

/// Power-subtraction gain for one bin
#[inline]
pub fn power_subtraction_gain(signal: f32, noise: f32, reduction_factor: f32) -> f32 {
    let ratio = noise / signal.max(SPECTRAL_EPSILON);
    (1.0 - reduction_factor * ratio.sqrt()).clamp(0.0, 1.0)
}

/// Computes and applies the per-bin gain mask
pub struct GainComputer {
    method: SuppressionMethod,
    domain: SpectrumDomain,
    gain: Vec<f32>,
}

impl GainComputer {
    /// Create a gain computer over `num_bins` bins with unity gain
    pub fn new(num_bins: usize, method: SuppressionMethod, domain: SpectrumDomain) -> Self {
        Self {
            method,
            domain,
            gain: vec![1.0; num_bins],
        }
    }

    /// Current gain mask
    #[inline]
    pub fn gains(&self) -> &[f32] {
        &self.gain
    }

    #[inline]
    pub fn method(&self) -> SuppressionMethod {
        self.method
    }

    /// Compute the gain mask for one frame.
    ///
    /// `noise_estimate` must be in the same domain as this computer.
    pub fn compute(
        &mut self,
        magnitude: &[f32],
        power: &[f32],
        noise_estimate: &[f32],
        reduction_db: f32,
    ) {
        let reduction_factor = db_to_linear(reduction_db);
        let signal = self.domain.select(magnitude, power);

        let law = match self.method {
            SuppressionMethod::Wiener => wiener_gain,
            SuppressionMethod::PowerSubtraction => power_subtraction_gain,
        };

        for ((gain, &s), &n) in self.gain.iter_mut().zip(signal).zip(noise_estimate) {
            *gain = sanitize_denormal(law(s, n, reduction_factor));
        }
    }

    /// Scale a half-complex spectrum by the gain mask.
    ///
    /// Bin `i` scales `freq[i]` and, for `0 < i < N/2`, its imaginary part
    /// at `freq[N - i]`.
    pub fn apply(&self, freq: &mut [f32]) {
        let n = freq.len();
        let half = n / 2;

        for (i, &g) in self.gain.iter().enumerate().take(half + 1) {
            freq[i] = sanitize_denormal(freq[i] * g);
            if i > 0 && i < half {
                freq[n - i] = sanitize_denormal(freq[n - i] * g);
            }
        }
    }
}
