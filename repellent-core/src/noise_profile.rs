//! Noise profile estimation from captured frames
//!
//! While capture is active every analysed frame is folded into per-bin
//! running statistics (minimum, maximum and mean) and a single combined
//! noise spectrum is derived from them. When capture stops the combined
//! estimate is simply no longer updated, which freezes it for suppression.
//!
//! # Thread Safety
//! The structures in this module are not thread-safe. Each engine owns
//! its own profile.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::utils::sanitize_denormal;

// ============================================================================
// Configuration Enums
// ============================================================================

/// Which spectrum the estimator and the gain computer work on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SpectrumDomain {
    /// Linear magnitude `|X[k]|`
    Magnitude,
    /// Power `|X[k]|^2`
    #[default]
    Power,
}

impl SpectrumDomain {
    /// Pick the spectrum matching this domain
    #[inline]
    pub fn select<'a>(&self, magnitude: &'a [f32], power: &'a [f32]) -> &'a [f32] {
        match self {
            SpectrumDomain::Magnitude => magnitude,
            SpectrumDomain::Power => power,
        }
    }
}

/// How the running statistics are combined into the noise estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CombinationRule {
    /// Per-bin maximum seen during capture
    #[default]
    Maximum,
    /// Geometric mean of per-bin minimum and maximum
    GeometricMean,
    /// Per-bin running average
    Average,
}

// ============================================================================
// Noise Profile
// ============================================================================

/// Running noise statistics and the combined estimate used for suppression
pub struct NoiseProfile {
    domain: SpectrumDomain,
    combination: CombinationRule,

    min_spectrum: Vec<f32>,
    max_spectrum: Vec<f32>,
    avg_spectrum: Vec<f32>,

    /// Combined spectrum consumed by the gain computer
    estimate: Vec<f32>,

    frames_captured: u64,
}

impl NoiseProfile {
    /// Create an empty profile over `num_bins` bins
    pub fn new(num_bins: usize, domain: SpectrumDomain, combination: CombinationRule) -> Self {
        Self {
            domain,
            combination,
            min_spectrum: vec![f32::INFINITY; num_bins],
            max_spectrum: vec![0.0; num_bins],
            avg_spectrum: vec![0.0; num_bins],
            estimate: vec![0.0; num_bins],
            frames_captured: 0,
        }
    }

    /// Get the combined noise estimate
    #[inline]
    pub fn estimate(&self) -> &[f32] {
        &self.estimate
    }

    #[inline]
    pub fn min(&self) -> &[f32] {
        &self.min_spectrum
    }

    #[inline]
    pub fn max(&self) -> &[f32] {
        &self.max_spectrum
    }

    #[inline]
    pub fn avg(&self) -> &[f32] {
        &self.avg_spectrum
    }

    #[inline]
    pub fn domain(&self) -> SpectrumDomain {
        self.domain
    }

    #[inline]
    pub fn combination(&self) -> CombinationRule {
        self.combination
    }

    /// Number of frames folded into the statistics so far
    #[inline]
    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    /// Whether any frame has been captured yet
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames_captured == 0
    }

    /// Fold one captured frame into the statistics and recompute the estimate.
    ///
    /// Only the first `num_bins` values of each spectrum are read.
    pub fn update(&mut self, magnitude: &[f32], power: &[f32]) {
        let values = self.domain.select(magnitude, power);

        self.frames_captured += 1;
        let count = self.frames_captured as f32;

        let stats = self
            .min_spectrum
            .iter_mut()
            .zip(self.max_spectrum.iter_mut())
            .zip(self.avg_spectrum.iter_mut())
            .zip(values);

        for (((min, max), avg), &value) in stats {
            // +inf/0 sentinels always lose on the first frame
            *min = min.min(value);
            *max = max.max(value);
            *avg = sanitize_denormal(*avg + (value - *avg) / count);
        }

        self.combine();
    }

    fn combine(&mut self) {
        let stats = self
            .min_spectrum
            .iter()
            .zip(&self.max_spectrum)
            .zip(&self.avg_spectrum);

        for (estimate, ((&min, &max), &avg)) in self.estimate.iter_mut().zip(stats) {
            *estimate = match self.combination {
                CombinationRule::Maximum => max,
                CombinationRule::GeometricMean => sanitize_denormal((min * max).sqrt()),
                CombinationRule::Average => avg,
            };
        }
    }
}
