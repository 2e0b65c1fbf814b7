//! Windowing and half-complex spectral transforms
//!
//! This module provides the analysis/synthesis window and a real-input
//! transform whose coefficients are packed in half-complex layout:
//!
//! ```text
//! index:  0    1   ...  N/2-1   N/2    N/2+1   ...  N-1
//! value:  r0   r1  ...  r(N/2-1) rN/2  i(N/2-1) ...  i1
//! ```
//!
//! DC and Nyquist are purely real. For `0 < k < N/2`, `freq[k]` holds the
//! real part and `freq[N - k]` the imaginary part of bin `k`.

use num_complex::Complex32;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::f32::consts::TAU;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::utils::{sanitize_denormal, scale_buffer};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum FftError {
    InvalidSize { size: usize },
    BufferSizeMismatch { expected: usize, got: usize },
    /// Failure reported by the real FFT backend
    Backend(String),
}

impl std::fmt::Display for FftError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FftError::InvalidSize { size } =>
                write!(f, "Invalid transform size: {}. Must be even and at least 2", size),
            FftError::BufferSizeMismatch { expected, got } =>
                write!(f, "Buffer size mismatch: expected {}, got {}", expected, got),
            FftError::Backend(msg) =>
                write!(f, "FFT backend error: {}", msg),
        }
    }
}

impl std::error::Error for FftError {}

impl From<realfft::FftError> for FftError {
    fn from(err: realfft::FftError) -> Self {
        FftError::Backend(err.to_string())
    }
}

// ============================================================================
// Window Function Types
// ============================================================================

/// Symmetric analysis/synthesis windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WindowType {
    /// `0.5 (1 - cos(2πi / (L-1)))`
    #[default]
    Hann,
    /// `0.54 - 0.46 cos(2πi / (L-1))`, non-zero at the edges
    Hamming,
    /// Three-term Blackman, `0.42 - 0.5 cos(t) + 0.08 cos(2t)`
    Blackman,
}

impl WindowType {
    /// Allocate and fill a window of `size` coefficients
    pub fn generate(&self, size: usize) -> Vec<f32> {
        let mut window = vec![0.0; size];
        self.generate_into(&mut window);
        window
    }

    /// Generate window coefficients into existing buffer.
    ///
    /// Windows are symmetric (divisor `size - 1`); callers guarantee
    /// `size >= 2`.
    pub fn generate_into(&self, window: &mut [f32]) {
        let size = window.len();
        if size < 2 {
            window.fill(1.0);
            return;
        }

        let scale = TAU / (size - 1) as f32;

        for (i, w) in window.iter_mut().enumerate() {
            let t = i as f32 * scale;
            *w = match self {
                WindowType::Hann => 0.5 * (1.0 - t.cos()),
                WindowType::Hamming => 0.54 - 0.46 * t.cos(),
                WindowType::Blackman => 0.42 - 0.5 * t.cos() + 0.08 * (2.0 * t).cos(),
            };
        }
    }

    /// Human-readable name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            WindowType::Hann => "hann",
            WindowType::Hamming => "hamming",
            WindowType::Blackman => "blackman",
        }
    }
}

/// Multiply `input` by `window` into `output`, flushing denormals
#[inline]
pub fn apply_window(input: &[f32], window: &[f32], output: &mut [f32]) {
    for ((out, &sample), &coeff) in output.iter_mut().zip(input).zip(window) {
        *out = sanitize_denormal(sample * coeff);
    }
}

// ============================================================================
// Spectral Transform (half-complex adapter)
// ============================================================================

/// Real-input forward/inverse transform in half-complex layout.
///
/// Wraps `realfft` plans. The real work buffer, the `N/2 + 1` bin spectrum
/// and the FFT scratch are allocated once, so `forward` and `inverse`
/// never allocate.
pub struct SpectralTransform {
    frame_size: usize,
    fft_forward: Arc<dyn RealToComplex<f32>>,
    fft_inverse: Arc<dyn ComplexToReal<f32>>,
    /// realfft consumes its real input, so frames are copied here first
    real_buffer: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl SpectralTransform {
    /// Plan forward and inverse transforms of `frame_size` points
    pub fn new(frame_size: usize) -> Result<Self, FftError> {
        if frame_size < 2 || frame_size % 2 != 0 {
            return Err(FftError::InvalidSize { size: frame_size });
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let fft_forward = planner.plan_fft_forward(frame_size);
        let fft_inverse = planner.plan_fft_inverse(frame_size);

        let scratch_len = fft_forward
            .get_scratch_len()
            .max(fft_inverse.get_scratch_len());

        Ok(Self {
            frame_size,
            spectrum: fft_forward.make_output_vec(),
            fft_forward,
            fft_inverse,
            real_buffer: vec![0.0; frame_size],
            scratch: vec![Complex32::new(0.0, 0.0); scratch_len],
        })
    }

    /// Transform size
    #[inline]
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn check_len(&self, got: usize) -> Result<(), FftError> {
        if got != self.frame_size {
            return Err(FftError::BufferSizeMismatch {
                expected: self.frame_size,
                got,
            });
        }
        Ok(())
    }

    /// Forward transform of `time` into half-complex `freq` (unnormalized)
    pub fn forward(&mut self, time: &[f32], freq: &mut [f32]) -> Result<(), FftError> {
        self.check_len(time.len())?;
        self.check_len(freq.len())?;

        self.real_buffer.copy_from_slice(time);
        self.fft_forward
            .process_with_scratch(&mut self.real_buffer, &mut self.spectrum, &mut self.scratch)?;

        let n = self.frame_size;
        let half = n / 2;
        freq[0] = self.spectrum[0].re;
        for k in 1..half {
            freq[k] = self.spectrum[k].re;
            freq[n - k] = self.spectrum[k].im;
        }
        freq[half] = self.spectrum[half].re;

        Ok(())
    }

    /// Inverse transform of half-complex `freq` into `time`, divided by N
    pub fn inverse(&mut self, freq: &[f32], time: &mut [f32]) -> Result<(), FftError> {
        self.check_len(freq.len())?;
        self.check_len(time.len())?;

        let n = self.frame_size;
        let half = n / 2;

        // DC and Nyquist must carry no imaginary part
        self.spectrum[0] = Complex32::new(freq[0], 0.0);
        for k in 1..half {
            self.spectrum[k] = Complex32::new(freq[k], freq[n - k]);
        }
        self.spectrum[half] = Complex32::new(freq[half], 0.0);

        self.fft_inverse
            .process_with_scratch(&mut self.spectrum, &mut self.real_buffer, &mut self.scratch)?;

        let scale = 1.0 / n as f32;
        for (out, &sample) in time.iter_mut().zip(&self.real_buffer) {
            *out = sanitize_denormal(sample * scale);
        }

        Ok(())
    }
}

// ============================================================================
// Spectral Buffers
// ============================================================================

/// Per-frame working buffers shared by analysis and synthesis.
///
/// `time` holds the windowed frame before the forward transform and the
/// reconstructed frame after the inverse one; `freq` holds the forward
/// output and, after gain is applied, the inverse input. Both are
/// overwritten on every processed frame.
pub struct SpectralBuffers {
    pub time: Vec<f32>,
    pub freq: Vec<f32>,
    pub magnitude: Vec<f32>,
    pub power: Vec<f32>,
}

impl SpectralBuffers {
    pub fn new(frame_size: usize) -> Self {
        let num_bins = frame_size / 2 + 1;
        Self {
            time: vec![0.0; frame_size],
            freq: vec![0.0; frame_size],
            magnitude: vec![0.0; num_bins],
            power: vec![0.0; num_bins],
        }
    }

    /// Number of meaningful bins (N/2 + 1)
    #[inline]
    pub fn num_bins(&self) -> usize {
        self.magnitude.len()
    }

    /// Fill `magnitude` and `power` from the half-complex `freq` buffer.
    ///
    /// DC and Nyquist have no imaginary slot and are read as purely real.
    pub fn extract_spectra(&mut self) {
        let n = self.freq.len();
        let half = n / 2;

        for k in 0..=half {
            let re = self.freq[k];
            let p2 = if k == 0 || k == half {
                re * re
            } else {
                let im = self.freq[n - k];
                re * re + im * im
            };

            self.power[k] = sanitize_denormal(p2);
            self.magnitude[k] = sanitize_denormal(p2.sqrt());
        }
    }

    /// Rescale `magnitude` and `power` as if the frame had been scaled by
    /// `amplitude` before analysis
    pub fn scale_spectra(&mut self, amplitude: f32) {
        scale_buffer(&mut self.magnitude, amplitude);
        scale_buffer(&mut self.power, amplitude * amplitude);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_window_types() {
        let size = 256;

        for window_type in [WindowType::Hann, WindowType::Hamming, WindowType::Blackman] {
            let window = window_type.generate(size);
            assert_eq!(window.len(), size);
            assert!(window[0] < 0.1);
            assert!(window[size - 1] < 0.1);
            assert!(window[size / 2] > 0.9);

            // Symmetric windows
            for i in 0..size / 2 {
                assert!((window[i] - window[size - 1 - i]).abs() < EPSILON);
            }
        }
    }

    #[test]
    fn test_window_formulas() {
        let hann = WindowType::Hann.generate(5);
        assert!((hann[0] - 0.0).abs() < EPSILON);
        assert!((hann[1] - 0.5).abs() < EPSILON);
        assert!((hann[2] - 1.0).abs() < EPSILON);

        let hamming = WindowType::Hamming.generate(5);
        assert!((hamming[0] - 0.08).abs() < EPSILON);
        assert!((hamming[2] - 1.0).abs() < EPSILON);

        let blackman = WindowType::Blackman.generate(5);
        assert!(blackman[0].abs() < EPSILON);
        assert!((blackman[1] - 0.34).abs() < EPSILON);
        assert!((blackman[2] - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_transform_creation() {
        assert!(SpectralTransform::new(256).is_ok());
        assert!(SpectralTransform::new(2048).is_ok());
        assert!(SpectralTransform::new(0).is_err());
        assert!(SpectralTransform::new(255).is_err());
    }

    #[test]
    fn test_forward_inverse_perfect_reconstruction() {
        let n = 512;
        let mut transform = SpectralTransform::new(n).unwrap();

        let input: Vec<f32> = (0..n)
            .map(|i| (2.0 * PI * 10.0 * i as f32 / n as f32).sin() + 0.25)
            .collect();

        let mut freq = vec![0.0; n];
        let mut output = vec![0.0; n];
        transform.forward(&input, &mut freq).unwrap();
        transform.inverse(&freq, &mut output).unwrap();

        for i in 0..n {
            assert!((input[i] - output[i]).abs() < 1e-4);
        }
    }

    #[test]
    fn test_half_complex_layout() {
        let n = 64;
        let mut transform = SpectralTransform::new(n).unwrap();

        // cos at bin 4 lands in the real slot, sin at bin 6 in the imaginary slot
        let input: Vec<f32> = (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                (2.0 * PI * 4.0 * t).cos() + (2.0 * PI * 6.0 * t).sin() + 1.0
            })
            .collect();

        let mut freq = vec![0.0; n];
        transform.forward(&input, &mut freq).unwrap();

        let half_n = n as f32 / 2.0;
        assert!((freq[0] - n as f32).abs() < 1e-3);
        assert!((freq[4] - half_n).abs() < 1e-3);
        assert!(freq[n - 4].abs() < 1e-3);
        assert!(freq[6].abs() < 1e-3);
        // e^{-i} convention: sine shows up with negative imaginary part
        assert!((freq[n - 6] + half_n).abs() < 1e-3);
    }

    #[test]
    fn test_nyquist_bin_is_real() {
        let n = 32;
        let mut transform = SpectralTransform::new(n).unwrap();
        let input: Vec<f32> = (0..n).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();

        let mut buffers = SpectralBuffers::new(n);
        transform.forward(&input, &mut buffers.freq).unwrap();
        buffers.extract_spectra();

        assert!((buffers.freq[n / 2] - n as f32).abs() < 1e-3);
        assert!((buffers.magnitude[n / 2] - n as f32).abs() < 1e-3);
        assert!(buffers.magnitude[0].abs() < 1e-3);
    }

    #[test]
    fn test_extract_spectra_edges() {
        let n = 8;
        let mut buffers = SpectralBuffers::new(n);
        // DC negative, Nyquist negative: magnitudes must be absolute values
        buffers.freq = vec![-3.0, 3.0, 0.0, 1.0, -2.0, 2.0, 0.0, 4.0];
        buffers.extract_spectra();

        assert_eq!(buffers.num_bins(), 5);
        assert!((buffers.magnitude[0] - 3.0).abs() < EPSILON);
        assert!((buffers.power[0] - 9.0).abs() < EPSILON);
        assert!((buffers.magnitude[1] - 5.0).abs() < EPSILON);
        assert!((buffers.power[1] - 25.0).abs() < EPSILON);
        assert!((buffers.power[3] - 5.0).abs() < EPSILON);
        assert!((buffers.magnitude[4] - 2.0).abs() < EPSILON);
        assert!((buffers.power[4] - 4.0).abs() < EPSILON);
    }

    #[test]
    fn test_scale_spectra_matches_scaled_frame() {
        let n = 128;
        let mut transform = SpectralTransform::new(n).unwrap();
        let input: Vec<f32> = (0..n)
            .map(|i| (2.0 * PI * 5.0 * i as f32 / n as f32).cos() * 0.8)
            .collect();
        let scaled: Vec<f32> = input.iter().map(|x| x * 0.25).collect();

        let mut reference = SpectralBuffers::new(n);
        transform.forward(&scaled, &mut reference.freq).unwrap();
        reference.extract_spectra();

        let mut buffers = SpectralBuffers::new(n);
        transform.forward(&input, &mut buffers.freq).unwrap();
        buffers.extract_spectra();
        buffers.scale_spectra(0.25);

        for k in 0..buffers.num_bins() {
            assert!((buffers.magnitude[k] - reference.magnitude[k]).abs() < 1e-3);
            assert!((buffers.power[k] - reference.power[k]).abs() < 1e-2 * reference.power[k].max(1.0));
        }
    }

    #[test]
    fn test_buffer_size_mismatch() {
        let mut transform = SpectralTransform::new(64).unwrap();
        let input = vec![0.0; 32];
        let mut freq = vec![0.0; 64];
        assert_eq!(
            transform.forward(&input, &mut freq),
            Err(FftError::BufferSizeMismatch { expected: 64, got: 32 })
        );
    }

    #[test]
    fn test_apply_window() {
        let input = vec![1.0, 1.0, 1.0, 1.0];
        let window = vec![0.5, 0.75, 0.75, 0.5];
        let mut output = vec![0.0; 4];

        apply_window(&input, &window, &mut output);
        assert_eq!(output, vec![0.5, 0.75, 0.75, 0.5]);
    }
}
