//! Streaming noise-reduction engine
//!
//! `NoiseRepellent` ties the frame buffers, window, spectral transform,
//! noise profile and gain computer together and processes audio one block
//! at a time with a fixed latency.
//!
//! # Example
//! ```
//! use repellent_core::denoiser::{BlockControls, CaptureState, NoiseRepellentBuilder};
//!
//! let mut engine = NoiseRepellentBuilder::new()
//!     .sample_rate(48000.0)
//!     .frame_size(1024)
//!     .build()
//!     .unwrap();
//!
//! let input = vec![0.0_f32; 512];
//! let mut output = vec![0.0_f32; 512];
//!
//! // Learn the noise floor, then suppress it by 6 dB extra
//! engine.process_block(&input, &mut output, BlockControls::capture_manual()).unwrap();
//! engine.process_block(&input, &mut output, BlockControls::new(CaptureState::Idle, 6.0)).unwrap();
//! ```

use log::{debug, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::fft_processor::{apply_window, FftError, SpectralBuffers, SpectralTransform, WindowType};
use crate::frame_buffer::{overlap_add_sums, FrameBuffers};
use crate::noise_profile::{CombinationRule, NoiseProfile, SpectrumDomain};
use crate::spectral_subtraction::{GainComputer, SuppressionMethod};
use crate::utils::{calculate_peak, scale_buffer};

// ============================================================================
// Constants
// ============================================================================

/// Default analysis frame size
pub const DEFAULT_FRAME_SIZE: usize = 2048;

/// Default number of overlapping frames per window length
pub const DEFAULT_OVERLAP_FACTOR: usize = 4;

/// Default host sample rate used by the builder
pub const DEFAULT_SAMPLE_RATE: f32 = 48000.0;

pub const MIN_FRAME_SIZE: usize = 64;
pub const MAX_FRAME_SIZE: usize = 16384;

/// Smallest window overlap-add sum accepted at any hop phase
pub const MIN_OVERLAP_SUM: f32 = 1e-3;

// ============================================================================
// Error Types
// ============================================================================

/// Rejected engine configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    OddFrameSize { frame_size: usize },
    FrameSizeOutOfRange { frame_size: usize, min: usize, max: usize },
    InvalidOverlap { frame_size: usize, overlap_factor: usize },
    NotOverlapAddCompliant { window: WindowType, overlap_factor: usize, min_sum: f32 },
    InvalidSampleRate(f32),
    Transform(FftError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::OddFrameSize { frame_size } =>
                write!(f, "Frame size {} must be even", frame_size),
            ConfigError::FrameSizeOutOfRange { frame_size, min, max } =>
                write!(f, "Frame size {} out of range [{}, {}]", frame_size, min, max),
            ConfigError::InvalidOverlap { frame_size, overlap_factor } =>
                write!(
                    f,
                    "Overlap factor {} must be at least 2 and divide frame size {}",
                    overlap_factor, frame_size
                ),
            ConfigError::NotOverlapAddCompliant { window, overlap_factor, min_sum } =>
                write!(
                    f,
                    "{} window with overlap {} does not overlap-add (minimum sum {:.6})",
                    window.name(), overlap_factor, min_sum
                ),
            ConfigError::InvalidSampleRate(rate) =>
                write!(f, "Invalid sample rate: {}", rate),
            ConfigError::Transform(err) =>
                write!(f, "Cannot plan transform: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<FftError> for ConfigError {
    fn from(err: FftError) -> Self {
        ConfigError::Transform(err)
    }
}

/// Failure while processing a block
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingError {
    /// Input and output blocks differ in length
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Spectral transform rejected its buffers
    Transform(FftError),
}

impl std::fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingError::BufferSizeMismatch { expected, actual } =>
                write!(f, "Buffer size mismatch: expected {}, got {}", expected, actual),
            ProcessingError::Transform(err) =>
                write!(f, "Transform error: {}", err),
        }
    }
}

impl std::error::Error for ProcessingError {}

impl From<FftError> for ProcessingError {
    fn from(err: FftError) -> Self {
        ProcessingError::Transform(err)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// When frames are peak-normalized before analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FrameNormalization {
    /// Normalize while capturing and restore the level after synthesis
    #[default]
    CaptureOnly,
    /// Normalize every frame and leave the output at normalized level
    Always,
}

/// Engine configuration, fixed for the lifetime of an instance
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    /// Analysis frame size N (even)
    pub frame_size: usize,

    /// Analysis and synthesis window
    pub window_type: WindowType,

    /// Frames overlapping each sample; hop = N / overlap_factor
    pub overlap_factor: usize,

    /// Spectrum used for noise estimation and gains
    pub domain: SpectrumDomain,

    /// How captured statistics become the noise estimate
    pub combination: CombinationRule,

    /// Gain law
    pub method: SuppressionMethod,

    pub normalization: FrameNormalization,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            window_type: WindowType::Hann,
            overlap_factor: DEFAULT_OVERLAP_FACTOR,
            domain: SpectrumDomain::Power,
            combination: CombinationRule::Maximum,
            method: SuppressionMethod::Wiener,
            normalization: FrameNormalization::CaptureOnly,
        }
    }
}

impl EngineConfig {
    /// Hop size in samples
    #[inline]
    pub fn hop(&self) -> usize {
        self.frame_size / self.overlap_factor.max(1)
    }

    /// Reported latency `N - hop`
    #[inline]
    pub fn latency(&self) -> usize {
        self.frame_size - self.hop()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = self.frame_size;

        if n % 2 != 0 {
            return Err(ConfigError::OddFrameSize { frame_size: n });
        }

        if !(MIN_FRAME_SIZE..=MAX_FRAME_SIZE).contains(&n) {
            return Err(ConfigError::FrameSizeOutOfRange {
                frame_size: n,
                min: MIN_FRAME_SIZE,
                max: MAX_FRAME_SIZE,
            });
        }

        if self.overlap_factor < 2 || n % self.overlap_factor != 0 {
            return Err(ConfigError::InvalidOverlap {
                frame_size: n,
                overlap_factor: self.overlap_factor,
            });
        }

        let window = self.window_type.generate(n);
        let min_sum = overlap_add_sums(&window, self.hop())
            .into_iter()
            .fold(f32::INFINITY, f32::min);

        if min_sum < MIN_OVERLAP_SUM {
            return Err(ConfigError::NotOverlapAddCompliant {
                window: self.window_type,
                overlap_factor: self.overlap_factor,
                min_sum,
            });
        }

        Ok(())
    }
}

// ============================================================================
// Block Controls
// ============================================================================

/// Noise capture mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CaptureState {
    /// Profile frozen, suppression active
    #[default]
    Idle,
    /// Profile updated, suppression bypassed
    ManualCapture,
    /// Profile updated and suppression active on every frame
    AutoCapture,
}

impl CaptureState {
    /// Map a host control value (0 = off, 1 = manual, 2 = auto)
    pub fn from_control(value: f32) -> Self {
        if !value.is_finite() {
            return CaptureState::Idle;
        }
        match value.round().clamp(0.0, 2.0) as u8 {
            1 => CaptureState::ManualCapture,
            2 => CaptureState::AutoCapture,
            _ => CaptureState::Idle,
        }
    }

    #[inline]
    pub fn is_capturing(&self) -> bool {
        !matches!(self, CaptureState::Idle)
    }
}

/// Controls read once at the start of every block
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlockControls {
    pub capture: CaptureState,

    /// Reduction amount in dB; scales the noise estimate
    pub reduction_db: f32,
}

impl BlockControls {
    pub fn new(capture: CaptureState, reduction_db: f32) -> Self {
        Self { capture, reduction_db }
    }

    /// Suppress with the frozen profile
    pub fn idle(reduction_db: f32) -> Self {
        Self::new(CaptureState::Idle, reduction_db)
    }

    /// Learn the profile without touching the signal
    pub fn capture_manual() -> Self {
        Self::new(CaptureState::ManualCapture, 0.0)
    }
}

/// Processing counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStats {
    pub frames_processed: u64,
    pub frames_captured: u64,
}

// ============================================================================
// Engine
// ============================================================================

/// Single-channel streaming noise reducer
pub struct NoiseRepellent {
    sample_rate: f32,
    config: EngineConfig,

    window: Vec<f32>,
    frames: FrameBuffers,
    transform: SpectralTransform,
    spectral: SpectralBuffers,
    profile: NoiseProfile,
    gain: GainComputer,

    capture_state: CaptureState,
    frames_processed: u64,
}

impl NoiseRepellent {
    /// Create an engine; all buffers are allocated here
    pub fn new(sample_rate: f32, config: EngineConfig) -> Result<Self, ConfigError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            warn!("Rejected sample rate {}", sample_rate);
            return Err(ConfigError::InvalidSampleRate(sample_rate));
        }

        if let Err(err) = config.validate() {
            warn!("Rejected engine configuration: {}", err);
            return Err(err);
        }

        let n = config.frame_size;
        let hop = config.hop();

        let window = config.window_type.generate(n);
        let frames = FrameBuffers::new(n, hop, &window);
        let transform = SpectralTransform::new(n)?;
        let spectral = SpectralBuffers::new(n);
        let num_bins = spectral.num_bins();

        info!(
            "Noise repellent ready: {} Hz, frame {}, hop {}, latency {}, {} window, {:?}/{:?}",
            sample_rate,
            n,
            hop,
            frames.latency(),
            config.window_type.name(),
            config.method,
            config.domain
        );

        Ok(Self {
            sample_rate,
            profile: NoiseProfile::new(num_bins, config.domain, config.combination),
            gain: GainComputer::new(num_bins, config.method, config.domain),
            config,
            window,
            frames,
            transform,
            spectral,
            capture_state: CaptureState::Idle,
            frames_processed: 0,
        })
    }

    /// Reported latency `N - hop` in samples
    #[inline]
    pub fn latency_samples(&self) -> usize {
        self.frames.latency()
    }

    /// Delay after which an input sample reappears at the output.
    ///
    /// One hop longer than `latency_samples()`: a sample must wait for the
    /// rest of its hop before the frame containing it is analysed.
    #[inline]
    pub fn round_trip_delay(&self) -> usize {
        self.frames.frame_size()
    }

    #[inline]
    pub fn hop_size(&self) -> usize {
        self.frames.hop_size()
    }

    #[inline]
    pub fn frame_size(&self) -> usize {
        self.frames.frame_size()
    }

    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn noise_profile(&self) -> &NoiseProfile {
        &self.profile
    }

    /// Gain mask of the last suppressed frame
    pub fn gain_mask(&self) -> &[f32] {
        self.gain.gains()
    }

    /// Capture state of the last processed block
    pub fn capture_state(&self) -> CaptureState {
        self.capture_state
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            frames_processed: self.frames_processed,
            frames_captured: self.profile.frames_captured(),
        }
    }

    /// Process one block; `output` receives the input delayed and denoised
    pub fn process_block(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        controls: BlockControls,
    ) -> Result<(), ProcessingError> {
        if input.len() != output.len() {
            return Err(ProcessingError::BufferSizeMismatch {
                expected: input.len(),
                actual: output.len(),
            });
        }

        let controls = self.begin_block(controls);

        for (out, &sample) in output.iter_mut().zip(input) {
            *out = self.process_sample(sample, &controls)?;
        }

        Ok(())
    }

    /// Process one block, replacing its samples with the output
    pub fn process_in_place(
        &mut self,
        buffer: &mut [f32],
        controls: BlockControls,
    ) -> Result<(), ProcessingError> {
        let controls = self.begin_block(controls);

        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample, &controls)?;
        }

        Ok(())
    }

    fn begin_block(&mut self, controls: BlockControls) -> BlockControls {
        if controls.capture != self.capture_state {
            debug!(
                "Capture state {:?} -> {:?} after {} frames",
                self.capture_state, controls.capture, self.frames_processed
            );
            self.capture_state = controls.capture;
        }

        let reduction_db = if controls.reduction_db.is_finite() {
            controls.reduction_db
        } else {
            0.0
        };

        BlockControls::new(controls.capture, reduction_db)
    }

    #[inline]
    fn process_sample(&mut self, sample: f32, controls: &BlockControls) -> Result<f32, ProcessingError> {
        let (output, frame_ready) = self.frames.push_sample(sample);
        if frame_ready {
            self.process_frame(controls)?;
        }
        Ok(output)
    }

    fn process_frame(&mut self, controls: &BlockControls) -> Result<(), ProcessingError> {
        let (normalize, restore) = match self.config.normalization {
            FrameNormalization::CaptureOnly => {
                let capturing = controls.capture.is_capturing();
                (capturing, capturing)
            }
            FrameNormalization::Always => (true, false),
        };

        let peak = if normalize { calculate_peak(self.frames.frame()) } else { 0.0 };
        let normalized = peak > 0.0;

        apply_window(self.frames.frame(), &self.window, &mut self.spectral.time);
        if normalized {
            scale_buffer(&mut self.spectral.time, 1.0 / peak);
        }

        self.transform.forward(&self.spectral.time, &mut self.spectral.freq)?;
        self.spectral.extract_spectra();
        if normalized && restore {
            // Profile and gains work at the input level
            self.spectral.scale_spectra(peak);
        }

        match controls.capture {
            CaptureState::ManualCapture => {
                self.profile.update(&self.spectral.magnitude, &self.spectral.power);
            }
            CaptureState::Idle => {
                self.suppress(controls.reduction_db);
            }
            CaptureState::AutoCapture => {
                self.profile.update(&self.spectral.magnitude, &self.spectral.power);
                self.suppress(controls.reduction_db);
            }
        }

        self.transform.inverse(&self.spectral.freq, &mut self.spectral.time)?;
        if normalized && restore {
            scale_buffer(&mut self.spectral.time, peak);
        }

        self.frames.overlap_add(&self.spectral.time);
        self.frames_processed += 1;

        Ok(())
    }

    fn suppress(&mut self, reduction_db: f32) {
        self.gain.compute(
            &self.spectral.magnitude,
            &self.spectral.power,
            self.profile.estimate(),
            reduction_db,
        );
        self.gain.apply(&mut self.spectral.freq);
    }
}

// ============================================================================
// Builder Pattern
// ============================================================================

/// Builder for NoiseRepellent
pub struct NoiseRepellentBuilder {
    sample_rate: f32,
    config: EngineConfig,
}

impl NoiseRepellentBuilder {
    /// Create new builder with default config
    pub fn new() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            config: EngineConfig::default(),
        }
    }

    pub fn sample_rate(mut self, rate: f32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn frame_size(mut self, size: usize) -> Self {
        self.config.frame_size = size;
        self
    }

    pub fn window_type(mut self, window: WindowType) -> Self {
        self.config.window_type = window;
        self
    }

    pub fn overlap_factor(mut self, factor: usize) -> Self {
        self.config.overlap_factor = factor;
        self
    }

    pub fn domain(mut self, domain: SpectrumDomain) -> Self {
        self.config.domain = domain;
        self
    }

    pub fn combination(mut self, rule: CombinationRule) -> Self {
        self.config.combination = rule;
        self
    }

    pub fn method(mut self, method: SuppressionMethod) -> Self {
        self.config.method = method;
        self
    }

    pub fn normalization(mut self, normalization: FrameNormalization) -> Self {
        self.config.normalization = normalization;
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<NoiseRepellent, ConfigError> {
        NoiseRepellent::new(self.sample_rate, self.config)
    }
}

impl Default for NoiseRepellentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
