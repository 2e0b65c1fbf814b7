//! Real-time spectral noise reduction for streaming mono audio
//!
//! The engine learns a noise profile from captured frames, either on
//! demand or continuously, and attenuates noise-dominated frequency bins
//! with a Wiener or power-subtraction gain. Processing runs block by block
//! with a fixed latency of `N - hop` samples reported to the host.

use wasm_bindgen::prelude::*;

use denoiser::{BlockControls, CaptureState, EngineConfig, NoiseRepellent};

/// Utility functions for audio processing
pub mod utils;
/// Window functions and half-complex spectral transforms
pub mod fft_processor;
/// Input/output FIFOs and overlap-add synthesis
pub mod frame_buffer;
/// Noise profile capture and combination
pub mod noise_profile;
/// Per-bin suppression gains
pub mod spectral_subtraction;
/// Streaming engine tying the pipeline together
pub mod denoiser;

pub use denoiser::{
    ConfigError, EngineStats, FrameNormalization, NoiseRepellentBuilder, ProcessingError,
};
pub use fft_processor::WindowType;
pub use noise_profile::{CombinationRule, SpectrumDomain};
pub use spectral_subtraction::SuppressionMethod;

/// WebAssembly-compatible noise repellent with the default configuration.
///
/// Mirrors the controls of a classic plugin: a capture switch
/// (0 = off, 1 = manual, 2 = auto) and a reduction amount in dB.
#[wasm_bindgen]
pub struct WasmNoiseRepellent {
    engine: NoiseRepellent,
}

#[wasm_bindgen]
impl WasmNoiseRepellent {
    /// Creates a new noise repellent for the given sample rate
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: f32) -> Result<WasmNoiseRepellent, JsError> {
        let engine = NoiseRepellent::new(sample_rate, EngineConfig::default())?;
        Ok(WasmNoiseRepellent { engine })
    }

    /// Processes an audio buffer and returns the delayed, denoised output
    #[wasm_bindgen]
    pub fn process(&mut self, input: &[f32], capture: f32, amount_db: f32) -> Vec<f32> {
        let controls = BlockControls::new(CaptureState::from_control(capture), amount_db);
        let mut output = input.to_vec();

        if self.engine.process_in_place(&mut output, controls).is_err() {
            // Validated buffers never fail; keep the host stream silent if they do
            output.fill(0.0);
        }

        output
    }

    /// Latency in samples to report to the host
    #[wasm_bindgen(getter)]
    pub fn latency(&self) -> usize {
        self.engine.latency_samples()
    }

    /// Returns the analysis frame size
    #[wasm_bindgen(getter)]
    pub fn frame_size(&self) -> usize {
        self.engine.frame_size()
    }

    /// Returns the current sample rate
    #[wasm_bindgen(getter)]
    pub fn sample_rate(&self) -> f32 {
        self.engine.sample_rate()
    }

    /// Number of frames folded into the noise profile so far
    #[wasm_bindgen(getter)]
    pub fn frames_captured(&self) -> f64 {
        self.engine.stats().frames_captured as f64
    }
}
