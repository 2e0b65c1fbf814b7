//! Fixed-latency frame buffering with overlap-add synthesis
//!
//! Samples are written into an input FIFO at `read_ptr`; every call also
//! emits one previously synthesized sample from the output FIFO. Once the
//! input FIFO holds a full frame the caller analyses it, hands back the
//! reconstructed frame, and the buffers advance by one hop.
//!
//! ```text
//!              L = N - hop                hop
//! in_fifo   [ history from last frames | new samples ]   read_ptr in [L, N]
//! out_fifo  [ hop samples to emit      | unused      ]   read at read_ptr - L
//! ```

use crate::utils::{sanitize_denormal, SPECTRAL_EPSILON};

/// Sum of the overlapping windows at each phase of the hop.
///
/// Entry `k` is `Σ_m window[k + m * hop]`, the total analysis weight that
/// lands on an output sample emitted at phase `k`.
pub fn overlap_add_sums(window: &[f32], hop: usize) -> Vec<f32> {
    let hop = hop.max(1);
    (0..hop.min(window.len()))
        .map(|offset| window.iter().skip(offset).step_by(hop).sum())
        .collect()
}

/// Input/output FIFOs, overlap-add accumulator and read pointer.
///
/// Owned by a single engine instance; never shared.
pub struct FrameBuffers {
    frame_size: usize,
    hop_size: usize,
    latency: usize,

    in_fifo: Vec<f32>,
    out_fifo: Vec<f32>,
    output_accum: Vec<f32>,

    /// Per-phase inverse of the window overlap-add sum
    synthesis_gain: Vec<f32>,

    read_ptr: usize,
}

impl FrameBuffers {
    /// Allocate buffers for frames of `frame_size` advancing by `hop_size`.
    ///
    /// `window` is the analysis window; its overlap-add sum must stay away
    /// from zero, which configuration validation guarantees.
    pub fn new(frame_size: usize, hop_size: usize, window: &[f32]) -> Self {
        let latency = frame_size - hop_size;
        let synthesis_gain = overlap_add_sums(window, hop_size)
            .into_iter()
            .map(|sum| if sum > SPECTRAL_EPSILON { 1.0 / sum } else { 0.0 })
            .collect();

        Self {
            frame_size,
            hop_size,
            latency,
            in_fifo: vec![0.0; frame_size],
            out_fifo: vec![0.0; frame_size],
            output_accum: vec![0.0; frame_size],
            synthesis_gain,
            read_ptr: latency,
        }
    }

    #[inline]
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    #[inline]
    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// FIFO latency `N - hop` in samples
    #[inline]
    pub fn latency(&self) -> usize {
        self.latency
    }

    #[inline]
    pub fn read_ptr(&self) -> usize {
        self.read_ptr
    }

    /// The full input frame, oldest sample first
    #[inline]
    pub fn frame(&self) -> &[f32] {
        &self.in_fifo
    }

    /// Overlap-add accumulator (exposed for invariant checks)
    #[inline]
    pub fn output_accum(&self) -> &[f32] {
        &self.output_accum
    }

    /// Store one input sample and return the delayed output sample.
    ///
    /// The flag is `true` when the input FIFO has just filled up; the
    /// caller must then process `frame()` and call `overlap_add` before
    /// pushing the next sample.
    #[inline]
    pub fn push_sample(&mut self, sample: f32) -> (f32, bool) {
        self.in_fifo[self.read_ptr] = sample;
        let output = self.out_fifo[self.read_ptr - self.latency];
        self.read_ptr += 1;

        if self.read_ptr >= self.frame_size {
            self.read_ptr = self.latency;
            (output, true)
        } else {
            (output, false)
        }
    }

    /// Accumulate a reconstructed frame and advance all buffers by one hop
    pub fn overlap_add(&mut self, reconstructed: &[f32]) {
        let n = self.frame_size;
        let hop = self.hop_size;

        for (acc, &sample) in self.output_accum.iter_mut().zip(reconstructed) {
            *acc = sanitize_denormal(*acc + sample);
        }

        // Every sample in [0, hop) has now received all of its overlapping frames
        for k in 0..hop {
            self.out_fifo[k] = sanitize_denormal(self.output_accum[k] * self.synthesis_gain[k]);
        }

        self.output_accum.copy_within(hop..n, 0);
        self.output_accum[n - hop..].fill(0.0);

        self.in_fifo.copy_within(hop..n, 0);
    }
}
