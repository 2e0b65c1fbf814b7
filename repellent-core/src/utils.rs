/// Reduction amounts at or below this level map to a zero linear factor
pub const DB_NOISE_FLOOR: f32 = -100.0;

/// Guard added to denominators that may reach zero on silent bins
pub const SPECTRAL_EPSILON: f32 = 1e-12;

// ============================================================================
// Decibel Conversion
// ============================================================================

/// Amplitude ratio to dB; non-positive input gives -inf
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        -f32::INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// dB to amplitude ratio, `10^(db / 20)`, floored to 0.0 at `DB_NOISE_FLOOR`
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    if db <= DB_NOISE_FLOOR {
        0.0
    } else {
        10.0_f32.powf(db / 20.0)
    }
}

// ============================================================================
// Denormal Handling
// ============================================================================

/// Flush a value to zero unless it is a normal float.
///
/// Subnormals slow down arithmetic on the audio thread; NaN and infinities
/// are flushed as well so a single bad sample cannot poison the buffers.
#[inline]
pub fn sanitize_denormal(x: f32) -> f32 {
    if x.is_normal() {
        x
    } else {
        0.0
    }
}

/// Largest absolute sample value, 0.0 for an empty or silent buffer
#[inline]
pub fn calculate_peak(buffer: &[f32]) -> f32 {
    buffer.iter()
        .map(|&x| x.abs())
        .fold(0.0_f32, f32::max)
}

/// Multiply every sample by `scale`, flushing denormals on the way
#[inline]
pub fn scale_buffer(buffer: &mut [f32], scale: f32) {
    for x in buffer.iter_mut() {
        *x = sanitize_denormal(*x * scale);
    }
}
