use crest_domain::{db_to_linear, linear_to_db};

use crate::buffer::AudioBuffer;

/// Peak level of `buffer` relative to its format's full scale, in dBFS.
///
/// Never above 0.0 for samples within range. Returns negative infinity for
/// silence, which callers treat as "skip" rather than feeding it into a gain.
pub fn measure_peak_dbfs(buffer: &AudioBuffer) -> f64 {
    let peak = buffer.max_amplitude();
    if peak == 0.0 {
        return f64::NEG_INFINITY;
    }
    linear_to_db(peak / buffer.max_possible_amplitude())
}

/// Scales every sample by `10^(gain_db / 20)`.
///
/// No clamping happens here; saturation is left to the encoder.
pub fn apply_gain(buffer: &AudioBuffer, gain_db: f64) -> AudioBuffer {
    let factor = db_to_linear(gain_db);
    buffer.map_samples(|sample| sample * factor)
}
