//! Test signal synthesis
//!
//! Generators for keyed tones and two-tone patterns. These are
//! used by the unit tests only.

/// Pure sinusoid
///
/// `len` samples of a sine wave at `freq_hz` with peak
/// `amplitude`, sampled at `sample_rate`. Phase starts at zero.
pub fn tone(freq_hz: f32, amplitude: f32, sample_rate: u32, len: usize) -> Vec<f32> {
    let rad_per_sa = 2.0f64 * std::f64::consts::PI * freq_hz as f64 / sample_rate as f64;
    (0..len)
        .map(|n| (amplitude as f64 * f64::sin(rad_per_sa * n as f64)) as f32)
        .collect()
}

/// Number of samples in `ms` milliseconds, rounded
pub fn ms_to_samples(ms: f32, sample_rate: u32) -> usize {
    (ms as f64 * sample_rate as f64 / 1000.0f64).round() as usize
}

/// On/off keyed tone
///
/// Each `(keyed, ms)` entry of `pattern` appends `ms`
/// milliseconds of either the tone or silence. The tone's phase
/// runs continuously across the whole signal.
pub fn keyed_tone(
    freq_hz: f32,
    amplitude: f32,
    sample_rate: u32,
    pattern: &[(bool, f32)],
) -> Vec<f32> {
    let total = pattern
        .iter()
        .map(|(_, ms)| ms_to_samples(*ms, sample_rate))
        .sum();
    let carrier = tone(freq_hz, amplitude, sample_rate, total);

    let mut out = Vec::with_capacity(total);
    for (keyed, ms) in pattern {
        let start = out.len();
        let end = start + ms_to_samples(*ms, sample_rate);
        if *keyed {
            out.extend_from_slice(&carrier[start..end]);
        } else {
            out.extend(std::iter::repeat(0.0f32).take(end - start));
        }
    }
    out
}

/// Alternating two-tone signal
///
/// Starts with `white_ms` of the white tone, then `black_ms` of
/// the black tone, repeated `cycles` times. Each segment is a
/// fresh sinusoid starting at zero phase.
pub fn alternating_tones(
    black_hz: f32,
    white_hz: f32,
    amplitude: f32,
    sample_rate: u32,
    white_ms: f32,
    black_ms: f32,
    cycles: usize,
) -> Vec<f32> {
    let white = tone(white_hz, amplitude, sample_rate, ms_to_samples(white_ms, sample_rate));
    let black = tone(black_hz, amplitude, sample_rate, ms_to_samples(black_ms, sample_rate));
    let mut out = Vec::with_capacity(cycles * (white.len() + black.len()));
    for _i in 0..cycles {
        out.extend_from_slice(&white);
        out.extend_from_slice(&black);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyed_tone() {
        let sig = keyed_tone(800.0, 1.0, 8000, &[(true, 10.0), (false, 5.0), (true, 1.0)]);
        assert_eq!(128, sig.len());
        assert!(sig[..80].iter().any(|s| s.abs() > 0.5));
        assert!(sig[80..120].iter().all(|s| *s == 0.0));
        assert!(sig[120..].iter().any(|s| *s != 0.0));
    }

    #[test]
    fn test_alternating() {
        let sig = alternating_tones(1500.0, 2300.0, 1.0, 8000, 10.0, 20.0, 3);
        assert_eq!(3 * 240, sig.len());
    }
}
