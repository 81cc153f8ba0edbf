//! Envelope detection
//!
//! An alternative to the Goertzel bank for when the tone
//! frequency is unknown or the signal is broadband. The
//! [`EnvelopeExtractor`] computes the magnitude of the analytic
//! signal over a whole buffer and smooths it with a centered
//! moving average. The [`EnvelopeDetector`] thresholds the
//! envelope at a fixed fraction of its own maximum, so its
//! decisions scale with the loudest tone in the buffer.
//!
//! Unlike the block detectors, this path is *not* streaming.
//! As a [`LevelDetector`], it collects every sample it is given
//! and decides them all at once when the stream is
//! [flushed](crate::LevelDetector::flush). The threshold is
//! always taken over the whole recording, however it was
//! chunked.

#[cfg(not(test))]
use log::trace;

#[cfg(test)]
use std::println as trace;

use num_complex::Complex;
use rustfft::FftPlanner;

use std::convert::TryFrom;

use crate::builder::{ConfigError, DetectorBuilder};
use crate::filter::smooth_centered;
use crate::segment::LevelDetector;

/// Maximum envelope moving-average length (samples)
pub const MAX_ENVELOPE_SMOOTHING: usize = 65536;

/// Analytic-signal envelope extractor
pub struct EnvelopeExtractor {
    smoothing: usize,
    planner: FftPlanner<f32>,
}

impl EnvelopeExtractor {
    /// New extractor with a `smoothing`-sample moving average
    ///
    /// A `smoothing` length of zero or one disables smoothing.
    pub fn new(smoothing: usize) -> Self {
        Self {
            smoothing,
            planner: FftPlanner::new(),
        }
    }

    /// Moving average length, in samples
    pub fn smoothing(&self) -> usize {
        self.smoothing
    }

    /// Smoothed envelope of `samples`
    ///
    /// The output has the same length as the input.
    pub fn envelope(&mut self, samples: &[f32]) -> Vec<f32> {
        let raw = self.analytic_magnitude(samples);
        smooth_centered(&raw, self.smoothing)
    }

    /// Magnitude of the analytic signal
    ///
    /// The analytic signal is formed in the frequency domain:
    /// negative frequencies are zeroed and positive frequencies
    /// doubled. DC and, for even lengths, the Nyquist bin are
    /// kept as-is. For a sinusoid, the magnitude is its
    /// amplitude.
    pub fn analytic_magnitude(&mut self, samples: &[f32]) -> Vec<f32> {
        let n = samples.len();
        if n == 0 {
            return Vec::new();
        }

        let mut buf: Vec<Complex<f32>> = samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
        self.planner.plan_fft_forward(n).process(&mut buf);

        let positive_end = if n % 2 == 0 { n / 2 } else { (n + 1) / 2 };
        for c in buf[1..positive_end].iter_mut() {
            *c *= 2.0f32;
        }
        let negative_start = if n % 2 == 0 { n / 2 + 1 } else { positive_end };
        for c in buf[negative_start..].iter_mut() {
            *c = Complex::new(0.0, 0.0);
        }

        self.planner.plan_fft_inverse(n).process(&mut buf);

        // rustfft does not normalize the inverse
        let scale = 1.0f32 / n as f32;
        buf.iter().map(|c| c.norm() * scale).collect()
    }
}

impl std::fmt::Debug for EnvelopeExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeExtractor")
            .field("smoothing", &self.smoothing)
            .finish()
    }
}

/// Whole-buffer envelope threshold detector
///
/// Marks each sample active when the smoothed envelope is
/// strictly above `max(envelope) * threshold_ratio`. An all-zero
/// buffer therefore has no active samples.
#[derive(Debug)]
pub struct EnvelopeDetector {
    extractor: EnvelopeExtractor,
    threshold_ratio: f32,
    sample_rate: u32,
    last_max: f32,
    pending: Vec<f32>,
}

impl EnvelopeDetector {
    /// New detector
    ///
    /// Prefer [`DetectorBuilder::build_envelope_detector()`](crate::DetectorBuilder::build_envelope_detector),
    /// which validates its inputs.
    pub fn new(sample_rate: u32, smoothing: usize, threshold_ratio: f32) -> Self {
        Self {
            extractor: EnvelopeExtractor::new(smoothing),
            threshold_ratio,
            sample_rate,
            last_max: 0.0f32,
            pending: Vec::new(),
        }
    }

    /// Input sampling rate (Hz)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Threshold, as a fraction of the envelope maximum
    pub fn threshold_ratio(&self) -> f32 {
        self.threshold_ratio
    }

    /// Envelope maximum of the last buffer
    pub fn last_max(&self) -> f32 {
        self.last_max
    }

    /// Samples collected by `detect()` and not yet flushed
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// The underlying extractor
    pub fn extractor_mut(&mut self) -> &mut EnvelopeExtractor {
        &mut self.extractor
    }

    /// Per-sample activity of one whole buffer
    pub fn activity(&mut self, samples: &[f32]) -> Vec<bool> {
        let env = self.extractor.envelope(samples);
        let max = env.iter().copied().fold(0.0f32, f32::max);
        let threshold = max * self.threshold_ratio;
        self.last_max = max;

        trace!(
            "envelope: {} samples, max {:0.4}, threshold {:0.4}",
            samples.len(),
            max,
            threshold
        );

        env.iter().map(|&e| e > threshold).collect()
    }
}

impl TryFrom<&DetectorBuilder> for EnvelopeDetector {
    type Error = ConfigError;

    /// Create the envelope detector from its builder
    fn try_from(cfg: &DetectorBuilder) -> Result<Self, Self::Error> {
        cfg.validate_envelope()?;
        Ok(EnvelopeDetector::new(
            cfg.sample_rate(),
            cfg.envelope_smoothing(),
            cfg.envelope_threshold_ratio(),
        ))
    }
}

impl LevelDetector for EnvelopeDetector {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn samples_per_decision(&self) -> usize {
        1
    }

    /// Collects `samples`; decisions are made by `flush()`
    fn detect(&mut self, samples: &[f32], _out: &mut Vec<bool>) {
        self.pending.extend_from_slice(samples);
    }

    fn flush(&mut self, out: &mut Vec<bool>) {
        let samples = std::mem::take(&mut self.pending);
        out.extend(self.activity(&samples));
        self.pending = samples;
        self.pending.clear();
    }

    fn reset(&mut self) {
        self.last_max = 0.0f32;
        self.pending.clear();
    }
}
