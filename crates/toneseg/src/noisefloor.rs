//! Adaptive noise floor

use crate::goertzel::BinPeak;

/// Background level tracker
///
/// Estimates the background energy around a tone from the bins
/// which do *not* contain it. Each block contributes one noise
/// sample, which is smoothed with a single-pole IIR filter:
///
/// ```txt
/// floor = floor * (1 - α) + sample * α
/// ```
///
/// The very first sample seeds the floor directly. The floor is
/// never negative.
#[derive(Clone, Debug)]
pub struct NoiseFloorTracker {
    alpha: f32,
    floor: Option<f32>,
}

impl NoiseFloorTracker {
    /// New noise floor tracker
    ///
    /// `alpha` is the smoothing weight given to each new noise
    /// sample. It is clamped to `[0.0, 1.0]`; the builder rejects
    /// values outside `(0.0, 1.0]` before they get here.
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: f32::clamp(alpha, 0.0f32, 1.0f32),
            floor: None,
        }
    }

    /// Reset to the unseeded state
    pub fn reset(&mut self) {
        self.floor = None;
    }

    /// Current noise floor
    ///
    /// Zero until the first update.
    #[inline]
    pub fn floor(&self) -> f32 {
        self.floor.unwrap_or(0.0f32)
    }

    /// True once the floor has been seeded
    pub fn is_seeded(&self) -> bool {
        self.floor.is_some()
    }

    /// Smoothing weight
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Update from one block of bin magnitudes
    ///
    /// Derives a noise sample from `magnitudes` and the block's
    /// `peak` with [`noise_sample()`], then smooths it into the
    /// floor. Returns the new floor.
    pub fn update(&mut self, magnitudes: &[f32], peak: &BinPeak) -> f32 {
        self.track(noise_sample(magnitudes, peak))
    }

    /// Smooth one noise sample into the floor
    ///
    /// Returns the new floor.
    #[inline]
    pub fn track(&mut self, sample: f32) -> f32 {
        let sample = f32::max(sample, 0.0f32);
        let floor = match self.floor {
            None => sample,
            Some(prev) => prev * (1.0f32 - self.alpha) + sample * self.alpha,
        };
        let floor = f32::max(floor, 0.0f32);
        self.floor = Some(floor);
        floor
    }
}

/// Noise sample for one block
///
/// Averages every bin more than one index away from the
/// strongest bin. When there are no such bins, as with a bank of
/// two or three bins centered on the peak, the second-strongest
/// magnitude is used instead, or half of the strongest if the
/// second is zero.
pub fn noise_sample(magnitudes: &[f32], peak: &BinPeak) -> f32 {
    let mut accum = 0.0f32;
    let mut count = 0usize;
    for (i, &mag) in magnitudes.iter().enumerate() {
        if i.abs_diff(peak.index) > 1 {
            accum += mag;
            count += 1;
        }
    }

    if count > 0 {
        accum / count as f32
    } else if peak.second > 0.0f32 {
        peak.second
    } else {
        peak.strongest * 0.5f32
    }
}
