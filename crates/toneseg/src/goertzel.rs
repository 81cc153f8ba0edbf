//! Goertzel filter bank
//!
//! The Goertzel recurrence computes a single DFT bin with one
//! multiply and two adds per sample:
//!
//! ```txt
//! q0 = coeff * q1 - q2 + x[n]
//! q2 = q1
//! q1 = q0
//! ```
//!
//! where `coeff = 2 cos(2π f / fs)`. After one block of samples,
//! the bin magnitude is
//!
//! ```txt
//! |X| = sqrt(q1² + q2² - q1 q2 coeff)
//! ```
//!
//! The [`GoertzelBinBank`] runs several of these in parallel, one
//! per tracked frequency, and resets them after every block.

use arrayvec::ArrayVec;

use crate::filter::BlockWindow;

/// Maximum number of bins in one [`GoertzelBinBank`]
pub const MAX_BINS: usize = 16;

/// One Goertzel bin
///
/// Owns the two recurrence accumulators for a single target
/// frequency. The accumulators are cleared each time a
/// magnitude is computed.
#[derive(Clone, Debug, PartialEq)]
pub struct GoertzelBin {
    target_hz: f32,
    coeff: f32,
    q1: f32,
    q2: f32,
    magnitude: f32,
}

impl GoertzelBin {
    /// New bin at `target_hz`
    ///
    /// The recurrence coefficient is computed for the given
    /// `sample_rate`. If `integer_bin` is set, the frequency is
    /// first rounded to the nearest DFT bin of a `block_len`-point
    /// transform.
    pub fn new(target_hz: f32, sample_rate: u32, block_len: usize, integer_bin: bool) -> Self {
        let n = block_len as f32;
        let mut k = n * target_hz / sample_rate as f32;
        if integer_bin {
            k = f32::floor(k + 0.5f32);
        }
        let omega = 2.0f32 * std::f32::consts::PI * k / n;
        Self {
            target_hz,
            coeff: 2.0f32 * omega.cos(),
            q1: 0.0f32,
            q2: 0.0f32,
            magnitude: 0.0f32,
        }
    }

    /// Target frequency (Hz)
    pub fn target_hz(&self) -> f32 {
        self.target_hz
    }

    /// Recurrence coefficient, `2 cos(ω)`
    pub fn coeff(&self) -> f32 {
        self.coeff
    }

    /// Magnitude as of the last completed block
    pub fn magnitude(&self) -> f32 {
        self.magnitude
    }

    /// Run the recurrence over one block
    ///
    /// If `window` is given, it must be at least as long as
    /// `block`; each sample is weighted before it enters the
    /// recurrence.
    #[inline]
    fn accumulate(&mut self, block: &[f32], window: Option<&[f32]>) {
        let coeff = self.coeff;
        let mut q1 = self.q1;
        let mut q2 = self.q2;
        match window {
            Some(w) => {
                for i in 0..block.len() {
                    let q0 = coeff * q1 - q2 + block[i] * w[i];
                    q2 = q1;
                    q1 = q0;
                }
            }
            None => {
                for i in 0..block.len() {
                    let q0 = coeff * q1 - q2 + block[i];
                    q2 = q1;
                    q1 = q0;
                }
            }
        }
        self.q1 = q1;
        self.q2 = q2;
    }

    /// Compute the magnitude and reset the accumulators
    #[inline]
    fn finish(&mut self) -> f32 {
        let radicand = self.q1 * self.q1 + self.q2 * self.q2 - self.q1 * self.q2 * self.coeff;
        self.magnitude = f32::max(radicand, 0.0f32).sqrt();
        self.q1 = 0.0f32;
        self.q2 = 0.0f32;
        self.magnitude
    }

    /// Reset to zero initial conditions
    pub fn reset(&mut self) {
        self.q1 = 0.0f32;
        self.q2 = 0.0f32;
        self.magnitude = 0.0f32;
    }
}

/// A bank of Goertzel bins
///
/// Computes per-block magnitudes at a small, fixed set of
/// frequencies. Call [`process()`](#method.process) once per
/// block.
#[derive(Clone, Debug)]
pub struct GoertzelBinBank {
    bins: ArrayVec<GoertzelBin, MAX_BINS>,
    magnitudes: ArrayVec<f32, MAX_BINS>,
    window: Option<Vec<f32>>,
    block_len: usize,
}

impl GoertzelBinBank {
    /// Bank of evenly-spaced bins
    ///
    /// Creates `count` bins centered on `center_hz` and spaced
    /// `spacing_hz` apart. The middle bin (index `count / 2`) is
    /// at `center_hz`. `count` is capped to [`MAX_BINS`].
    pub fn evenly_spaced(
        center_hz: f32,
        spacing_hz: f32,
        count: usize,
        sample_rate: u32,
        block_len: usize,
        window: BlockWindow,
    ) -> Self {
        let count = usize::min(count, MAX_BINS);
        let center_index = count / 2;
        let freqs = (0..count)
            .map(|i| center_hz + (i as f32 - center_index as f32) * spacing_hz)
            .collect::<ArrayVec<f32, MAX_BINS>>();
        Self::with_frequencies(&freqs, sample_rate, block_len, window, false)
    }

    /// Bank of bins at arbitrary frequencies
    ///
    /// Creates one bin per entry of `freqs_hz`, in order. At most
    /// [`MAX_BINS`] frequencies are used. See
    /// [`GoertzelBin::new()`] for `integer_bins`.
    pub fn with_frequencies(
        freqs_hz: &[f32],
        sample_rate: u32,
        block_len: usize,
        window: BlockWindow,
        integer_bins: bool,
    ) -> Self {
        let bins: ArrayVec<GoertzelBin, MAX_BINS> = freqs_hz
            .iter()
            .take(MAX_BINS)
            .map(|&f| GoertzelBin::new(f, sample_rate, block_len, integer_bins))
            .collect();
        let magnitudes = std::iter::repeat(0.0f32).take(bins.len()).collect();
        Self {
            bins,
            magnitudes,
            window: window.coefficients(block_len),
            block_len,
        }
    }

    /// Process one block
    ///
    /// Runs every bin over `block` and returns the per-bin
    /// magnitudes, in bin order. All accumulators are reset
    /// afterwards. An empty block yields all-zero magnitudes.
    ///
    /// Blocks longer than the configured block length are
    /// truncated to it.
    pub fn process(&mut self, block: &[f32]) -> &[f32] {
        let block = &block[..usize::min(block.len(), self.block_len)];
        let window = self.window.as_deref();
        for (bin, mag) in self.bins.iter_mut().zip(self.magnitudes.iter_mut()) {
            bin.accumulate(block, window);
            *mag = bin.finish();
        }
        &self.magnitudes
    }

    /// Magnitudes from the last processed block
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Normalized power of bin `index` from the last block
    ///
    /// Power is `magnitude² / N`, where `N` is the block length.
    /// Returns zero for an out-of-range index.
    pub fn power(&self, index: usize) -> f32 {
        match self.magnitudes.get(index) {
            Some(mag) => mag * mag / self.block_len as f32,
            None => 0.0f32,
        }
    }

    /// The bins, in order
    pub fn bins(&self) -> &[GoertzelBin] {
        &self.bins
    }

    /// Number of bins
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// True if there are no bins
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Configured block length, in samples
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Reset all bins to zero initial conditions
    pub fn reset(&mut self) {
        for bin in self.bins.iter_mut() {
            bin.reset();
        }
        for mag in self.magnitudes.iter_mut() {
            *mag = 0.0f32;
        }
    }
}

/// Strongest and second-strongest bins of one block
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BinPeak {
    /// Index of the strongest bin
    pub index: usize,

    /// Magnitude of the strongest bin
    pub strongest: f32,

    /// Magnitude of the second-strongest bin
    pub second: f32,
}

impl BinPeak {
    /// Find the peak among `magnitudes`
    ///
    /// Ties keep the lower bin index. If no bin is above zero,
    /// the reported index is `fallback_index`.
    pub fn find(magnitudes: &[f32], fallback_index: usize) -> Self {
        let mut out = BinPeak {
            index: fallback_index,
            strongest: 0.0f32,
            second: 0.0f32,
        };
        for (i, &mag) in magnitudes.iter().enumerate() {
            if mag > out.strongest {
                out.second = out.strongest;
                out.strongest = mag;
                out.index = i;
            } else if mag > out.second {
                out.second = mag;
            }
        }
        out
    }
}
