//! # Sliding windows and smoothing
//!
//! The `Window` is a fixed-length lookback buffer. New samples
//! are pushed onto the right side, and the oldest sample ages off
//! the left side. It has a fixed size at construction time.
//!
//! The [`MovingAverage`] is built on a `Window` and smooths a
//! signal with a boxcar of `len` taps. [`smooth_centered()`] uses
//! it to compute a centered, zero-padded moving average of an
//! entire buffer.
//!
//! [`BlockWindow`] selects the taper applied to each Goertzel
//! block before the recurrence runs.

use num_traits::Zero;
use slice_ring_buffer::SliceRingBuffer;

/// Taper applied to each analysis block
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlockWindow {
    /// No taper: every sample has unit weight
    #[default]
    Rectangular,

    /// Hann (raised-cosine) taper
    ///
    /// Lowers the sidelobes of each bin at the cost of a wider
    /// main lobe. Useful when the bins do not fall on exact DFT
    /// frequencies and leakage between them is high.
    Hann,
}

impl BlockWindow {
    /// Window coefficients for a block of `len` samples
    ///
    /// Returns `None` for the rectangular window, which needs
    /// no coefficients at all.
    pub fn coefficients(&self, len: usize) -> Option<Vec<f32>> {
        match self {
            BlockWindow::Rectangular => None,
            BlockWindow::Hann => {
                if len < 2 {
                    return Some(vec![1.0f32; len]);
                }
                let denom = (len - 1) as f32;
                Some(
                    (0..len)
                        .map(|n| {
                            0.5f32
                                - 0.5f32
                                    * f32::cos(2.0f32 * std::f32::consts::PI * n as f32 / denom)
                        })
                        .collect(),
                )
            }
        }
    }
}

/// Sample window
///
/// Implements a fixed-size lookback window. The window always
/// contains exactly `len()` samples; it starts out full of
/// zeros.
#[derive(Clone, Debug)]
pub(crate) struct Window<T>(SliceRingBuffer<T>)
where
    T: Copy + Zero;

#[allow(dead_code)]
impl<T> Window<T>
where
    T: Copy + Zero,
{
    /// Create empty window, filling it with zeros
    ///
    /// Creates a new `Window` with the given `len`gth.
    pub fn new(len: usize) -> Self {
        let mut out = Self(SliceRingBuffer::with_capacity(len));
        for _i in 0..len {
            out.0.push_front(T::zero());
        }
        out
    }

    /// Reset to zero initial conditions
    ///
    /// Clear the window, filling it with zeros
    pub fn reset(&mut self) {
        let len = self.0.len();
        self.0.clear();
        for _i in 0..len {
            self.0.push_front(T::zero());
        }
    }

    /// Window length
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Append a scalar to the sample window
    ///
    /// Appends the `input` scalar to the right side of the Window.
    /// It becomes the last / most recent sample of Window.
    /// Returns the sample that was formerly the oldest
    /// sample in the Window.
    #[inline]
    pub fn push_scalar(&mut self, input: T) -> T {
        match self.0.pop_front() {
            Some(out) => {
                self.0.push_back(input);
                out
            }
            None => input,
        }
    }

    /// Obtain current window contents, as a slice
    ///
    /// The zeroth sample of the slice is the least recent
    /// sample in the window.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.0.as_slice()
    }
}

/// Moving average filter
///
/// This is an efficient "comb filter" which computes a
/// moving average that is the length of the window. The
/// delay of the moving average filter is its `length - 1`.
///
/// The moving average filter provides the same result as
/// an FIR filter of length `length` with taps of
/// `1 / length`, but it does so with many fewer multiplies.
#[derive(Clone, Debug)]
pub struct MovingAverage {
    window: Window<f32>,
    inv_len: f32,
    moving_sum: f32,
}

impl MovingAverage {
    /// New moving average filter
    ///
    /// The length, `len > 0`, is fixed at creation time.
    /// A zero length is treated as one.
    pub fn new(len: usize) -> Self {
        let len = usize::max(len, 1);
        Self {
            window: Window::new(len),
            inv_len: 1.0f32 / (len as f32),
            moving_sum: 0.0f32,
        }
    }

    /// Reset to zero initial conditions
    pub fn reset(&mut self) {
        self.window.reset();
        self.moving_sum = 0.0f32;
    }

    /// Filter length
    #[inline]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Filter the input
    ///
    /// Pushes `input` and returns the average of the last
    /// `len()` inputs, counting zeros before the first input.
    #[inline]
    pub fn filter(&mut self, input: f32) -> f32 {
        let aged = self.window.push_scalar(input);
        self.moving_sum += input - aged;
        self.moving_sum * self.inv_len
    }
}

/// Centered moving average of an entire buffer
///
/// Smooths `input` with a boxcar of `len` taps, each `1 / len`.
/// The output is aligned like a "same"-mode convolution: output
/// sample `i` is the full convolution at `i + (len - 1) / 2`, and
/// the input is treated as zero outside its extents. The output
/// is always the same length as the input.
///
/// A `len` of zero or one returns the input unchanged.
pub fn smooth_centered(input: &[f32], len: usize) -> Vec<f32> {
    if len <= 1 {
        return input.to_vec();
    }

    let delay = (len - 1) / 2;
    let mut avg = MovingAverage::new(len);
    let mut out = Vec::with_capacity(input.len());

    let padded = input
        .iter()
        .copied()
        .chain(std::iter::repeat(0.0f32).take(delay));
    for (n, sa) in padded.enumerate() {
        let y = avg.filter(sa);
        if n >= delay {
            out.push(y);
        }
    }

    out
}
