//! Duration statistics

use std::fmt;

/// Summary of a non-empty set of durations
///
/// All values share the unit of the input, which is
/// milliseconds throughout this crate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DurationSummary {
    /// Number of durations
    pub count: usize,

    /// Shortest duration
    pub min: f64,

    /// Longest duration
    pub max: f64,

    /// Arithmetic mean
    pub mean: f64,

    /// Median
    ///
    /// For an even count, the mean of the two middle values.
    pub median: f64,

    /// Population standard deviation
    pub std_dev: f64,
}

/// Duration statistics
///
/// An empty input is not an error. It produces
/// [`DurationStats::Empty`], which reports as
/// "no pulses detected."
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DurationStats {
    /// There were no durations to summarize
    Empty,

    /// Summary of one or more durations
    Measured(DurationSummary),
}

impl DurationStats {
    /// Summarize `durations`
    ///
    /// Non-finite durations are ignored.
    pub fn from_durations(durations: &[f64]) -> Self {
        let mut sorted: Vec<f64> = durations.iter().copied().filter(|d| d.is_finite()).collect();
        if sorted.is_empty() {
            return DurationStats::Empty;
        }
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0f64
        } else {
            sorted[mid]
        };
        let variance = sorted.iter().map(|d| (d - mean) * (d - mean)).sum::<f64>() / count as f64;

        DurationStats::Measured(DurationSummary {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean,
            median,
            std_dev: variance.sqrt(),
        })
    }

    /// True if there was nothing to summarize
    pub fn is_empty(&self) -> bool {
        matches!(self, DurationStats::Empty)
    }

    /// The summary, if any
    pub fn summary(&self) -> Option<&DurationSummary> {
        match self {
            DurationStats::Empty => None,
            DurationStats::Measured(s) => Some(s),
        }
    }

    /// Number of durations summarized
    pub fn count(&self) -> usize {
        self.summary().map(|s| s.count).unwrap_or(0)
    }
}

impl From<&[f64]> for DurationStats {
    fn from(durations: &[f64]) -> Self {
        Self::from_durations(durations)
    }
}

impl fmt::Display for DurationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "count={}, min={:.2} ms, max={:.2} ms, mean={:.2} ms, median={:.2} ms, std={:.2} ms",
            self.count, self.min, self.max, self.mean, self.median, self.std_dev
        )
    }
}

impl fmt::Display for DurationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationStats::Empty => write!(f, "no pulses detected"),
            DurationStats::Measured(s) => write!(f, "{}", s),
        }
    }
}
