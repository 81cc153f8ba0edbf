//! Edge and interval extraction
//!
//! Detectors emit one level decision per *time unit*: a block
//! for the Goertzel sessions, or a single sample for the
//! envelope detector. This module turns those decisions into
//! timed events.
//!
//! * The [`IntervalExtractor`] works in *binary edge mode*. A
//!   rising edge opens an [`Interval`], and a falling edge closes
//!   it.
//!
//! * The [`TransitionDetector`] works in *named-transition mode*.
//!   It watches a multi-level stream in which some units are
//!   undecided and reports only one specific change of level,
//!   like white → black.
//!
//! All times are input-sample positions, counted from the start
//! of the session. Convert them with [`samples_to_ms()`].

use std::fmt;

use crate::stats::DurationStats;

/// Convert a sample count to milliseconds
#[inline]
pub fn samples_to_ms(samples: u64, sample_rate: u32) -> f64 {
    samples as f64 * 1000.0f64 / sample_rate as f64
}

/// A closed interval of activity
///
/// Spans input samples `start..end`. The end is exclusive, and
/// `end > start` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interval {
    start: u64,
    end: u64,
}

impl Interval {
    /// New interval, or `None` if it would be empty
    pub fn new(start: u64, end: u64) -> Option<Self> {
        if end > start {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// First active sample
    pub fn start(&self) -> u64 {
        self.start
    }

    /// One past the last active sample
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Length, in samples
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Start time (ms)
    pub fn start_ms(&self, sample_rate: u32) -> f64 {
        samples_to_ms(self.start, sample_rate)
    }

    /// End time (ms)
    pub fn end_ms(&self, sample_rate: u32) -> f64 {
        samples_to_ms(self.end, sample_rate)
    }

    /// Duration (ms)
    pub fn duration_ms(&self, sample_rate: u32) -> f64 {
        samples_to_ms(self.len(), sample_rate)
    }

    /// Samples from the end of `self` to the start of `next`
    ///
    /// Zero if they touch or are out of order.
    pub fn gap_to(&self, next: &Interval) -> u64 {
        next.start.saturating_sub(self.end)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Binary edge detector
///
/// Feed it one activity decision per time unit with
/// [`input()`](#method.input). Each time unit spans
/// `samples_per_unit` input samples, so the decision for unit
/// `i` is timestamped at sample `i * samples_per_unit`.
///
/// * inactive → active opens an interval at the current unit
/// * active → inactive closes it at the current unit
///
/// When the stream ends, call [`finish()`](#method.finish) to
/// close any interval which is still open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntervalExtractor {
    samples_per_unit: u64,
    units: u64,
    open: Option<u64>,
}

impl IntervalExtractor {
    /// New extractor with the given time unit
    ///
    /// A `samples_per_unit` of zero is treated as one.
    pub fn new(samples_per_unit: usize) -> Self {
        Self {
            samples_per_unit: u64::max(samples_per_unit as u64, 1),
            units: 0,
            open: None,
        }
    }

    /// Reset to zero initial conditions
    pub fn reset(&mut self) {
        self.units = 0;
        self.open = None;
    }

    /// Time units consumed so far
    pub fn units(&self) -> u64 {
        self.units
    }

    /// Current time, in samples
    pub fn now(&self) -> u64 {
        self.units * self.samples_per_unit
    }

    /// True if an interval is open
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Input one unit's activity
    ///
    /// Returns the interval which this unit closed, if any.
    pub fn input(&mut self, active: bool) -> Option<Interval> {
        let now = self.now();
        self.units += 1;
        match (self.open, active) {
            (None, true) => {
                self.open = Some(now);
                None
            }
            (Some(start), false) => {
                self.open = None;
                Interval::new(start, now)
            }
            _ => None,
        }
    }

    /// Close the trailing interval, if any
    ///
    /// The interval ends at the end of the last unit which was
    /// input. The extractor may continue to be used afterwards;
    /// time is not reset.
    pub fn finish(&mut self) -> Option<Interval> {
        let start = self.open.take()?;
        Interval::new(start, self.now())
    }
}

/// Extract every interval from a complete activity stream
///
/// Convenience wrapper around [`IntervalExtractor`]. Includes
/// the trailing interval if the stream ends while active.
pub fn extract_intervals<I>(activity: I, samples_per_unit: usize) -> Vec<Interval>
where
    I: IntoIterator<Item = bool>,
{
    let mut extractor = IntervalExtractor::new(samples_per_unit);
    let mut out: Vec<Interval> = activity
        .into_iter()
        .filter_map(|act| extractor.input(act))
        .collect();
    out.extend(extractor.finish());
    out
}

/// Named-transition detector
///
/// Watches a stream of `Option<L>` levels, one per time unit,
/// where `None` means *undecided*. Reports the time of every
/// `from` → `to` change between *decided* levels. Undecided
/// units are skipped over: they neither break nor create a
/// transition, and the last decided level persists across them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionDetector<L> {
    from: L,
    to: L,
    samples_per_unit: u64,
    units: u64,
    last: Option<L>,
}

impl<L> TransitionDetector<L>
where
    L: Copy + PartialEq,
{
    /// New detector for the `from` → `to` transition
    ///
    /// A `samples_per_unit` of zero is treated as one.
    pub fn new(from: L, to: L, samples_per_unit: usize) -> Self {
        Self {
            from,
            to,
            samples_per_unit: u64::max(samples_per_unit as u64, 1),
            units: 0,
            last: None,
        }
    }

    /// Reset to zero initial conditions
    pub fn reset(&mut self) {
        self.units = 0;
        self.last = None;
    }

    /// The transition being watched, as (`from`, `to`)
    pub fn transition(&self) -> (L, L) {
        (self.from, self.to)
    }

    /// Last decided level
    pub fn last(&self) -> Option<L> {
        self.last
    }

    /// Input one unit's level
    ///
    /// Returns the edge position, in samples, if this unit
    /// completes the transition.
    pub fn input(&mut self, level: Option<L>) -> Option<u64> {
        let now = self.units * self.samples_per_unit;
        self.units += 1;

        let level = level?;
        let edge = self.last == Some(self.from) && level == self.to;
        self.last = Some(level);
        if edge {
            Some(now)
        } else {
            None
        }
    }
}

/// A train of edges
///
/// Holds edge positions, in samples, in increasing order.
/// Reports the periods between successive edges, such as the
/// weather-fax phasing period.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeTrain {
    edges: Vec<u64>,
    sample_rate: u32,
}

impl EdgeTrain {
    /// New, empty edge train
    pub fn new(sample_rate: u32) -> Self {
        Self {
            edges: Vec::new(),
            sample_rate,
        }
    }

    /// Append an edge
    ///
    /// Edges which do not advance time are dropped.
    pub fn push(&mut self, position: u64) {
        match self.edges.last() {
            Some(&last) if position <= last => {}
            _ => self.edges.push(position),
        }
    }

    /// Edge positions, in samples
    pub fn edges(&self) -> &[u64] {
        &self.edges
    }

    /// Sampling rate of the positions
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of edges
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// True if there are no edges
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Edge times (ms)
    pub fn edges_ms(&self) -> Vec<f64> {
        self.edges
            .iter()
            .map(|&e| samples_to_ms(e, self.sample_rate))
            .collect()
    }

    /// Edge-to-edge periods (ms)
    ///
    /// `N` edges yield `N - 1` periods.
    pub fn periods_ms(&self) -> Vec<f64> {
        self.edges
            .windows(2)
            .map(|w| samples_to_ms(w[1] - w[0], self.sample_rate))
            .collect()
    }

    /// Statistics of the edge-to-edge periods
    pub fn period_stats(&self) -> DurationStats {
        DurationStats::from_durations(&self.periods_ms())
    }

    /// Forget all edges
    pub fn clear(&mut self) {
        self.edges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_interval() {
        assert_eq!(None, Interval::new(10, 10));
        assert_eq!(None, Interval::new(10, 5));

        let iv = Interval::new(8000, 16000).expect("interval");
        assert_eq!(8000, iv.len());
        assert_approx_eq!(1000.0f64, iv.start_ms(8000));
        assert_approx_eq!(2000.0f64, iv.end_ms(8000));
        assert_approx_eq!(1000.0f64, iv.duration_ms(8000));
        assert_eq!("[8000, 16000)", iv.to_string());

        let next = Interval::new(20000, 21000).expect("interval");
        assert_eq!(4000, iv.gap_to(&next));
        assert_eq!(0, next.gap_to(&iv));
    }

    #[test]
    fn test_binary_edges() {
        let act = [false, true, true, false, false, true, false];
        let out = extract_intervals(act, 10);
        assert_eq!(
            vec![
                Interval::new(10, 30).expect("interval"),
                Interval::new(50, 60).expect("interval"),
            ],
            out
        );
    }

    #[test]
    fn test_trailing_interval_closed() {
        let out = extract_intervals([false, false, true, true], 128);
        assert_eq!(vec![Interval::new(256, 512).expect("interval")], out);

        // active from the very first unit
        let out = extract_intervals([true], 1);
        assert_eq!(vec![Interval::new(0, 1).expect("interval")], out);
    }

    #[test]
    fn test_streaming_matches_batch() {
        let act = [true, false, true, true, false, true, true, true];
        let batch = extract_intervals(act, 4);

        let mut uut = IntervalExtractor::new(4);
        let mut streamed = vec![];
        for a in act {
            streamed.extend(uut.input(a));
        }
        assert!(uut.is_open());
        streamed.extend(uut.finish());
        assert!(!uut.is_open());
        assert_eq!(None, uut.finish());
        assert_eq!(batch, streamed);
        assert_eq!(32, uut.now());

        uut.reset();
        assert_eq!(0, uut.units());
    }

    #[test]
    fn test_empty_and_silent() {
        assert!(extract_intervals(std::iter::empty::<bool>(), 64).is_empty());
        assert!(extract_intervals([false; 100], 64).is_empty());
    }

    #[test]
    fn test_named_transition() {
        #[derive(Clone, Copy, Debug, PartialEq)]
        enum Lvl {
            Lo,
            Hi,
        }

        let stream = [
            None,
            Some(Lvl::Lo),
            Some(Lvl::Hi),
            None,
            None,
            Some(Lvl::Lo), // edge at unit 5
            Some(Lvl::Lo),
            Some(Lvl::Hi),
            Some(Lvl::Lo), // edge at unit 8
            Some(Lvl::Hi),
            None,
            Some(Lvl::Hi),
        ];

        let mut uut = TransitionDetector::new(Lvl::Hi, Lvl::Lo, 64);
        let edges: Vec<u64> = stream.iter().filter_map(|l| uut.input(*l)).collect();
        assert_eq!(vec![5 * 64, 8 * 64], edges);
        assert_eq!(Some(Lvl::Hi), uut.last());
        assert_eq!((Lvl::Hi, Lvl::Lo), uut.transition());

        uut.reset();
        assert_eq!(None, uut.last());
    }

    #[test]
    fn test_edge_train() {
        let mut train = EdgeTrain::new(1000);
        assert!(train.is_empty());
        assert!(train.periods_ms().is_empty());
        assert!(train.period_stats().is_empty());

        for e in [100u64, 600, 600, 1100, 1590] {
            train.push(e);
        }
        assert_eq!(4, train.len());
        assert_eq!(vec![500.0f64, 500.0, 490.0], train.periods_ms());
        assert_eq!(vec![100.0f64, 600.0, 1100.0, 1590.0], train.edges_ms());

        let stats = train.period_stats();
        let stats = stats.summary().expect("stats");
        assert_eq!(3, stats.count);
        assert_approx_eq!(500.0f64, stats.median);

        train.clear();
        assert!(train.is_empty());
    }
}
