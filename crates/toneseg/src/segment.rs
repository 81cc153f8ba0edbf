//! Segmentation into timed intervals
//!
//! Every detector in this crate boils down to the same
//! capability: turn a window of samples into one level decision
//! per time unit. The [`LevelDetector`] trait captures it, and
//! the [`Segmenter`] runs any `LevelDetector` through one shared
//! [`IntervalExtractor`].
//!
//! ```
//! use toneseg::{segment, DetectorBuilder};
//!
//! let session = DetectorBuilder::new(8000)
//!     .build_tone_session()
//!     .expect("valid configuration");
//!
//! let segments = segment(session, &[0.0f32; 8000]);
//! assert!(segments.is_empty());
//! assert_eq!("no pulses detected", segments.interval_stats().to_string());
//! ```

use crate::interval::{Interval, IntervalExtractor};
use crate::stats::DurationStats;

/// Produces one activity decision per time unit
pub trait LevelDetector {
    /// Input sampling rate (Hz)
    fn sample_rate(&self) -> u32;

    /// Input samples covered by each decision
    fn samples_per_decision(&self) -> usize;

    /// Detect activity
    ///
    /// Appends one decision to `out` for every time unit which
    /// `samples` completes. Streaming detectors may hold back a
    /// partial unit until the next call. Whole-buffer detectors
    /// may hold back everything until [`flush()`](#method.flush).
    fn detect(&mut self, samples: &[f32], out: &mut Vec<bool>);

    /// End of stream
    ///
    /// Appends any decisions which were held back for the rest
    /// of the stream. Streaming detectors have none.
    fn flush(&mut self, _out: &mut Vec<bool>) {}

    /// Reset to zero initial conditions
    fn reset(&mut self);
}

impl<D> LevelDetector for &mut D
where
    D: LevelDetector + ?Sized,
{
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn samples_per_decision(&self) -> usize {
        (**self).samples_per_decision()
    }

    fn detect(&mut self, samples: &[f32], out: &mut Vec<bool>) {
        (**self).detect(samples, out)
    }

    fn flush(&mut self, out: &mut Vec<bool>) {
        (**self).flush(out)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Intervals found by a [`Segmenter`]
///
/// Intervals are non-overlapping and ordered by start time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Segments {
    intervals: Vec<Interval>,
    sample_rate: u32,
}

impl Segments {
    /// New segment list
    pub fn new(intervals: Vec<Interval>, sample_rate: u32) -> Self {
        Self {
            intervals,
            sample_rate,
        }
    }

    /// The intervals, in order
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Sampling rate of the interval positions
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of intervals
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// True if no intervals were found
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Interval (start, end) times (ms)
    pub fn times_ms(&self) -> Vec<(f64, f64)> {
        self.intervals
            .iter()
            .map(|iv| (iv.start_ms(self.sample_rate), iv.end_ms(self.sample_rate)))
            .collect()
    }

    /// Interval durations (ms)
    pub fn durations_ms(&self) -> Vec<f64> {
        self.intervals
            .iter()
            .map(|iv| iv.duration_ms(self.sample_rate))
            .collect()
    }

    /// Gaps between successive intervals (ms)
    ///
    /// `N` intervals yield `N - 1` gaps.
    pub fn gaps_ms(&self) -> Vec<f64> {
        self.intervals
            .windows(2)
            .map(|w| crate::interval::samples_to_ms(w[0].gap_to(&w[1]), self.sample_rate))
            .collect()
    }

    /// Statistics of the interval durations
    pub fn interval_stats(&self) -> DurationStats {
        DurationStats::from_durations(&self.durations_ms())
    }

    /// Statistics of the gaps
    pub fn gap_stats(&self) -> DurationStats {
        DurationStats::from_durations(&self.gaps_ms())
    }

    /// Consume, returning the intervals
    pub fn into_intervals(self) -> Vec<Interval> {
        self.intervals
    }
}

impl<'a> IntoIterator for &'a Segments {
    type Item = &'a Interval;
    type IntoIter = std::slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.intervals.iter()
    }
}

/// Drives a [`LevelDetector`] and collects intervals
///
/// Feed samples with [`push()`](#method.push) as they arrive.
/// When the stream ends, [`finish()`](#method.finish) closes any
/// interval which is still open and returns everything found.
#[derive(Clone, Debug)]
pub struct Segmenter<D> {
    detector: D,
    extractor: IntervalExtractor,
    intervals: Vec<Interval>,
    activity: Vec<bool>,
}

impl<D> Segmenter<D>
where
    D: LevelDetector,
{
    /// New segmenter around `detector`
    pub fn new(detector: D) -> Self {
        let extractor = IntervalExtractor::new(detector.samples_per_decision());
        Self {
            detector,
            extractor,
            intervals: Vec::new(),
            activity: Vec::new(),
        }
    }

    /// Push samples
    ///
    /// Returns the number of intervals which these samples
    /// closed. Detectors which decide a whole buffer at once,
    /// like the [`EnvelopeDetector`](crate::EnvelopeDetector),
    /// close nothing until `finish()`.
    pub fn push(&mut self, samples: &[f32]) -> usize {
        self.activity.clear();
        self.detector.detect(samples, &mut self.activity);

        let before = self.intervals.len();
        for &act in &self.activity {
            self.intervals.extend(self.extractor.input(act));
        }
        self.intervals.len() - before
    }

    /// True if an interval is open
    pub fn is_open(&self) -> bool {
        self.extractor.is_open()
    }

    /// Intervals closed so far
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// End the stream
    ///
    /// Flushes the detector, closes the trailing interval, if
    /// any, at the last decided time unit and returns all
    /// intervals found since the last `finish()`. Samples still waiting inside the detector for
    /// a whole time unit are not counted.
    pub fn finish(&mut self) -> Segments {
        self.activity.clear();
        self.detector.flush(&mut self.activity);
        for &act in &self.activity {
            self.intervals.extend(self.extractor.input(act));
        }
        self.intervals.extend(self.extractor.finish());
        Segments::new(
            std::mem::take(&mut self.intervals),
            self.detector.sample_rate(),
        )
    }

    /// Clear all state, including the detector's
    pub fn reset(&mut self) {
        self.detector.reset();
        self.extractor.reset();
        self.intervals.clear();
        self.activity.clear();
    }

    /// The detector
    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// The detector, mutably
    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    /// Consume, returning the detector
    pub fn into_inner(self) -> D {
        self.detector
    }
}

/// Segment a complete recording
///
/// Runs `detector` over all of `samples` and closes any trailing
/// interval.
pub fn segment<D>(detector: D, samples: &[f32]) -> Segments
where
    D: LevelDetector,
{
    let mut segmenter = Segmenter::new(detector);
    segmenter.push(samples);
    segmenter.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;

    use crate::builder::DetectorBuilder;
    use crate::session::ToneSession;
    use crate::waveform::{alternating_tones, keyed_tone};

    // 10 ms blocks on exact DFT bins
    fn cw_session() -> ToneSession {
        DetectorBuilder::new(12800)
            .with_block_size(128)
            .with_center_frequency(800.0)
            .build_tone_session()
            .expect("valid configuration")
    }

    #[test]
    fn test_cw_intervals_and_gap() {
        let sig = keyed_tone(
            800.0,
            2048.0,
            12800,
            &[(true, 100.0), (false, 50.0), (true, 200.0), (false, 150.0)],
        );
        let segments = segment(cw_session(), &sig);
        assert_eq!(2, segments.len());
        assert_eq!(12800, segments.sample_rate());

        let durations = segments.durations_ms();
        assert_approx_eq!(100.0f64, durations[0], 10.0f64);
        assert_approx_eq!(200.0f64, durations[1], 10.0f64);

        let gaps = segments.gaps_ms();
        assert_eq!(1, gaps.len());
        assert_approx_eq!(50.0f64, gaps[0], 10.0f64);

        let stats = segments.interval_stats();
        let stats = stats.summary().expect("intervals");
        assert_eq!(2, stats.count);
        assert_approx_eq!(150.0f64, stats.mean, 10.0f64);
        assert_eq!(1, segments.gap_stats().count());
    }

    #[test]
    fn test_silence_is_empty() {
        for len in [0usize, 1, 127, 128, 10000] {
            let segments = segment(cw_session(), &vec![0.0f32; len]);
            assert!(segments.is_empty());
            assert!(segments.interval_stats().is_empty());
            assert!(segments.gap_stats().is_empty());
        }

        let envelope = DetectorBuilder::new(8000)
            .build_envelope_detector()
            .expect("valid configuration");
        assert!(segment(envelope, &[0.0f32; 4000]).is_empty());
    }

    #[test]
    fn test_trailing_interval_closed() {
        let sig = keyed_tone(800.0, 2048.0, 12800, &[(false, 50.0), (true, 120.0)]);
        let mut uut = Segmenter::new(cw_session());
        assert_eq!(0, uut.push(&sig));
        assert!(uut.is_open());

        let segments = uut.finish();
        assert_eq!(1, segments.len());
        assert_eq!(640, segments.intervals()[0].start());
        assert_eq!(sig.len() as u64, segments.intervals()[0].end());
        assert!(!uut.is_open());
    }

    #[test]
    fn test_idempotent() {
        let sig = keyed_tone(
            800.0,
            1500.0,
            12800,
            &[(false, 30.0), (true, 70.0), (false, 40.0), (true, 30.0), (false, 60.0)],
        );
        let first = segment(cw_session(), &sig);
        let second = segment(cw_session(), &sig);
        assert_eq!(2, first.len());
        assert_eq!(first, second);

        // a reset session is as good as a fresh one
        let mut uut = Segmenter::new(cw_session());
        uut.push(&sig[..1000]);
        uut.reset();
        uut.push(&sig);
        assert_eq!(first, uut.finish());
    }

    #[test]
    fn test_chunked_push() {
        let sig = keyed_tone(
            800.0,
            2048.0,
            12800,
            &[(true, 40.0), (false, 20.0), (true, 60.0), (false, 30.0)],
        );
        let expect = segment(cw_session(), &sig);

        let mut uut = Segmenter::new(cw_session());
        for chunk in sig.chunks(100) {
            uut.push(chunk);
        }
        assert_eq!(expect, uut.finish());
    }

    #[test]
    fn test_ordered_and_disjoint() {
        let sig = keyed_tone(
            800.0,
            2048.0,
            12800,
            &[
                (true, 20.0),
                (false, 20.0),
                (true, 30.0),
                (false, 10.0),
                (true, 50.0),
                (false, 40.0),
                (true, 10.0),
            ],
        );
        let segments = segment(cw_session(), &sig);
        assert_eq!(4, segments.len());
        for w in segments.intervals().windows(2) {
            assert!(w[0].end() <= w[1].start());
            assert!(w[0].start() < w[1].start());
        }
    }

    #[test]
    fn test_two_tone_black_spans() {
        let session = DetectorBuilder::new(12800)
            .with_block_size(64)
            .with_two_tone_frequencies(1600.0, 2400.0)
            .build_two_tone_session()
            .expect("valid configuration");
        let sig = alternating_tones(1600.0, 2400.0, 1000.0, 12800, 300.0, 200.0, 3);
        let segments = segment(session, &sig);
        assert_eq!(3, segments.len());
        for d in segments.durations_ms() {
            assert_approx_eq!(200.0f64, d);
        }
        for g in segments.gaps_ms() {
            assert_approx_eq!(300.0f64, g);
        }
    }

    #[test]
    fn test_envelope_segments() {
        let mut det = DetectorBuilder::new(8000)
            .with_envelope_smoothing(64)
            .build_envelope_detector()
            .expect("valid configuration");
        let sig = keyed_tone(
            1000.0,
            500.0,
            8000,
            &[(false, 50.0), (true, 100.0), (false, 100.0), (true, 50.0), (false, 50.0)],
        );

        // borrow the detector instead of moving it
        let segments = segment(&mut det, &sig);
        assert_eq!(2, segments.len());
        assert_eq!(1, LevelDetector::samples_per_decision(&det));
        let durations = segments.durations_ms();
        assert_approx_eq!(100.0f64, durations[0], 5.0f64);
        assert_approx_eq!(50.0f64, durations[1], 5.0f64);
        assert!(det.last_max() > 0.0f32);
    }

    #[test]
    fn test_envelope_chunked_push() {
        // a quiet pulse stays below the threshold set by the loud one
        let mut sig = keyed_tone(1000.0, 100.0, 8000, &[(false, 50.0), (true, 100.0), (false, 100.0)]);
        sig.extend(keyed_tone(1000.0, 1000.0, 8000, &[(true, 100.0), (false, 50.0)]));

        let build = || {
            DetectorBuilder::new(8000)
                .with_envelope_smoothing(64)
                .build_envelope_detector()
                .expect("valid configuration")
        };
        let expect = segment(build(), &sig);
        assert_eq!(1, expect.len());
        assert_approx_eq!(100.0f64, expect.durations_ms()[0], 5.0f64);

        let mut uut = Segmenter::new(build());
        let (left, right) = sig.split_at(sig.len() / 2);
        assert_eq!(0, uut.push(left));
        assert_eq!(0, uut.push(right));
        assert_eq!(expect, uut.finish());

        let mut uut = Segmenter::new(build());
        for chunk in sig.chunks(333) {
            uut.push(chunk);
        }
        assert_eq!(expect, uut.finish());
    }
}
