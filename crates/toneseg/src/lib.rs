//! # toneseg: Tone and Level Segmentation
//!
//! This crate turns a stream of audio samples into a timed
//! sequence of on/off intervals. It was built for keyed radio
//! signals:
//!
//! * **CW** (Morse): a single tone which is keyed on and off
//! * **Weather fax** phasing: alternating black and white tones
//!
//! Decoding the protocol carried by these intervals, like Morse
//! symbols or fax images, is beyond the scope of this crate. So
//! is reading audio files and resampling them.
//!
//! ## Example
//!
//! You will first need mono audio at a known sampling rate. The
//! default thresholds assume samples scaled to about ±2048, like
//! a 12-bit ADC.
//!
//! ```
//! use toneseg::{DetectorBuilder, Segmenter};
//!
//! # let some_audio_source = || vec![vec![0.0f32; 512]; 4];
//! #
//! // create a session with your audio sampling rate
//! let session = DetectorBuilder::new(8000)
//!     .with_block_size(64)             // one decision every 8 ms
//!     .with_center_frequency(700.0)    // expected tone (Hz)
//!     .with_bins(5, 100.0)             // track ±200 Hz of drift
//!     .build_tone_session()
//!     .expect("invalid configuration");
//!
//! // feed it chunks of any size, as they arrive
//! let mut segmenter = Segmenter::new(session);
//! for chunk in some_audio_source() {
//!     segmenter.push(&chunk);
//! }
//!
//! // close the last interval and summarize
//! let segments = segmenter.finish();
//! for iv in &segments {
//!     println!("tone from {} to {}", iv.start(), iv.end());
//! }
//! println!("pulses: {}", segments.interval_stats());
//! println!("gaps: {}", segments.gap_stats());
//! ```
//!
//! ## Detectors
//!
//! All three detectors are created by one
//! [builder](DetectorBuilder), which checks the configuration.
//! Each implements [`LevelDetector`], so any of them can feed a
//! [`Segmenter`].
//!
//! * [`ToneSession`] runs a small bank of Goertzel bins around
//!   the expected tone. An adaptive noise floor, fed by the bins
//!   away from the tone, sets the thresholds of a hysteresis
//!   classifier. The session follows the tone if it drifts into
//!   a neighboring bin.
//!
//! * [`TwoToneSession`] compares the power of a black tone and a
//!   white tone. Blocks where neither dominates are uncertain
//!   and keep the last decided level. Every white → black change
//!   is recorded in an [`EdgeTrain`], which reports the phasing
//!   period.
//!
//! * [`EnvelopeDetector`] thresholds the smoothed analytic-signal
//!   envelope of a whole recording at a fraction of its maximum.
//!   Use it when the tone frequency is unknown. It collects
//!   pushed samples and decides them when the stream is
//!   finished.
//!
//! The Goertzel sessions are streaming. They process one block
//! at a time and give identical results no matter how their
//! input is chunked, so they suit both offline analysis and
//! sample-at-a-time embedded use.
//!
//! ## Time
//!
//! All positions are counted in input samples since the session
//! began. [`Interval`] and [`Segments`] convert them to
//! milliseconds.

mod builder;
mod classifier;
mod envelope;
mod filter;
mod goertzel;
mod interval;
mod noisefloor;
mod segment;
mod session;
mod stats;

#[cfg(test)]
mod waveform;

pub use builder::{ConfigError, DetectorBuilder};
pub use classifier::{
    FaxLevel, ToneClassifier, ToneDecision, ToneState, ToneThresholds, Transition,
    TwoToneClassifier, TwoToneDecision, TwoToneThresholds,
};
pub use envelope::{EnvelopeDetector, EnvelopeExtractor, MAX_ENVELOPE_SMOOTHING};
pub use filter::{smooth_centered, BlockWindow, MovingAverage};
pub use goertzel::{BinPeak, GoertzelBin, GoertzelBinBank, MAX_BINS};
pub use interval::{
    extract_intervals, samples_to_ms, EdgeTrain, Interval, IntervalExtractor, TransitionDetector,
};
pub use noisefloor::{noise_sample, NoiseFloorTracker};
pub use segment::{segment, LevelDetector, Segmenter, Segments};
pub use session::{FaxBlock, ToneBlock, ToneSession, TwoToneSession, MAX_BLOCK_SIZE};
pub use stats::{DurationStats, DurationSummary};
