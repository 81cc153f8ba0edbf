//! Streaming detector sessions
//!
//! A session owns every piece of state for one detection run:
//! the Goertzel bins, the noise floor, the classifier, and a
//! buffer of samples which do not yet fill a block. Sessions
//! accept samples in slices of any size with `push()`. The
//! results never depend on how the input is chunked.
//!
//! Sessions are independent of one another. Build them with a
//! [`DetectorBuilder`](crate::DetectorBuilder).

mod output;

pub use output::{FaxBlock, ToneBlock};

#[cfg(not(test))]
use log::{debug, info, trace};

#[cfg(test)]
use std::{println as debug, println as info, println as trace};

use std::convert::TryFrom;

use arrayvec::ArrayVec;

use crate::builder::{ConfigError, DetectorBuilder};
use crate::classifier::{
    FaxLevel, ToneClassifier, ToneState, ToneThresholds, TwoToneClassifier, TwoToneThresholds,
};
use crate::goertzel::{BinPeak, GoertzelBinBank};
use crate::interval::{samples_to_ms, EdgeTrain, TransitionDetector};
use crate::noisefloor::NoiseFloorTracker;
use crate::segment::LevelDetector;

/// Largest supported block size, in samples
pub const MAX_BLOCK_SIZE: usize = 4096;

/// Single-tone (CW) detector session
///
/// Runs a bank of Goertzel bins around the expected tone
/// frequency. Each block updates the adaptive noise floor and
/// then the hysteresis classifier, which decides whether the
/// tone is keyed.
///
/// ```
/// use toneseg::DetectorBuilder;
///
/// let mut session = DetectorBuilder::new(8000)
///     .with_block_size(64)
///     .with_center_frequency(700.0)
///     .build_tone_session()
///     .expect("valid configuration");
///
/// let mut blocks = vec![];
/// session.push(&[0.0f32; 200], &mut blocks);
/// assert_eq!(3, blocks.len());
/// assert!(!blocks[2].is_active());
/// ```
#[derive(Clone, Debug)]
pub struct ToneSession {
    chain: ToneChain,
    buffer: BlockBuffer,
    sample_rate: u32,
    input_sample_counter: u64,
}

impl ToneSession {
    /// Push samples
    ///
    /// Appends one [`ToneBlock`] to `out` for every block which
    /// `samples` completes. Leftover samples are kept until the
    /// next call. Returns the number of blocks appended.
    pub fn push(&mut self, samples: &[f32], out: &mut Vec<ToneBlock>) -> usize {
        let before = out.len();
        for &sa in samples {
            self.input_sample_counter = self.input_sample_counter.wrapping_add(1);
            if let Some(block) = self.buffer.input(sa) {
                out.extend(self.chain.process(block));
            }
        }
        out.len() - before
    }

    /// Process exactly one block
    ///
    /// Bypasses the `push()` buffer. Blocks longer than the
    /// configured block size are truncated, and shorter blocks
    /// still take up one whole block of session time. Samples
    /// waiting in the `push()` buffer are discarded. An empty
    /// block is ignored and returns `None`.
    pub fn process_block(&mut self, block: &[f32]) -> Option<ToneBlock> {
        let out = self.chain.process(block)?;
        let dropped = self.buffer.len() as u64;
        self.buffer.reset();
        self.input_sample_counter = self
            .input_sample_counter
            .wrapping_sub(dropped)
            .wrapping_add(self.block_size() as u64);
        Some(out)
    }

    /// Clear all state and reset to zero initial conditions
    ///
    /// The session behaves exactly as if it were freshly built.
    pub fn reset(&mut self) {
        self.chain.reset();
        self.buffer.reset();
        self.input_sample_counter = 0;
    }

    /// Input sampling rate (Hz)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Block size, in samples
    pub fn block_size(&self) -> usize {
        self.buffer.block_size()
    }

    /// Lifetime total input sample counter
    ///
    /// Includes samples which are still waiting in the buffer
    /// for their block to fill.
    pub fn input_sample_counter(&self) -> u64 {
        self.input_sample_counter
    }

    /// Blocks processed so far
    pub fn block_counter(&self) -> u64 {
        self.chain.block_counter
    }

    /// Samples waiting for their block to fill
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Current classifier state
    pub fn state(&self) -> ToneState {
        self.chain.classifier.state()
    }

    /// True if the tone is present
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Current noise floor
    pub fn noise_floor(&self) -> f32 {
        self.chain.noise.floor()
    }

    /// Current tracking center (bin index)
    pub fn active_bin(&self) -> usize {
        self.chain.classifier.active_bin()
    }

    /// The Goertzel bins
    pub fn bank(&self) -> &GoertzelBinBank {
        &self.chain.bank
    }
}

impl TryFrom<&DetectorBuilder> for ToneSession {
    type Error = ConfigError;

    /// Create the session from its builder
    fn try_from(cfg: &DetectorBuilder) -> Result<Self, Self::Error> {
        cfg.validate_tone()?;

        let bank = GoertzelBinBank::evenly_spaced(
            cfg.center_frequency(),
            cfg.bin_spacing(),
            cfg.bin_count(),
            cfg.sample_rate(),
            cfg.block_size(),
            cfg.block_window(),
        );
        let thresholds = ToneThresholds {
            activation_margin: cfg.activation_margin(),
            release_factor: cfg.release_factor(),
            minimum_dynamic_threshold: cfg.minimum_dynamic_threshold(),
            minimum_peak_ratio: cfg.minimum_peak_ratio(),
            release_hold_blocks: cfg.release_hold_blocks(),
        };
        let center_bin = bank.len() / 2;

        info!(
            "tone session: {} Hz, block {} samples ({:.1} ms), {} bins at {} ± {} Hz",
            cfg.sample_rate(),
            cfg.block_size(),
            samples_to_ms(cfg.block_size() as u64, cfg.sample_rate()),
            bank.len(),
            cfg.center_frequency(),
            cfg.bin_spacing()
        );

        Ok(Self {
            chain: ToneChain {
                bank,
                noise: NoiseFloorTracker::new(cfg.noise_floor_alpha()),
                classifier: ToneClassifier::new(thresholds, center_bin),
                block_size: cfg.block_size(),
                block_counter: 0,
                trace_interval_blocks: trace_interval(cfg.sample_rate(), cfg.block_size()),
            },
            buffer: BlockBuffer::new(cfg.block_size()),
            sample_rate: cfg.sample_rate(),
            input_sample_counter: 0,
        })
    }
}

impl LevelDetector for ToneSession {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn samples_per_decision(&self) -> usize {
        self.block_size()
    }

    fn detect(&mut self, samples: &[f32], out: &mut Vec<bool>) {
        for &sa in samples {
            self.input_sample_counter = self.input_sample_counter.wrapping_add(1);
            if let Some(block) = self.buffer.input(sa) {
                out.extend(self.chain.process(block).map(|b| b.is_active()));
            }
        }
    }

    fn reset(&mut self) {
        ToneSession::reset(self)
    }
}

/// Two-tone (weather-fax) detector session
///
/// Measures the power of a black tone and a white tone in each
/// block and decides which one dominates. Every white → black
/// change is recorded as an edge; the spacing of these edges is
/// the phasing period.
///
/// ```
/// use toneseg::DetectorBuilder;
///
/// let mut session = DetectorBuilder::new(11025)
///     .with_block_size(64)
///     .with_two_tone_frequencies(1500.0, 2300.0)
///     .build_two_tone_session()
///     .expect("valid configuration");
///
/// let mut blocks = vec![];
/// session.push(&[0.0f32; 128], &mut blocks);
/// assert_eq!(2, blocks.len());
/// assert_eq!(None, session.held());
/// assert!(session.edges().is_empty());
/// ```
#[derive(Clone, Debug)]
pub struct TwoToneSession {
    chain: TwoToneChain,
    buffer: BlockBuffer,
    sample_rate: u32,
    input_sample_counter: u64,
}

impl TwoToneSession {
    /// Push samples
    ///
    /// Appends one [`FaxBlock`] to `out` for every block which
    /// `samples` completes. Leftover samples are kept until the
    /// next call. Returns the number of blocks appended.
    pub fn push(&mut self, samples: &[f32], out: &mut Vec<FaxBlock>) -> usize {
        let before = out.len();
        for &sa in samples {
            self.input_sample_counter = self.input_sample_counter.wrapping_add(1);
            if let Some(block) = self.buffer.input(sa) {
                out.extend(self.chain.process(block));
            }
        }
        out.len() - before
    }

    /// Process exactly one block
    ///
    /// Bypasses the `push()` buffer. Blocks longer than the
    /// configured block size are truncated, and shorter blocks
    /// still take up one whole block of session time. Samples
    /// waiting in the `push()` buffer are discarded. An empty
    /// block is ignored and returns `None`.
    pub fn process_block(&mut self, block: &[f32]) -> Option<FaxBlock> {
        let out = self.chain.process(block)?;
        let dropped = self.buffer.len() as u64;
        self.buffer.reset();
        self.input_sample_counter = self
            .input_sample_counter
            .wrapping_sub(dropped)
            .wrapping_add(self.block_size() as u64);
        Some(out)
    }

    /// Clear all state and reset to zero initial conditions
    ///
    /// Recorded edges are discarded.
    pub fn reset(&mut self) {
        self.chain.reset();
        self.buffer.reset();
        self.input_sample_counter = 0;
    }

    /// Input sampling rate (Hz)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Block size, in samples
    pub fn block_size(&self) -> usize {
        self.buffer.block_size()
    }

    /// Lifetime total input sample counter
    pub fn input_sample_counter(&self) -> u64 {
        self.input_sample_counter
    }

    /// Blocks processed so far
    pub fn block_counter(&self) -> u64 {
        self.chain.block_counter
    }

    /// Samples waiting for their block to fill
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Last decided level
    pub fn held(&self) -> Option<FaxLevel> {
        self.chain.classifier.held()
    }

    /// White → black edges seen so far
    pub fn edges(&self) -> &EdgeTrain {
        &self.chain.edges
    }

    /// The two Goertzel bins, black first
    pub fn bank(&self) -> &GoertzelBinBank {
        &self.chain.bank
    }
}

impl TryFrom<&DetectorBuilder> for TwoToneSession {
    type Error = ConfigError;

    /// Create the session from its builder
    fn try_from(cfg: &DetectorBuilder) -> Result<Self, Self::Error> {
        cfg.validate_two_tone()?;

        let (black_hz, white_hz) = cfg.two_tone_frequencies();
        let bank = GoertzelBinBank::with_frequencies(
            &[black_hz, white_hz],
            cfg.sample_rate(),
            cfg.block_size(),
            cfg.block_window(),
            cfg.two_tone_integer_bins(),
        );
        let thresholds = TwoToneThresholds {
            hysteresis_multiplier: cfg.two_tone_hysteresis_multiplier(),
            minimum_power: cfg.two_tone_minimum_power(),
        };

        info!(
            "two-tone session: {} Hz, block {} samples ({:.1} ms), black {} Hz, white {} Hz",
            cfg.sample_rate(),
            cfg.block_size(),
            samples_to_ms(cfg.block_size() as u64, cfg.sample_rate()),
            black_hz,
            white_hz
        );

        Ok(Self {
            chain: TwoToneChain {
                bank,
                classifier: TwoToneClassifier::new(thresholds),
                transitions: TransitionDetector::new(
                    FaxLevel::White,
                    FaxLevel::Black,
                    cfg.block_size(),
                ),
                edges: EdgeTrain::new(cfg.sample_rate()),
                block_size: cfg.block_size(),
                block_counter: 0,
                trace_interval_blocks: trace_interval(cfg.sample_rate(), cfg.block_size()),
            },
            buffer: BlockBuffer::new(cfg.block_size()),
            sample_rate: cfg.sample_rate(),
            input_sample_counter: 0,
        })
    }
}

impl LevelDetector for TwoToneSession {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn samples_per_decision(&self) -> usize {
        self.block_size()
    }

    /// Active while black is the held level
    fn detect(&mut self, samples: &[f32], out: &mut Vec<bool>) {
        for &sa in samples {
            self.input_sample_counter = self.input_sample_counter.wrapping_add(1);
            if let Some(block) = self.buffer.input(sa) {
                out.extend(
                    self.chain
                        .process(block)
                        .map(|b| b.held() == Some(FaxLevel::Black)),
                );
            }
        }
    }

    fn reset(&mut self) {
        TwoToneSession::reset(self)
    }
}

// Per-block DSP for the single-tone session
#[derive(Clone, Debug)]
struct ToneChain {
    bank: GoertzelBinBank,
    noise: NoiseFloorTracker,
    classifier: ToneClassifier,
    block_size: usize,
    block_counter: u64,
    trace_interval_blocks: u64,
}

impl ToneChain {
    fn process(&mut self, block: &[f32]) -> Option<ToneBlock> {
        if block.is_empty() {
            return None;
        }
        let block = &block[..usize::min(block.len(), self.block_size)];

        // 1. bin magnitudes
        let mags = self.bank.process(block);

        // 2. noise floor, from the bins away from the peak
        let peak = BinPeak::find(mags, self.classifier.active_bin());
        let floor = self.noise.update(mags, &peak);

        // 3. hysteresis
        let decision = self.classifier.classify(&peak, floor);

        let start = self.block_counter * self.block_size as u64;
        self.block_counter += 1;
        let out = ToneBlock::new(decision, start, self.block_size);

        if self.block_counter % self.trace_interval_blocks == 0 {
            trace!("tone {}", out);
        }
        if decision.transition.is_some() {
            debug!("tone [{:<14}]: {:?}", start, decision.transition);
        }

        Some(out)
    }

    fn reset(&mut self) {
        self.bank.reset();
        self.noise.reset();
        self.classifier.reset();
        self.block_counter = 0;
    }
}

// Per-block DSP for the two-tone session
#[derive(Clone, Debug)]
struct TwoToneChain {
    bank: GoertzelBinBank,
    classifier: TwoToneClassifier,
    transitions: TransitionDetector<FaxLevel>,
    edges: EdgeTrain,
    block_size: usize,
    block_counter: u64,
    trace_interval_blocks: u64,
}

impl TwoToneChain {
    fn process(&mut self, block: &[f32]) -> Option<FaxBlock> {
        if block.is_empty() {
            return None;
        }
        let block = &block[..usize::min(block.len(), self.block_size)];

        self.bank.process(block);
        let decision = self
            .classifier
            .classify(self.bank.power(0), self.bank.power(1));

        // the detector keeps its own block count in step with ours
        let edge = self.transitions.input(decision.decided);
        if let Some(pos) = edge {
            self.edges.push(pos);
            debug!(
                "two-tone [{:<14}]: white → black edge #{}",
                pos,
                self.edges.len()
            );
        }

        let start = self.block_counter * self.block_size as u64;
        self.block_counter += 1;
        let out = FaxBlock::new(decision, start, self.block_size, edge);

        if self.block_counter % self.trace_interval_blocks == 0 {
            trace!("two-tone {}", out);
        }

        Some(out)
    }

    fn reset(&mut self) {
        self.bank.reset();
        self.classifier.reset();
        self.transitions.reset();
        self.edges.clear();
        self.block_counter = 0;
    }
}

// Collects samples into whole blocks
//
// A completed block stays readable until the next sample
// arrives, which clears it.
#[derive(Clone, Debug)]
struct BlockBuffer {
    pending: ArrayVec<f32, MAX_BLOCK_SIZE>,
    block_size: usize,
}

impl BlockBuffer {
    fn new(block_size: usize) -> Self {
        Self {
            pending: ArrayVec::new(),
            block_size: usize::clamp(block_size, 1, MAX_BLOCK_SIZE),
        }
    }

    // Input one sample; returns the block if it is now complete
    #[inline]
    fn input(&mut self, sa: f32) -> Option<&[f32]> {
        if self.pending.len() >= self.block_size {
            self.pending.clear();
        }
        self.pending.push(sa);
        if self.pending.len() == self.block_size {
            Some(&self.pending)
        } else {
            None
        }
    }

    fn len(&self) -> usize {
        if self.pending.len() >= self.block_size {
            0
        } else {
            self.pending.len()
        }
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn reset(&mut self) {
        self.pending.clear();
    }
}

// Blocks between trace-level log messages: about once per second
fn trace_interval(sample_rate: u32, block_size: usize) -> u64 {
    u64::max(sample_rate as u64 / u64::max(block_size as u64, 1), 1)
}
