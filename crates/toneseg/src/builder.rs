use std::convert::TryFrom;

use thiserror::Error;

use crate::envelope::{EnvelopeDetector, MAX_ENVELOPE_SMOOTHING};
use crate::filter::BlockWindow;
use crate::goertzel::MAX_BINS;
use crate::session::{ToneSession, TwoToneSession, MAX_BLOCK_SIZE};

/// Invalid detector configuration
///
/// Returned by the `build_*()` methods of [`DetectorBuilder`].
/// Configuration is the only thing in this crate which can
/// fail: once built, a detector accepts any input.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// The sampling rate is zero
    #[error("sampling rate must be positive")]
    SampleRate,

    /// The block size is zero or too large
    #[error("block size {0} must be between 1 and {max}", max = MAX_BLOCK_SIZE)]
    BlockSize(usize),

    /// The noise floor smoothing weight is outside `(0, 1]`
    #[error("noise floor alpha {0} is outside (0, 1]")]
    NoiseFloorAlpha(f32),

    /// The bin count is zero or too large
    #[error("bin count {0} must be between 1 and {max}", max = MAX_BINS)]
    BinCount(usize),

    /// The black and white tones land in the same bin
    #[error("two-tone mode needs two distinct bins, but {black_hz} Hz and {white_hz} Hz share one")]
    IndistinctTones {
        /// Black tone frequency (Hz)
        black_hz: f32,

        /// White tone frequency (Hz)
        white_hz: f32,
    },

    /// A bin frequency is not between zero and Nyquist
    #[error("frequency {0} Hz is outside (0, {1}) Hz")]
    Frequency(f32, f32),

    /// A threshold, ratio, or spacing is out of range
    #[error("invalid {name}: {value}")]
    Parameter {
        /// Option name
        name: &'static str,

        /// Rejected value
        value: f32,
    },
}

/// Builds tone detectors
///
/// The builder comes with a sensible set of default options.
/// All you really need to provide is the input sampling rate.
/// The thresholds assume samples on roughly a 12-bit scale,
/// with full-scale at ±2048. If your samples are normalized to
/// ±1.0, scale them up or scale the thresholds down.
///
/// One builder can build any of the three detectors:
///
/// * [`build_tone_session()`](#method.build_tone_session): single
///   keyed tone (CW), with an adaptive noise floor
/// * [`build_two_tone_session()`](#method.build_two_tone_session):
///   black/white weather-fax tones
/// * [`build_envelope_detector()`](#method.build_envelope_detector):
///   whole-buffer envelope threshold, for unknown frequencies
///
/// Setters never fail. All options are checked when a detector
/// is built, and only the options which that detector uses are
/// checked.
///
/// The actual default values are *not* part of this crate's API
/// and are subject to revision in any minor release. If you
/// care very strongly about a setting, be sure to configure it
/// here.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorBuilder {
    sample_rate: u32,
    block_size: usize,
    block_window: BlockWindow,
    center_frequency: f32,
    bin_count: usize,
    bin_spacing: f32,
    activation_margin: f32,
    release_factor: f32,
    minimum_dynamic_threshold: f32,
    minimum_peak_ratio: f32,
    release_hold_blocks: u32,
    noise_floor_alpha: f32,
    black_frequency: f32,
    white_frequency: f32,
    two_tone_hysteresis_multiplier: f32,
    two_tone_minimum_power: f32,
    two_tone_integer_bins: bool,
    envelope_smoothing: usize,
    envelope_threshold_ratio: f32,
}

impl DetectorBuilder {
    /// New detector builder with "sensible" defaults
    ///
    /// The only mandatory parameter is the input sampling rate,
    /// in Hz.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            block_size: 128,
            block_window: BlockWindow::Rectangular,
            center_frequency: 800.0f32,
            bin_count: 5,
            bin_spacing: 100.0f32,
            activation_margin: 3000.0f32,
            release_factor: 0.55f32,
            minimum_dynamic_threshold: 1200.0f32,
            minimum_peak_ratio: 1.8f32,
            release_hold_blocks: 0,
            noise_floor_alpha: 0.10f32,
            black_frequency: 1500.0f32,
            white_frequency: 2300.0f32,
            two_tone_hysteresis_multiplier: 5.0f32,
            two_tone_minimum_power: 500.0f32,
            two_tone_integer_bins: true,
            envelope_smoothing: 96,
            envelope_threshold_ratio: 0.35f32,
        }
    }

    /// Build a single-tone (CW) session
    ///
    /// Once built, the session is immediately ready to process
    /// samples.
    pub fn build_tone_session(&self) -> Result<ToneSession, ConfigError> {
        ToneSession::try_from(self)
    }

    /// Build a two-tone (weather-fax) session
    pub fn build_two_tone_session(&self) -> Result<TwoToneSession, ConfigError> {
        TwoToneSession::try_from(self)
    }

    /// Build a whole-buffer envelope detector
    pub fn build_envelope_detector(&self) -> Result<EnvelopeDetector, ConfigError> {
        EnvelopeDetector::try_from(self)
    }

    /// Block size (samples)
    ///
    /// The Goertzel sessions make one decision per block, so the
    /// block size and sampling rate together set the time
    /// resolution. At most [`MAX_BLOCK_SIZE`] samples.
    pub fn with_block_size(&mut self, block_size: usize) -> &mut Self {
        self.block_size = block_size;
        self
    }

    /// Block taper
    ///
    /// The default rectangular window works best when the bins
    /// fall on exact DFT frequencies of the block.
    pub fn with_block_window(&mut self, window: BlockWindow) -> &mut Self {
        self.block_window = window;
        self
    }

    /// Single-tone center frequency (Hz)
    pub fn with_center_frequency(&mut self, hz: f32) -> &mut Self {
        self.center_frequency = hz;
        self
    }

    /// Single-tone bin layout
    ///
    /// Places `count` bins `spacing` Hz apart, with the middle
    /// bin on the center frequency. The extra bins let the
    /// session follow a drifting or mistuned tone, and the bins
    /// farther away from the tone measure the noise floor.
    pub fn with_bins(&mut self, count: usize, spacing: f32) -> &mut Self {
        self.bin_count = count;
        self.bin_spacing = spacing;
        self
    }

    /// Activation thresholds
    ///
    /// To activate, the strongest bin must exceed the noise floor
    /// by `margin`, and it must be at least `minimum` in any case.
    /// Linear magnitudes.
    pub fn with_activation(&mut self, margin: f32, minimum: f32) -> &mut Self {
        self.activation_margin = margin;
        self.minimum_dynamic_threshold = minimum;
        self
    }

    /// Release factor
    ///
    /// Once active, the tone stays active until it drops below
    /// `noise_floor + margin * factor`. Values below 1.0 give
    /// hysteresis.
    pub fn with_release_factor(&mut self, factor: f32) -> &mut Self {
        self.release_factor = factor;
        self
    }

    /// Minimum peak ratio
    ///
    /// The strongest bin must be this many times stronger than
    /// the second strongest to activate. Broadband noise, which
    /// raises every bin at once, fails this test.
    pub fn with_minimum_peak_ratio(&mut self, ratio: f32) -> &mut Self {
        self.minimum_peak_ratio = ratio;
        self
    }

    /// Release hold (blocks)
    ///
    /// Number of weak blocks to ride through before releasing.
    /// Zero releases immediately.
    pub fn with_release_hold_blocks(&mut self, blocks: u32) -> &mut Self {
        self.release_hold_blocks = blocks;
        self
    }

    /// Noise floor smoothing weight
    ///
    /// Weight given to each block's noise sample, in `(0, 1]`.
    /// Larger values track changing noise faster.
    pub fn with_noise_floor_alpha(&mut self, alpha: f32) -> &mut Self {
        self.noise_floor_alpha = alpha;
        self
    }

    /// Two-tone black and white frequencies (Hz)
    pub fn with_two_tone_frequencies(&mut self, black_hz: f32, white_hz: f32) -> &mut Self {
        self.black_frequency = black_hz;
        self.white_frequency = white_hz;
        self
    }

    /// Two-tone hysteresis multiplier
    ///
    /// One tone's power must be this many times the other's for
    /// a block to decide a level. At least 1.0.
    pub fn with_two_tone_hysteresis_multiplier(&mut self, mult: f32) -> &mut Self {
        self.two_tone_hysteresis_multiplier = mult;
        self
    }

    /// Two-tone minimum power
    ///
    /// Blocks whose summed black and white power is at or below
    /// this value are uncertain. Power is `magnitude² / N`.
    pub fn with_two_tone_minimum_power(&mut self, power: f32) -> &mut Self {
        self.two_tone_minimum_power = power;
        self
    }

    /// Round the two-tone frequencies to whole DFT bins
    pub fn with_two_tone_integer_bins(&mut self, enable: bool) -> &mut Self {
        self.two_tone_integer_bins = enable;
        self
    }

    /// Envelope moving-average length (samples)
    ///
    /// Zero or one disables smoothing. Lengths above
    /// [`MAX_ENVELOPE_SMOOTHING`](crate::MAX_ENVELOPE_SMOOTHING)
    /// are rejected when the detector is built.
    pub fn with_envelope_smoothing(&mut self, samples: usize) -> &mut Self {
        self.envelope_smoothing = samples;
        self
    }

    /// Envelope threshold, as a fraction of the envelope maximum
    pub fn with_envelope_threshold_ratio(&mut self, ratio: f32) -> &mut Self {
        self.envelope_threshold_ratio = ratio;
        self
    }

    /// Input sampling rate (Hz)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Block size (samples)
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Block taper
    pub fn block_window(&self) -> BlockWindow {
        self.block_window
    }

    /// Single-tone center frequency (Hz)
    pub fn center_frequency(&self) -> f32 {
        self.center_frequency
    }

    /// Number of single-tone bins
    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    /// Single-tone bin spacing (Hz)
    pub fn bin_spacing(&self) -> f32 {
        self.bin_spacing
    }

    /// Activation margin above the noise floor
    pub fn activation_margin(&self) -> f32 {
        self.activation_margin
    }

    /// Lower bound on the activation threshold
    pub fn minimum_dynamic_threshold(&self) -> f32 {
        self.minimum_dynamic_threshold
    }

    /// Release factor
    pub fn release_factor(&self) -> f32 {
        self.release_factor
    }

    /// Minimum peak ratio
    pub fn minimum_peak_ratio(&self) -> f32 {
        self.minimum_peak_ratio
    }

    /// Release hold (blocks)
    pub fn release_hold_blocks(&self) -> u32 {
        self.release_hold_blocks
    }

    /// Noise floor smoothing weight
    pub fn noise_floor_alpha(&self) -> f32 {
        self.noise_floor_alpha
    }

    /// Two-tone (`black`, `white`) frequencies (Hz)
    pub fn two_tone_frequencies(&self) -> (f32, f32) {
        (self.black_frequency, self.white_frequency)
    }

    /// Two-tone hysteresis multiplier
    pub fn two_tone_hysteresis_multiplier(&self) -> f32 {
        self.two_tone_hysteresis_multiplier
    }

    /// Two-tone minimum power
    pub fn two_tone_minimum_power(&self) -> f32 {
        self.two_tone_minimum_power
    }

    /// True if two-tone frequencies are rounded to whole bins
    pub fn two_tone_integer_bins(&self) -> bool {
        self.two_tone_integer_bins
    }

    /// Envelope moving-average length (samples)
    pub fn envelope_smoothing(&self) -> usize {
        self.envelope_smoothing
    }

    /// Envelope threshold ratio
    pub fn envelope_threshold_ratio(&self) -> f32 {
        self.envelope_threshold_ratio
    }

    // Check the options shared by both Goertzel sessions
    fn validate_blocks(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::SampleRate);
        }
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(ConfigError::BlockSize(self.block_size));
        }
        Ok(())
    }

    // Check the options used by the single-tone session
    pub(crate) fn validate_tone(&self) -> Result<(), ConfigError> {
        self.validate_blocks()?;

        if !(self.noise_floor_alpha > 0.0f32 && self.noise_floor_alpha <= 1.0f32) {
            return Err(ConfigError::NoiseFloorAlpha(self.noise_floor_alpha));
        }
        if self.bin_count == 0 || self.bin_count > MAX_BINS {
            return Err(ConfigError::BinCount(self.bin_count));
        }
        if self.bin_count > 1 && !(self.bin_spacing.is_finite() && self.bin_spacing > 0.0f32) {
            return Err(ConfigError::Parameter {
                name: "bin spacing",
                value: self.bin_spacing,
            });
        }

        let center_index = (self.bin_count / 2) as f32;
        for i in 0..self.bin_count {
            self.check_frequency(self.center_frequency + (i as f32 - center_index) * self.bin_spacing)?;
        }

        non_negative("activation margin", self.activation_margin)?;
        non_negative("release factor", self.release_factor)?;
        non_negative("minimum dynamic threshold", self.minimum_dynamic_threshold)?;
        non_negative("minimum peak ratio", self.minimum_peak_ratio)?;
        Ok(())
    }

    // Check the options used by the two-tone session
    pub(crate) fn validate_two_tone(&self) -> Result<(), ConfigError> {
        self.validate_blocks()?;

        self.check_frequency(self.black_frequency)?;
        self.check_frequency(self.white_frequency)?;
        let (black_bin, white_bin) = if self.two_tone_integer_bins {
            (
                self.integer_bin(self.black_frequency),
                self.integer_bin(self.white_frequency),
            )
        } else {
            (self.black_frequency, self.white_frequency)
        };
        if black_bin == white_bin {
            return Err(ConfigError::IndistinctTones {
                black_hz: self.black_frequency,
                white_hz: self.white_frequency,
            });
        }

        if !(self.two_tone_hysteresis_multiplier.is_finite()
            && self.two_tone_hysteresis_multiplier >= 1.0f32)
        {
            return Err(ConfigError::Parameter {
                name: "two-tone hysteresis multiplier",
                value: self.two_tone_hysteresis_multiplier,
            });
        }
        non_negative("two-tone minimum power", self.two_tone_minimum_power)?;
        Ok(())
    }

    // Check the options used by the envelope detector
    pub(crate) fn validate_envelope(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::SampleRate);
        }
        if self.envelope_smoothing > MAX_ENVELOPE_SMOOTHING {
            return Err(ConfigError::Parameter {
                name: "envelope smoothing",
                value: self.envelope_smoothing as f32,
            });
        }
        let ratio = self.envelope_threshold_ratio;
        if !(ratio.is_finite() && (0.0f32..=1.0f32).contains(&ratio)) {
            return Err(ConfigError::Parameter {
                name: "envelope threshold ratio",
                value: ratio,
            });
        }
        Ok(())
    }

    fn check_frequency(&self, hz: f32) -> Result<(), ConfigError> {
        let nyquist = self.sample_rate as f32 / 2.0f32;
        if hz.is_finite() && hz > 0.0f32 && hz < nyquist {
            Ok(())
        } else {
            Err(ConfigError::Frequency(hz, nyquist))
        }
    }

    // Nearest DFT bin of a block, as used by integer-bin tuning
    fn integer_bin(&self, hz: f32) -> f32 {
        f32::floor(self.block_size as f32 * hz / self.sample_rate as f32 + 0.5f32)
    }
}

impl std::default::Default for DetectorBuilder {
    fn default() -> Self {
        Self::new(11025)
    }
}

fn non_negative(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0f32 {
        Ok(())
    } else {
        Err(ConfigError::Parameter { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_build() {
        let builder = DetectorBuilder::default();
        assert_eq!(11025, builder.sample_rate());
        assert_eq!(128, builder.block_size());
        assert_eq!((1500.0f32, 2300.0f32), builder.two_tone_frequencies());
        assert!(builder.build_tone_session().is_ok());
        assert!(builder.build_two_tone_session().is_ok());
        assert!(builder.build_envelope_detector().is_ok());

        let session = builder.build_tone_session().expect("session");
        assert_eq!(5, session.bank().len());
        assert_eq!(2, session.active_bin());
    }

    #[test]
    fn test_setters() {
        let mut builder = DetectorBuilder::new(8000);
        builder
            .with_block_size(64)
            .with_block_window(BlockWindow::Hann)
            .with_bins(3, 50.0)
            .with_activation(100.0, 10.0)
            .with_release_factor(0.5)
            .with_minimum_peak_ratio(2.0)
            .with_release_hold_blocks(4)
            .with_noise_floor_alpha(0.25)
            .with_envelope_smoothing(0)
            .with_envelope_threshold_ratio(0.5);
        assert_eq!(64, builder.block_size());
        assert_eq!(BlockWindow::Hann, builder.block_window());
        assert_eq!(3, builder.bin_count());
        assert_eq!(50.0f32, builder.bin_spacing());
        assert_eq!(100.0f32, builder.activation_margin());
        assert_eq!(10.0f32, builder.minimum_dynamic_threshold());
        assert_eq!(4, builder.release_hold_blocks());
        assert_eq!(0.25f32, builder.noise_floor_alpha());

        let det = builder.build_envelope_detector().expect("detector");
        assert_eq!(0.5f32, det.threshold_ratio());
        assert_eq!(8000, det.sample_rate());
    }

    #[test]
    fn test_invalid_common() {
        assert_eq!(
            Err(ConfigError::SampleRate),
            DetectorBuilder::new(0).build_tone_session().map(|_| ())
        );
        assert_eq!(
            Err(ConfigError::SampleRate),
            DetectorBuilder::new(0).build_envelope_detector().map(|_| ())
        );
        assert_eq!(
            Err(ConfigError::BlockSize(0)),
            DetectorBuilder::new(8000)
                .with_block_size(0)
                .build_two_tone_session()
                .map(|_| ())
        );
        assert_eq!(
            Err(ConfigError::BlockSize(MAX_BLOCK_SIZE + 1)),
            DetectorBuilder::new(8000)
                .with_block_size(MAX_BLOCK_SIZE + 1)
                .build_tone_session()
                .map(|_| ())
        );
    }

    #[test]
    fn test_invalid_tone() {
        for alpha in [0.0f32, -0.1, 1.5, f32::NAN] {
            assert!(matches!(
                DetectorBuilder::new(8000)
                    .with_noise_floor_alpha(alpha)
                    .build_tone_session(),
                Err(ConfigError::NoiseFloorAlpha(_))
            ));
        }
        assert!(DetectorBuilder::new(8000)
            .with_noise_floor_alpha(1.0)
            .build_tone_session()
            .is_ok());

        assert_eq!(
            Err(ConfigError::BinCount(MAX_BINS + 1)),
            DetectorBuilder::new(8000)
                .with_bins(MAX_BINS + 1, 10.0)
                .build_tone_session()
                .map(|_| ())
        );

        // lowest bin at 800 - 2 * 400 = 0 Hz
        assert_eq!(
            Err(ConfigError::Frequency(0.0, 4000.0)),
            DetectorBuilder::new(8000)
                .with_bins(5, 400.0)
                .build_tone_session()
                .map(|_| ())
        );

        // a single bin needs no spacing
        assert!(DetectorBuilder::new(8000)
            .with_bins(1, 0.0)
            .build_tone_session()
            .is_ok());

        let err = DetectorBuilder::new(8000)
            .with_minimum_peak_ratio(f32::INFINITY)
            .build_tone_session()
            .map(|_| ())
            .expect_err("must fail");
        assert_eq!("invalid minimum peak ratio: inf", err.to_string());
    }

    #[test]
    fn test_invalid_two_tone() {
        // both round to bin 24 of 128 at 8 kHz
        assert!(matches!(
            DetectorBuilder::new(8000)
                .with_two_tone_frequencies(1500.0, 1510.0)
                .build_two_tone_session(),
            Err(ConfigError::IndistinctTones { .. })
        ));
        assert!(DetectorBuilder::new(8000)
            .with_two_tone_frequencies(1500.0, 1510.0)
            .with_two_tone_integer_bins(false)
            .build_two_tone_session()
            .is_ok());

        assert!(matches!(
            DetectorBuilder::new(4000).build_two_tone_session(),
            Err(ConfigError::Frequency(_, _))
        ));
        assert!(matches!(
            DetectorBuilder::new(8000)
                .with_two_tone_hysteresis_multiplier(0.5)
                .build_two_tone_session(),
            Err(ConfigError::Parameter { .. })
        ));

        // single-tone options are not checked
        assert!(DetectorBuilder::new(8000)
            .with_noise_floor_alpha(0.0)
            .build_two_tone_session()
            .is_ok());
    }

    #[test]
    fn test_invalid_envelope() {
        assert!(matches!(
            DetectorBuilder::new(8000)
                .with_envelope_threshold_ratio(1.5)
                .build_envelope_detector(),
            Err(ConfigError::Parameter { .. })
        ));

        assert_eq!(
            Err(ConfigError::Parameter {
                name: "envelope smoothing",
                value: usize::MAX as f32,
            }),
            DetectorBuilder::new(8000)
                .with_envelope_smoothing(usize::MAX)
                .build_envelope_detector()
                .map(|_| ())
        );
        assert!(DetectorBuilder::new(8000)
            .with_envelope_smoothing(MAX_ENVELOPE_SMOOTHING + 1)
            .build_envelope_detector()
            .is_err());
        assert!(DetectorBuilder::new(8000)
            .with_envelope_smoothing(MAX_ENVELOPE_SMOOTHING)
            .build_envelope_detector()
            .is_ok());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            "block size 0 must be between 1 and 4096",
            ConfigError::BlockSize(0).to_string()
        );
        assert_eq!(
            "bin count 20 must be between 1 and 16",
            ConfigError::BinCount(20).to_string()
        );
    }
}
