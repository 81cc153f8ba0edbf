//! Hysteresis level classifiers
//!
//! The [`ToneClassifier`] decides whether a single keyed tone is
//! present in each block. It uses two thresholds, both riding on
//! top of the adaptive noise floor:
//!
//! ```txt
//!                 ┌──────── strongest ≥ activation ∧ ratio ≥ min ────────┐
//!                 │                                                      ▼
//!           ┌──────────┐                                          ┌──────────┐
//!  start ──▶│ Inactive │                                          │  Active  │◀─┐
//!           └──────────┘                                          └──────────┘  │
//!                 ▲                                                  │   │      │
//!                 └──── strongest < release ∧ countdown == 0 ────────┘   └──────┘
//!                                                               strongest ≥ release
//! ```
//!
//! The [`TwoToneClassifier`] compares two fixed bins against each
//! other, as used for weather-fax black/white phasing. Blocks with
//! too little power, or where neither tone dominates, are
//! *uncertain* and leave the last decided level in place.

use std::fmt;

#[cfg(not(test))]
use log::debug;

#[cfg(test)]
use std::println as debug;

use crate::goertzel::BinPeak;

/// Single-tone classifier thresholds
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct ToneThresholds {
    /// Margin above the noise floor required to activate
    pub activation_margin: f32,

    /// Fraction of `activation_margin` required to stay active
    pub release_factor: f32,

    /// Lower bound on the activation threshold
    ///
    /// The release threshold is bounded by half of this.
    pub minimum_dynamic_threshold: f32,

    /// Minimum strongest-to-second-strongest bin ratio to activate
    pub minimum_peak_ratio: f32,

    /// Blocks to hold the tone after it falls below release
    pub release_hold_blocks: u32,
}

impl ToneThresholds {
    /// Activation threshold for the given noise floor
    #[inline]
    pub fn activation(&self, noise_floor: f32) -> f32 {
        f32::max(
            noise_floor + self.activation_margin,
            self.minimum_dynamic_threshold,
        )
    }

    /// Release threshold for the given noise floor
    #[inline]
    pub fn release(&self, noise_floor: f32) -> f32 {
        f32::max(
            noise_floor + self.activation_margin * self.release_factor,
            self.minimum_dynamic_threshold * 0.5f32,
        )
    }
}

impl Default for ToneThresholds {
    fn default() -> Self {
        Self {
            activation_margin: 3000.0f32,
            release_factor: 0.55f32,
            minimum_dynamic_threshold: 1200.0f32,
            minimum_peak_ratio: 1.8f32,
            release_hold_blocks: 0,
        }
    }
}

/// Tone classifier state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToneState {
    /// No tone present
    Inactive,

    /// Tone present
    ///
    /// `release` is the number of further weak blocks which
    /// will be tolerated before the tone is released.
    Active {
        /// Remaining release countdown, in blocks
        release: u32,
    },
}

impl ToneState {
    /// True if the tone is present
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, ToneState::Active { .. })
    }
}

/// Level change reported by a classifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Inactive → Active
    Activated,

    /// Active → Inactive
    Released,
}

/// Single-tone classifier output for one block
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneDecision {
    /// State after this block
    pub state: ToneState,

    /// Level change caused by this block, if any
    pub transition: Option<Transition>,

    /// Strongest bin magnitude
    pub strongest: f32,

    /// Second-strongest bin magnitude
    pub second: f32,

    /// Noise floor used for the thresholds
    pub noise_floor: f32,

    /// Strongest over second-strongest
    pub peak_ratio: f32,

    /// Activation threshold for this block
    pub activation_threshold: f32,

    /// Release threshold for this block
    pub release_threshold: f32,

    /// Tracking center after this block
    pub active_bin: usize,
}

impl ToneDecision {
    /// True if the tone is present after this block
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

impl fmt::Display for ToneDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "max={:8.1}, second={:8.1}, noise={:7.1}, ratio={:4.2}, act={:7.1}, rel={:7.1}, bin={}, tone={}",
            self.strongest,
            self.second,
            self.noise_floor,
            self.peak_ratio,
            self.activation_threshold,
            self.release_threshold,
            self.active_bin,
            self.is_active()
        )
    }
}

/// Single-tone hysteresis classifier
///
/// Owns the tone state and the *tracking center*: the bin index
/// where the tone was last seen. The center follows the strongest
/// bin whenever the tone is (re-)confirmed, which compensates for
/// a drifting or mistuned transmitter.
#[derive(Clone, Debug)]
pub struct ToneClassifier {
    thresholds: ToneThresholds,
    state: ToneState,
    active_bin: usize,
    initial_bin: usize,
}

impl ToneClassifier {
    /// New classifier, tracking from `center_bin`
    pub fn new(thresholds: ToneThresholds, center_bin: usize) -> Self {
        Self {
            thresholds,
            state: ToneState::Inactive,
            active_bin: center_bin,
            initial_bin: center_bin,
        }
    }

    /// Reset to the inactive state at the initial center
    pub fn reset(&mut self) {
        self.state = ToneState::Inactive;
        self.active_bin = self.initial_bin;
    }

    /// Current state
    pub fn state(&self) -> ToneState {
        self.state
    }

    /// Current tracking center (bin index)
    pub fn active_bin(&self) -> usize {
        self.active_bin
    }

    /// Thresholds
    pub fn thresholds(&self) -> &ToneThresholds {
        &self.thresholds
    }

    /// Classify one block
    ///
    /// `peak` summarizes the block's bins, and `noise_floor` is
    /// the floor *after* it was updated with this block.
    pub fn classify(&mut self, peak: &BinPeak, noise_floor: f32) -> ToneDecision {
        let activation_threshold = self.thresholds.activation(noise_floor);
        let release_threshold = self.thresholds.release(noise_floor);
        let peak_ratio = peak.strongest / f32::max(peak.second, 1.0f32);
        let hold = self.thresholds.release_hold_blocks;

        let was_active = self.state.is_active();
        self.state = match self.state {
            ToneState::Inactive => {
                if peak.strongest >= activation_threshold
                    && peak_ratio >= self.thresholds.minimum_peak_ratio
                {
                    self.active_bin = peak.index;
                    ToneState::Active { release: hold }
                } else {
                    ToneState::Inactive
                }
            }
            ToneState::Active { release } => {
                if peak.strongest >= release_threshold {
                    self.active_bin = peak.index;
                    ToneState::Active { release: hold }
                } else if release > 0 {
                    ToneState::Active {
                        release: release - 1,
                    }
                } else {
                    ToneState::Inactive
                }
            }
        };

        let transition = match (was_active, self.state.is_active()) {
            (false, true) => Some(Transition::Activated),
            (true, false) => Some(Transition::Released),
            _ => None,
        };

        let out = ToneDecision {
            state: self.state,
            transition,
            strongest: peak.strongest,
            second: peak.second,
            noise_floor,
            peak_ratio,
            activation_threshold,
            release_threshold,
            active_bin: self.active_bin,
        };
        if transition.is_some() {
            debug!("classifier: {:?}: {}", transition, out);
        }
        out
    }
}

/// Weather-fax level
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum_macros::AsRefStr,
    strum_macros::EnumIter,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum FaxLevel {
    /// The black tone dominates
    Black,

    /// The white tone dominates
    White,
}

impl fmt::Display for FaxLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// Two-tone classifier parameters
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct TwoToneThresholds {
    /// How many times stronger the winning tone must be
    pub hysteresis_multiplier: f32,

    /// Minimum summed power of both tones
    pub minimum_power: f32,
}

impl Default for TwoToneThresholds {
    fn default() -> Self {
        Self {
            hysteresis_multiplier: 5.0f32,
            minimum_power: 500.0f32,
        }
    }
}

/// Two-tone classifier output for one block
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TwoToneDecision {
    /// Level decided by this block; `None` if uncertain
    pub decided: Option<FaxLevel>,

    /// Last decided level, including this block
    pub held: Option<FaxLevel>,

    /// Black tone power
    pub black_power: f32,

    /// White tone power
    pub white_power: f32,
}

impl TwoToneDecision {
    /// True if this block was uncertain
    #[inline]
    pub fn is_uncertain(&self) -> bool {
        self.decided.is_none()
    }
}

/// Two-tone (black/white) classifier
///
/// Decides a level only when one tone's power beats the other's
/// by the hysteresis multiplier and their sum clears the minimum
/// power. Otherwise the block is uncertain. The last decided
/// level is sticky: uncertain blocks never change it, no matter
/// how many of them arrive.
#[derive(Clone, Debug)]
pub struct TwoToneClassifier {
    thresholds: TwoToneThresholds,
    held: Option<FaxLevel>,
}

impl TwoToneClassifier {
    /// New classifier with no decided level
    pub fn new(thresholds: TwoToneThresholds) -> Self {
        Self {
            thresholds,
            held: None,
        }
    }

    /// Forget the held level
    pub fn reset(&mut self) {
        self.held = None;
    }

    /// Last decided level
    pub fn held(&self) -> Option<FaxLevel> {
        self.held
    }

    /// Thresholds
    pub fn thresholds(&self) -> &TwoToneThresholds {
        &self.thresholds
    }

    /// Classify one block from the two tone powers
    pub fn classify(&mut self, black_power: f32, white_power: f32) -> TwoToneDecision {
        let mult = self.thresholds.hysteresis_multiplier;
        let decided = if black_power + white_power > self.thresholds.minimum_power {
            if white_power > black_power * mult {
                Some(FaxLevel::White)
            } else if black_power > white_power * mult {
                Some(FaxLevel::Black)
            } else {
                None
            }
        } else {
            None
        };

        if decided.is_some() {
            self.held = decided;
        }

        TwoToneDecision {
            decided,
            held: self.held,
            black_power,
            white_power,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::str::FromStr;

    use strum::IntoEnumIterator;

    fn peak(index: usize, strongest: f32, second: f32) -> BinPeak {
        BinPeak {
            index,
            strongest,
            second,
        }
    }

    #[test]
    fn test_thresholds() {
        let th = ToneThresholds::default();
        assert_eq!(3000.0f32, th.activation(0.0));
        assert_eq!(3100.0f32, th.activation(100.0));
        assert_eq!(1650.0f32, th.release(0.0));

        // the dynamic minimum bounds both thresholds
        let th = ToneThresholds {
            activation_margin: 100.0,
            ..ToneThresholds::default()
        };
        assert_eq!(1200.0f32, th.activation(0.0));
        assert_eq!(600.0f32, th.release(0.0));
    }

    #[test]
    fn test_activate_and_release() {
        let mut uut = ToneClassifier::new(ToneThresholds::default(), 2);
        assert_eq!(ToneState::Inactive, uut.state());

        // below threshold
        let out = uut.classify(&peak(2, 2000.0, 10.0), 0.0);
        assert!(!out.is_active());
        assert_eq!(None, out.transition);

        // strong, peaky tone on bin 3
        let out = uut.classify(&peak(3, 20000.0, 100.0), 0.0);
        assert!(out.is_active());
        assert_eq!(Some(Transition::Activated), out.transition);
        assert_eq!(3, out.active_bin);
        assert_eq!(200.0f32, out.peak_ratio);

        // above release, drifted to bin 4: re-centered, no new activation
        let out = uut.classify(&peak(4, 2000.0, 100.0), 0.0);
        assert!(out.is_active());
        assert_eq!(None, out.transition);
        assert_eq!(4, uut.active_bin());

        // below release: immediate drop with no hold
        let out = uut.classify(&peak(1, 1000.0, 100.0), 0.0);
        assert!(!out.is_active());
        assert_eq!(Some(Transition::Released), out.transition);
        assert_eq!(4, out.active_bin);
    }

    #[test]
    fn test_broadband_rejected() {
        // loud, but flat across the bins
        let mut uut = ToneClassifier::new(ToneThresholds::default(), 2);
        let out = uut.classify(&peak(2, 50000.0, 40000.0), 0.0);
        assert!(!out.is_active());
        assert!(out.peak_ratio < 1.8f32);
    }

    #[test]
    fn test_zero_second_ratio() {
        // no second bin at all: ratio is the raw magnitude
        let mut uut = ToneClassifier::new(ToneThresholds::default(), 2);
        let out = uut.classify(&peak(2, 4000.0, 0.0), 0.0);
        assert_eq!(4000.0f32, out.peak_ratio);
        assert!(out.is_active());

        let out = uut.classify(&peak(2, 0.0, 0.0), 0.0);
        assert_eq!(0.0f32, out.peak_ratio);
        assert!(!out.is_active());
    }

    #[test]
    fn test_release_hold() {
        let mut uut = ToneClassifier::new(
            ToneThresholds {
                release_hold_blocks: 2,
                ..ToneThresholds::default()
            },
            2,
        );
        assert!(uut.classify(&peak(2, 10000.0, 10.0), 0.0).is_active());

        // two weak blocks are tolerated, the third releases
        assert_eq!(
            ToneState::Active { release: 1 },
            uut.classify(&peak(2, 0.0, 0.0), 0.0).state
        );
        assert_eq!(
            ToneState::Active { release: 0 },
            uut.classify(&peak(2, 0.0, 0.0), 0.0).state
        );

        // recovery refills the countdown
        assert_eq!(
            ToneState::Active { release: 2 },
            uut.classify(&peak(2, 5000.0, 10.0), 0.0).state
        );
        uut.classify(&peak(2, 0.0, 0.0), 0.0);
        uut.classify(&peak(2, 0.0, 0.0), 0.0);
        let out = uut.classify(&peak(2, 0.0, 0.0), 0.0);
        assert_eq!(Some(Transition::Released), out.transition);

        uut.reset();
        assert_eq!(ToneState::Inactive, uut.state());
        assert_eq!(2, uut.active_bin());
    }

    #[test]
    fn test_noise_floor_raises_thresholds() {
        let mut uut = ToneClassifier::new(ToneThresholds::default(), 2);
        let out = uut.classify(&peak(2, 4000.0, 10.0), 2000.0);
        assert_eq!(5000.0f32, out.activation_threshold);
        assert!(!out.is_active());
    }

    #[test]
    fn test_two_tone() {
        let mut uut = TwoToneClassifier::new(TwoToneThresholds::default());
        assert_eq!(None, uut.held());

        // too quiet
        let out = uut.classify(0.0, 400.0);
        assert!(out.is_uncertain());
        assert_eq!(None, out.held);

        let out = uut.classify(100.0, 1000.0);
        assert_eq!(Some(FaxLevel::White), out.decided);

        // neither dominates: uncertain, but white is held
        let out = uut.classify(1000.0, 2000.0);
        assert!(out.is_uncertain());
        assert_eq!(Some(FaxLevel::White), out.held);

        // total power must exceed the minimum
        let out = uut.classify(250.0, 250.0);
        assert!(out.is_uncertain());

        // one tone must exceed the other by more than the multiplier
        let out = uut.classify(200.0, 1000.0);
        assert!(out.is_uncertain());
        let out = uut.classify(1000.0, 200.0);
        assert!(out.is_uncertain());
        assert_eq!(Some(FaxLevel::White), out.held);

        let out = uut.classify(6000.0, 1000.0);
        assert_eq!(Some(FaxLevel::Black), out.decided);
        assert_eq!(Some(FaxLevel::Black), out.held);

        // a long run of silence does not time out
        for _i in 0..1000 {
            assert_eq!(Some(FaxLevel::Black), uut.classify(0.0, 0.0).held);
        }

        uut.reset();
        assert_eq!(None, uut.held());
    }

    #[test]
    fn test_fax_level_names() {
        let names: Vec<String> = FaxLevel::iter().map(|l| l.to_string()).collect();
        assert_eq!(vec!["black", "white"], names);
        assert_eq!(Ok(FaxLevel::White), FaxLevel::from_str("white"));
        assert!(FaxLevel::from_str("gray").is_err());
    }
}
