use std::fmt;

use crate::classifier::{FaxLevel, ToneDecision, Transition, TwoToneDecision};

/// Single-tone session output for one block
///
/// Pairs the classifier's [`ToneDecision`] with the block's
/// position in the input stream. Positions are counted in input
/// samples from the start of the session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneBlock {
    decision: ToneDecision,
    start: u64,
    len: usize,
}

impl ToneBlock {
    pub(crate) fn new(decision: ToneDecision, start: u64, len: usize) -> Self {
        Self {
            decision,
            start,
            len,
        }
    }

    /// Classifier decision and diagnostics
    pub fn decision(&self) -> &ToneDecision {
        &self.decision
    }

    /// True if the tone is present after this block
    pub fn is_active(&self) -> bool {
        self.decision.is_active()
    }

    /// Level change caused by this block, if any
    pub fn transition(&self) -> Option<Transition> {
        self.decision.transition
    }

    /// Position of the first sample in the block
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Position one past the end of the block
    pub fn end(&self) -> u64 {
        self.start + self.len as u64
    }

    /// Block length, in samples
    ///
    /// Always the session's block size, even if the block
    /// was short.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the block was empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Display for ToneBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:<14}]: {}", self.start, self.decision)
    }
}

/// Two-tone session output for one block
///
/// If this block completed a white → black change, `edge()`
/// reports its position. Positions are counted in input samples
/// from the start of the session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaxBlock {
    decision: TwoToneDecision,
    start: u64,
    len: usize,
    edge: Option<u64>,
}

impl FaxBlock {
    pub(crate) fn new(decision: TwoToneDecision, start: u64, len: usize, edge: Option<u64>) -> Self {
        Self {
            decision,
            start,
            len,
            edge,
        }
    }

    /// Classifier decision and tone powers
    pub fn decision(&self) -> &TwoToneDecision {
        &self.decision
    }

    /// Level decided by this block; `None` if uncertain
    pub fn decided(&self) -> Option<FaxLevel> {
        self.decision.decided
    }

    /// Last decided level, including this block
    pub fn held(&self) -> Option<FaxLevel> {
        self.decision.held
    }

    /// White → black edge position, if this block has one
    pub fn edge(&self) -> Option<u64> {
        self.edge
    }

    /// Position of the first sample in the block
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Position one past the end of the block
    pub fn end(&self) -> u64 {
        self.start + self.len as u64
    }

    /// Block length, in samples
    ///
    /// Always the session's block size, even if the block
    /// was short.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the block was empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Display for FaxBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match &self.decision.decided {
            Some(lvl) => lvl.as_ref(),
            None => "uncertain",
        };
        write!(
            f,
            "[{:<14}]: black={:10.1}, white={:10.1}, level={}",
            self.start, self.decision.black_power, self.decision.white_power, level
        )?;
        if self.edge.is_some() {
            write!(f, ", edge")?;
        }
        Ok(())
    }
}
