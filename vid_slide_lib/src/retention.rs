use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::definitions::DEFAULT_RETENTION_THRESHOLD;
use crate::{dissimilarity, ConfigError, FilterError, Frame};

/// The minimum dissimilarity a frame must exceed (strictly) to be kept.
/// Always in the range `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct RetentionThreshold(f64);

impl RetentionThreshold {
    pub fn new(value: f64) -> Result<Self, ConfigError> {
        if value > 0.0 && value <= 1.0 {
            Ok(Self(value))
        } else {
            Err(ConfigError::InvalidThreshold(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for RetentionThreshold {
    fn default() -> Self {
        Self(DEFAULT_RETENTION_THRESHOLD)
    }
}

impl TryFrom<f64> for RetentionThreshold {
    type Error = ConfigError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RetentionThreshold> for f64 {
    fn from(threshold: RetentionThreshold) -> Self {
        threshold.0
    }
}

/// The outcome of offering one frame to a [`RetentionFilter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Retention {
    /// There was nothing to compare against. Kept.
    First,
    /// Differs from the last kept frame by more than the threshold. Kept.
    Changed(f64),
    /// Could not be compared with the last kept frame. Kept.
    Unscored(FilterError),
    /// Too similar to the last kept frame. Dropped.
    Duplicate(f64),
}

impl Retention {
    pub fn is_kept(&self) -> bool {
        !matches!(self, Self::Duplicate(_))
    }
}

/// Drops frames that are near duplicates of the most recently kept frame.
///
/// The first frame is always kept. Every later frame is scored against the last frame
/// that was kept (not the previous frame), so a slow fade eventually crosses the
/// threshold instead of being dropped forever. A frame that cannot be scored is kept.
///
/// Only the last kept frame is held, so memory use does not grow with the sequence.
#[derive(Debug, Clone)]
pub struct RetentionFilter {
    threshold: RetentionThreshold,
    reference: Option<Frame>,
    frames_seen: u64,
    frames_kept: u64,
    frames_unscored: u64,
}

impl RetentionFilter {
    pub fn new(threshold: RetentionThreshold) -> Self {
        Self {
            threshold,
            reference: None,
            frames_seen: 0,
            frames_kept: 0,
            frames_unscored: 0,
        }
    }

    pub fn threshold(&self) -> RetentionThreshold {
        self.threshold
    }

    /// The last kept frame, if any.
    pub fn reference(&self) -> Option<&Frame> {
        self.reference.as_ref()
    }

    /// Decide whether to keep `frame`. If it is kept it becomes the new reference.
    pub fn consider(&mut self, frame: &Frame) -> Retention {
        self.frames_seen += 1;

        let decision = match &self.reference {
            None => Retention::First,
            Some(reference) => match dissimilarity(reference, frame) {
                Ok(score) if score > self.threshold.value() => Retention::Changed(score),
                Ok(score) => Retention::Duplicate(score),
                Err(e) => Retention::Unscored(e),
            },
        };

        match &decision {
            Retention::First => debug!("{}: first frame, keeping unconditionally", frame.describe()),
            Retention::Changed(score) => debug!("{}: keeping, dissimilarity {score:.4}", frame.describe()),
            Retention::Duplicate(score) => trace!("{}: dropping, dissimilarity {score:.4}", frame.describe()),
            Retention::Unscored(e) => {
                self.frames_unscored += 1;
                warn!("{}: comparison failed, keeping it: {e}", frame.describe());
            }
        }

        if decision.is_kept() {
            self.frames_kept += 1;
            self.reference = Some(frame.clone());
        }

        decision
    }

    /// Streaming form of [`consider`](Self::consider): returns the frame if it is kept.
    pub fn offer(&mut self, frame: Frame) -> Option<Frame> {
        self.consider(&frame).is_kept().then_some(frame)
    }

    /// Forget the reference frame and the counters, as if newly created.
    pub fn reset(&mut self) {
        *self = Self::new(self.threshold);
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn frames_kept(&self) -> u64 {
        self.frames_kept
    }

    /// Frames that were kept because they could not be compared.
    pub fn frames_unscored(&self) -> u64 {
        self.frames_unscored
    }
}

/// Iterator adapter yielding only the frames a [`RetentionFilter`] keeps.
/// Created by [`RetainChanged::retain_changed`].
#[derive(Debug)]
pub struct KeptFrames<I> {
    frames: I,
    filter: RetentionFilter,
}

impl<I> KeptFrames<I> {
    pub fn new(frames: I, threshold: RetentionThreshold) -> Self {
        Self {
            frames,
            filter: RetentionFilter::new(threshold),
        }
    }

    /// The filter state, including its counters.
    pub fn retention_filter(&self) -> &RetentionFilter {
        &self.filter
    }

    pub fn into_inner(self) -> I {
        self.frames
    }
}

impl<I> Iterator for KeptFrames<I>
where
    I: Iterator<Item = Frame>,
{
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        for frame in self.frames.by_ref() {
            if let Some(kept) = self.filter.offer(frame) {
                return Some(kept);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self.frames.size_hint();
        //the first frame is always kept
        let lower = if self.filter.reference().is_none() { lower.min(1) } else { 0 };
        (lower, upper)
    }
}

/// Adds [`retain_changed`](RetainChanged::retain_changed) to any iterator of frames.
pub trait RetainChanged: Iterator<Item = Frame> + Sized {
    fn retain_changed(self, threshold: RetentionThreshold) -> KeptFrames<Self> {
        KeptFrames::new(self, threshold)
    }
}

impl<I> RetainChanged for I where I: Iterator<Item = Frame> {}

/// Filter a whole sequence of frames at once. The result is an order-preserving
/// subsequence of the input which starts with the first input frame.
pub fn filter_frames(frames: impl IntoIterator<Item = Frame>, threshold: RetentionThreshold) -> Vec<Frame> {
    frames.into_iter().retain_changed(threshold).collect()
}
