//! Finger extension classification.
//!
//! [`FingerClassifier`] decides, for a single [`HandLandmarks`] snapshot, which of the five
//! fingers are extended. It is a purely geometric heuristic over normalized image coordinates:
//!
//! - Index, middle, ring and pinky are extended only if *every* criterion holds (tip clearly above
//!   the PIP joint, tip above the knuckle, and tip not closer to the wrist than the PIP joint).
//! - The thumb flexes in a different plane, so its criteria are not comparable to the other
//!   fingers. It is considered extended if a majority of three independent checks pass.
//!
//! The thresholds in [`ClassifierParams`] are hand-tuned to reject partially curled fingers.

use std::fmt;

use crate::hand::landmark::{HandLandmarks, Handedness, LandmarkIdx};

/// One of the five fingers of a hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    /// All fingers, from thumb to pinky.
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Finger::Thumb => "thumb",
            Finger::Index => "index",
            Finger::Middle => "middle",
            Finger::Ring => "ring",
            Finger::Pinky => "pinky",
        }
    }

    /// Returns the `(MCP, PIP, tip)` landmarks of a non-thumb finger.
    fn joints(self) -> Option<(LandmarkIdx, LandmarkIdx, LandmarkIdx)> {
        use LandmarkIdx::*;
        Some(match self {
            Finger::Thumb => return None,
            Finger::Index => (IndexFingerMcp, IndexFingerPip, IndexFingerTip),
            Finger::Middle => (MiddleFingerMcp, MiddleFingerPip, MiddleFingerTip),
            Finger::Ring => (RingFingerMcp, RingFingerPip, RingFingerTip),
            Finger::Pinky => (PinkyMcp, PinkyPip, PinkyTip),
        })
    }
}

/// Which fingers of a hand are extended.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FingerExtension {
    pub thumb: bool,
    pub index: bool,
    pub middle: bool,
    pub ring: bool,
    pub pinky: bool,
}

impl FingerExtension {
    /// No finger extended (a fist).
    pub const NONE: Self = Self {
        thumb: false,
        index: false,
        middle: false,
        ring: false,
        pinky: false,
    };

    /// Creates a [`FingerExtension`] where exactly the given fingers are extended.
    pub fn from_fingers<I: IntoIterator<Item = Finger>>(fingers: I) -> Self {
        let mut this = Self::NONE;
        for finger in fingers {
            this.set(finger, true);
        }
        this
    }

    #[inline]
    pub fn is_extended(&self, finger: Finger) -> bool {
        match finger {
            Finger::Thumb => self.thumb,
            Finger::Index => self.index,
            Finger::Middle => self.middle,
            Finger::Ring => self.ring,
            Finger::Pinky => self.pinky,
        }
    }

    pub fn set(&mut self, finger: Finger, extended: bool) {
        let flag = match finger {
            Finger::Thumb => &mut self.thumb,
            Finger::Index => &mut self.index,
            Finger::Middle => &mut self.middle,
            Finger::Ring => &mut self.ring,
            Finger::Pinky => &mut self.pinky,
        };
        *flag = extended;
    }

    /// Returns an iterator over the extended fingers.
    pub fn extended(&self) -> impl Iterator<Item = Finger> + '_ {
        Finger::ALL
            .into_iter()
            .filter(|finger| self.is_extended(*finger))
    }

    /// Returns the number of extended fingers.
    pub fn count(&self) -> usize {
        self.extended().count()
    }
}

/// Formats the extended fingers as `index+middle`, or `none`.
impl fmt::Display for FingerExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fingers = self.extended();
        match fingers.next() {
            Some(first) => {
                f.write_str(first.name())?;
                for finger in fingers {
                    write!(f, "+{}", finger.name())?;
                }
                Ok(())
            }
            None => f.write_str("none"),
        }
    }
}

/// Thresholds used by [`FingerClassifier`].
///
/// Distances are in normalized image units; ratios are unitless.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierParams {
    /// The thumb tip must be this many times farther from the index knuckle than the thumb's IP
    /// joint is.
    pub thumb_index_ratio: f32,
    /// Minimum horizontal displacement of the thumb tip from the thumb's MCP joint, away from the
    /// palm.
    pub thumb_horizontal_offset: f32,
    /// The thumb tip must be this many times farther from the wrist than the thumb's MCP joint is.
    pub thumb_wrist_ratio: f32,
    /// Number of thumb checks (out of 3) that have to pass.
    pub thumb_votes: usize,
    /// How far above the PIP joint a fingertip has to be.
    pub tip_above_pip: f32,
    /// How far above the knuckle (MCP) a fingertip has to be.
    pub tip_above_mcp: f32,
    /// Minimum ratio of tip-to-wrist over PIP-to-wrist distance.
    pub tip_wrist_ratio: f32,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            thumb_index_ratio: 1.15,
            thumb_horizontal_offset: 0.03,
            thumb_wrist_ratio: 1.05,
            thumb_votes: 2,
            tip_above_pip: 0.02,
            tip_above_mcp: 0.01,
            tip_wrist_ratio: 0.95,
        }
    }
}

/// Classifies hand landmarks into a [`FingerExtension`].
#[derive(Debug, Default, Clone)]
pub struct FingerClassifier {
    params: ClassifierParams,
}

impl FingerClassifier {
    pub fn new(params: ClassifierParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    /// Classifies the landmarks of one frame.
    ///
    /// Returns [`None`] if no hand was detected in the frame.
    pub fn classify_frame(&self, hand: Option<&HandLandmarks>) -> Option<FingerExtension> {
        hand.map(|hand| self.classify(hand))
    }

    /// Determines which fingers of `hand` are extended.
    pub fn classify(&self, hand: &HandLandmarks) -> FingerExtension {
        let mut ext = FingerExtension {
            thumb: self.thumb_extended(hand),
            ..FingerExtension::NONE
        };
        for finger in &Finger::ALL[1..] {
            ext.set(*finger, self.finger_extended(hand, *finger));
        }
        ext
    }

    fn thumb_extended(&self, hand: &HandLandmarks) -> bool {
        use LandmarkIdx::*;
        let p = &self.params;

        let tip = hand.get(ThumbTip);
        let mcp = hand.get(ThumbMcp);

        let away_from_index = hand.distance(ThumbTip, IndexFingerMcp)
            > hand.distance(ThumbIp, IndexFingerMcp) * p.thumb_index_ratio;

        // Unknown handedness is treated like a left hand.
        let sideways = match hand.handedness() {
            Some(Handedness::Right) => tip.x < mcp.x - p.thumb_horizontal_offset,
            Some(Handedness::Left) | None => tip.x > mcp.x + p.thumb_horizontal_offset,
        };

        let away_from_wrist =
            hand.distance(ThumbTip, Wrist) > hand.distance(ThumbMcp, Wrist) * p.thumb_wrist_ratio;

        let votes = [away_from_index, sideways, away_from_wrist]
            .into_iter()
            .filter(|pass| *pass)
            .count();
        votes >= p.thumb_votes
    }

    fn finger_extended(&self, hand: &HandLandmarks, finger: Finger) -> bool {
        let Some((mcp, pip, tip)) = finger.joints() else {
            return self.thumb_extended(hand);
        };
        let p = &self.params;

        let tip_pos = hand.get(tip);
        let above_pip = tip_pos.y < hand.get(pip).y - p.tip_above_pip;
        let above_mcp = tip_pos.y < hand.get(mcp).y - p.tip_above_mcp;
        let reaching = hand.distance(tip, LandmarkIdx::Wrist)
            > hand.distance(pip, LandmarkIdx::Wrist) * p.tip_wrist_ratio;

        above_pip && above_mcp && reaching
    }
}

/// Classifies `hand` with the default [`ClassifierParams`].
pub fn classify(hand: &HandLandmarks) -> FingerExtension {
    FingerClassifier::default().classify(hand)
}
