//! The 21-point hand skeleton reported by hand landmark engines.

use std::{fmt, str::FromStr};

use anyhow::bail;
use nalgebra::Point2;

/// Number of landmarks in a [`HandLandmarks`] snapshot.
pub const NUM_LANDMARKS: usize = 21;

/// Which hand a set of landmarks belongs to.
///
/// Landmark engines usually report this for the image as-is, so a mirrored (selfie-style) camera
/// feed will report the opposite hand. Only the thumb classification depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

impl FromStr for Handedness {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("left") {
            Ok(Self::Left)
        } else if s.eq_ignore_ascii_case("right") {
            Ok(Self::Right)
        } else {
            bail!("invalid handedness label '{s}' (expected 'left' or 'right')")
        }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Left => "left",
            Self::Right => "right",
        })
    }
}

/// Names for the hand pose landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **IP**: Interphalangeal joint of the thumb, between its MCP and tip.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Landmarks of a single detected hand in one video frame.
///
/// Positions are normalized to the frame: X and Y are in range 0.0 to 1.0, with Y pointing down.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    positions: [Point2<f32>; NUM_LANDMARKS],
    handedness: Option<Handedness>,
}

impl HandLandmarks {
    /// Creates a landmark snapshot without handedness information.
    pub fn new(positions: [Point2<f32>; NUM_LANDMARKS]) -> Self {
        Self {
            positions,
            handedness: None,
        }
    }

    /// Creates a landmark snapshot from a list of `[x, y]` coordinates.
    ///
    /// Returns an error if `points` does not contain exactly [`NUM_LANDMARKS`] entries.
    pub fn from_points(points: &[[f32; 2]]) -> anyhow::Result<Self> {
        if points.len() != NUM_LANDMARKS {
            bail!(
                "hand landmark list has {} entries (expected {})",
                points.len(),
                NUM_LANDMARKS
            );
        }

        let mut positions = [Point2::origin(); NUM_LANDMARKS];
        for (out, &[x, y]) in positions.iter_mut().zip(points) {
            *out = Point2::new(x, y);
        }
        Ok(Self::new(positions))
    }

    pub fn with_handedness(self, handedness: Handedness) -> Self {
        Self {
            handedness: Some(handedness),
            ..self
        }
    }

    /// Returns the reported handedness, if the landmark engine provided one.
    #[inline]
    pub fn handedness(&self) -> Option<Handedness> {
        self.handedness
    }

    /// Returns the position of a single landmark.
    #[inline]
    pub fn get(&self, idx: LandmarkIdx) -> Point2<f32> {
        self.positions[idx as usize]
    }

    #[inline]
    pub fn positions(&self) -> &[Point2<f32>] {
        &self.positions
    }

    /// Euclidean distance between two landmarks, in normalized image units.
    pub fn distance(&self, a: LandmarkIdx, b: LandmarkIdx) -> f32 {
        nalgebra::distance(&self.get(a), &self.get(b))
    }

    /// Mirrors the landmarks along the vertical axis of the frame.
    ///
    /// This also swaps the handedness, since a mirrored left hand looks like a right hand.
    pub fn flip_horizontal_in_place(&mut self) {
        for pos in &mut self.positions {
            pos.x = 1.0 - pos.x;
        }
        self.handedness = self.handedness.map(|h| match h {
            Handedness::Left => Handedness::Right,
            Handedness::Right => Handedness::Left,
        });
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn from_points_checks_length() {
        assert!(HandLandmarks::from_points(&[[0.0, 0.0]; 20]).is_err());
        assert!(HandLandmarks::from_points(&[[0.0, 0.0]; 22]).is_err());

        let mut points = [[0.0, 0.0]; NUM_LANDMARKS];
        points[LandmarkIdx::ThumbTip as usize] = [0.25, 0.5];
        let hand = HandLandmarks::from_points(&points).unwrap();
        assert_eq!(hand.get(LandmarkIdx::ThumbTip), Point2::new(0.25, 0.5));
        assert_eq!(hand.handedness(), None);
    }

    #[test]
    fn anatomical_indices() {
        assert_eq!(LandmarkIdx::Wrist as usize, 0);
        assert_eq!(LandmarkIdx::ThumbTip as usize, 4);
        assert_eq!(LandmarkIdx::IndexFingerMcp as usize, 5);
        assert_eq!(LandmarkIdx::MiddleFingerMcp as usize, 9);
        assert_eq!(LandmarkIdx::RingFingerMcp as usize, 13);
        assert_eq!(LandmarkIdx::PinkyTip as usize, NUM_LANDMARKS - 1);
    }

    #[test]
    fn distance() {
        let mut points = [[0.0, 0.0]; NUM_LANDMARKS];
        points[LandmarkIdx::Wrist as usize] = [0.5, 0.9];
        points[LandmarkIdx::MiddleFingerTip as usize] = [0.8, 0.5];
        let hand = HandLandmarks::from_points(&points).unwrap();
        assert_relative_eq!(
            hand.distance(LandmarkIdx::Wrist, LandmarkIdx::MiddleFingerTip),
            0.5,
            epsilon = 1e-6
        );
    }

    #[test]
    fn flip_swaps_handedness() {
        let mut points = [[0.0, 0.0]; NUM_LANDMARKS];
        points[LandmarkIdx::ThumbTip as usize] = [0.25, 0.5];
        let mut hand = HandLandmarks::from_points(&points)
            .unwrap()
            .with_handedness(Handedness::Right);
        hand.flip_horizontal_in_place();
        assert_eq!(hand.handedness(), Some(Handedness::Left));
        assert_relative_eq!(hand.get(LandmarkIdx::ThumbTip).x, 0.75);
        assert_relative_eq!(hand.get(LandmarkIdx::Wrist).x, 1.0);
    }

    #[test]
    fn parse_handedness() {
        assert_eq!("Right".parse::<Handedness>().unwrap(), Handedness::Right);
        assert_eq!("left".parse::<Handedness>().unwrap(), Handedness::Left);
        assert!("both".parse::<Handedness>().is_err());
    }
}
