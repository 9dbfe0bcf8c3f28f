//! Synthetic hand landmarks for tests.
//!
//! The fixture hand is upright, palm facing the camera, wrist at the bottom center of the frame.
//! Extended fingers point straight up; curled fingers fold their tip down below the PIP joint.
//! A curled thumb is folded across the palm towards the index knuckle.

use crate::hand::fingers::Finger;
use crate::hand::landmark::{HandLandmarks, Handedness, NUM_LANDMARKS};
use crate::image::Image;

const WRIST: [f32; 2] = [0.5, 0.9];
const THUMB_CMC: [f32; 2] = [0.42, 0.82];
const THUMB_MCP: [f32; 2] = [0.36, 0.74];
const THUMB_EXTENDED: [[f32; 2]; 2] = [[0.31, 0.68], [0.25, 0.62]];
const THUMB_CURLED: [[f32; 2]; 2] = [[0.40, 0.72], [0.48, 0.72]];

const FINGER_COLUMNS: [f32; 4] = [0.45, 0.5, 0.55, 0.6];
const MCP_Y: f32 = 0.6;
/// PIP, DIP, tip.
const EXTENDED_Y: [f32; 3] = [0.5, 0.42, 0.35];
const CURLED_Y: [f32; 3] = [0.52, 0.58, 0.62];

fn points(extended: &[Finger]) -> [[f32; 2]; NUM_LANDMARKS] {
    let mut points = [[0.0; 2]; NUM_LANDMARKS];
    points[0] = WRIST;
    points[1] = THUMB_CMC;
    points[2] = THUMB_MCP;
    let [ip, tip] = if extended.contains(&Finger::Thumb) {
        THUMB_EXTENDED
    } else {
        THUMB_CURLED
    };
    points[3] = ip;
    points[4] = tip;

    for (i, finger) in Finger::ALL[1..].iter().enumerate() {
        let x = FINGER_COLUMNS[i];
        let base = 5 + i * 4;
        let ys = if extended.contains(finger) {
            EXTENDED_Y
        } else {
            CURLED_Y
        };
        points[base] = [x, MCP_Y];
        for (j, y) in ys.into_iter().enumerate() {
            points[base + 1 + j] = [x, y];
        }
    }
    points
}

/// A right hand with exactly the `extended` fingers extended.
pub fn hand(extended: &[Finger]) -> HandLandmarks {
    unknown_hand(extended).with_handedness(Handedness::Right)
}

/// The mirror image of [`hand`], reported as a left hand.
pub fn left_hand(extended: &[Finger]) -> HandLandmarks {
    let mut hand = hand(extended);
    hand.flip_horizontal_in_place();
    hand
}

/// Right hand geometry without handedness information.
pub fn unknown_hand(extended: &[Finger]) -> HandLandmarks {
    HandLandmarks::from_points(&points(extended)).unwrap()
}

/// A small blank camera frame.
pub fn frame() -> Image {
    Image::new(64, 48)
}
