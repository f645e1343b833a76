//! Hand-landmark layout and the x-coordinate used as the hand position signal.
//!
//! The landmark model returns 21 points per hand in normalized image space.
//! Index 0 is the wrist.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_TIP: usize = 4;
/// Index finger base knuckle.
pub const INDEX_MCP: usize = 5;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_TIP: usize = 12;
pub const RING_TIP: usize = 16;
pub const PINKY_TIP: usize = 20;

const FINGERTIPS: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

/// Skeleton edges for drawing a hand.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    // Thumb
    (0, 1), (1, 2), (2, 3), (3, 4),
    // Index
    (0, 5), (5, 6), (6, 7), (7, 8),
    // Middle
    (5, 9), (9, 10), (10, 11), (11, 12),
    // Ring
    (9, 13), (13, 14), (14, 15), (15, 16),
    // Pinky
    (13, 17), (17, 18), (18, 19), (19, 20),
    // Palm
    (0, 17),
];

/// Returned when a hand has too few points to read: the frame centre.
const FALLBACK_X: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Which landmark stands in for "where the hand is" along the neck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PositionLandmark {
    Wrist,
    #[default]
    IndexMcp,
    IndexTip,
    FingertipsAverage,
}

impl PositionLandmark {
    pub fn x_of(self, hand: &[Landmark]) -> f64 {
        match self {
            Self::Wrist => point_x(hand, WRIST),
            Self::IndexMcp => point_x(hand, INDEX_MCP),
            Self::IndexTip => point_x(hand, INDEX_TIP),
            Self::FingertipsAverage => {
                if hand.len() < LANDMARK_COUNT {
                    return FALLBACK_X;
                }
                FINGERTIPS.iter().map(|&i| hand[i].x).sum::<f64>() / FINGERTIPS.len() as f64
            }
        }
    }
}

fn point_x(hand: &[Landmark], index: usize) -> f64 {
    hand.get(index).map_or(FALLBACK_X, |p| p.x)
}
