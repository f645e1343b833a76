//! Asymmetric fret window covered by the fretting hand.
//!
//! The index finger anchors the low side of the hand span and barely reaches
//! back; the pinky stretches further toward the bridge. For a left-handed
//! player the two sides swap.
//!
//! This window is for display. The resolver filters with its own symmetric
//! `estimated ± tolerance` window and the two are not reconciled.

use serde::Serialize;

use crate::fretboard::FRET_COUNT;

/// Inclusive fret range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FretRange {
    pub min: u8,
    pub max: u8,
}

impl FretRange {
    pub fn contains(&self, fret: u8) -> bool {
        fret >= self.min && fret <= self.max
    }
}

/// Reach toward lower frets: half the tolerance, at least one fret.
pub fn index_tolerance(tolerance: u8) -> u8 {
    (tolerance / 2).max(1)
}

/// Reach toward higher frets: one more than the tolerance.
pub fn pinky_tolerance(tolerance: u8) -> u8 {
    tolerance.saturating_add(1)
}

pub fn fret_range(estimated_fret: u8, tolerance: u8, is_left_handed: bool) -> FretRange {
    let index = index_tolerance(tolerance);
    let pinky = pinky_tolerance(tolerance);

    let (low, high) = if is_left_handed {
        (pinky, index)
    } else {
        (index, pinky)
    };

    FretRange {
        min: estimated_fret.saturating_sub(low),
        max: estimated_fret.saturating_add(high).min(FRET_COUNT),
    }
}
