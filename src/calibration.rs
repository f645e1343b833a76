//! Three-point camera calibration: hand x-coordinate → fret number, plus the
//! picking-hand exclusion zone.
//!
//! The mapping is linear between the fret-1 and fret-12 captures and is
//! extrapolated unchanged outside them. Real fret spacing shrinks
//! geometrically toward the bridge, so estimates drift the further the hand is
//! from the calibrated segment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fretboard::FRET_COUNT;

/// Minimum |fret12_x - fret1_x| for a usable calibration (10% of frame width).
pub const MIN_SEPARATION: f64 = 0.1;

/// Dead band between the picking boundary and the fretting-hand zone.
/// Keeps a hand parked on the boundary from flickering between zones.
pub const PICKING_MARGIN: f64 = 0.02;

/// Slack around the neck span when the picking boundary falls inside it.
pub const NECK_MARGIN: f64 = 0.05;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("Fret 1 and fret 12 captures are only {separation:.3} apart (need more than 0.1)")]
    InsufficientSeparation { separation: f64 },
    #[error("Cannot capture {attempted:?} while calibration is at step {current:?}")]
    OutOfOrder {
        current: CalibrationStep,
        attempted: CalibrationStep,
    },
}

/// A completed calibration. All x values are normalized image coordinates in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub fret1_x: f64,
    pub fret12_x: f64,
    pub picking_boundary_x: f64,
    pub is_left_handed: bool,
    pub timestamp: DateTime<Utc>,
}

/// Horizontal band in which a hand counts as the fretting hand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionZone {
    pub min_x: f64,
    pub max_x: f64,
}

impl DetectionZone {
    pub fn contains(&self, x: f64) -> bool {
        x >= self.min_x && x <= self.max_x
    }
}

impl Calibration {
    pub fn separation(&self) -> f64 {
        (self.fret12_x - self.fret1_x).abs()
    }

    pub fn is_valid(&self) -> bool {
        self.separation() > MIN_SEPARATION
    }

    fn neck_span(&self) -> (f64, f64) {
        (self.fret1_x.min(self.fret12_x), self.fret1_x.max(self.fret12_x))
    }

    /// Where the fretting hand may be. The picking side is cut off at the
    /// boundary minus a margin; if the boundary sits inside the neck span the
    /// zone is the neck itself with a little slack.
    pub fn detection_zone(&self) -> DetectionZone {
        let (neck_min, neck_max) = self.neck_span();
        if self.picking_boundary_x > neck_max {
            DetectionZone { min_x: 0.0, max_x: self.picking_boundary_x - PICKING_MARGIN }
        } else if self.picking_boundary_x < neck_min {
            DetectionZone { min_x: self.picking_boundary_x + PICKING_MARGIN, max_x: 1.0 }
        } else {
            DetectionZone { min_x: neck_min - NECK_MARGIN, max_x: neck_max + NECK_MARGIN }
        }
    }

    /// Human-readable orientation, e.g. "Left -> Right (right-handed)".
    pub fn direction(&self) -> &'static str {
        let left_to_right = self.fret1_x < self.fret12_x;
        match (self.is_left_handed, left_to_right) {
            (true, true) => "Right -> Left (left-handed)",
            (true, false) => "Left -> Right (left-handed)",
            (false, true) => "Left -> Right (right-handed)",
            (false, false) => "Right -> Left (right-handed)",
        }
    }
}

/// Fret under `hand_x`, clamped to 0-24.
pub fn estimate_fret(hand_x: f64, calibration: &Calibration) -> u8 {
    let mut ratio = (hand_x - calibration.fret1_x) / (calibration.fret12_x - calibration.fret1_x);
    if calibration.is_left_handed {
        ratio = 1.0 - ratio;
    }

    let fret = (ratio * 11.0).round() + 1.0;
    if fret.is_nan() {
        // Zero-width calibration with the hand exactly on it
        return 0;
    }
    fret.clamp(0.0, FRET_COUNT as f64) as u8
}

/// True when `hand_x` is outside the picking-hand zone.
/// On the open sides there is no outer bound, matching `detection_zone`'s 0/1 edges.
pub fn is_in_detection_zone(hand_x: f64, calibration: &Calibration) -> bool {
    let (neck_min, neck_max) = calibration.neck_span();
    let boundary = calibration.picking_boundary_x;

    if boundary > neck_max {
        hand_x <= boundary - PICKING_MARGIN
    } else if boundary < neck_min {
        hand_x >= boundary + PICKING_MARGIN
    } else {
        hand_x >= neck_min - NECK_MARGIN && hand_x <= neck_max + NECK_MARGIN
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStep {
    #[default]
    Idle,
    PickingZone,
    Fret1,
    Fret12,
    Complete,
}

impl CalibrationStep {
    /// 1-based step number as shown to the user (Idle has none).
    pub fn number(self) -> Option<u8> {
        match self {
            Self::Idle => None,
            Self::PickingZone => Some(1),
            Self::Fret1 => Some(2),
            Self::Fret12 => Some(3),
            Self::Complete => Some(4),
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            Self::Idle => "Not calibrating",
            Self::PickingZone => "Hold your picking hand over the strumming area",
            Self::Fret1 => "Place your fretting hand at fret 1",
            Self::Fret12 => "Place your fretting hand at fret 12",
            Self::Complete => "Calibration complete",
        }
    }
}

/// Capture sequence: picking zone → fret 1 → fret 12 → complete.
///
/// A fret-12 capture too close to fret 1 rolls back to the fret-1 step; the
/// picking boundary survives the retry.
#[derive(Debug, Clone, Default)]
pub struct CalibrationWizard {
    step: CalibrationStep,
    picking_boundary_x: Option<f64>,
    fret1_x: Option<f64>,
    fret12_x: Option<f64>,
}

impl CalibrationWizard {
    pub fn step(&self) -> CalibrationStep {
        self.step
    }

    /// True between `start` and `finish`/`reset`. Hand filtering by zone is
    /// suspended meanwhile so the picking hand can be captured.
    pub fn is_active(&self) -> bool {
        self.step != CalibrationStep::Idle
    }

    pub fn picking_boundary_x(&self) -> Option<f64> {
        self.picking_boundary_x
    }

    pub fn fret1_x(&self) -> Option<f64> {
        self.fret1_x
    }

    pub fn fret12_x(&self) -> Option<f64> {
        self.fret12_x
    }

    pub fn start(&mut self) {
        *self = Self {
            step: CalibrationStep::PickingZone,
            ..Self::default()
        };
    }

    fn expect_step(&self, attempted: CalibrationStep) -> Result<(), CalibrationError> {
        if self.step == attempted {
            Ok(())
        } else {
            Err(CalibrationError::OutOfOrder {
                current: self.step,
                attempted,
            })
        }
    }

    pub fn capture_picking_zone(&mut self, x: f64) -> Result<(), CalibrationError> {
        self.expect_step(CalibrationStep::PickingZone)?;
        self.picking_boundary_x = Some(x);
        self.step = CalibrationStep::Fret1;
        Ok(())
    }

    pub fn capture_fret1(&mut self, x: f64) -> Result<(), CalibrationError> {
        self.expect_step(CalibrationStep::Fret1)?;
        self.fret1_x = Some(x);
        self.step = CalibrationStep::Fret12;
        Ok(())
    }

    /// Completes the calibration, or rolls back to the fret-1 step when the
    /// two fret captures are too close together.
    pub fn capture_fret12(
        &mut self,
        x: f64,
        is_left_handed: bool,
    ) -> Result<Calibration, CalibrationError> {
        self.expect_step(CalibrationStep::Fret12)?;
        let (Some(fret1_x), Some(picking_boundary_x)) = (self.fret1_x, self.picking_boundary_x)
        else {
            return Err(CalibrationError::OutOfOrder {
                current: self.step,
                attempted: CalibrationStep::Fret12,
            });
        };

        let calibration = Calibration {
            fret1_x,
            fret12_x: x,
            picking_boundary_x,
            is_left_handed,
            timestamp: Utc::now(),
        };

        if !calibration.is_valid() {
            log::info!(
                "Rejected calibration: fret1={:.3} fret12={:.3}, restarting at fret 1",
                fret1_x,
                x
            );
            self.step = CalibrationStep::Fret1;
            self.fret1_x = None;
            self.fret12_x = None;
            return Err(CalibrationError::InsufficientSeparation {
                separation: calibration.separation(),
            });
        }

        self.fret12_x = Some(x);
        self.step = CalibrationStep::Complete;
        log::info!(
            "Calibration captured: picking={:.3} fret1={:.3} fret12={:.3} ({})",
            picking_boundary_x,
            fret1_x,
            x,
            calibration.direction()
        );
        Ok(calibration)
    }

    pub fn finish(&mut self) {
        self.step = CalibrationStep::Idle;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
