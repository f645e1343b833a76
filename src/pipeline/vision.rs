//! Hand-tracking pipeline: rate-limits the landmark model, picks the
//! fretting hand and turns its position into a fret estimate.

use super::Pipeline;
use crate::calibration::{estimate_fret, is_in_detection_zone};
use crate::config::VisionConfig;
use crate::landmarks::{Landmark, PositionLandmark};
use crate::smoothing::PositionSmoother;
use crate::state::SharedState;

/// External hand-landmark model. Each detected hand is an ordered list of
/// 21 normalized points.
pub trait HandLandmarker {
    type Frame;

    fn detect(
        &mut self,
        frame: &Self::Frame,
        timestamp_ms: u64,
    ) -> Result<Vec<Vec<Landmark>>, String>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// Too soon after the previous detection.
    Skipped,
    /// A usable hand was found.
    Tracked { smoothed_x: f64, estimated_fret: u8 },
    /// No usable hand; last values held.
    Lost,
}

pub struct VisionPipeline<L: HandLandmarker> {
    landmarker: L,
    config: VisionConfig,
    smoother: PositionSmoother,
    last_detection_ms: Option<u64>,
    state: SharedState,
}

impl<L: HandLandmarker> VisionPipeline<L> {
    /// The landmark model is ready once handed over.
    pub fn new(landmarker: L, config: VisionConfig, state: SharedState) -> Self {
        state.update_vision(|v| v.is_loading = false);
        Self {
            landmarker,
            smoother: PositionSmoother::new(config.smoothing_window),
            config,
            last_detection_ms: None,
            state,
        }
    }

    pub fn start(&mut self) {
        self.last_detection_ms = None;
        self.state.update_vision(|v| v.is_tracking = true);
        log::info!("Vision pipeline started");
    }

    pub fn position_landmark(&self) -> PositionLandmark {
        self.config.position_landmark
    }

    pub fn process_frame(&mut self, frame: &L::Frame, now_ms: u64) -> FrameOutcome {
        if let Some(last) = self.last_detection_ms {
            if now_ms.saturating_sub(last) < self.config.min_interval_ms {
                log::trace!("Skipping frame at {} ms", now_ms);
                return FrameOutcome::Skipped;
            }
        }
        self.last_detection_ms = Some(now_ms);

        let hands = match self.landmarker.detect(frame, now_ms) {
            Ok(hands) => hands,
            Err(e) => {
                log::warn!("Hand detection failed: {}", e);
                return FrameOutcome::Lost;
            }
        };

        let (calibration, filter_by_zone) = {
            let s = self.state.read();
            let calibration = s.calibration().cloned();
            // While calibrating, every hand counts so the picking hand can be captured
            let filter = calibration.is_some() && !s.wizard().is_active();
            (calibration, filter)
        };

        let landmark = self.config.position_landmark;
        let chosen = hands.into_iter().find_map(|hand| {
            let x = landmark.x_of(&hand);
            match &calibration {
                Some(c) if filter_by_zone && !is_in_detection_zone(x, c) => None,
                _ => Some((hand, x)),
            }
        });

        match chosen {
            Some((hand, x)) => {
                let smoothed_x = self.smoother.add(x);
                let estimated_fret = calibration
                    .as_ref()
                    .map_or(0, |c| estimate_fret(smoothed_x, c));
                self.state
                    .update_vision(|v| v.hand_found(hand, smoothed_x, estimated_fret));
                FrameOutcome::Tracked {
                    smoothed_x,
                    estimated_fret,
                }
            }
            None => {
                self.state.update_vision(|v| v.hand_lost());
                FrameOutcome::Lost
            }
        }
    }

    /// Forget smoothing history, e.g. after recalibrating.
    pub fn reset_smoother(&mut self) {
        self.smoother.reset();
    }

    pub fn stop(&mut self) {
        self.smoother.reset();
        self.state.update_vision(|v| v.stop());
        log::info!("Vision pipeline stopped");
    }
}

impl<L: HandLandmarker> Pipeline for VisionPipeline<L> {
    fn start(&mut self) {
        VisionPipeline::start(self);
    }

    fn stop(&mut self) {
        VisionPipeline::stop(self);
    }
}
