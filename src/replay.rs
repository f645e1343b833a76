//! Replays a recorded session through both pipelines.
//!
//! Input is JSON lines, one object per tick:
//!
//! ```text
//! {"t_ms": 0,
//!  "pitch": {"frequency": 110.0, "clarity": 0.95, "rms": 0.08},
//!  "hands": [[[0.41, 0.5, 0.0], ...]]}
//! ```
//!
//! `pitch` and `hands` are each optional; a missing key means that sensor
//! produced nothing this tick, while `"hands": []` is a frame with no hand in it.

use std::io::BufRead;

use serde::Deserialize;
use thiserror::Error;

use crate::config::AppConfig;
use crate::fretboard::FretPosition;
use crate::hand_region::FretRange;
use crate::landmarks::Landmark;
use crate::pipeline::audio::PitchGate;
use crate::pipeline::vision::{HandLandmarker, VisionPipeline};
use crate::resolver::{Confidence, ResolvedPosition};
use crate::state::SharedState;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Failed to read recording: {0}")]
    Io(#[from] std::io::Error),
    #[error("Line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ReplayError>;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PitchSample {
    pub frequency: f64,
    pub clarity: f64,
    pub rms: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordedTick {
    pub t_ms: u64,
    #[serde(default)]
    pub pitch: Option<PitchSample>,
    #[serde(default)]
    pub hands: Option<Vec<Vec<[f64; 3]>>>,
}

impl RecordedTick {
    fn hand_landmarks(&self) -> Option<Vec<Vec<Landmark>>> {
        self.hands.as_ref().map(|hands| {
            hands
                .iter()
                .map(|hand| hand.iter().map(|&[x, y, z]| Landmark::new(x, y, z)).collect())
                .collect()
        })
    }
}

/// Hands come straight from the recording.
pub struct RecordedHands;

impl HandLandmarker for RecordedHands {
    type Frame = Vec<Vec<Landmark>>;

    fn detect(
        &mut self,
        frame: &Self::Frame,
        _timestamp_ms: u64,
    ) -> std::result::Result<Vec<Vec<Landmark>>, String> {
        Ok(frame.clone())
    }
}

/// State after one replayed tick.
#[derive(Debug, Clone)]
pub struct ReplayTick {
    pub t_ms: u64,
    pub note: Option<String>,
    pub resolved: ResolvedPosition,
    pub fret_range: FretRange,
    /// Position or confidence differs from the previous tick.
    pub changed: bool,
}

pub struct Replayer<R: BufRead> {
    lines: std::io::Lines<R>,
    line_no: usize,
    audio: PitchGate,
    vision: VisionPipeline<RecordedHands>,
    state: SharedState,
    last: Option<(Option<FretPosition>, Confidence)>,
}

impl<R: BufRead> Replayer<R> {
    pub fn new(reader: R, config: &AppConfig, state: SharedState) -> Self {
        let audio = PitchGate::new(config.audio.clone(), state.clone());
        let mut vision = VisionPipeline::new(RecordedHands, config.vision.clone(), state.clone());
        audio.start();
        vision.start();
        Self {
            lines: reader.lines(),
            line_no: 0,
            audio,
            vision,
            state,
            last: None,
        }
    }

    /// Replay the next tick; `None` once the recording is exhausted.
    pub fn next_tick(&mut self) -> Result<Option<ReplayTick>> {
        let tick = loop {
            let Some(line) = self.lines.next() else {
                return Ok(None);
            };
            let line = line?;
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            break serde_json::from_str::<RecordedTick>(&line).map_err(|source| ReplayError::Parse {
                line: self.line_no,
                source,
            })?;
        };

        if let Some(p) = tick.pitch {
            self.audio.publish(p.rms, Some((p.frequency, p.clarity)));
        }
        if let Some(hands) = tick.hand_landmarks() {
            self.vision.process_frame(&hands, tick.t_ms);
        }

        let s = self.state.read();
        let resolved = s.resolved_position();
        let key = (resolved.position, resolved.confidence);
        let changed = self.last != Some(key);
        self.last = Some(key);

        Ok(Some(ReplayTick {
            t_ms: tick.t_ms,
            note: s.audio().current_note.map(|n| n.label()),
            fret_range: s.fret_range(),
            resolved,
            changed,
        }))
    }

    pub fn finish(mut self) {
        self.audio.stop();
        self.vision.stop();
    }
}
