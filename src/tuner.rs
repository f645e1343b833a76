//! Open-string tuner: nearest standard-tuning target and cents deviation.

use std::fmt;

use serde::Serialize;

use crate::theory::{midi_to_frequency, NoteName};

/// Within ±5 cents counts as in tune.
pub const IN_TUNE_CENTS: f64 = 5.0;
/// Within ±15 cents counts as close.
pub const CLOSE_CENTS: f64 = 15.0;
/// Farther than a semitone from every open string → no target.
pub const MAX_TARGET_CENTS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TuningTarget {
    pub string: u8,
    pub note: NoteName,
    pub octave: i32,
    pub midi_note: i32,
    pub frequency: f64,
    pub label: &'static str,
}

const STANDARD_TUNING: [(u8, NoteName, i32, i32, &str); 6] = [
    (6, NoteName::E, 2, 40, "E2"),
    (5, NoteName::A, 2, 45, "A2"),
    (4, NoteName::D, 3, 50, "D3"),
    (3, NoteName::G, 3, 55, "G3"),
    (2, NoteName::B, 3, 59, "B3"),
    (1, NoteName::E, 4, 64, "E4"),
];

/// Standard tuning targets, low E first.
pub fn standard_tuning() -> [TuningTarget; 6] {
    STANDARD_TUNING.map(|(string, note, octave, midi_note, label)| TuningTarget {
        string,
        note,
        octave,
        midi_note,
        frequency: midi_to_frequency(midi_note),
        label,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TuningStatus {
    InTune,
    Close,
    Flat,
    Sharp,
}

impl TuningStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::InTune => "in tune",
            Self::Close => "close",
            Self::Flat => "flat",
            Self::Sharp => "sharp",
        }
    }
}

impl fmt::Display for TuningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Positive = sharp, negative = flat.
pub fn calculate_cents(frequency: f64, target_frequency: f64) -> f64 {
    1200.0 * (frequency / target_frequency).log2()
}

/// Open string nearest to `frequency` in cents, if any is within a semitone.
pub fn find_closest_string(frequency: f64) -> Option<TuningTarget> {
    if frequency <= 0.0 {
        return None;
    }

    let (closest, cents) = standard_tuning()
        .into_iter()
        .map(|t| (t, calculate_cents(frequency, t.frequency).abs()))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;

    (cents <= MAX_TARGET_CENTS).then_some(closest)
}

pub fn tuning_status(cents: f64) -> TuningStatus {
    let abs = cents.abs();
    if abs <= IN_TUNE_CENTS {
        TuningStatus::InTune
    } else if abs <= CLOSE_CENTS {
        TuningStatus::Close
    } else if cents < 0.0 {
        TuningStatus::Flat
    } else {
        TuningStatus::Sharp
    }
}

/// "0", "+3", "-12".
pub fn format_cents(cents: f64) -> String {
    let rounded = cents.round() as i64;
    if rounded > 0 {
        format!("+{}", rounded)
    } else {
        rounded.to_string()
    }
}

/// Everything a tuner display needs for one detected frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TunerReading {
    pub frequency: f64,
    pub target: TuningTarget,
    pub cents: f64,
    pub status: TuningStatus,
}

impl TunerReading {
    pub fn from_frequency(frequency: f64) -> Option<Self> {
        let target = find_closest_string(frequency)?;
        let cents = calculate_cents(frequency, target.frequency);
        Some(Self {
            frequency,
            target,
            cents,
            status: tuning_status(cents),
        })
    }
}
