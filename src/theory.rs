//! Equal-temperament conversions between frequency, MIDI note and note name.
//!
//! A4 = 440 Hz = MIDI 69. All functions are pure; frequency inputs must be
//! positive (the log is undefined otherwise).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reference pitch for A4.
pub const A4_FREQUENCY: f64 = 440.0;
pub const A4_MIDI: i32 = 69;

/// Lowest frequency accepted as a guitar note (just under E2 at ~82 Hz).
pub const GUITAR_MIN_HZ: f64 = 75.0;
/// Highest frequency accepted as a guitar note (just over E6 at ~1319 Hz).
pub const GUITAR_MAX_HZ: f64 = 1400.0;

/// The twelve chromatic pitch classes, starting at C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteName {
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C#")]
    CSharp,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D#")]
    DSharp,
    #[serde(rename = "E")]
    E,
    #[serde(rename = "F")]
    F,
    #[serde(rename = "F#")]
    FSharp,
    #[serde(rename = "G")]
    G,
    #[serde(rename = "G#")]
    GSharp,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A#")]
    ASharp,
    #[serde(rename = "B")]
    B,
}

/// Chromatic table indexed by `midi % 12`.
pub const NOTE_NAMES: [NoteName; 12] = [
    NoteName::C,
    NoteName::CSharp,
    NoteName::D,
    NoteName::DSharp,
    NoteName::E,
    NoteName::F,
    NoteName::FSharp,
    NoteName::G,
    NoteName::GSharp,
    NoteName::A,
    NoteName::ASharp,
    NoteName::B,
];

impl NoteName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::C => "C",
            Self::CSharp => "C#",
            Self::D => "D",
            Self::DSharp => "D#",
            Self::E => "E",
            Self::F => "F",
            Self::FSharp => "F#",
            Self::G => "G",
            Self::GSharp => "G#",
            Self::A => "A",
            Self::ASharp => "A#",
            Self::B => "B",
        }
    }

    /// Chromatic index 0-11 (C = 0).
    pub fn index(self) -> i32 {
        self as i32
    }

    /// Note name for any chromatic index, wrapping negatives and values ≥ 12.
    pub fn from_index(index: i32) -> Self {
        NOTE_NAMES[index.rem_euclid(12) as usize]
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown note name: {0:?}")]
pub struct ParseNoteError(pub String);

impl FromStr for NoteName {
    type Err = ParseNoteError;

    /// Accepts sharps ("C#") and flats as enharmonic aliases ("Db" → C#).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        pitch_class_offset(s)
            .map(Self::from_index)
            .ok_or_else(|| ParseNoteError(s.to_string()))
    }
}

/// Semitones above C for a note name, without wrapping: "Cb" → -1, "B#" → 12.
fn pitch_class_offset(s: &str) -> Option<i32> {
    let t = s.trim();
    let mut chars = t.chars();
    let base = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let accidental = match chars.as_str() {
        "" => 0,
        "#" | "♯" => 1,
        "b" | "♭" => -1,
        _ => return None,
    };
    Some(base + accidental)
}

/// A detected note, derived from a frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteInfo {
    pub midi_note: i32,
    pub note_name: NoteName,
    pub octave: i32,
    pub frequency: f64,
}

impl NoteInfo {
    pub fn from_frequency(frequency: f64) -> Self {
        let midi_note = frequency_to_midi(frequency);
        Self {
            midi_note,
            note_name: midi_to_note_name(midi_note),
            octave: midi_to_octave(midi_note),
            frequency,
        }
    }

    /// `None` for zero, negative or non-finite input, where no pitch exists.
    pub fn try_from_frequency(frequency: f64) -> Option<Self> {
        (frequency.is_finite() && frequency > 0.0).then(|| Self::from_frequency(frequency))
    }

    /// Display form such as "A4".
    pub fn label(&self) -> String {
        format_note(self.note_name, self.octave)
    }
}

/// Nearest MIDI note: `round(12·log2(f/440) + 69)`.
pub fn frequency_to_midi(frequency: f64) -> i32 {
    (12.0 * (frequency / A4_FREQUENCY).log2() + A4_MIDI as f64).round() as i32
}

pub fn midi_to_frequency(midi_note: i32) -> f64 {
    A4_FREQUENCY * 2f64.powf((midi_note as f64 - A4_MIDI as f64) / 12.0)
}

pub fn midi_to_note_name(midi_note: i32) -> NoteName {
    NoteName::from_index(midi_note)
}

/// MIDI 60 → octave 4.
pub fn midi_to_octave(midi_note: i32) -> i32 {
    midi_note.div_euclid(12) - 1
}

pub fn format_note(note_name: NoteName, octave: i32) -> String {
    format!("{}{}", note_name, octave)
}

pub fn is_guitar_range(frequency: f64) -> bool {
    (GUITAR_MIN_HZ..=GUITAR_MAX_HZ).contains(&frequency)
}

/// Parse a note given either as a MIDI number ("52") or as name+octave ("E3", "C#4", "Bb2").
pub fn parse_note_or_midi(s: &str) -> Option<i32> {
    let t = s.trim();
    if let Ok(midi) = t.parse::<i32>() {
        return Some(midi);
    }
    let split = t.find(|c: char| c.is_ascii_digit() || c == '-')?;
    let (name, octave) = t.split_at(split);
    let offset = pitch_class_offset(name)?;
    let octave: i32 = octave.parse().ok()?;
    octave.checked_add(1)?.checked_mul(12)?.checked_add(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_to_midi() {
        assert_eq!(frequency_to_midi(440.0), 69);
        assert_eq!(frequency_to_midi(82.41), 40);
        assert_eq!(frequency_to_midi(329.63), 64);
        // 20 cents sharp still rounds to the same note
        assert_eq!(frequency_to_midi(440.0 * 2f64.powf(0.2 / 12.0)), 69);
    }

    #[test]
    fn test_midi_to_frequency() {
        assert!((midi_to_frequency(69) - 440.0).abs() < 1e-9);
        assert!((midi_to_frequency(57) - 220.0).abs() < 1e-9);
        assert!((midi_to_frequency(40) - 82.4069).abs() < 1e-3);
    }

    #[test]
    fn test_note_name_and_octave() {
        assert_eq!(midi_to_note_name(60), NoteName::C);
        assert_eq!(midi_to_octave(60), 4);
        assert_eq!(midi_to_note_name(40), NoteName::E);
        assert_eq!(midi_to_octave(40), 2);
        assert_eq!(midi_to_note_name(70), NoteName::ASharp);
        assert_eq!(midi_to_octave(11), -1);
    }

    #[test]
    fn test_note_info_from_frequency() {
        let info = NoteInfo::from_frequency(110.0);
        assert_eq!(info.midi_note, 45);
        assert_eq!(info.note_name, NoteName::A);
        assert_eq!(info.octave, 2);
        assert_eq!(info.label(), "A2");
    }

    #[test]
    fn test_note_info_rejects_non_pitches() {
        assert!(NoteInfo::try_from_frequency(0.0).is_none());
        assert!(NoteInfo::try_from_frequency(-110.0).is_none());
        assert!(NoteInfo::try_from_frequency(f64::NAN).is_none());
        assert!(NoteInfo::try_from_frequency(f64::INFINITY).is_none());
        assert_eq!(NoteInfo::try_from_frequency(110.0).map(|n| n.midi_note), Some(45));
        // Extreme MIDI numbers must not overflow on the way back to Hz
        assert_eq!(midi_to_frequency(i32::MIN), 0.0);
    }

    #[test]
    fn test_guitar_range() {
        assert!(is_guitar_range(75.0));
        assert!(is_guitar_range(1400.0));
        assert!(is_guitar_range(440.0));
        assert!(!is_guitar_range(74.9));
        assert!(!is_guitar_range(1400.1));
    }

    #[test]
    fn test_parse_note_name() {
        assert_eq!("C#".parse::<NoteName>().unwrap(), NoteName::CSharp);
        assert_eq!("db".parse::<NoteName>().unwrap(), NoteName::CSharp);
        assert_eq!("Cb".parse::<NoteName>().unwrap(), NoteName::B);
        assert!("H".parse::<NoteName>().is_err());
        assert!("".parse::<NoteName>().is_err());
    }

    #[test]
    fn test_parse_note_or_midi() {
        assert_eq!(parse_note_or_midi("52"), Some(52));
        assert_eq!(parse_note_or_midi("E2"), Some(40));
        assert_eq!(parse_note_or_midi("A4"), Some(69));
        assert_eq!(parse_note_or_midi("Bb3"), Some(58));
        assert_eq!(parse_note_or_midi("B#3"), Some(60));
        assert_eq!(parse_note_or_midi("Cb4"), Some(59));
        assert_eq!(parse_note_or_midi("nope"), None);
    }

    #[test]
    fn test_parse_note_or_midi_rejects_huge_octave() {
        assert_eq!(parse_note_or_midi("C999999999"), None);
        assert_eq!(parse_note_or_midi("B178956969"), None);
        assert_eq!(parse_note_or_midi("C-999999999"), None);
    }

    #[test]
    fn test_parse_note_error_message() {
        let err = "H".parse::<NoteName>().unwrap_err();
        assert_eq!(err.to_string(), "unknown note name: \"H\"");
    }

    #[test]
    fn test_from_index_wraps() {
        assert_eq!(NoteName::from_index(-1), NoteName::B);
        assert_eq!(NoteName::from_index(12), NoteName::C);
        assert_eq!(NoteName::from_index(25), NoteName::CSharp);
    }
}
