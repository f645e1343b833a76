//! Scale patterns and scale membership over the fingerboard (practice mode).

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fretboard::{FretPosition, GUITAR_STRINGS};
use crate::theory::NoteName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ScaleType {
    PentatonicMinor,
    PentatonicMajor,
    Major,
    Minor,
    Blues,
}

impl ScaleType {
    pub const ALL: [ScaleType; 5] = [
        Self::PentatonicMinor,
        Self::PentatonicMajor,
        Self::Major,
        Self::Minor,
        Self::Blues,
    ];

    /// Semitone intervals above the root.
    pub fn pattern(self) -> &'static [i32] {
        match self {
            Self::PentatonicMinor => &[0, 3, 5, 7, 10],
            Self::PentatonicMajor => &[0, 2, 4, 7, 9],
            Self::Major => &[0, 2, 4, 5, 7, 9, 11],
            Self::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Self::Blues => &[0, 3, 5, 6, 7, 10],
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::PentatonicMinor => "Minor Pentatonic",
            Self::PentatonicMajor => "Major Pentatonic",
            Self::Major => "Major",
            Self::Minor => "Minor",
            Self::Blues => "Blues",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::PentatonicMinor => "pentatonic_minor",
            Self::PentatonicMajor => "pentatonic_major",
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Blues => "blues",
        }
    }
}

impl fmt::Display for ScaleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown scale type: {0}")]
pub struct ParseScaleError(pub String);

impl FromStr for ScaleType {
    type Err = ParseScaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|t| t.key() == normalized)
            .ok_or_else(|| ParseScaleError(s.to_string()))
    }
}

/// A fingerboard position annotated with its scale role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScalePosition {
    #[serde(flatten)]
    pub position: FretPosition,
    pub note_name: NoteName,
    pub is_root: bool,
    pub midi_note: i32,
}

fn interval_from_root(midi_note: i32, root: NoteName) -> i32 {
    (midi_note - root.index()).rem_euclid(12)
}

pub fn is_root_note(midi_note: i32, root: NoteName) -> bool {
    interval_from_root(midi_note, root) == 0
}

pub fn is_in_scale(midi_note: i32, root: NoteName, scale: ScaleType) -> bool {
    scale.pattern().contains(&interval_from_root(midi_note, root))
}

/// Scale members in `min_midi..=max_midi`. The fretted range of standard tuning is 40-88.
pub fn scale_midi_notes(
    root: NoteName,
    scale: ScaleType,
    min_midi: i32,
    max_midi: i32,
) -> Vec<i32> {
    (min_midi..=max_midi)
        .filter(|&m| is_in_scale(m, root, scale))
        .collect()
}

/// Every scale tone on the fingerboard up to `max_fret`, string by string (low E first).
pub fn scale_positions(root: NoteName, scale: ScaleType, max_fret: u8) -> Vec<ScalePosition> {
    let mut positions = Vec::new();

    for gs in &GUITAR_STRINGS {
        for fret in 0..=max_fret {
            let midi_note = gs.open_midi + fret as i32;
            let interval = interval_from_root(midi_note, root);
            if scale.pattern().contains(&interval) {
                positions.push(ScalePosition {
                    position: FretPosition::new(gs.string, fret),
                    note_name: NoteName::from_index(midi_note),
                    is_root: interval == 0,
                    midi_note,
                });
            }
        }
    }

    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a_minor_pentatonic_membership() {
        // A C D E G
        for midi in [57, 60, 62, 64, 67] {
            assert!(is_in_scale(midi, NoteName::A, ScaleType::PentatonicMinor), "midi {}", midi);
        }
        for midi in [58, 59, 61, 63, 65, 66, 68] {
            assert!(!is_in_scale(midi, NoteName::A, ScaleType::PentatonicMinor), "midi {}", midi);
        }
    }

    #[test]
    fn test_root_detection() {
        assert!(is_root_note(57, NoteName::A));
        assert!(is_root_note(45, NoteName::A));
        assert!(!is_root_note(58, NoteName::A));
    }

    #[test]
    fn test_scale_midi_notes_default_range() {
        let notes = scale_midi_notes(NoteName::C, ScaleType::Major, 40, 88);
        assert_eq!(notes.first(), Some(&40)); // E2
        assert_eq!(notes.last(), Some(&88)); // E6
        // 7 notes per octave, 4 octaves + E..E boundaries
        assert!(notes.iter().all(|&m| is_in_scale(m, NoteName::C, ScaleType::Major)));
        assert_eq!(notes.len(), 29);
    }

    #[test]
    fn test_scale_positions_order_and_roots() {
        let positions = scale_positions(NoteName::A, ScaleType::PentatonicMinor, 5);
        // Low E string: frets 0 (E), 3 (G), 5 (A)
        let low_e: Vec<u8> = positions
            .iter()
            .filter(|p| p.position.string == 6)
            .map(|p| p.position.fret)
            .collect();
        assert_eq!(low_e, vec![0, 3, 5]);
        assert_eq!(positions[0].position.string, 6);
        assert_eq!(positions.last().unwrap().position.string, 1);

        let root = positions
            .iter()
            .find(|p| p.position == FretPosition::new(6, 5))
            .unwrap();
        assert!(root.is_root);
        assert_eq!(root.note_name, NoteName::A);
        assert_eq!(root.midi_note, 45);
    }

    #[test]
    fn test_scale_type_parse() {
        assert_eq!(
            "pentatonic_minor".parse::<ScaleType>().unwrap(),
            ScaleType::PentatonicMinor
        );
        assert_eq!(
            "Pentatonic-Major".parse::<ScaleType>().unwrap(),
            ScaleType::PentatonicMajor
        );
        assert_eq!("blues".parse::<ScaleType>().unwrap(), ScaleType::Blues);
        assert_eq!(
            "dorian".parse::<ScaleType>(),
            Err(ParseScaleError("dorian".to_string()))
        );
    }
}
