//! Standard-tuning fingerboard: open-string table and pitch → position search.

use serde::{Deserialize, Serialize};

use crate::theory::NoteName;

/// Highest fret considered by position search.
pub const FRET_COUNT: u8 = 24;
/// Frets drawn by a typical fingerboard view (0-15).
pub const DISPLAY_FRETS: u8 = 15;

const SINGLE_DOT_FRETS: [u8; 8] = [3, 5, 7, 9, 15, 17, 19, 21];
const DOUBLE_DOT_FRETS: [u8; 2] = [12, 24];

/// One open string of the instrument. String 1 is the highest-pitched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuitarString {
    pub string: u8,
    pub open_note: NoteName,
    pub open_midi: i32,
    pub name: &'static str,
}

/// Standard tuning EADGBE, ordered low E (string 6) to high E (string 1).
/// Search results follow this order and callers rely on it.
pub const GUITAR_STRINGS: [GuitarString; 6] = [
    GuitarString {
        string: 6,
        open_note: NoteName::E,
        open_midi: 40,
        name: "E2",
    },
    GuitarString {
        string: 5,
        open_note: NoteName::A,
        open_midi: 45,
        name: "A2",
    },
    GuitarString {
        string: 4,
        open_note: NoteName::D,
        open_midi: 50,
        name: "D3",
    },
    GuitarString {
        string: 3,
        open_note: NoteName::G,
        open_midi: 55,
        name: "G3",
    },
    GuitarString {
        string: 2,
        open_note: NoteName::B,
        open_midi: 59,
        name: "B3",
    },
    GuitarString {
        string: 1,
        open_note: NoteName::E,
        open_midi: 64,
        name: "E4",
    },
];

/// A fretted (or open, fret 0) position on one string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FretPosition {
    pub string: u8,
    pub fret: u8,
}

impl FretPosition {
    pub fn new(string: u8, fret: u8) -> Self {
        Self { string, fret }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FretMarker {
    Single,
    Double,
}

/// Every position where `midi_note` can be played, up to `max_fret`.
/// At most one result per string, in `GUITAR_STRINGS` order.
pub fn find_positions(midi_note: i32, max_fret: u8) -> Vec<FretPosition> {
    GUITAR_STRINGS
        .iter()
        .filter_map(|gs| {
            let fret = midi_note.checked_sub(gs.open_midi)?;
            (0..=max_fret as i32)
                .contains(&fret)
                .then(|| FretPosition::new(gs.string, fret as u8))
        })
        .collect()
}

/// `find_positions` over the full neck, or nothing when no note is sounding.
pub fn positions_for_note(midi_note: Option<i32>) -> Vec<FretPosition> {
    midi_note
        .map(|m| find_positions(m, FRET_COUNT))
        .unwrap_or_default()
}

pub fn guitar_string(string: u8) -> Option<&'static GuitarString> {
    GUITAR_STRINGS.iter().find(|gs| gs.string == string)
}

/// MIDI note sounded at `(string, fret)`; `None` for a string outside 1-6.
pub fn midi_for_position(string: u8, fret: u8) -> Option<i32> {
    guitar_string(string).map(|gs| gs.open_midi + fret as i32)
}

pub fn fret_marker(fret: u8) -> Option<FretMarker> {
    if DOUBLE_DOT_FRETS.contains(&fret) {
        Some(FretMarker::Double)
    } else if SINGLE_DOT_FRETS.contains(&fret) {
        Some(FretMarker::Single)
    } else {
        None
    }
}

pub fn string_name(string: u8) -> String {
    match guitar_string(string) {
        Some(gs) => gs.name.to_string(),
        None => format!("String {}", string),
    }
}
