//! Fuses the audio candidate set with the vision fret estimate.
//!
//! Pure and stateless; called on every audio/vision tick. Rules, in order:
//!
//! 1. no note (or no candidates) → `None` confidence
//! 2. no hand → `Low`, all candidates (audio-only fallback)
//! 3. filter candidates to `estimated ± tolerance`:
//!    one match → `High`; several → `Medium`, nearest fret wins (earliest in
//!    string-table order on ties); none → `Low`, all candidates

use std::fmt;

use serde::Serialize;

use crate::fretboard::FretPosition;

/// What the audio side knows about the current note.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioData {
    pub midi_note: Option<i32>,
    /// Candidates for `midi_note`, in fingerboard string-table order.
    pub possible_positions: Vec<FretPosition>,
}

/// What the vision side knows about the fretting hand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisionData {
    pub hand_detected: bool,
    pub estimated_fret: u8,
    /// Symmetric window half-width, in frets.
    pub tolerance: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    None,
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPosition {
    pub position: Option<FretPosition>,
    pub confidence: Confidence,
    pub all_matches: Vec<FretPosition>,
    pub reasoning: String,
}

impl ResolvedPosition {
    fn unresolved(
        confidence: Confidence,
        all_matches: Vec<FretPosition>,
        reasoning: String,
    ) -> Self {
        Self {
            position: None,
            confidence,
            all_matches,
            reasoning,
        }
    }
}

pub fn resolve_position(audio: &AudioData, vision: &VisionData) -> ResolvedPosition {
    if audio.midi_note.is_none() || audio.possible_positions.is_empty() {
        return ResolvedPosition::unresolved(
            Confidence::None,
            Vec::new(),
            "No note detected".to_string(),
        );
    }

    if !vision.hand_detected {
        return ResolvedPosition::unresolved(
            Confidence::Low,
            audio.possible_positions.clone(),
            format!(
                "Hand not detected - showing all {} possible positions",
                audio.possible_positions.len()
            ),
        );
    }

    // Signed so a window near the nut can extend below fret 0
    let estimated = vision.estimated_fret as i32;
    let min_fret = estimated - vision.tolerance as i32;
    let max_fret = estimated + vision.tolerance as i32;

    let matches: Vec<FretPosition> = audio
        .possible_positions
        .iter()
        .copied()
        .filter(|p| (min_fret..=max_fret).contains(&(p.fret as i32)))
        .collect();

    match matches.as_slice() {
        [] => ResolvedPosition::unresolved(
            Confidence::Low,
            audio.possible_positions.clone(),
            format!("No positions match hand region {}-{}", min_fret, max_fret),
        ),
        [only] => ResolvedPosition {
            position: Some(*only),
            confidence: Confidence::High,
            reasoning: format!(
                "Matched: string {} fret {} within hand region {}-{}",
                only.string, only.fret, min_fret, max_fret
            ),
            all_matches: matches,
        },
        _ => {
            // min_by_key keeps the first minimum, so ties go to the lower string
            let closest = matches
                .iter()
                .copied()
                .min_by_key(|p| (p.fret as i32 - estimated).abs());
            ResolvedPosition {
                position: closest,
                confidence: Confidence::Medium,
                reasoning: format!(
                    "{} matches in hand region {}-{}, closest to fret {}",
                    matches.len(),
                    min_fret,
                    max_fret,
                    estimated
                ),
                all_matches: matches,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fretboard::{find_positions, FRET_COUNT};

    fn audio(positions: Vec<FretPosition>) -> AudioData {
        AudioData {
            midi_note: Some(43),
            possible_positions: positions,
        }
    }

    fn two_candidates() -> Vec<FretPosition> {
        vec![FretPosition::new(6, 3), FretPosition::new(4, 10)]
    }

    fn hand(estimated_fret: u8, tolerance: u8) -> VisionData {
        VisionData {
            hand_detected: true,
            estimated_fret,
            tolerance,
        }
    }

    #[test]
    fn test_no_note_is_none_regardless_of_vision() {
        let a = AudioData {
            midi_note: None,
            possible_positions: two_candidates(),
        };
        let no_hand = VisionData {
            hand_detected: false,
            estimated_fret: 0,
            tolerance: 0,
        };
        for v in [hand(3, 1), no_hand] {
            let r = resolve_position(&a, &v);
            assert_eq!(r.confidence, Confidence::None);
            assert!(r.position.is_none());
            assert!(r.all_matches.is_empty());
            assert!(r.reasoning.contains("No note"));
        }
    }

    #[test]
    fn test_empty_candidates_is_none() {
        let r = resolve_position(&audio(vec![]), &hand(3, 1));
        assert_eq!(r.confidence, Confidence::None);
    }

    #[test]
    fn test_no_hand_falls_back_to_all_positions() {
        let v = VisionData {
            hand_detected: false,
            estimated_fret: 3,
            tolerance: 1,
        };
        let r = resolve_position(&audio(two_candidates()), &v);
        assert_eq!(r.confidence, Confidence::Low);
        assert!(r.position.is_none());
        assert_eq!(r.all_matches, two_candidates());
        assert!(r.reasoning.contains("Hand not detected"));
    }

    #[test]
    fn test_single_match_is_high() {
        let r = resolve_position(&audio(two_candidates()), &hand(3, 1));
        assert_eq!(r.confidence, Confidence::High);
        assert_eq!(r.position, Some(FretPosition::new(6, 3)));
        assert_eq!(r.all_matches, vec![FretPosition::new(6, 3)]);
        assert!(r.reasoning.contains("2-4"));
    }

    #[test]
    fn test_multiple_matches_pick_nearest() {
        // window 2-10: both match; 3 is 3 away, 10 is 4 away
        let r = resolve_position(&audio(two_candidates()), &hand(6, 4));
        assert_eq!(r.confidence, Confidence::Medium);
        assert_eq!(r.position, Some(FretPosition::new(6, 3)));
        assert_eq!(r.all_matches.len(), 2);
        assert!(r.reasoning.contains("2-10"));
    }

    #[test]
    fn test_tie_goes_to_first_in_table_order() {
        // A3 (57): 6/17, 5/12, 4/7, 3/2; the exact hit beats the equidistant 7 and 17
        let positions = find_positions(57, FRET_COUNT);
        let r = resolve_position(&audio(positions), &hand(12, 5));
        assert_eq!(r.confidence, Confidence::Medium);
        assert_eq!(r.position, Some(FretPosition::new(5, 12)));

        let tied = vec![FretPosition::new(6, 5), FretPosition::new(5, 9)];
        let r = resolve_position(&audio(tied), &hand(7, 2));
        assert_eq!(r.position, Some(FretPosition::new(6, 5)));
    }

    #[test]
    fn test_no_match_is_low_with_all_candidates() {
        let r = resolve_position(&audio(two_candidates()), &hand(20, 1));
        assert_eq!(r.confidence, Confidence::Low);
        assert!(r.position.is_none());
        assert_eq!(r.all_matches, two_candidates());
        assert!(r.reasoning.contains("19-21"));
    }

    #[test]
    fn test_window_below_nut() {
        // Open string with the hand at fret 1, tolerance 2 → window -1..3
        let a = audio(vec![FretPosition::new(5, 0), FretPosition::new(6, 5)]);
        let r = resolve_position(&a, &hand(1, 2));
        assert_eq!(r.confidence, Confidence::High);
        assert_eq!(r.position, Some(FretPosition::new(5, 0)));
        assert!(r.reasoning.contains("-1-3"));
    }

    #[test]
    fn test_matches_are_subset_of_candidates() {
        for midi in 40..=88 {
            let candidates = find_positions(midi, FRET_COUNT);
            for fret in 0..=24u8 {
                for tolerance in 0..=4u8 {
                    let a = AudioData {
                        midi_note: Some(midi),
                        possible_positions: candidates.clone(),
                    };
                    let r = resolve_position(&a, &hand(fret, tolerance));
                    assert!(r.all_matches.iter().all(|p| candidates.contains(p)));
                    if let Some(p) = r.position {
                        assert!(r.all_matches.contains(&p));
                    }
                }
            }
        }
    }

    #[test]
    fn test_confidence_ordering() {
        assert!(Confidence::High > Confidence::Medium);
        assert!(Confidence::Low > Confidence::None);
        assert_eq!(Confidence::Medium.to_string(), "medium");
    }
}
