//! Scales
//!
//! Scale formulas and generation of fretboard box patterns in standard tuning.

use crate::{
    fretboard::{FretPosition, ScalePattern, STRING_BASE_MIDI},
    note::{NoteName, SEMITONES},
};
use std::{fmt::Display, ops::RangeInclusive, str::FromStr};
use thiserror::Error;

/// Errors when looking up a scale.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScaleError {
    /// The name matched no known scale type.
    #[error("unknown scale `{0}`")]
    UnknownScale(String),
}

/// Supported scale types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ScaleType {
    /// Ionian
    Major,
    /// Aeolian
    NaturalMinor,
    /// Natural minor with a raised seventh
    HarmonicMinor,
    /// Ascending melodic minor
    MelodicMinor,
    /// Five-note major
    PentatonicMajor,
    /// Five-note minor
    PentatonicMinor,
    /// Minor pentatonic plus the flat fifth
    Blues,
    /// Dorian mode
    Dorian,
    /// Mixolydian mode
    Mixolydian,
    /// Lydian mode
    Lydian,
    /// Phrygian mode
    Phrygian,
    /// Locrian mode
    Locrian,
}

impl ScaleType {
    /// Every scale type.
    pub const ALL: [ScaleType; 12] = [
        ScaleType::Major,
        ScaleType::NaturalMinor,
        ScaleType::HarmonicMinor,
        ScaleType::MelodicMinor,
        ScaleType::PentatonicMajor,
        ScaleType::PentatonicMinor,
        ScaleType::Blues,
        ScaleType::Dorian,
        ScaleType::Mixolydian,
        ScaleType::Lydian,
        ScaleType::Phrygian,
        ScaleType::Locrian,
    ];

    /// Semitones from the tonic, ending with the octave (12).
    pub fn intervals(self) -> &'static [i32] {
        match self {
            ScaleType::Major => &[0, 2, 4, 5, 7, 9, 11, 12],
            ScaleType::NaturalMinor => &[0, 2, 3, 5, 7, 8, 10, 12],
            ScaleType::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11, 12],
            ScaleType::MelodicMinor => &[0, 2, 3, 5, 7, 9, 11, 12],
            ScaleType::PentatonicMajor => &[0, 2, 4, 7, 9, 12],
            ScaleType::PentatonicMinor => &[0, 3, 5, 7, 10, 12],
            ScaleType::Blues => &[0, 3, 5, 6, 7, 10, 12],
            ScaleType::Dorian => &[0, 2, 3, 5, 7, 9, 10, 12],
            ScaleType::Mixolydian => &[0, 2, 4, 5, 7, 9, 10, 12],
            ScaleType::Lydian => &[0, 2, 4, 6, 7, 9, 11, 12],
            ScaleType::Phrygian => &[0, 1, 3, 5, 7, 8, 10, 12],
            ScaleType::Locrian => &[0, 1, 3, 5, 6, 8, 10, 12],
        }
    }

    /// Degree formula relative to the tonic, e.g. `["1", "b3", "4", "5", "b7"]`.
    pub fn formula(self) -> &'static [&'static str] {
        match self {
            ScaleType::Major => &["1", "2", "3", "4", "5", "6", "7"],
            ScaleType::NaturalMinor => &["1", "2", "b3", "4", "5", "b6", "b7"],
            ScaleType::HarmonicMinor => &["1", "2", "b3", "4", "5", "b6", "7"],
            ScaleType::MelodicMinor => &["1", "2", "b3", "4", "5", "6", "7"],
            ScaleType::PentatonicMajor => &["1", "2", "3", "5", "6"],
            ScaleType::PentatonicMinor => &["1", "b3", "4", "5", "b7"],
            ScaleType::Blues => &["1", "b3", "4", "b5", "5", "b7"],
            ScaleType::Dorian => &["1", "2", "b3", "4", "5", "6", "b7"],
            ScaleType::Mixolydian => &["1", "2", "3", "4", "5", "6", "b7"],
            ScaleType::Lydian => &["1", "2", "3", "#4", "5", "6", "7"],
            ScaleType::Phrygian => &["1", "b2", "b3", "4", "5", "b6", "b7"],
            ScaleType::Locrian => &["1", "b2", "b3", "4", "b5", "b6", "b7"],
        }
    }

    /// Display label for the degree at `index` (0 = tonic, shown as `"R"`).
    ///
    /// Returns `None` past the octave.
    pub fn degree_label(self, index: usize) -> Option<&'static str> {
        if index == 0 {
            return Some("R");
        }
        let labels: &[&str] = match self {
            ScaleType::Major => &["2", "3", "4", "p5", "6", "7", "8"],
            ScaleType::NaturalMinor => &["2", "b3", "4", "5", "b6", "b7", "8"],
            ScaleType::HarmonicMinor => &["2", "b3", "4", "5", "b6", "7", "8"],
            ScaleType::MelodicMinor => &["2", "b3", "4", "5", "6", "7", "8"],
            ScaleType::PentatonicMajor => &["2", "3", "p5", "6", "8"],
            ScaleType::PentatonicMinor => &["b3", "4", "5", "b7", "8"],
            ScaleType::Blues => &["b3", "4", "b5", "p5", "b7", "8"],
            ScaleType::Dorian => &["2", "b3", "4", "5", "6", "b7", "8"],
            ScaleType::Mixolydian => &["2", "3", "4", "5", "6", "b7", "8"],
            ScaleType::Lydian => &["2", "3", "#4", "5", "6", "7", "8"],
            ScaleType::Phrygian => &["b2", "b3", "4", "5", "b6", "b7", "8"],
            ScaleType::Locrian => &["b2", "b3", "4", "b5", "b6", "b7", "8"],
        };
        labels.get(index - 1).copied()
    }

    /// Human-readable name.
    pub fn display_name(self) -> &'static str {
        match self {
            ScaleType::Major => "Major",
            ScaleType::NaturalMinor => "Natural minor",
            ScaleType::HarmonicMinor => "Harmonic minor",
            ScaleType::MelodicMinor => "Melodic minor",
            ScaleType::PentatonicMajor => "Pentatonic major",
            ScaleType::PentatonicMinor => "Pentatonic minor",
            ScaleType::Blues => "Blues",
            ScaleType::Dorian => "Dorian",
            ScaleType::Mixolydian => "Mixolydian",
            ScaleType::Lydian => "Lydian",
            ScaleType::Phrygian => "Phrygian",
            ScaleType::Locrian => "Locrian",
        }
    }

    /// Ascending note names from `root_midi` up to its octave, ready to be
    /// used as planner targets.
    pub fn build_scale(self, root_midi: i32) -> Vec<NoteName> {
        self.intervals()
            .iter()
            .map(|&i| NoteName::from_midi(root_midi + i))
            .collect()
    }
}

impl FromStr for ScaleType {
    type Err = ScaleError;

    /// Accepts display names and the usual catalog aliases, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        let scale = match name.as_str() {
            "major" | "ionian" => ScaleType::Major,
            "natural minor" | "minor" | "aeolian" => ScaleType::NaturalMinor,
            "harmonic minor" => ScaleType::HarmonicMinor,
            "melodic minor" | "melodic minor (asc)" => ScaleType::MelodicMinor,
            "pentatonic major" | "major pentatonic" => ScaleType::PentatonicMajor,
            "pentatonic minor" | "minor pentatonic" => ScaleType::PentatonicMinor,
            "blues" => ScaleType::Blues,
            "dorian" => ScaleType::Dorian,
            "mixolydian" => ScaleType::Mixolydian,
            "lydian" => ScaleType::Lydian,
            "phrygian" => ScaleType::Phrygian,
            "locrian" => ScaleType::Locrian,
            _ => return Err(ScaleError::UnknownScale(s.to_string())),
        };
        Ok(scale)
    }
}

impl Display for ScaleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Semitone offset of a degree token such as `"b3"` or `"#4"`.
pub fn degree_semitones(degree: &str) -> Option<usize> {
    let semitones = match degree {
        "1" => 0,
        "b2" => 1,
        "2" => 2,
        "#2" | "b3" => 3,
        "3" => 4,
        "4" => 5,
        "#4" | "b5" => 6,
        "5" => 7,
        "#5" | "b6" => 8,
        "6" | "bb7" => 9,
        "b7" => 10,
        "7" => 11,
        _ => return None,
    };
    Some(semitones)
}

fn degree_display(degree: &str) -> &str {
    match degree {
        "1" => "R",
        "4" => "p4",
        "5" => "p5",
        other => other,
    }
}

impl ScalePattern {
    /// Every position within `frets` (inclusive) whose pitch class belongs to
    /// the scale given by `formula`, string by string from low E.
    ///
    /// Unknown degree tokens are ignored. When two tokens name the same pitch
    /// class the later one supplies the label.
    pub fn build(root: NoteName, formula: &[&str], frets: RangeInclusive<u8>) -> ScalePattern {
        let mut degree_of: [Option<&str>; SEMITONES] = [None; SEMITONES];
        for &degree in formula {
            if let Some(offset) = degree_semitones(degree) {
                degree_of[(root.index() + offset) % SEMITONES] = Some(degree);
            }
        }

        let mut positions = Vec::new();
        for (string, &open) in STRING_BASE_MIDI.iter().enumerate() {
            for fret in frets.clone() {
                let note = NoteName::from_midi(open + i32::from(fret));
                if let Some(degree) = degree_of[note.index()] {
                    let label = degree_display(degree);
                    let is_root = label == "R" || note == root;
                    positions.push(FretPosition::new(string, fret, note, label, is_root));
                }
            }
        }
        ScalePattern::new(positions)
    }

    /// [`ScalePattern::build`] with the formula of `scale`.
    pub fn for_scale(root: NoteName, scale: ScaleType, frets: RangeInclusive<u8>) -> ScalePattern {
        ScalePattern::build(root, scale.formula(), frets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fretboard::STRINGS;

    #[test]
    fn intervals_and_formula_agree() {
        for scale in ScaleType::ALL {
            let from_formula: Vec<i32> = scale
                .formula()
                .iter()
                .map(|d| degree_semitones(d).unwrap() as i32)
                .collect();
            let intervals = scale.intervals();
            assert_eq!(&intervals[..intervals.len() - 1], &from_formula[..], "{scale}");
            assert_eq!(scale.degree_label(0), Some("R"));
            assert_eq!(scale.degree_label(intervals.len() - 1), Some("8"));
            assert_eq!(scale.degree_label(intervals.len()), None);
        }
    }

    #[test]
    fn builds_a_major_scale() {
        let notes = ScaleType::Major.build_scale(60);
        let names: Vec<String> = notes.iter().map(|n| n.to_string()).collect();
        assert_eq!(names, ["C", "D", "E", "F", "G", "A", "B", "C"]);
    }

    #[test]
    fn parses_catalog_aliases() {
        assert_eq!("Aeolian".parse(), Ok(ScaleType::NaturalMinor));
        assert_eq!(" melodic minor (asc) ".parse(), Ok(ScaleType::MelodicMinor));
        assert_eq!("Pentatonic Minor".parse(), Ok(ScaleType::PentatonicMinor));
        assert!("bebop".parse::<ScaleType>().is_err());
    }

    #[test]
    fn a_minor_pentatonic_box() {
        let pattern = ScalePattern::for_scale(NoteName::A, ScaleType::PentatonicMinor, 5..=8);
        // classic first box: two notes per string
        assert_eq!(pattern.len(), 12);
        for string in 0..STRINGS {
            assert_eq!(pattern.positions().iter().filter(|p| p.string == string).count(), 2);
        }

        let low_root = &pattern.positions()[0];
        assert_eq!((low_root.string, low_root.fret), (0, 5));
        assert_eq!(low_root.note, NoteName::A);
        assert_eq!(low_root.degree, "R");
        assert!(low_root.is_root);

        assert_eq!(pattern.roots().count(), 3);
        assert!(pattern.positions().iter().any(|p| p.degree == "p5"));
    }

    #[test]
    fn ignores_unknown_degrees() {
        let pattern = ScalePattern::build(NoteName::C, &["1", "x9"], 0..=12);
        assert!(pattern.positions().iter().all(|p| p.note == NoteName::C && p.is_root));
    }
}
