//! Note names
//!
//! Pitch-class spelling, enharmonic normalization and MIDI helpers shared by
//! the chord templates and the fretboard planner.

use std::{fmt::Display, str::FromStr};
use thiserror::Error;

/// Number of pitch classes in an octave.
pub const SEMITONES: usize = 12;

/// MIDI number of A4.
const A4_MIDI: f32 = 69.0;

/// Frequency of A4 in Hz.
const A4_HZ: f32 = 440.0;

const SHARP_NAMES: [&str; SEMITONES] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const ALL_NOTES: [NoteName; SEMITONES] = [
    NoteName::C,
    NoteName::Cs,
    NoteName::D,
    NoteName::Ds,
    NoteName::E,
    NoteName::F,
    NoteName::Fs,
    NoteName::G,
    NoteName::Gs,
    NoteName::A,
    NoteName::As,
    NoteName::B,
];

/// Errors when parsing a note name.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NoteError {
    /// The text did not spell any of the twelve pitch classes.
    #[error("unknown note name `{0}`")]
    Unknown(String),
}

/// Twelve chromatic pitch classes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NoteName {
    /// C
    C,
    /// C sharp / D flat
    Cs,
    /// D
    D,
    /// D sharp / E flat
    Ds,
    /// E
    E,
    /// F
    F,
    /// F sharp / G flat
    Fs,
    /// G
    G,
    /// G sharp / A flat
    Gs,
    /// A
    A,
    /// A sharp / B flat
    As,
    /// B
    B,
}

impl NoteName {
    /// All twelve pitch classes, starting at C.
    pub const ALL: [NoteName; SEMITONES] = ALL_NOTES;

    /// Pitch class for a chroma index. Indices wrap modulo 12.
    pub const fn from_index(idx: usize) -> NoteName {
        ALL_NOTES[idx % SEMITONES]
    }

    /// Chroma index of this pitch class (0 = C .. 11 = B).
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Sharp spelling, e.g. `"C#"`.
    pub const fn as_str(self) -> &'static str {
        SHARP_NAMES[self as usize]
    }

    /// Pitch class of a MIDI note number. Negative numbers wrap as well.
    pub fn from_midi(midi: i32) -> NoteName {
        NoteName::from_index(midi.rem_euclid(SEMITONES as i32) as usize)
    }

    /// Parse a note name, ignoring any octave suffix.
    ///
    /// Accepts `#`/`♯` and `b`/`♭` accidentals in any case, so `"db4"`,
    /// `"C♯"` and `"Db"` all give [`NoteName::Cs`]. `E#`, `B#`, `Cb` and `Fb`
    /// resolve to their natural neighbours.
    pub fn parse(text: &str) -> Option<NoteName> {
        let trimmed = text.trim().trim_end_matches(|c: char| c.is_ascii_digit());
        let mut chars = trimmed.chars();

        let base: i32 = match chars.next()?.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };

        let mut offset = 0;
        for c in chars {
            match c {
                '#' | '♯' => offset += 1,
                'b' | 'B' | '♭' => offset -= 1,
                c if c.is_whitespace() => {}
                _ => return None,
            }
        }

        Some(NoteName::from_midi(base + offset))
    }

    /// Whether two spellings name the same pitch class (`"Db"` == `"C#4"`).
    ///
    /// Unparseable names are never equal to anything.
    pub fn equals_enharmonic(a: &str, b: &str) -> bool {
        match (NoteName::parse(a), NoteName::parse(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }
}

impl FromStr for NoteName {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NoteName::parse(s).ok_or_else(|| NoteError::Unknown(s.to_string()))
    }
}

impl Display for NoteName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fractional MIDI number for a frequency, `None` for non-positive input.
pub fn frequency_to_midi(frequency: f32) -> Option<f32> {
    if frequency <= 0.0 {
        return None;
    }
    Some(SEMITONES as f32 * (frequency / A4_HZ).log2() + A4_MIDI)
}

/// Deviation in cents from the nearest equal-tempered pitch. Zero for
/// non-positive input.
pub fn cents_off(frequency: f32) -> f32 {
    match frequency_to_midi(frequency) {
        Some(midi) => (midi - midi.round()) * 100.0,
        None => 0.0,
    }
}
