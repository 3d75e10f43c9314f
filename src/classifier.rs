//! Chord Classifier
//!
//! Template matching of an averaged chromagram against reference chord
//! profiles using cosine similarity.

use crate::{
    chromagram::ChromaVector,
    note::{NoteName, SEMITONES},
};
use std::fmt::Display;

/// Result emitted when no template matches well enough.
pub const NO_CHORD: &str = "No Chord";

/// Minimum cosine similarity a template must exceed to be reported.
pub const SIMILARITY_THRESHOLD: f32 = 0.5;

/// Number of chord qualities
const NUM_CHORD_KINDS: usize = 10;

/// Supported chord qualities in the same order as `CHORD_INTERVALS`
const CHORD_KINDS: [ChordKind; NUM_CHORD_KINDS] = [
    ChordKind::Major,
    ChordKind::Minor,
    ChordKind::PowerFifth,
    ChordKind::DominantSeventh,
    ChordKind::MajorSeventh,
    ChordKind::MinorSeventh,
    ChordKind::Diminished,
    ChordKind::Augmented,
    ChordKind::SuspendedSecond,
    ChordKind::SuspendedFourth,
];

/// Intervals (in semitones) matching `CHORD_KINDS` order
const CHORD_INTERVALS: [&[usize]; NUM_CHORD_KINDS] = [
    &[0, 4, 7],
    &[0, 3, 7],
    &[0, 7],
    &[0, 4, 7, 10],
    &[0, 4, 7, 11],
    &[0, 3, 7, 10],
    &[0, 3, 6],
    &[0, 4, 8],
    &[0, 2, 7],
    &[0, 5, 7],
];

/// Supported chord qualities
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChordKind {
    /// Major chord (e.g., C-E-G)
    Major,
    /// Minor chord (e.g., C-Eb-G)
    Minor,
    /// Power chord (e.g., C-G)
    PowerFifth,
    /// Dominant seventh chord (e.g., C-E-G-Bb)
    DominantSeventh,
    /// Major seventh chord (e.g., C-E-G-B)
    MajorSeventh,
    /// Minor seventh chord (e.g., C-Eb-G-Bb)
    MinorSeventh,
    /// Diminished chord (e.g., C-Eb-Gb)
    Diminished,
    /// Augmented chord (e.g., C-E-G#)
    Augmented,
    /// Suspended second chord (e.g., C-D-G)
    SuspendedSecond,
    /// Suspended fourth chord (e.g., C-F-G)
    SuspendedFourth,
}

impl ChordKind {
    /// Every supported quality.
    pub const ALL: [ChordKind; NUM_CHORD_KINDS] = CHORD_KINDS;

    /// Semitone offsets from the root.
    pub fn intervals(self) -> &'static [usize] {
        CHORD_INTERVALS[self as usize]
    }

    /// Conventional chord-symbol suffix, e.g. `"m7"` for a minor seventh.
    pub fn suffix(self) -> &'static str {
        match self {
            ChordKind::Major => "",
            ChordKind::Minor => "m",
            ChordKind::PowerFifth => "5",
            ChordKind::DominantSeventh => "7",
            ChordKind::MajorSeventh => "maj7",
            ChordKind::MinorSeventh => "m7",
            ChordKind::Diminished => "dim",
            ChordKind::Augmented => "aug",
            ChordKind::SuspendedSecond => "sus2",
            ChordKind::SuspendedFourth => "sus4",
        }
    }
}

impl Display for ChordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A named reference chroma profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordTemplate {
    /// Display name reported on a match, e.g. `"Am"`.
    pub name: String,
    /// Expected energy per pitch class.
    pub profile: ChromaVector,
}

impl ChordTemplate {
    /// Create a template from a name and a profile.
    pub fn new(name: impl Into<String>, profile: ChromaVector) -> Self {
        ChordTemplate {
            name: name.into(),
            profile,
        }
    }

    /// Binary template with weight 1 on every chord tone, named with the
    /// usual symbol (`"C#m7"`, `"Gsus4"`...).
    pub fn from_intervals(root: NoteName, kind: ChordKind) -> Self {
        let mut profile = [0.0; SEMITONES];
        for &off in kind.intervals() {
            profile[(root.index() + off) % SEMITONES] = 1.0;
        }
        ChordTemplate {
            name: format!("{root}{}", kind.suffix()),
            profile,
        }
    }
}

/// Binary templates for every root and quality, grouped by quality in
/// `ChordKind::ALL` order, roots ascending from C.
pub fn standard_templates() -> Vec<ChordTemplate> {
    CHORD_KINDS
        .iter()
        .flat_map(|&kind| {
            NoteName::ALL
                .iter()
                .map(move |&root| ChordTemplate::from_intervals(root, kind))
        })
        .collect()
}

/// Cosine of the angle between two chroma vectors, 0 when either is silent.
#[inline]
pub fn cosine_similarity(profile: &ChromaVector, chroma: &ChromaVector) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_p = 0.0f64;
    let mut norm_c = 0.0f64;
    for (&p, &c) in profile.iter().zip(chroma) {
        let (p, c) = (p as f64, c as f64);
        dot += p * c;
        norm_p += p * p;
        norm_c += c * c;
    }
    if norm_p == 0.0 || norm_c == 0.0 {
        return 0.0;
    }
    (dot / (norm_p.sqrt() * norm_c.sqrt())) as f32
}

/// Picks the best matching template for a chromagram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChordClassifier {
    threshold: f32,
}

impl ChordClassifier {
    /// Classifier with the default [`SIMILARITY_THRESHOLD`].
    pub fn new() -> Self {
        Self::with_threshold(SIMILARITY_THRESHOLD)
    }

    /// Classifier reporting only similarities strictly above `threshold`.
    pub fn with_threshold(threshold: f32) -> Self {
        ChordClassifier { threshold }
    }

    /// Minimum similarity a match must exceed.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Name of the most similar template, or [`NO_CHORD`].
    ///
    /// Only similarities strictly above the threshold count. When several
    /// templates share the maximum the first in `templates` wins, so the
    /// caller's ordering decides ties.
    pub fn classify<'a>(&self, chroma: &ChromaVector, templates: &'a [ChordTemplate]) -> &'a str {
        self.best_match(chroma, templates)
            .map_or(NO_CHORD, |(template, _)| template.name.as_str())
    }

    /// Best template together with its similarity, if any exceeds the
    /// threshold.
    pub fn best_match<'a>(
        &self,
        chroma: &ChromaVector,
        templates: &'a [ChordTemplate],
    ) -> Option<(&'a ChordTemplate, f32)> {
        let mut best: Option<(&ChordTemplate, f32)> = None;
        for template in templates {
            let score = cosine_similarity(&template.profile, chroma);
            log::trace!("{} score={score:.4}", template.name);
            let beats_best = match best {
                Some((_, s)) => score > s,
                None => true,
            };
            if score > self.threshold && beats_best {
                best = Some((template, score));
            }
        }
        best
    }

    /// Similarity of every template, in template order.
    pub fn scores(&self, chroma: &ChromaVector, templates: &[ChordTemplate]) -> Vec<f32> {
        templates
            .iter()
            .map(|t| cosine_similarity(&t.profile, chroma))
            .collect()
    }
}

impl Default for ChordClassifier {
    fn default() -> Self {
        ChordClassifier::new()
    }
}
