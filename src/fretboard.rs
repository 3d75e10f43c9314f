//! Fretboard path planning
//!
//! Binds a sequence of note names to concrete string/fret positions inside a
//! scale pattern, walking upwards in pitch with the smallest possible steps.

use crate::note::NoteName;

/// Number of strings on a standard guitar.
pub const STRINGS: usize = 6;

/// MIDI pitch of each open string in standard tuning, low E (string 0) to
/// high E (string 5).
pub const STRING_BASE_MIDI: [i32; STRINGS] = [40, 45, 50, 55, 59, 64];

/// Penalty per string crossed, relative to one fret of movement.
const STRING_WEIGHT: i32 = 2;

/// Rank given to strings missing from the preference order.
const UNRANKED_STRING: i32 = 100;

/// One playable note of a scale pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FretPosition {
    /// String index, 0 = low E .. 5 = high E.
    pub string: usize,
    /// Fret number, 0 = open string.
    pub fret: u8,
    /// Pitch class sounded at this position.
    pub note: NoteName,
    /// Scale degree label, e.g. `"R"`, `"b3"`, `"p5"`.
    pub degree: String,
    /// Whether this is the scale's tonic.
    pub is_root: bool,
}

impl FretPosition {
    /// Create a position.
    pub fn new(
        string: usize,
        fret: u8,
        note: NoteName,
        degree: impl Into<String>,
        is_root: bool,
    ) -> Self {
        FretPosition {
            string,
            fret,
            note,
            degree: degree.into(),
            is_root,
        }
    }

    /// Absolute MIDI pitch in standard tuning. Unknown strings count as low E.
    pub fn midi_pitch(&self) -> i32 {
        let base = STRING_BASE_MIDI
            .get(self.string)
            .copied()
            .unwrap_or(STRING_BASE_MIDI[0]);
        base + i32::from(self.fret)
    }

    /// Same string and fret as `other`.
    pub fn same_spot(&self, other: &FretPosition) -> bool {
        self.string == other.string && self.fret == other.fret
    }

    /// Hand movement to `other`: frets plus twice the strings crossed.
    pub fn distance(&self, other: &FretPosition) -> i32 {
        let frets = (i32::from(self.fret) - i32::from(other.fret)).abs();
        let strings = (self.string as i32 - other.string as i32).abs();
        frets + strings * STRING_WEIGHT
    }

    /// Tie-break between equally good candidates: higher string first, then
    /// lower fret.
    fn preferred_over(&self, other: &FretPosition) -> bool {
        self.string > other.string || (self.string == other.string && self.fret < other.fret)
    }
}

/// The playable positions of a scale in one fretboard window ("box").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScalePattern {
    positions: Vec<FretPosition>,
}

impl ScalePattern {
    /// Wrap an existing list of positions.
    pub fn new(positions: Vec<FretPosition>) -> Self {
        ScalePattern { positions }
    }

    /// All positions, in pattern order.
    pub fn positions(&self) -> &[FretPosition] {
        &self.positions
    }

    /// Positions marked as the tonic.
    pub fn roots(&self) -> impl Iterator<Item = &FretPosition> {
        self.positions.iter().filter(|p| p.is_root)
    }

    /// Number of positions.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the pattern has no positions.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl From<Vec<FretPosition>> for ScalePattern {
    fn from(positions: Vec<FretPosition>) -> Self {
        ScalePattern::new(positions)
    }
}

/// Greedy planner mapping target notes onto pattern positions.
///
/// The first note prefers a root position on the most preferred string at
/// the lowest fret. Every following note prefers the smallest step up in
/// pitch, then the same pitch somewhere else, then the closest position by
/// hand movement. Equal candidates are split by higher string, then lower
/// fret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPlanner {
    start_preference: [usize; STRINGS],
}

impl PathPlanner {
    /// Planner preferring strings 0..=5 in order for the first note.
    pub fn new() -> Self {
        PathPlanner {
            start_preference: [0, 1, 2, 3, 4, 5],
        }
    }

    /// Planner with a custom string order for choosing the first note.
    pub fn with_string_preference(order: [usize; STRINGS]) -> Self {
        PathPlanner {
            start_preference: order,
        }
    }

    /// Choose one position per target note.
    ///
    /// Targets are compared by pitch class, so `"Db"` matches a position
    /// spelled `C#` and octave digits are ignored. A target with no matching
    /// position (or one that is not a note name) repeats the previous choice,
    /// or is dropped if nothing has been chosen yet.
    pub fn plan_path<S: AsRef<str>>(
        &self,
        targets: &[S],
        candidates: &[FretPosition],
    ) -> Vec<FretPosition> {
        let mut path: Vec<FretPosition> = Vec::with_capacity(targets.len());
        if targets.is_empty() || candidates.is_empty() {
            return path;
        }

        let mut last: Option<&FretPosition> = None;
        for target in targets {
            let matches: Vec<&FretPosition> = match NoteName::parse(target.as_ref()) {
                Some(note) => candidates.iter().filter(|c| c.note == note).collect(),
                None => Vec::new(),
            };

            if matches.is_empty() {
                if let Some(prev) = last {
                    path.push(prev.clone());
                }
                continue;
            }

            let chosen = match last {
                None => self.choose_start(&matches),
                Some(prev) => {
                    let next = choose_next(prev, &matches);
                    if next.same_spot(prev) {
                        closest_other(prev, &matches).unwrap_or(next)
                    } else {
                        next
                    }
                }
            };

            path.push(chosen.clone());
            last = Some(chosen);
        }
        path
    }

    fn choose_start<'a>(&self, matches: &[&'a FretPosition]) -> &'a FretPosition {
        let roots: Vec<&FretPosition> = matches.iter().copied().filter(|c| c.is_root).collect();
        let pool = if roots.is_empty() { matches } else { &roots[..] };

        let mut best = pool[0];
        let mut best_rank = self.rank(best);
        for &c in &pool[1..] {
            let rank = self.rank(c);
            if rank < best_rank {
                best = c;
                best_rank = rank;
            }
        }
        best
    }

    fn rank(&self, position: &FretPosition) -> i32 {
        let string_rank = self
            .start_preference
            .iter()
            .position(|&s| s == position.string)
            .map_or(UNRANKED_STRING, |i| i as i32);
        string_rank * 100 + i32::from(position.fret)
    }
}

impl Default for PathPlanner {
    fn default() -> Self {
        PathPlanner::new()
    }
}

fn choose_next<'a>(prev: &FretPosition, matches: &[&'a FretPosition]) -> &'a FretPosition {
    let prev_pitch = prev.midi_pitch();

    let mut forward: Option<(&FretPosition, i32)> = None;
    for &c in matches {
        let delta = c.midi_pitch() - prev_pitch;
        if delta <= 0 {
            continue;
        }
        forward = match forward {
            Some((best, best_delta)) if delta > best_delta => Some((best, best_delta)),
            Some((best, best_delta)) if delta == best_delta && !c.preferred_over(best) => {
                Some((best, best_delta))
            }
            _ => Some((c, delta)),
        };
    }
    if let Some((best, _)) = forward {
        return best;
    }

    let mut same: Option<&FretPosition> = None;
    for &c in matches {
        if c.midi_pitch() != prev_pitch {
            continue;
        }
        same = match same {
            Some(best) if !c.preferred_over(best) => Some(best),
            _ => Some(c),
        };
    }
    match same {
        Some(c) if !c.same_spot(prev) => c,
        _ => nearest(prev, matches),
    }
}

fn nearest<'a>(prev: &FretPosition, matches: &[&'a FretPosition]) -> &'a FretPosition {
    let mut best = matches[0];
    let mut best_dist = prev.distance(best);
    for &c in &matches[1..] {
        let dist = prev.distance(c);
        if dist < best_dist || (dist == best_dist && c.preferred_over(best)) {
            best = c;
            best_dist = dist;
        }
    }
    best
}

/// Closest candidate on a different spot than `prev`; first wins on ties.
fn closest_other<'a>(
    prev: &FretPosition,
    matches: &[&'a FretPosition],
) -> Option<&'a FretPosition> {
    let mut best: Option<(&FretPosition, i32)> = None;
    for &c in matches {
        if c.same_spot(prev) {
            continue;
        }
        let dist = prev.distance(c);
        best = match best {
            Some((other, d)) if dist >= d => Some((other, d)),
            _ => Some((c, dist)),
        };
    }
    best.map(|(c, _)| c)
}
