use crate::{
    dice::{DiceCounts, Face, NUM_FACES},
    rules::Rules,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The number of distinct used-face sets.
pub const NUM_USED_FACE_SETS: usize = 1 << NUM_FACES;

///////////////
// UsedFaces //
///////////////

/// The set of faces already set aside this turn, as a 6-bit mask where bit
/// `i` is set iff face `i` is locked.
#[repr(transparent)]
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsedFaces(u8);

impl_total_size_static!(UsedFaces);

impl UsedFaces {
    const MASK: u8 = (NUM_USED_FACE_SETS - 1) as u8;

    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn full() -> Self {
        Self(Self::MASK)
    }

    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// The index of this set in a table with one entry per used-face set.
    #[inline]
    pub const fn as_idx(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_locked(self, face: Face) -> bool {
        self.0 & face.bit() != 0
    }

    #[inline]
    pub const fn with_locked(self, face: Face) -> Self {
        Self(self.0 | face.bit())
    }

    #[inline]
    pub const fn len(self) -> u8 {
        self.0.count_ones() as u8
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_full(self) -> bool {
        self.0 == Self::MASK
    }

    /// The locked faces, in face order.
    pub fn iter(self) -> impl Iterator<Item = Face> {
        Face::all()
            .iter()
            .copied()
            .filter(move |&face| self.is_locked(face))
    }

    /// The faces not yet locked, in face order.
    pub fn unused(self) -> impl Iterator<Item = Face> {
        Face::all()
            .iter()
            .copied()
            .filter(move |&face| !self.is_locked(face))
    }

    /// Every used-face set.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..NUM_USED_FACE_SETS as u8).map(Self)
    }

    /// Every used-face set with exactly `len` faces locked.
    pub fn with_len(len: u8) -> impl Iterator<Item = Self> {
        Self::all().filter(move |used| used.len() == len)
    }
}

/// Formats as one 0/1 flag per face, in face order, e.g., `000011` for
/// `{5, W}`.
impl fmt::Display for UsedFaces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &face in Face::all() {
            f.write_str(if self.is_locked(face) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for UsedFaces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Parse a list of face symbols like `5W`, `[5, W]`, or `-` for no faces.
impl FromStr for UsedFaces {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "-" {
            return Ok(Self::empty());
        }

        let s = s.trim_start_matches('[');
        let s = s.trim_end_matches(']');

        let mut used = Self::empty();
        for c in s.chars().filter(|c| !matches!(c, ',' | ' ' | '\t')) {
            let face = Face::from_symbol(c)
                .ok_or_else(|| format!("used face must be one of 1-5 or W: '{}'", c))?;
            if used.is_locked(face) {
                return Err(format!("face '{}' listed more than once", face));
            }
            used = used.with_locked(face);
        }
        Ok(used)
    }
}

///////////////
// GameState //
///////////////

/// A point in the roll sub-game: the turn score so far, the dice still in
/// hand, and the faces already set aside.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameState {
    pub score: u16,
    pub dice_left: u8,
    pub used: UsedFaces,
}

impl GameState {
    pub const fn new(score: u16, dice_left: u8, used: UsedFaces) -> Self {
        Self {
            score,
            dice_left,
            used,
        }
    }

    /// The state every turn starts from.
    pub fn initial(rules: &Rules) -> Self {
        Self::new(0, rules.total_dice(), UsedFaces::empty())
    }

    #[inline]
    pub fn has_required_face(&self, rules: &Rules) -> bool {
        self.used.is_locked(rules.required_face())
    }

    /// Stopping banks the score; only legal with the required face locked and
    /// enough points.
    #[inline]
    pub fn can_stop(&self, rules: &Rules) -> bool {
        self.has_required_face(rules) && self.score >= rules.min_stop_score()
    }

    /// Rolling again needs dice in hand and a face left to lock.
    #[inline]
    pub fn can_roll(&self) -> bool {
        self.dice_left > 0 && !self.used.is_full()
    }

    /// The faces in `dice` that may be locked from this state, in face order.
    pub fn legal_faces(self, dice: DiceCounts) -> impl Iterator<Item = Face> {
        dice.faces()
            .map(|(face, _)| face)
            .filter(move |&face| !self.used.is_locked(face))
    }

    /// The state after locking every die showing `face` in `dice`. Returns
    /// `None` when the new score would exceed `max_score`.
    ///
    /// Panics if `face` is already locked or wasn't rolled.
    pub fn successor(&self, rules: &Rules, dice: DiceCounts, face: Face) -> Option<Self> {
        assert!(
            !self.used.is_locked(face),
            "face '{}' is already locked: {:?}",
            face,
            self.used,
        );
        let count = dice.get_count(face);
        assert!(count > 0, "face '{}' wasn't rolled: {}", face, dice);
        assert!(
            count <= self.dice_left,
            "rolled more dice than in hand: {} > {}",
            count,
            self.dice_left,
        );

        let score = self.score + rules.face_score(face) * (count as u16);
        if score > rules.max_score() {
            return None;
        }

        Some(Self::new(
            score,
            self.dice_left - count,
            self.used.with_locked(face),
        ))
    }
}

////////////////
// ValueEntry //
////////////////

/// The solved value of a state: the expected banked score under optimal play
/// and the probability that optimal play still busts.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueEntry {
    pub expected_value: f64,
    pub bust_probability: f64,
}

impl_total_size_static!(ValueEntry);

impl ValueEntry {
    pub const BUST: Self = Self::new(0.0, 1.0);

    pub const fn new(expected_value: f64, bust_probability: f64) -> Self {
        Self {
            expected_value,
            bust_probability,
        }
    }

    /// Stopping now banks `score` for sure.
    pub fn stop(score: u16) -> Self {
        Self::new(score as f64, 0.0)
    }
}

/// The human readable trace line for one solved state, e.g.,
/// `(25, 3, 26.4, 0.12, 100011)`.
#[derive(Copy, Clone, Debug)]
pub struct TraceLine {
    pub state: GameState,
    pub entry: ValueEntry,
}

impl fmt::Display for TraceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {:.1}, {:.2}, {})",
            self.state.score,
            self.state.dice_left,
            self.entry.expected_value,
            self.entry.bust_probability,
            self.state.used,
        )
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod test {
    use super::*;

    fn used(faces: &[Face]) -> UsedFaces {
        faces
            .iter()
            .fold(UsedFaces::empty(), |used, &face| used.with_locked(face))
    }

    #[test]
    fn test_used_faces_ops() {
        let set = used(&[Face::Two, Face::Worm]);
        assert!(set.is_locked(Face::Two));
        assert!(set.is_locked(Face::Worm));
        assert!(!set.is_locked(Face::One));
        assert_eq!(2, set.len());
        assert_eq!(vec![Face::Two, Face::Worm], set.iter().collect::<Vec<_>>());
        assert_eq!(
            vec![Face::One, Face::Three, Face::Four, Face::Five],
            set.unused().collect::<Vec<_>>()
        );

        assert!(UsedFaces::empty().is_empty());
        assert!(UsedFaces::full().is_full());
        assert_eq!(6, UsedFaces::full().len());
        assert_eq!(UsedFaces::full(), UsedFaces::from_bits(0xff));
        assert_eq!(64, UsedFaces::all().count());
        assert_eq!(15, UsedFaces::with_len(2).count());
        assert_eq!(1, UsedFaces::with_len(6).count());
    }

    #[test]
    fn test_used_faces_fmt() {
        assert_eq!("000011", used(&[Face::Five, Face::Worm]).to_string());
        assert_eq!("100000", used(&[Face::One]).to_string());
        assert_eq!("{One, Worm}", format!("{:?}", used(&[Face::One, Face::Worm])));
    }

    #[test]
    fn test_used_faces_from_str() {
        let expected = used(&[Face::Five, Face::Worm]);
        assert_eq!(Ok(expected), UsedFaces::from_str("5W"));
        assert_eq!(Ok(expected), UsedFaces::from_str("[5, W]"));
        assert_eq!(Ok(expected), UsedFaces::from_str("W,5"));
        assert_eq!(Ok(UsedFaces::empty()), UsedFaces::from_str("-"));
        assert_eq!(Ok(UsedFaces::empty()), UsedFaces::from_str("[]"));

        assert!(UsedFaces::from_str("55").is_err());
        assert!(UsedFaces::from_str("7").is_err());
    }

    #[test]
    fn test_successor() {
        let rules = Rules::default();
        let state = GameState::initial(&rules);
        let dice = DiceCounts::from_counts([1, 0, 2, 0, 3, 2]);

        assert_eq!(
            vec![Face::One, Face::Three, Face::Five, Face::Worm],
            state.legal_faces(dice).collect::<Vec<_>>()
        );

        let next = state.successor(&rules, dice, Face::Worm).unwrap();
        assert_eq!(GameState::new(10, 6, used(&[Face::Worm])), next);
        assert!(next.has_required_face(&rules));
        assert!(!next.can_stop(&rules));
        assert!(next.can_roll());

        let next = next.successor(&rules, dice, Face::Five).unwrap();
        assert_eq!(GameState::new(25, 3, used(&[Face::Five, Face::Worm])), next);
        assert!(next.can_stop(&rules));
        assert_eq!(
            vec![Face::One, Face::Three],
            next.legal_faces(dice).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_successor_over_max_score() {
        let rules = Rules::default();
        let state = GameState::new(36, 2, used(&[Face::One, Face::Two]));
        let dice = DiceCounts::from_counts([0, 0, 0, 0, 0, 1]);
        assert_eq!(None, state.successor(&rules, dice, Face::Worm));

        let state = GameState::new(35, 2, used(&[Face::One, Face::Two]));
        assert_eq!(
            Some(GameState::new(40, 1, used(&[Face::One, Face::Two, Face::Worm]))),
            state.successor(&rules, dice, Face::Worm)
        );
    }

    #[test]
    #[should_panic]
    fn test_successor_locked_face_panics() {
        let rules = Rules::default();
        let state = GameState::new(5, 7, used(&[Face::Worm]));
        let dice = DiceCounts::from_counts([0, 0, 0, 0, 0, 7]);
        let _ = state.successor(&rules, dice, Face::Worm);
    }

    #[test]
    fn test_trace_line() {
        let line = TraceLine {
            state: GameState::new(25, 3, used(&[Face::One, Face::Five, Face::Worm])),
            entry: ValueEntry::new(26.4321, 0.1234),
        };
        assert_eq!("(25, 3, 26.4, 0.12, 100011)", line.to_string());
    }
}
