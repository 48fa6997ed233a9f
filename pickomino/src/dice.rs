use crate::{factorial, rules::MAX_TOTAL_DICE, u32_sum_all_nibs};
use claim::debug_assert_le;
use itertools::Itertools;
use rand::{distributions::Distribution, Rng};
use serde::{Deserialize, Serialize};
use std::{fmt, iter::FusedIterator, str::FromStr};

/// Every die has six faces.
pub const NUM_FACES: usize = 6;

//////////
// Face //
//////////

/// A die face. The declaration order is also the order the solver tries faces
/// in, which decides ties between equally valued actions.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Face {
    One = 0,
    Two,
    Three,
    Four,
    Five,
    Worm,
}

impl Face {
    pub const fn all() -> &'static [Face; NUM_FACES] {
        &[
            Self::One,
            Self::Two,
            Self::Three,
            Self::Four,
            Self::Five,
            Self::Worm,
        ]
    }

    pub const fn from_idx(idx: u8) -> Self {
        match idx {
            0 => Self::One,
            1 => Self::Two,
            2 => Self::Three,
            3 => Self::Four,
            4 => Self::Five,
            5 => Self::Worm,
            _ => panic!("face index out of range"),
        }
    }

    #[inline]
    pub const fn idx(self) -> u8 {
        self as u8
    }

    /// This face's bit in a used-faces mask.
    #[inline]
    pub const fn bit(self) -> u8 {
        1 << self.idx()
    }

    pub const fn symbol(self) -> char {
        match self {
            Self::One => '1',
            Self::Two => '2',
            Self::Three => '3',
            Self::Four => '4',
            Self::Five => '5',
            Self::Worm => 'W',
        }
    }

    /// The worm is printed on the die's "6" face, so accept that too.
    pub fn from_symbol(c: char) -> Option<Self> {
        let face = match c {
            '1' => Self::One,
            '2' => Self::Two,
            '3' => Self::Three,
            '4' => Self::Four,
            '5' => Self::Five,
            'W' | 'w' | '6' => Self::Worm,
            _ => return None,
        };
        Some(face)
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Face {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                Self::from_symbol(c).ok_or_else(|| format!("not a die face: '{}'", c))
            }
            _ => Err(format!("expected a single die face: '{}'", s)),
        }
    }
}

/// A fair six-sided die. Sampling draws a uniform integer in `[0, 6)` and
/// maps it to the face with that index.
#[derive(Copy, Clone, Debug, Default)]
pub struct FairDie;

impl Distribution<Face> for FairDie {
    #[inline]
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Face {
        Face::from_idx(rng.gen_range(0..NUM_FACES as u8))
    }
}

////////////////
// DiceCounts //
////////////////

/// A compressed representation of a roll of indistinguishable dice, stored as
/// counts of each face packed into a u32. Visually,
///
/// `XXXX XXXX WWWW 5555 4444 3333 2222 1111`, where `XXXX`s are unused nibbles
/// and `NNNN` is the nibble for the count of face `N`.
///
/// This representation has the added benefit of being order invariant, since
/// the order of dice in a roll is not important.
#[repr(transparent)]
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct DiceCounts(u32);

impl_total_size_static!(DiceCounts);

impl DiceCounts {
    /// A new empty set of dice.
    #[inline]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Counts indexed by `Face::idx`.
    #[inline]
    pub const fn from_counts(cs: [u8; NUM_FACES]) -> Self {
        Self(u32::from_le_bytes([
            cs[0] | (cs[1] << 4),
            cs[2] | (cs[3] << 4),
            cs[4] | (cs[5] << 4),
            0,
        ]))
    }

    #[inline]
    pub const fn into_counts(self) -> [u8; NUM_FACES] {
        [
            self.get_count(Face::One),
            self.get_count(Face::Two),
            self.get_count(Face::Three),
            self.get_count(Face::Four),
            self.get_count(Face::Five),
            self.get_count(Face::Worm),
        ]
    }

    /// A convenience function for constructing a `DiceCounts` set from an
    /// unordered list of faces.
    pub fn from_faces(faces: &[Face]) -> Self {
        let mut counts = Self::new();
        for &face in faces {
            counts.add_count(face, 1);
        }
        counts
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The number of dice in this set.
    #[inline]
    pub fn len(self) -> u8 {
        // the sum of all the nibbles is the total number of dice.
        u32_sum_all_nibs(self.0) as u8
    }

    #[inline]
    pub const fn get_count(self, face: Face) -> u8 {
        ((self.0 >> (4 * (face.idx() as u32))) & 0x0f) as u8
    }

    #[inline]
    pub fn set_count(&mut self, face: Face, count: u8) {
        debug_assert_le!(count, 0x0f);

        let shift = 4 * (face.idx() as u32);
        self.0 = (self.0 & !(0x0f << shift)) | (((count as u32) & 0x0f) << shift);
    }

    #[inline]
    pub fn add_count(&mut self, face: Face, count: u8) {
        debug_assert_le!(self.get_count(face) + count, 0x0f);

        self.0 += (count as u32) << (4 * (face.idx() as u32));
    }

    /// Returns an `Iterator` of `(face, count)` pairs for all faces present in
    /// this set, in face order.
    pub fn faces(self) -> impl Iterator<Item = (Face, u8)> {
        Face::all()
            .iter()
            .map(move |&face| (face, self.get_count(face)))
            .filter(|&(_, count)| count > 0)
    }

    /// Return the probability of rolling exactly this set of dice with
    /// `n = self.len()` fair dice.
    ///
    /// ```text
    /// P = n! / (6^n * ∏_{i∈[1,6]} c_i!)
    ///     where c_i is the count of the i'th face in the set
    /// ```
    pub fn p_roll(self) -> f64 {
        let n = self.len() as u32;

        let prod: u64 = Face::all()
            .iter()
            .map(|&face| factorial(self.get_count(face) as u32))
            .product();

        let permutations = factorial(n) / prod;
        (permutations as f64) * (1.0 / NUM_FACES as f64).powi(n as i32)
    }

    /// Roll `ndice` fair dice.
    pub fn roll<R: Rng + ?Sized>(rng: &mut R, ndice: u8) -> Self {
        debug_assert_le!(ndice, MAX_TOTAL_DICE);

        let mut counts = Self::new();
        for _ in 0..ndice {
            counts.add_count(FairDie.sample(rng), 1);
        }
        counts
    }

    /// The faces in this set, highest face first.
    pub fn to_faces(self) -> Vec<Face> {
        Face::all()
            .iter()
            .rev()
            .flat_map(|&face| std::iter::repeat(face).take(self.get_count(face) as usize))
            .collect()
    }
}

/// Formats as the faces from highest to lowest, e.g., `W W 5 3 1`.
impl fmt::Display for DiceCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_faces().into_iter().join(" "))
    }
}

impl fmt::Debug for DiceCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.to_faces().into_iter().join(", "))
    }
}

impl FromIterator<Face> for DiceCounts {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = Face>,
    {
        let mut counts = Self::new();
        for face in iter {
            counts.add_count(face, 1);
        }
        counts
    }
}

/// Parse a comma/space/tab separated list of faces into a `DiceCounts` set.
/// Enclosing brackets ('[' or ']') optional. Faces may also be written
/// without separators, e.g., `WW531`.
impl FromStr for DiceCounts {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_start_matches('[');
        let s = s.trim_end_matches(']');

        let splitters = &[',', ' ', '\n', '\t'];

        let mut faces = Vec::new();
        for face_str in s.split(splitters).filter(|s| !s.is_empty()) {
            for c in face_str.chars() {
                let face = Face::from_symbol(c)
                    .ok_or_else(|| format!("die face must be one of 1-5 or W: '{}'", c))?;
                faces.push(face);
            }
        }

        if faces.len() > MAX_TOTAL_DICE as usize {
            return Err(format!(
                "too many dice! expected <= {}, got: {}",
                MAX_TOTAL_DICE,
                faces.len()
            ));
        }

        Ok(Self::from_faces(&faces))
    }
}

///////////////
// DiceState //
///////////////

/// One distinct outcome of rolling some number of indistinguishable dice,
/// together with its exact probability.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DiceState {
    counts: DiceCounts,
    prob: f64,
}

impl_total_size_static!(DiceState);

impl DiceState {
    pub fn new(counts: DiceCounts) -> Self {
        Self {
            counts,
            prob: counts.p_roll(),
        }
    }

    #[inline]
    pub fn counts(&self) -> DiceCounts {
        self.counts
    }

    #[inline]
    pub fn prob(&self) -> f64 {
        self.prob
    }

    /// Every distinct outcome of rolling `ndice` dice.
    #[inline]
    pub fn all(ndice: u8) -> DiceStatesIter {
        DiceStatesIter::new(ndice)
    }
}

/// An `Iterator` over all outcomes (multisets of faces) of rolling `ndice`
/// dice.
///
/// The face counts work like an odometer where the last face always absorbs
/// whatever count is left, i.e., `counts[W] = ndice - sum(counts[1..=5])`.
/// Each step bumps the highest non-last slot by one. Once the other slots
/// already sum to `ndice`, we instead "carry": clear the highest non-zero
/// slot and bump the slot just below it. We start at `[0, 0, 0, 0, 0, n]`
/// and we're done once the running sum would exceed `ndice`.
pub struct DiceStatesIter {
    /// the _next_ outcome we'll output (unless we're done).
    counts: [u8; NUM_FACES],
    /// `sum(counts[..NUM_FACES - 1])`
    sum: u8,
    ndice: u8,
}

impl DiceStatesIter {
    fn new(ndice: u8) -> Self {
        let mut counts = [0; NUM_FACES];
        counts[NUM_FACES - 1] = ndice;

        Self {
            counts,
            sum: 0,
            ndice,
        }
    }

    #[inline]
    fn is_done(&self) -> bool {
        self.sum > self.ndice
    }

    fn advance(&mut self) {
        // zero dice only have the one (empty) outcome
        if self.ndice == 0 {
            self.sum = 1;
            return;
        }

        let mut level = NUM_FACES - 2;

        if self.sum == self.ndice {
            // the other slots sum to ndice, so there's a non-zero slot below
            // the last one.
            while self.counts[level] == 0 {
                level -= 1;
            }

            if level != 0 {
                self.sum -= self.counts[level];
                self.counts[level] = 0;
                level -= 1;
            }
        }

        self.counts[level] += 1;
        self.sum += 1;
        self.counts[NUM_FACES - 1] = self.ndice.saturating_sub(self.sum);
    }
}

impl Iterator for DiceStatesIter {
    type Item = DiceState;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_done() {
            return None;
        }

        let current = DiceState::new(DiceCounts::from_counts(self.counts));
        self.advance();
        Some(current)
    }
}

impl FusedIterator for DiceStatesIter {}

///////////
// Tests //
///////////

#[cfg(test)]
mod test {
    use super::*;
    use crate::num_multisets;
    use approx::assert_relative_eq;
    use claim::assert_le;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoroshiro64Star;
    use std::collections::HashSet;

    macro_rules! dice {
        () => {
            DiceCounts::new()
        };
        ($($x:tt),+ $(,)?) => {
            DiceCounts::from_faces(&[ $( Face::from_str(stringify!($x)).unwrap() ),+ ])
        };
    }

    // simple recursive implementation
    fn all_dice_outcomes_ref(ndice: u8) -> Vec<DiceCounts> {
        fn rec(cb: &mut impl FnMut(DiceCounts), counts: DiceCounts, face_idx: u8, ndice: u8) {
            // time to return the accumulator
            if ndice == 0 {
                cb(counts);
                return;
            // passed the end; nothing to return
            } else if face_idx as usize >= NUM_FACES {
                return;
            }

            // can choose 0..=ndice of the current face
            for count in 0..=ndice {
                let mut new_counts = counts;
                new_counts.set_count(Face::from_idx(face_idx), count);
                rec(cb, new_counts, face_idx + 1, ndice - count);
            }
        }

        let mut out = Vec::new();
        rec(&mut |counts| out.push(counts), DiceCounts::new(), 0, ndice);
        out
    }

    #[test]
    fn test_face_symbols() {
        for &face in Face::all() {
            assert_eq!(Some(face), Face::from_symbol(face.symbol()));
            assert_eq!(face, Face::from_idx(face.idx()));
            assert_eq!(Ok(face), face.to_string().parse::<Face>());
        }

        assert_eq!(Some(Face::Worm), Face::from_symbol('6'));
        assert_eq!(Some(Face::Worm), Face::from_symbol('w'));
        assert_eq!(None, Face::from_symbol('7'));
        assert!(Face::from_str("55").is_err());
        assert!(Face::from_str("").is_err());
    }

    #[test]
    fn test_dice_counts_packing() {
        let counts = DiceCounts::from_counts([1, 0, 2, 0, 3, 2]);
        assert_eq!([1, 0, 2, 0, 3, 2], counts.into_counts());
        assert_eq!(8, counts.len());
        assert_eq!(3, counts.get_count(Face::Five));
        assert_eq!(2, counts.get_count(Face::Worm));

        let mut counts2 = DiceCounts::new();
        assert!(counts2.is_empty());
        counts2.add_count(Face::Worm, 2);
        counts2.add_count(Face::One, 1);
        counts2.set_count(Face::Three, 2);
        counts2.set_count(Face::Five, 3);
        assert_eq!(counts, counts2);

        counts2.set_count(Face::Five, 0);
        assert_eq!(5, counts2.len());
        assert_eq!(
            vec![(Face::One, 1), (Face::Three, 2), (Face::Worm, 2)],
            counts2.faces().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_dice_counts_fmt() {
        assert_eq!("W W 5 3 1", dice![1, W, 3, W, 5].to_string());
        assert_eq!("[W, W, 5, 3, 1]", format!("{:?}", dice![1, W, 3, W, 5]));
        assert_eq!("", dice![].to_string());
    }

    #[test]
    fn test_dice_counts_from_str() {
        assert_eq!(Ok(dice![1, 3, 5, W, W]), DiceCounts::from_str("[1,3,5,W,W]"));
        assert_eq!(Ok(dice![1, 3, 5, W, W]), DiceCounts::from_str("W W 5 3 1"));
        assert_eq!(Ok(dice![1, 3, 5, W, W]), DiceCounts::from_str("WW531"));
        assert_eq!(Ok(dice![W]), DiceCounts::from_str("6"));
        assert_eq!(Ok(dice![]), DiceCounts::from_str("[]"));

        assert!(DiceCounts::from_str("[1,7]").is_err());
        assert!(DiceCounts::from_str("111111111").is_err());
    }

    #[test]
    fn test_p_roll() {
        assert_relative_eq!(3.0 / 216.0, dice![1, 1, 3].p_roll());
        assert_relative_eq!(1.0 / 6.0, dice![W].p_roll());
        assert_relative_eq!(40320.0 / 6.0_f64.powi(8), dice![1, 2, 3, 4, 5, W, W, 5].p_roll() * 4.0);
        assert_relative_eq!(1.0, dice![].p_roll());
    }

    #[test]
    fn test_all_outcomes_count_and_mass() {
        for ndice in 1..=MAX_TOTAL_DICE {
            let outcomes = DiceState::all(ndice).collect::<Vec<_>>();

            assert_eq!(num_multisets(NUM_FACES as u32, ndice as u32) as usize, outcomes.len());

            let distinct = outcomes
                .iter()
                .map(|outcome| outcome.counts())
                .collect::<HashSet<_>>();
            assert_eq!(outcomes.len(), distinct.len());

            for outcome in &outcomes {
                assert_eq!(ndice, outcome.counts().len());
            }

            assert_relative_eq!(
                1.0,
                outcomes.iter().map(|outcome| outcome.prob()).sum::<f64>(),
                epsilon = 1e-9,
            );
        }
    }

    #[test]
    fn test_all_outcomes_single_die() {
        let outcomes = DiceState::all(1).collect::<Vec<_>>();
        assert_eq!(6, outcomes.len());
        for outcome in outcomes {
            assert_relative_eq!(1.0 / 6.0, outcome.prob());
        }
    }

    #[test]
    fn test_all_outcomes_order() {
        let outcomes = DiceState::all(2)
            .map(|outcome| outcome.counts().into_counts())
            .collect::<Vec<_>>();

        assert_eq!(
            vec![
                [0, 0, 0, 0, 0, 2],
                [0, 0, 0, 0, 1, 1],
                [0, 0, 0, 0, 2, 0],
                [0, 0, 0, 1, 0, 1],
                [0, 0, 0, 1, 1, 0],
                [0, 0, 0, 2, 0, 0],
            ],
            outcomes[..6]
        );
        assert_eq!(Some(&[2, 0, 0, 0, 0, 0]), outcomes.last());

        assert_eq!(1, DiceState::all(0).count());
    }

    #[test]
    fn test_all_outcomes_matches_ref() {
        for ndice in 0..=MAX_TOTAL_DICE {
            let expected = all_dice_outcomes_ref(ndice)
                .into_iter()
                .collect::<HashSet<_>>();
            let actual = DiceState::all(ndice)
                .map(|outcome| outcome.counts())
                .collect::<HashSet<_>>();
            assert_eq!(expected, actual);
        }
    }

    /// let X be some unknown Bernoulli distribution
    /// let p_actual be the _actual_ probability Pr[X = 1]
    /// let p_emp be our _empirical_ probability Pr[X = 1]
    /// let E = max_l1_error >= |p - r|_1 be our maximum tolerated error
    /// let Z = confidence level, given as Z-level of N(0, 1)
    ///
    /// => required number of trials is n = Z^2 / (4 E^2)
    fn num_trials(max_l1_error: f64, confidence: f64) -> usize {
        ((confidence * confidence) / (4.0 * (max_l1_error * max_l1_error))).ceil() as usize
    }

    // ensure FairDie::sample returns approx. the uniform distribution.
    #[test]
    fn test_fair_die_sample() {
        // number of trials for at-most 1% error at 5σ confidence (=> n = 62,500)
        let max_err = 0.01;
        let confidence = 5.0;
        let n = num_trials(max_err, confidence);
        let mut rng = Xoroshiro64Star::seed_from_u64(0xd15c0);

        let counts = FairDie
            .sample_iter(&mut rng)
            .take(n)
            .fold([0_usize; NUM_FACES], |mut counts, face| {
                counts[face.idx() as usize] += 1;
                counts
            });

        for count in counts {
            let p_emp = (count as f64) / (n as f64);
            assert_le!((p_emp - 1.0 / 6.0).abs(), max_err);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn test_roll_dice(seed in any::<u64>(), ndice in 0_u8..=MAX_TOTAL_DICE) {
            let mut rng = Xoroshiro64Star::seed_from_u64(seed);
            let possible_rolls = DiceState::all(ndice)
                .map(|outcome| outcome.counts())
                .collect::<HashSet<_>>();

            for _ in 0..20 {
                let rolled = DiceCounts::roll(&mut rng, ndice);
                prop_assert_eq!(ndice, rolled.len());
                prop_assert!(possible_rolls.contains(&rolled));
            }
        }
    }
}
