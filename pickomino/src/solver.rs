//! Backward induction over the whole roll sub-game.
//!
//! Every roll locks one more face, so a state's successors always have
//! strictly more used faces. Solving the blocks from "all six faces used" down
//! to "nothing used" means every successor's value is already known by the
//! time we need it.

use crate::{
    cache::RollOutcomeCache,
    dice::{DiceCounts, Face, NUM_FACES},
    index::{StateIndexer, ValueBlock},
    rules::Rules,
    state::{GameState, TraceLine, UsedFaces, ValueEntry},
    TotalSize,
};
use log::{debug, info, log_enabled, trace, Level};
use trice::Instant;

/// The solved value of every state in the roll sub-game for one set of
/// `Rules`. Built once, read-only afterwards.
#[derive(Clone, Debug)]
pub struct SolvedGameValueTable {
    rules: Rules,
    indexer: StateIndexer,
    /// one block per used-face set, indexed by `UsedFaces::as_idx`.
    blocks: Vec<ValueBlock>,
}

impl SolvedGameValueTable {
    pub fn solve(rules: Rules) -> Self {
        let cache = time!("enumerate roll outcomes", {
            RollOutcomeCache::new(rules.total_dice())
        });
        Self::solve_with_cache(rules, &cache)
    }

    /// Panics if `cache` doesn't cover the full dice pool.
    pub fn solve_with_cache(rules: Rules, cache: &RollOutcomeCache) -> Self {
        assert!(
            cache.max_dice() >= rules.total_dice(),
            "outcome cache only covers {} dice, need {}",
            cache.max_dice(),
            rules.total_dice()
        );

        let start = Instant::now();
        let indexer = StateIndexer::new(&rules);
        let mut blocks = indexer.allocate();

        for nused in (0..=NUM_FACES as u8).rev() {
            time!("solve tier", {
                let mut nstates = 0;

                for used in UsedFaces::with_len(nused) {
                    // a state's successors live in strictly larger used sets,
                    // so we can read the finished blocks while computing this
                    // one.
                    let entries = blocks[used.as_idx()]
                        .shape()
                        .states()
                        .map(|state| (state, solve_state(&rules, cache, &blocks, &state)))
                        .collect::<Vec<_>>();

                    let block = &mut blocks[used.as_idx()];
                    for (state, entry) in &entries {
                        block.set(state, *entry);
                    }
                    nstates += entries.len();
                }

                debug!("solved tier: used faces: {}, states: {}", nused, nstates);
            });
        }

        let table = Self {
            rules,
            indexer,
            blocks,
        };

        info!(
            "solved {} states in {:?}, initial state: {}",
            table.num_states(),
            start.elapsed(),
            table.initial_trace_line(),
        );

        if log_enabled!(Level::Trace) {
            for line in table.trace_lines() {
                trace!("{}", line);
            }
        }

        table
    }

    #[inline]
    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Panics if `state` isn't in the table.
    pub fn get(&self, state: &GameState) -> ValueEntry {
        self.blocks[state.used.as_idx()].get(state)
    }

    pub fn try_get(&self, state: &GameState) -> Option<ValueEntry> {
        self.blocks[state.used.as_idx()].try_get(state)
    }

    pub fn contains(&self, state: &GameState) -> bool {
        self.indexer.try_offset(state).is_some()
    }

    pub fn initial_state(&self) -> GameState {
        GameState::initial(&self.rules)
    }

    /// The value of a whole turn under optimal play.
    pub fn initial_entry(&self) -> ValueEntry {
        self.get(&self.initial_state())
    }

    fn initial_trace_line(&self) -> TraceLine {
        TraceLine {
            state: self.initial_state(),
            entry: self.initial_entry(),
        }
    }

    pub fn num_states(&self) -> usize {
        self.indexer.num_states()
    }

    /// Every solved `(state, entry)` pair, block by block from most used faces
    /// to fewest.
    pub fn iter(&self) -> impl Iterator<Item = (GameState, ValueEntry)> + '_ {
        (0..=NUM_FACES as u8)
            .rev()
            .flat_map(UsedFaces::with_len)
            .flat_map(move |used| self.blocks[used.as_idx()].iter())
    }

    pub fn trace_lines(&self) -> impl Iterator<Item = TraceLine> + '_ {
        self.iter()
            .map(|(state, entry)| TraceLine { state, entry })
    }

    /// The legal face with the strictly greatest successor value on `dice`,
    /// preferring the earliest face on ties. Returns `None` if every legal
    /// face busts (or there is no legal face).
    pub fn best_action(
        &self,
        state: &GameState,
        dice: DiceCounts,
    ) -> Option<(Face, GameState, ValueEntry)> {
        best_successor(&self.rules, &self.blocks, state, dice)
    }
}

impl TotalSize for SolvedGameValueTable {
    fn total_size(&self) -> usize {
        std::mem::size_of::<Self>() - std::mem::size_of::<Vec<ValueBlock>>()
            + self.blocks.total_size()
    }
}

/// The solved value of `state`, given solved values for all of its successors.
fn solve_state(
    rules: &Rules,
    cache: &RollOutcomeCache,
    blocks: &[ValueBlock],
    state: &GameState,
) -> ValueEntry {
    let stop = if state.can_stop(rules) {
        ValueEntry::stop(state.score)
    } else {
        ValueEntry::BUST
    };

    if !state.can_roll() {
        return stop;
    }

    let mut expected_value = 0.0_f64;
    let mut bust_probability = 0.0_f64;

    // for all possible dice rolls, take the best face to lock (if any).
    for outcome in cache.outcomes(state.dice_left) {
        let p_roll = outcome.prob();

        match best_successor(rules, blocks, state, outcome.counts()) {
            Some((_, _, entry)) => {
                expected_value += p_roll * entry.expected_value;
                bust_probability += p_roll * entry.bust_probability;
            }
            None => bust_probability += p_roll,
        }
    }

    // ties stop
    if expected_value > stop.expected_value {
        ValueEntry::new(expected_value, bust_probability)
    } else {
        stop
    }
}

fn best_successor(
    rules: &Rules,
    blocks: &[ValueBlock],
    state: &GameState,
    dice: DiceCounts,
) -> Option<(Face, GameState, ValueEntry)> {
    let mut best: Option<(Face, GameState, ValueEntry)> = None;

    for face in state.legal_faces(dice) {
        let next = match state.successor(rules, dice, face) {
            Some(next) => next,
            // this face pushes the score past the table; skip it.
            None => continue,
        };
        let entry = blocks[next.used.as_idx()].get(&next);

        let is_better = match best {
            Some((_, _, best_entry)) => entry.expected_value > best_entry.expected_value,
            None => true,
        };
        if is_better {
            best = Some((face, next, entry));
        }
    }

    best
}

///////////
// Tests //
///////////

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use claim::{assert_ge, assert_le, assert_none, assert_some};

    fn used(faces: &[Face]) -> UsedFaces {
        faces
            .iter()
            .fold(UsedFaces::empty(), |used, &face| used.with_locked(face))
    }

    #[test]
    fn test_single_die_forced_worm() {
        let rules = Rules::new(1, 0, 20).unwrap();
        let table = SolvedGameValueTable::solve(rules);

        assert_eq!(
            ValueEntry::new(5.0, 0.0),
            table.get(&GameState::new(5, 0, used(&[Face::Worm])))
        );
        assert_eq!(
            ValueEntry::BUST,
            table.get(&GameState::new(3, 0, used(&[Face::Three])))
        );

        // only a worm (1/6) avoids busting
        let initial = table.initial_entry();
        assert_relative_eq!(5.0 / 6.0, initial.expected_value);
        assert_relative_eq!(5.0 / 6.0, initial.bust_probability);
    }

    #[test]
    fn test_stoppable_states() {
        let rules = Rules::default();
        let table = SolvedGameValueTable::solve(rules);

        for (state, entry) in table.iter() {
            if !state.can_stop(&rules) {
                continue;
            }

            // either we stop, or rolling is strictly better than stopping.
            if entry != ValueEntry::stop(state.score) {
                assert!(
                    entry.expected_value > state.score as f64,
                    "state: {:?}, entry: {:?}",
                    state,
                    entry
                );
            }

            if !state.can_roll() {
                assert_eq!(ValueEntry::stop(state.score), entry);
            }
        }
    }

    #[test]
    fn test_all_faces_locked() {
        let rules = Rules::default();
        let table = SolvedGameValueTable::solve(rules);

        for score in 20..=40 {
            for dice_left in 0..=2 {
                let state = GameState::new(score, dice_left, UsedFaces::full());
                let expected = if score >= 21 {
                    ValueEntry::stop(score)
                } else {
                    ValueEntry::BUST
                };
                assert_eq!(expected, table.get(&state));
            }
        }
    }

    #[test]
    fn test_monotone_in_score() {
        let rules = Rules::default();
        let table = SolvedGameValueTable::solve(rules);
        let max_face_score = rules.max_face_score();

        for used in UsedFaces::all().filter(|used| !used.is_empty()) {
            let shape = *table.indexer.shape(used);
            for state in shape.states() {
                let upper = rules
                    .max_score()
                    .saturating_sub(max_face_score * state.dice_left as u16);
                if state.score + 1 > upper {
                    continue;
                }

                let next = GameState::new(state.score + 1, state.dice_left, used);
                let v0 = table.get(&state).expected_value;
                let v1 = table.get(&next).expected_value;
                assert_ge!(v1 + 1e-9, v0, "{:?} vs {:?}", state, next);
            }
        }
    }

    #[test]
    fn test_entries_bounded() {
        let rules = Rules::default();
        let table = SolvedGameValueTable::solve(rules);

        assert_eq!(table.num_states(), table.iter().count());

        for (state, entry) in table.iter() {
            assert!(!entry.expected_value.is_nan(), "unsolved: {:?}", state);
            assert_ge!(entry.expected_value, 0.0);
            assert_le!(entry.expected_value, rules.max_score() as f64);
            assert_ge!(entry.bust_probability, 0.0);
            assert_le!(entry.bust_probability, 1.0 + 1e-9);
        }

        let initial = table.initial_entry();
        assert!(initial.expected_value > 0.0);
        assert!(initial.bust_probability > 0.0 && initial.bust_probability < 1.0);
    }

    #[test]
    fn test_resolve_is_identical() {
        let rules = Rules::new(6, 21, 40).unwrap();
        let table1 = SolvedGameValueTable::solve(rules);
        let table2 = SolvedGameValueTable::solve(rules);

        for ((s1, e1), (s2, e2)) in table1.iter().zip(table2.iter()) {
            assert_eq!(s1, s2);
            assert_eq!(e1.expected_value.to_bits(), e2.expected_value.to_bits());
            assert_eq!(e1.bust_probability.to_bits(), e2.bust_probability.to_bits());
        }
    }

    #[test]
    fn test_best_action() {
        let rules = Rules::default();
        let table = SolvedGameValueTable::solve(rules);
        let initial = table.initial_state();

        let all_worms = DiceCounts::from_counts([0, 0, 0, 0, 0, 8]);
        let (face, next, entry) = assert_some!(table.best_action(&initial, all_worms));
        assert_eq!(Face::Worm, face);
        assert_eq!(GameState::new(40, 0, used(&[Face::Worm])), next);
        assert_eq!(ValueEntry::stop(40), entry);

        // only already-locked faces on the table: bust
        let state = GameState::new(10, 3, used(&[Face::Worm, Face::Five]));
        let dice = DiceCounts::from_counts([0, 0, 0, 0, 2, 1]);
        assert_none!(table.best_action(&state, dice));

        // the chosen face is never worse than any other legal face
        let state = GameState::new(5, 4, used(&[Face::Worm]));
        let dice = DiceCounts::from_counts([1, 0, 1, 1, 1, 0]);
        let (_, _, best) = assert_some!(table.best_action(&state, dice));
        for face in state.legal_faces(dice) {
            let next = assert_some!(state.successor(&rules, dice, face));
            assert_ge!(best.expected_value, table.get(&next).expected_value);
        }
    }

    #[test]
    fn test_total_size() {
        let rules = Rules::default();
        let table = SolvedGameValueTable::solve(rules);
        assert_ge!(
            table.total_size(),
            2 * table.num_states() * std::mem::size_of::<f64>()
        );
    }
}
