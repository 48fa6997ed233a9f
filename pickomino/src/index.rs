//! Storage layout for the solved table.
//!
//! States are grouped into one block per used-face set. Within a block we only
//! store the scores and dice counts that set can actually reach, so the table
//! is ragged: a state `(score, dice_left, used)` lives at
//!
//! ```text
//! offset = (dice_left - min_dice_left) * score_dim + (score - min_score)
//! ```
//!
//! in the block for `used`.

use crate::{
    rules::Rules,
    state::{GameState, UsedFaces, ValueEntry, NUM_USED_FACE_SETS},
    TotalSize,
};
use claim::debug_assert_lt;
use ndarray::Array1;

////////////////
// BlockShape //
////////////////

/// The score and dice ranges reachable with a given used-face set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockShape {
    used: UsedFaces,
    min_score: u16,
    score_dim: u16,
    min_dice_left: u8,
    dice_dim: u8,
}

impl_total_size_static!(BlockShape);

impl BlockShape {
    pub fn new(rules: &Rules, used: UsedFaces) -> Self {
        let total_dice = rules.total_dice();

        // every locked face took at least one die, so these sets can't happen.
        if used.len() > total_dice {
            return Self {
                used,
                min_score: 0,
                score_dim: 0,
                min_dice_left: 0,
                dice_dim: 0,
            };
        }

        // nothing locked yet: only the opening state.
        if used.is_empty() {
            return Self {
                used,
                min_score: 0,
                score_dim: 1,
                min_dice_left: total_dice,
                dice_dim: 1,
            };
        }

        let min_score = rules.locked_score(used);
        Self {
            used,
            min_score,
            score_dim: rules.max_score() - min_score + 1,
            min_dice_left: 0,
            dice_dim: total_dice - used.len() + 1,
        }
    }

    #[inline]
    pub fn used(&self) -> UsedFaces {
        self.used
    }

    #[inline]
    pub fn min_score(&self) -> u16 {
        self.min_score
    }

    #[inline]
    pub fn max_dice_left(&self) -> u8 {
        self.min_dice_left + self.dice_dim.saturating_sub(1)
    }

    #[inline]
    pub fn len(&self) -> usize {
        (self.score_dim as usize) * (self.dice_dim as usize)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, state: &GameState) -> bool {
        self.try_offset(state).is_some()
    }

    /// The offset of `state` in this block, or `None` if the block doesn't
    /// hold it.
    pub fn try_offset(&self, state: &GameState) -> Option<usize> {
        if state.used != self.used {
            return None;
        }

        let score_idx = state.score.checked_sub(self.min_score)?;
        let dice_idx = state.dice_left.checked_sub(self.min_dice_left)?;
        if score_idx >= self.score_dim || dice_idx >= self.dice_dim {
            return None;
        }

        Some((dice_idx as usize) * (self.score_dim as usize) + (score_idx as usize))
    }

    /// Panics if `state` is outside this block.
    pub fn offset(&self, state: &GameState) -> usize {
        match self.try_offset(state) {
            Some(offset) => offset,
            None => panic!("state out of range: {:?}, block: {:?}", state, self),
        }
    }

    /// The inverse of `offset`.
    pub fn state_at(&self, offset: usize) -> GameState {
        assert!(
            offset < self.len(),
            "offset out of range: {} >= {}",
            offset,
            self.len()
        );

        let score_dim = self.score_dim as usize;
        let score = self.min_score + (offset % score_dim) as u16;
        let dice_left = self.min_dice_left + (offset / score_dim) as u8;
        GameState::new(score, dice_left, self.used)
    }

    /// Every state in this block, in offset order.
    pub fn states(&self) -> impl Iterator<Item = GameState> + '_ {
        (0..self.len()).map(move |offset| self.state_at(offset))
    }
}

//////////////////
// StateIndexer //
//////////////////

/// One `BlockShape` for every used-face set.
#[derive(Clone, Debug)]
pub struct StateIndexer {
    shapes: Vec<BlockShape>,
}

impl StateIndexer {
    pub fn new(rules: &Rules) -> Self {
        let shapes = UsedFaces::all()
            .map(|used| BlockShape::new(rules, used))
            .collect::<Vec<_>>();
        debug_assert_eq!(NUM_USED_FACE_SETS, shapes.len());
        Self { shapes }
    }

    #[inline]
    pub fn shape(&self, used: UsedFaces) -> &BlockShape {
        &self.shapes[used.as_idx()]
    }

    pub fn try_offset(&self, state: &GameState) -> Option<usize> {
        self.shape(state.used).try_offset(state)
    }

    pub fn offset(&self, state: &GameState) -> usize {
        self.shape(state.used).offset(state)
    }

    pub fn num_states(&self) -> usize {
        self.shapes.iter().map(BlockShape::len).sum()
    }

    /// Allocate unfilled value blocks for every used-face set, indexed by
    /// `UsedFaces::as_idx`.
    pub fn allocate(&self) -> Vec<ValueBlock> {
        self.shapes.iter().copied().map(ValueBlock::new).collect()
    }
}

////////////////
// ValueBlock //
////////////////

/// The solved values for every state with one used-face set. Slots start out
/// as NaN and are written exactly once.
#[derive(Clone, Debug)]
pub struct ValueBlock {
    shape: BlockShape,
    values: Array1<f64>,
    p_bust: Array1<f64>,
}

impl ValueBlock {
    pub fn new(shape: BlockShape) -> Self {
        Self {
            shape,
            values: Array1::from_elem(shape.len(), f64::NAN),
            p_bust: Array1::from_elem(shape.len(), f64::NAN),
        }
    }

    #[inline]
    pub fn shape(&self) -> &BlockShape {
        &self.shape
    }

    #[inline]
    pub fn is_filled(&self, offset: usize) -> bool {
        !self.values[offset].is_nan()
    }

    /// Panics if `state` is outside this block.
    pub fn get(&self, state: &GameState) -> ValueEntry {
        let offset = self.shape.offset(state);
        ValueEntry::new(self.values[offset], self.p_bust[offset])
    }

    pub fn try_get(&self, state: &GameState) -> Option<ValueEntry> {
        let offset = self.shape.try_offset(state)?;
        Some(ValueEntry::new(self.values[offset], self.p_bust[offset]))
    }

    pub fn set(&mut self, state: &GameState, entry: ValueEntry) {
        let offset = self.shape.offset(state);
        debug_assert!(!self.is_filled(offset), "state written twice: {:?}", state);
        debug_assert_lt!(entry.bust_probability, 1.0 + 1e-9);

        self.values[offset] = entry.expected_value;
        self.p_bust[offset] = entry.bust_probability;
    }

    /// Every `(state, entry)` pair in this block, in offset order.
    pub fn iter(&self) -> impl Iterator<Item = (GameState, ValueEntry)> + '_ {
        (0..self.shape.len()).map(move |offset| {
            (
                self.shape.state_at(offset),
                ValueEntry::new(self.values[offset], self.p_bust[offset]),
            )
        })
    }
}

impl TotalSize for ValueBlock {
    fn total_size(&self) -> usize {
        std::mem::size_of::<Self>() - 2 * std::mem::size_of::<Array1<f64>>()
            + self.values.total_size()
            + self.p_bust.total_size()
    }
}

///////////
// Tests //
///////////
