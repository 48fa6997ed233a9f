use crate::{
    dice::{DiceState, NUM_FACES},
    num_multisets,
    rules::MAX_TOTAL_DICE,
    TotalSize,
};
use approx::relative_eq;

/// Every distinct outcome (with its probability) of rolling `1..=max_dice`
/// dice, enumerated once up front.
#[derive(Clone, Debug)]
pub struct RollOutcomeCache {
    /// `outcomes[ndice - 1]` holds the outcomes for `ndice` dice.
    outcomes: Vec<Vec<DiceState>>,
}

impl RollOutcomeCache {
    pub fn new(max_dice: u8) -> Self {
        assert!(
            (1..=MAX_TOTAL_DICE).contains(&max_dice),
            "dice pool must be in the range [1, {}]: {}",
            MAX_TOTAL_DICE,
            max_dice
        );

        let outcomes = (1..=max_dice)
            .map(|ndice| {
                let outcomes = DiceState::all(ndice).collect::<Vec<_>>();

                let expected = num_multisets(NUM_FACES as u32, ndice as u32) as usize;
                assert_eq!(
                    expected,
                    outcomes.len(),
                    "wrong number of outcomes for {} dice",
                    ndice
                );
                debug_assert!(relative_eq!(
                    1.0,
                    outcomes.iter().map(DiceState::prob).sum::<f64>(),
                    epsilon = 1e-9
                ));

                outcomes
            })
            .collect();

        Self { outcomes }
    }

    /// The largest pool size this cache covers.
    #[inline]
    pub fn max_dice(&self) -> u8 {
        self.outcomes.len() as u8
    }

    /// Panics if `ndice` is zero or above `max_dice`.
    #[inline]
    pub fn outcomes(&self, ndice: u8) -> &[DiceState] {
        assert!(
            ndice >= 1 && ndice <= self.max_dice(),
            "no outcomes cached for {} dice",
            ndice
        );
        &self.outcomes[(ndice - 1) as usize]
    }

    pub fn num_outcomes(&self) -> usize {
        self.outcomes.iter().map(Vec::len).sum()
    }
}

impl TotalSize for RollOutcomeCache {
    fn total_size(&self) -> usize {
        self.outcomes.total_size()
    }
}
