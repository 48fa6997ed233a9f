//! Playing the roll sub-game: the table-driven policy, live roll episodes, and
//! a few agents to play them.

use crate::{
    dice::{DiceCounts, Face, NUM_FACES},
    rules::Rules,
    solver::SolvedGameValueTable,
    state::{GameState, ValueEntry},
};
use log::debug;
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use std::{cmp, fmt};

////////////
// Policy //
////////////

/// A locked face together with the state it leads to and that state's value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ActionValue {
    pub face: Face,
    pub next: GameState,
    pub entry: ValueEntry,
}

/// The optimal policy, read straight off a solved table.
#[derive(Copy, Clone)]
pub struct Policy<'a> {
    table: &'a SolvedGameValueTable,
}

impl<'a> Policy<'a> {
    pub fn new(table: &'a SolvedGameValueTable) -> Self {
        Self { table }
    }

    #[inline]
    pub fn table(&self) -> &'a SolvedGameValueTable {
        self.table
    }

    /// The table only values a state at exactly its score when stopping
    /// beats (or ties) rolling on.
    pub fn should_stop(&self, state: &GameState) -> bool {
        state.can_stop(self.table.rules())
            && self.table.get(state).expected_value <= state.score as f64
    }

    /// For each face we could lock on `dice`, what is the value of the state it
    /// leads to? Sorted from highest to lowest expected value; equal values
    /// keep face order. Faces that push the score past the table are left out.
    pub fn actions_by_expected_value(&self, state: &GameState, dice: DiceCounts) -> Vec<ActionValue> {
        let rules = self.table.rules();

        let mut actions = state
            .legal_faces(dice)
            .filter_map(|face| {
                let next = state.successor(rules, dice, face)?;
                Some(ActionValue {
                    face,
                    next,
                    entry: self.table.get(&next),
                })
            })
            .collect::<Vec<_>>();

        // stable sort so the earliest face wins ties.
        actions.sort_by(|a1, a2| {
            a1.entry
                .expected_value
                .total_cmp(&a2.entry.expected_value)
                .reverse()
        });
        actions
    }

    /// The recommended face to lock on `dice`, or `None` if the roll busts.
    pub fn best_action(&self, state: &GameState, dice: DiceCounts) -> Option<ActionValue> {
        self.table
            .best_action(state, dice)
            .map(|(face, next, entry)| ActionValue { face, next, entry })
    }
}

/////////////////
// RollEpisode //
/////////////////

/// How a turn's rolling ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollResult {
    Scored(u16),
    Busted,
}

impl RollResult {
    /// The points this result is worth in the sub-game: scores below
    /// `min_stop_score` can't be banked.
    pub fn score_or_zero(self, min_stop_score: u16) -> u16 {
        match self {
            Self::Scored(score) if score >= min_stop_score => score,
            _ => 0,
        }
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scored(score) => write!(f, "scored {}", score),
            Self::Busted => f.write_str("busted"),
        }
    }
}

/// One turn of rolling in progress.
#[derive(Clone, Debug)]
pub struct RollEpisode {
    rules: Rules,
    state: GameState,
    /// how many dice of each face were locked, indexed by `Face::idx`.
    history: [u8; NUM_FACES],
}

impl RollEpisode {
    pub fn new(rules: Rules) -> Self {
        Self {
            rules,
            state: GameState::initial(&rules),
            history: [0; NUM_FACES],
        }
    }

    #[inline]
    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    #[inline]
    pub fn state(&self) -> GameState {
        self.state
    }

    #[inline]
    pub fn locked_count(&self, face: Face) -> u8 {
        self.history[face.idx() as usize]
    }

    /// The faces on `dice` we haven't locked yet.
    pub fn available_faces(&self, dice: DiceCounts) -> Vec<Face> {
        self.state.legal_faces(dice).collect()
    }

    /// Lock every die showing `face`.
    ///
    /// Panics if `face` is already locked or isn't on `dice`.
    pub fn apply(&mut self, dice: DiceCounts, face: Face) {
        assert!(
            !self.state.used.is_locked(face),
            "face '{}' is already locked",
            face
        );
        let count = dice.get_count(face);
        assert!(count > 0, "face '{}' wasn't rolled: {}", face, dice);
        assert!(count <= self.state.dice_left, "rolled more dice than in hand");

        self.history[face.idx() as usize] = count;
        self.state = GameState::new(
            self.state.score + self.rules.face_score(face) * (count as u16),
            self.state.dice_left - count,
            self.state.used.with_locked(face),
        );
    }

    /// Whether stopping now would bank the score.
    pub fn is_finalizeable(&self) -> bool {
        self.state.can_stop(&self.rules)
    }

    pub fn finalize(&self) -> RollResult {
        if self.state.has_required_face(&self.rules) {
            RollResult::Scored(self.state.score)
        } else {
            RollResult::Busted
        }
    }
}

////////////
// Agents //
////////////

pub trait Agent {
    /// Called before every roll.
    fn should_stop(&mut self, episode: &RollEpisode) -> bool;

    /// Pick a face to lock on `dice`, or `None` to give up (bust).
    fn choose_face(&mut self, episode: &RollEpisode, dice: DiceCounts) -> Option<Face>;
}

/// Plays the solved table.
pub struct OptimalAgent<'a> {
    policy: Policy<'a>,
}

impl<'a> OptimalAgent<'a> {
    pub fn new(table: &'a SolvedGameValueTable) -> Self {
        Self {
            policy: Policy::new(table),
        }
    }
}

impl<'a> Agent for OptimalAgent<'a> {
    fn should_stop(&mut self, episode: &RollEpisode) -> bool {
        self.policy.should_stop(&episode.state())
    }

    fn choose_face(&mut self, episode: &RollEpisode, dice: DiceCounts) -> Option<Face> {
        self.policy
            .best_action(&episode.state(), dice)
            .map(|action| action.face)
    }
}

/// Stops as soon as it's allowed; otherwise locks whichever face adds the
/// most points right now.
pub struct GreedyAgent;

impl Agent for GreedyAgent {
    fn should_stop(&mut self, episode: &RollEpisode) -> bool {
        episode.is_finalizeable()
    }

    fn choose_face(&mut self, episode: &RollEpisode, dice: DiceCounts) -> Option<Face> {
        let rules = episode.rules();
        episode
            .available_faces(dice)
            .into_iter()
            .map(|face| (face, rules.face_score(face) * (dice.get_count(face) as u16)))
            // reversed so `max_by_key` keeps the earliest of equal faces
            .rev()
            .max_by_key(|&(_, gain)| gain)
            .map(|(face, _)| face)
    }
}

/// Locks a random available face and, once allowed, stops with probability
/// `p_stop`.
pub struct RandomAgent<R> {
    rng: R,
    p_stop: f64,
}

impl<R: Rng> RandomAgent<R> {
    pub fn new(rng: R) -> Self {
        Self { rng, p_stop: 0.5 }
    }

    pub fn with_p_stop(rng: R, p_stop: f64) -> Self {
        Self {
            rng,
            p_stop: p_stop.clamp(0.0, 1.0),
        }
    }
}

impl<R: Rng> Agent for RandomAgent<R> {
    fn should_stop(&mut self, episode: &RollEpisode) -> bool {
        episode.is_finalizeable() && self.rng.gen_bool(self.p_stop)
    }

    fn choose_face(&mut self, episode: &RollEpisode, dice: DiceCounts) -> Option<Face> {
        episode
            .available_faces(dice)
            .choose(&mut self.rng)
            .copied()
    }
}

/////////////////
// run_episode //
/////////////////

/// One roll of an episode: what came up, which face the agent locked (if
/// any), and where that left us.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EpisodeStep {
    pub dice: DiceCounts,
    pub face: Option<Face>,
    pub state: GameState,
}

#[derive(Clone, Debug)]
pub struct EpisodeOutcome {
    pub result: RollResult,
    pub steps: Vec<EpisodeStep>,
}

impl EpisodeOutcome {
    /// The points banked, counting unbankable scores as zero.
    pub fn banked_score(&self, rules: &Rules) -> u16 {
        self.result.score_or_zero(rules.min_stop_score())
    }
}

/// Play a single roll episode from the start of a turn.
pub fn run_episode<A, R>(rules: Rules, agent: &mut A, rng: &mut R) -> EpisodeOutcome
where
    A: Agent + ?Sized,
    R: Rng + ?Sized,
{
    let mut episode = RollEpisode::new(rules);
    let mut steps = Vec::new();

    // each roll locks a new face, so this loop runs at most 6 times.
    while episode.state().can_roll() && !agent.should_stop(&episode) {
        let dice = DiceCounts::roll(rng, episode.state().dice_left);

        let face = agent.choose_face(&episode, dice);
        if let Some(face) = face {
            episode.apply(dice, face);
        }

        let step = EpisodeStep {
            dice,
            face,
            state: episode.state(),
        };
        debug!(
            "rolled: [{}], locked: {}, state: {:?}",
            step.dice,
            face.map(|face| face.to_string())
                .unwrap_or_else(|| "-".to_string()),
            step.state,
        );
        steps.push(step);

        if face.is_none() {
            debug!("busted");
            return EpisodeOutcome {
                result: RollResult::Busted,
                steps,
            };
        }
    }

    let result = episode.finalize();
    debug!("episode finished: {}", result);
    EpisodeOutcome { result, steps }
}

/// Summary statistics of the banked score over many episodes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScoreSummary {
    pub trials: usize,
    pub mean: f64,
    /// the standard error of `mean`.
    pub stderr: f64,
    /// the fraction of episodes that banked nothing.
    pub bust_rate: f64,
}

/// Play `trials` episodes and summarize the banked scores.
pub fn summarize_episodes<A, R>(
    rules: Rules,
    agent: &mut A,
    rng: &mut R,
    trials: usize,
) -> ScoreSummary
where
    A: Agent + ?Sized,
    R: Rng + ?Sized,
{
    let trials = cmp::max(trials, 1);

    let mut sum = 0.0_f64;
    let mut sum_sq = 0.0_f64;
    let mut busts = 0_usize;
    for _ in 0..trials {
        let score = run_episode(rules, &mut *agent, &mut *rng).banked_score(&rules);
        if score == 0 {
            busts += 1;
        }

        let score = score as f64;
        sum += score;
        sum_sq += score * score;
    }

    let n = trials as f64;
    let mean = sum / n;
    let var = if trials > 1 {
        (sum_sq - n * mean * mean).max(0.0) / (n - 1.0)
    } else {
        0.0
    };

    ScoreSummary {
        trials,
        mean,
        stderr: (var / n).sqrt(),
        bust_rate: (busts as f64) / n,
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod test {
    use super::*;
    use crate::state::UsedFaces;
    use claim::{assert_ge, assert_le, assert_matches};
    use rand::SeedableRng;
    use rand_xoshiro::Xoroshiro64Star;

    #[test]
    fn test_episode_apply() {
        let rules = Rules::default();
        let mut episode = RollEpisode::new(rules);
        let dice = DiceCounts::from_counts([1, 0, 2, 0, 3, 2]);

        assert_eq!(
            vec![Face::One, Face::Three, Face::Five, Face::Worm],
            episode.available_faces(dice)
        );

        episode.apply(dice, Face::Five);
        assert_eq!(15, episode.state().score);
        assert_eq!(5, episode.state().dice_left);
        assert_eq!(3, episode.locked_count(Face::Five));
        assert!(!episode.is_finalizeable());
        assert_eq!(RollResult::Busted, episode.finalize());

        let dice = DiceCounts::from_counts([0, 0, 0, 0, 3, 2]);
        assert_eq!(vec![Face::Worm], episode.available_faces(dice));
        episode.apply(dice, Face::Worm);
        assert_eq!(GameState::new(25, 3, episode.state().used), episode.state());
        assert!(episode.is_finalizeable());
        assert_eq!(RollResult::Scored(25), episode.finalize());
    }

    #[test]
    #[should_panic]
    fn test_episode_apply_used_face_panics() {
        let mut episode = RollEpisode::new(Rules::default());
        let dice = DiceCounts::from_counts([0, 0, 0, 0, 0, 2]);
        episode.apply(dice, Face::Worm);
        episode.apply(dice, Face::Worm);
    }

    #[test]
    #[should_panic]
    fn test_episode_apply_missing_face_panics() {
        let mut episode = RollEpisode::new(Rules::default());
        let dice = DiceCounts::from_counts([0, 0, 0, 0, 0, 2]);
        episode.apply(dice, Face::One);
    }

    #[test]
    fn test_roll_result() {
        assert_eq!(25, RollResult::Scored(25).score_or_zero(21));
        assert_eq!(0, RollResult::Scored(20).score_or_zero(21));
        assert_eq!(0, RollResult::Busted.score_or_zero(21));
        assert_eq!("scored 25", RollResult::Scored(25).to_string());
    }

    #[test]
    fn test_actions_by_expected_value() {
        let table = SolvedGameValueTable::solve(Rules::default());
        let policy = Policy::new(&table);
        let state = table.initial_state();
        let dice = DiceCounts::from_counts([2, 1, 0, 1, 2, 2]);

        let actions = policy.actions_by_expected_value(&state, dice);
        assert_eq!(5, actions.len());
        for pair in actions.windows(2) {
            assert_ge!(pair[0].entry.expected_value, pair[1].entry.expected_value);
        }
        assert_eq!(Some(actions[0]), policy.best_action(&state, dice));

        // nothing new on the table
        let state = GameState::new(10, 2, UsedFaces::empty().with_locked(Face::Worm));
        let dice = DiceCounts::from_counts([0, 0, 0, 0, 0, 2]);
        assert!(policy.actions_by_expected_value(&state, dice).is_empty());
        assert_eq!(None, policy.best_action(&state, dice));
    }

    #[test]
    fn test_should_stop() {
        let table = SolvedGameValueTable::solve(Rules::default());
        let policy = Policy::new(&table);
        let used = UsedFaces::empty()
            .with_locked(Face::Worm)
            .with_locked(Face::Five);

        // can't stop without enough points
        assert!(!policy.should_stop(&GameState::new(20, 3, used)));
        // nothing left to roll
        assert!(policy.should_stop(&GameState::new(30, 0, used)));
        // as good as it gets
        assert!(policy.should_stop(&GameState::new(40, 2, used)));
    }

    #[test]
    fn test_run_episode_agents() {
        let rules = Rules::default();
        let table = SolvedGameValueTable::solve(rules);
        let mut rng = Xoroshiro64Star::seed_from_u64(0x5eed);

        let mut optimal = OptimalAgent::new(&table);
        let mut greedy = GreedyAgent;
        let mut random = RandomAgent::new(Xoroshiro64Star::seed_from_u64(0xf00d));
        let agents: [&mut dyn Agent; 3] = [&mut optimal, &mut greedy, &mut random];

        for agent in agents {
            for _ in 0..200 {
                let outcome = run_episode(rules, &mut *agent, &mut rng);
                assert_le!(outcome.steps.len(), NUM_FACES);

                let last = outcome.steps.last().copied();
                match outcome.result {
                    RollResult::Busted => {}
                    RollResult::Scored(score) => {
                        assert_matches!(last, Some(step) if step.state.score == score);
                    }
                }
            }
        }
    }

    #[test]
    fn test_greedy_choose_face() {
        let episode = RollEpisode::new(Rules::default());
        let mut greedy = GreedyAgent;

        // 2x5 = 10 vs 2xW = 10: earliest face wins
        let dice = DiceCounts::from_counts([3, 0, 1, 0, 2, 2]);
        assert_eq!(Some(Face::Five), greedy.choose_face(&episode, dice));

        let dice = DiceCounts::from_counts([0, 0, 4, 0, 1, 1]);
        assert_eq!(Some(Face::Three), greedy.choose_face(&episode, dice));
    }

    // the optimal agent's average banked score should agree with the solved
    // value of the initial state.
    #[test]
    fn test_optimal_agent_matches_table() {
        let rules = Rules::default();
        let table = SolvedGameValueTable::solve(rules);
        let expected = table.initial_entry().expected_value;

        let mut rng = Xoroshiro64Star::seed_from_u64(0xd1ce);
        let mut agent = OptimalAgent::new(&table);
        let summary = summarize_episodes(rules, &mut agent, &mut rng, 20_000);

        assert_le!((summary.mean - expected).abs(), 5.0 * summary.stderr + 1e-9);
        assert_le!(
            (summary.bust_rate - table.initial_entry().bust_probability).abs(),
            0.02
        );

        // and nobody else does better on average
        let mut greedy = GreedyAgent;
        let greedy = summarize_episodes(rules, &mut greedy, &mut rng, 20_000);
        assert_le!(greedy.mean, expected + 5.0 * greedy.stderr);
    }
}
