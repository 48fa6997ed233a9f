use crate::{
    board::{play_match, MatchOutcome},
    dice::{DiceCounts, Face},
    policy::{
        run_episode, summarize_episodes, Agent, ActionValue, GreedyAgent, OptimalAgent, Policy,
        RandomAgent,
    },
    rules::{Rules, DEFAULT_MAX_SCORE, DEFAULT_MIN_STOP_SCORE, DEFAULT_TOTAL_DICE},
    solver::SolvedGameValueTable,
    state::{GameState, TraceLine, UsedFaces},
    stats::fit_roll_sampler,
    TotalSize,
};
use bytesize::ByteSize;
use itertools::Itertools;
use pico_args;
use rand::SeedableRng;
use rand_xoshiro::Xoroshiro64Star;
use std::{fmt, str::FromStr, time::SystemTime};
use tabular::{row, Table};
use trice::Instant;

///////////////////////////
// String parser helpers //
///////////////////////////

fn parse_req<T>(label: &'static str, s: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    T::from_str(s).map_err(|err| format!("invalid {label}: {err}"))
}

fn parse_opt<T>(label: &'static str, opt_s: Option<&str>) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    opt_s
        .map(T::from_str)
        .transpose()
        .map_err(|err| format!("invalid {label}: {err}"))
}

//////////////////////
// CLI Args Wrapper //
//////////////////////

pub struct Args(pico_args::Arguments);

impl Args {
    pub fn new(inner: pico_args::Arguments) -> Self {
        Self(inner)
    }

    fn subcommand(&mut self) -> Result<Option<String>, String> {
        self.0.subcommand().map_err(|err| err.to_string())
    }

    fn opt_value(&mut self, keys: impl Into<pico_args::Keys>) -> Result<Option<String>, String> {
        self.0
            .opt_value_from_fn(keys, |s| Result::<_, pico_args::Error>::Ok(s.to_owned()))
            .map_err(|err| err.to_string())
    }

    fn free_value(&mut self) -> Result<String, String> {
        self.0
            .free_from_fn(|s| Result::<_, pico_args::Error>::Ok(s.to_owned()))
            .map_err(|err| err.to_string())
    }

    fn flag(&mut self, keys: impl Into<pico_args::Keys>) -> bool {
        self.0.contains(keys)
    }

    fn expect_finished(self) -> Result<(), String> {
        let remaining = self.0.finish();
        if !remaining.is_empty() {
            Err(format!("unexpected arguments left: '{:?}'", remaining))
        } else {
            Ok(())
        }
    }

    fn maybe_help(&mut self, usage: &str) {
        if self.0.contains(["-h", "--help"]) {
            print!("{}", usage);
            std::process::exit(0);
        }
    }

    /// The `--dice`, `--min-stop`, and `--max-score` options every command
    /// takes.
    fn rules(&mut self) -> Result<Rules, String> {
        let total_dice = self.opt_value(["-d", "--dice"])?;
        let min_stop_score = self.opt_value(["-s", "--min-stop"])?;
        let max_score = self.opt_value(["-m", "--max-score"])?;

        Rules::new(
            parse_opt("dice", total_dice.as_deref())?.unwrap_or(DEFAULT_TOTAL_DICE),
            parse_opt("min stop score", min_stop_score.as_deref())?
                .unwrap_or(DEFAULT_MIN_STOP_SCORE),
            parse_opt("max score", max_score.as_deref())?.unwrap_or(DEFAULT_MAX_SCORE),
        )
        .map_err(|err| err.to_string())
    }

    /// `--seed`, or a fresh one from the clock.
    fn seed(&mut self) -> Result<u64, String> {
        let seed = self.opt_value("--seed")?;
        match parse_opt("seed", seed.as_deref())? {
            Some(seed) => Ok(seed),
            None => Ok(SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|dur| dur.as_nanos() as u64)
                .unwrap_or(0)),
        }
    }
}

const RULES_OPTIONS: &str = "\
    · --dice / -d n (default: 8)
      The number of dice a turn starts with, from 1 to 8.

    · --min-stop / -s score (default: 21)
      The smallest score a turn may stop at.

    · --max-score / -m score (default: 40)
      The largest score the table tracks. Locking a face that would push the
      score past this counts as if the face couldn't be locked.
";

fn solve_timed(rules: Rules, metrics: &mut Metrics) -> SolvedGameValueTable {
    let start_time = Instant::now();
    let table = SolvedGameValueTable::solve(rules);
    let solve_duration = start_time.elapsed();

    metrics.push("solve duration", format!("{:.2?}", solve_duration));
    metrics.push(
        "table size",
        format!(
            "{} states ({})",
            table.num_states(),
            ByteSize(table.total_size() as u64)
        ),
    );
    table
}

/////////////
// Metrics //
/////////////

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Metrics(pub Vec<(String, String)>);

impl Metrics {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, label: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.push((label.into(), value.into()));
        self
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new("{:>}  {:<}");

        for (label, value) in &self.0 {
            table.add_row(row!(label, value));
        }

        table
    }
}

///////////////////
// Command trait //
///////////////////

pub trait Command: Sized {
    const USAGE: &'static str;

    type Output: fmt::Display;

    fn try_from_cli_args(args: Args) -> Result<Self, String>;
    fn run(self) -> Result<Self::Output, String>;
}

///////////////
// AgentKind //
///////////////

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AgentKind {
    Optimal,
    Greedy,
    Random,
}

impl AgentKind {
    fn build<'a>(self, table: &'a SolvedGameValueTable, seed: u64) -> Box<dyn Agent + 'a> {
        match self {
            Self::Optimal => Box::new(OptimalAgent::new(table)),
            Self::Greedy => Box::new(GreedyAgent),
            Self::Random => Box::new(RandomAgent::new(Xoroshiro64Star::seed_from_u64(seed))),
        }
    }
}

impl FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "optimal" | "o" => Ok(Self::Optimal),
            "greedy" | "g" => Ok(Self::Greedy),
            "random" | "r" => Ok(Self::Random),
            _ => Err(format!(
                "unrecognized agent '{}', expected one of: optimal, greedy, random",
                s
            )),
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Optimal => "optimal",
            Self::Greedy => "greedy",
            Self::Random => "random",
        };
        f.write_str(s)
    }
}

/// A comma separated list of agents, one per player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentList(pub Vec<AgentKind>);

impl FromStr for AgentList {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let agents = s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(AgentKind::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(agents))
    }
}

//////////////////
// SolveCommand //
//////////////////

#[derive(Clone, Debug)]
pub struct SolveCommand {
    rules: Rules,
    dump: bool,
}

impl Command for SolveCommand {
    const USAGE: &'static str = "\
pickomino solve - solve every state of the roll sub-game

USAGE:
    pickomino solve [option ...]

EXAMPLES:
    pickomino solve
    pickomino solve --dump -d 4 -s 10 -m 20

OPTIONS:
    · --dump
      Print one line per solved state:
      (score, dice left, expected value, bust probability, used face flags)

";

    type Output = SolveCommandOutput;

    fn try_from_cli_args(mut args: Args) -> Result<Self, String> {
        args.maybe_help(&format!("{}{}", Self::USAGE, RULES_OPTIONS));

        let rules = args.rules()?;
        let dump = args.flag("--dump");
        args.expect_finished()?;

        Ok(Self { rules, dump })
    }

    fn run(self) -> Result<Self::Output, String> {
        let mut metrics = Metrics::new();
        let table = solve_timed(self.rules, &mut metrics);

        let initial = table.initial_entry();
        metrics.push("expected score", format!("{:.3}", initial.expected_value));
        metrics.push("bust probability", format!("{:.3}", initial.bust_probability));

        let trace_lines = if self.dump {
            table.trace_lines().map(|line| line.to_string()).collect()
        } else {
            Vec::new()
        };

        Ok(SolveCommandOutput {
            trace_lines,
            metrics,
        })
    }
}

pub struct SolveCommandOutput {
    pub trace_lines: Vec<String>,
    pub metrics: Metrics,
}

impl fmt::Display for SolveCommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.trace_lines {
            writeln!(f, "{}", line)?;
        }
        write!(f, "\n{}", self.metrics.to_table())
    }
}

///////////////////////
// BestActionCommand //
///////////////////////

#[derive(Clone, Debug)]
pub struct BestActionCommand {
    rules: Rules,
    state: GameState,
    rolled_dice: DiceCounts,
}

impl BestActionCommand {
    pub fn try_from_str_args(
        rules: Rules,
        score: &str,
        used: &str,
        rolled_dice: &str,
    ) -> Result<Self, String> {
        let score: u16 = parse_req("score", score)?;
        let used: UsedFaces = parse_req("used faces", used)?;
        let rolled_dice: DiceCounts = parse_req("rolled dice", rolled_dice)?;

        if rolled_dice.is_empty() {
            return Err("no dice rolled".to_string());
        }

        let state = GameState::new(score, rolled_dice.len(), used);
        Ok(Self {
            rules,
            state,
            rolled_dice,
        })
    }
}

impl Command for BestActionCommand {
    const USAGE: &'static str = "\
pickomino best-action - rank the faces to lock on a roll

USAGE:
    pickomino best-action [option ...] <score> <used-faces> <rolled-dice>

EXAMPLES:
    # the opening roll
    pickomino best-action 0 - [W,W,5,5,3,3,1,1]

    # 15 points with 5s and a worm locked, rolled four dice
    pickomino best-action 15 5W [4,4,3,1]

OPTIONS:
";

    type Output = BestActionCommandOutput;

    fn try_from_cli_args(mut args: Args) -> Result<Self, String> {
        args.maybe_help(&format!("{}{}", Self::USAGE, RULES_OPTIONS));

        let rules = args.rules()?;
        let score = args.free_value()?;
        let used = args.free_value()?;
        let rolled_dice = args.free_value()?;
        args.expect_finished()?;

        Self::try_from_str_args(rules, &score, &used, &rolled_dice)
    }

    fn run(self) -> Result<Self::Output, String> {
        let mut metrics = Metrics::new();
        let table = solve_timed(self.rules, &mut metrics);

        if !table.contains(&self.state) {
            return Err(format!(
                "can't reach score {} with {} dice left and faces {:?} locked",
                self.state.score, self.state.dice_left, self.state.used,
            ));
        }

        let policy = Policy::new(&table);
        let action_values = policy.actions_by_expected_value(&self.state, self.rolled_dice);
        let then_stop = action_values
            .iter()
            .map(|action| policy.should_stop(&action.next))
            .collect();

        let entry = table.get(&self.state);
        metrics.push(
            "state value",
            format!(
                "{:.3} (pbust {:.3})",
                entry.expected_value, entry.bust_probability
            ),
        );

        Ok(BestActionCommandOutput {
            rolled_dice: self.rolled_dice,
            action_values,
            then_stop,
            metrics,
        })
    }
}

pub struct BestActionCommandOutput {
    pub rolled_dice: DiceCounts,
    pub action_values: Vec<ActionValue>,
    /// whether the policy stops after each action.
    pub then_stop: Vec<bool>,
    pub metrics: Metrics,
}

impl fmt::Display for BestActionCommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut table = Table::new("{:>}  {:>}  {:>} {:>}  {:<}").with_row(row!(
            "lock", "score", "exp v", "pbust", "then"
        ));

        for (action, &then_stop) in self.action_values.iter().zip(&self.then_stop) {
            table.add_row(row!(
                format!(
                    "{}x {}",
                    self.rolled_dice.get_count(action.face),
                    action.face
                ),
                action.next.score,
                format!("{:.3}", action.entry.expected_value),
                format!("{:.3}", action.entry.bust_probability),
                if then_stop { "stop" } else { "roll" },
            ));
        }

        if self.action_values.is_empty() {
            table.add_row(row!("bust", "", "", "", ""));
        }

        write!(
            f,
            "\nrolled: {}\n\n{}\n{}",
            self.rolled_dice,
            table,
            self.metrics.to_table()
        )
    }
}

/////////////////////
// SimulateCommand //
/////////////////////

#[derive(Clone, Debug)]
pub struct SimulateCommand {
    rules: Rules,
    seed: u64,
    trials: usize,
    agent: AgentKind,
}

impl Command for SimulateCommand {
    const USAGE: &'static str = "\
pickomino simulate - play roll episodes against random dice

USAGE:
    pickomino simulate [option ...]

EXAMPLES:
    # trace a single turn
    pickomino simulate --seed 42

    # compare the greedy agent against the solved table
    pickomino simulate -n 100000 -a greedy

OPTIONS:
    · --trials / -n n (default: 1)
      The number of episodes to play. A single episode is traced roll by roll.

    · --agent / -a optimal|greedy|random (default: optimal)
      Who decides which face to lock and when to stop.

    · --seed seed (default: from the clock)
      Seed for the dice.

";

    type Output = SimulateCommandOutput;

    fn try_from_cli_args(mut args: Args) -> Result<Self, String> {
        args.maybe_help(&format!("{}{}", Self::USAGE, RULES_OPTIONS));

        let rules = args.rules()?;
        let seed = args.seed()?;
        let trials = args.opt_value(["-n", "--trials"])?;
        let agent = args.opt_value(["-a", "--agent"])?;
        args.expect_finished()?;

        let trials = parse_opt("trials", trials.as_deref())?.unwrap_or(1);
        if trials == 0 {
            return Err("need at least one trial".to_string());
        }

        Ok(Self {
            rules,
            seed,
            trials,
            agent: parse_opt("agent", agent.as_deref())?.unwrap_or(AgentKind::Optimal),
        })
    }

    fn run(self) -> Result<Self::Output, String> {
        let mut metrics = Metrics::new();
        let table = solve_timed(self.rules, &mut metrics);
        metrics.push("seed", self.seed.to_string());
        metrics.push("agent", self.agent.to_string());

        let mut rng = Xoroshiro64Star::seed_from_u64(self.seed);
        let mut agent = self.agent.build(&table, self.seed.wrapping_add(1));

        let mut trace = Vec::new();
        if self.trials == 1 {
            let outcome = run_episode(self.rules, agent.as_mut(), &mut rng);

            for step in &outcome.steps {
                let value = table
                    .try_get(&step.state)
                    .map(|entry| TraceLine {
                        state: step.state,
                        entry,
                    }.to_string())
                    .unwrap_or_else(|| format!("{:?}", step.state));
                let locked = step
                    .face
                    .map(|face| face.to_string())
                    .unwrap_or_else(|| "-".to_string());
                trace.push((step.dice.to_string(), locked, value));
            }

            metrics.push("result", outcome.result.to_string());
            metrics.push("banked", outcome.banked_score(&self.rules).to_string());
        } else {
            let start_time = Instant::now();
            let summary = summarize_episodes(self.rules, agent.as_mut(), &mut rng, self.trials);

            metrics.push("simulate duration", format!("{:.2?}", start_time.elapsed()));
            metrics.push("trials", summary.trials.to_string());
            metrics.push(
                "mean score",
                format!("{:.3} (± {:.3})", summary.mean, summary.stderr),
            );
            metrics.push("bust rate", format!("{:.3}", summary.bust_rate));
        }

        let initial = table.initial_entry();
        metrics.push(
            "optimal expected score",
            format!(
                "{:.3} (pbust {:.3})",
                initial.expected_value, initial.bust_probability
            ),
        );

        Ok(SimulateCommandOutput { trace, metrics })
    }
}

pub struct SimulateCommandOutput {
    /// `(rolled dice, locked face, resulting state)` per roll.
    pub trace: Vec<(String, String, String)>,
    pub metrics: Metrics,
}

impl fmt::Display for SimulateCommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.trace.is_empty() {
            let mut table =
                Table::new("{:>}  {:^}  {:<}").with_row(row!("rolled", "lock", "state"));
            for (rolled, locked, state) in &self.trace {
                table.add_row(row!(rolled, locked, state));
            }
            write!(f, "\n{}", table)?;
        }
        write!(f, "\n{}", self.metrics.to_table())
    }
}

//////////////////////
// PlayMatchCommand //
//////////////////////

#[derive(Clone, Debug)]
pub struct PlayMatchCommand {
    rules: Rules,
    players: AgentList,
    seed: u64,
    max_turns: usize,
}

impl Command for PlayMatchCommand {
    const USAGE: &'static str = "\
pickomino play-match - play a whole game for the tiles

USAGE:
    pickomino play-match [option ...]

EXAMPLES:
    pickomino play-match -p optimal,greedy,random --seed 7

OPTIONS:
    · --players / -p agent,.. (default: optimal,greedy)
      One agent per player (1 to 4 players): optimal, greedy, or random.

    · --max-turns / -u turns (default: 500)
      Stop the match after this many turns, even if tiles are left.

    · --seed seed (default: from the clock)
      Seed for the dice.

";

    type Output = PlayMatchCommandOutput;

    fn try_from_cli_args(mut args: Args) -> Result<Self, String> {
        args.maybe_help(&format!("{}{}", Self::USAGE, RULES_OPTIONS));

        let rules = args.rules()?;
        let seed = args.seed()?;
        let players = args.opt_value(["-p", "--players"])?;
        let max_turns = args.opt_value(["-u", "--max-turns"])?;
        args.expect_finished()?;

        Ok(Self {
            rules,
            players: parse_opt("players", players.as_deref())?
                .unwrap_or_else(|| AgentList(vec![AgentKind::Optimal, AgentKind::Greedy])),
            seed,
            max_turns: parse_opt("max turns", max_turns.as_deref())?.unwrap_or(500),
        })
    }

    fn run(self) -> Result<Self::Output, String> {
        let mut metrics = Metrics::new();
        let table = solve_timed(self.rules, &mut metrics);
        metrics.push("seed", self.seed.to_string());

        let mut agents = self
            .players
            .0
            .iter()
            .enumerate()
            .map(|(player, kind)| kind.build(&table, self.seed.wrapping_add(1 + player as u64)))
            .collect::<Vec<_>>();
        let mut agent_refs = agents
            .iter_mut()
            .map(|agent| agent.as_mut() as &mut dyn Agent)
            .collect::<Vec<_>>();

        let mut rng = Xoroshiro64Star::seed_from_u64(self.seed);
        let outcome = play_match(self.rules, &mut agent_refs, &mut rng, self.max_turns)
            .map_err(|err| err.to_string())?;

        metrics.push("turns", outcome.turns.to_string());
        metrics.push("table", format!("[{}]", outcome.board));
        metrics.push(
            if outcome.board.is_done() {
                "winner"
            } else {
                "leader"
            },
            outcome
                .winner
                .map(|player| format!("player {}", player))
                .unwrap_or_else(|| "-".to_string()),
        );

        Ok(PlayMatchCommandOutput {
            players: self.players,
            outcome,
            metrics,
        })
    }
}

pub struct PlayMatchCommandOutput {
    pub players: AgentList,
    pub outcome: MatchOutcome,
    pub metrics: Metrics,
}

impl fmt::Display for PlayMatchCommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let board = &self.outcome.board;
        let mut table = Table::new("{:>}  {:<}  {:>}  {:<}")
            .with_row(row!("player", "agent", "worms", "tiles"));

        for (player, agent) in self.players.0.iter().enumerate() {
            table.add_row(row!(
                player,
                agent,
                board.worms(player),
                board.tiles(player).join(" "),
            ));
        }

        write!(f, "\n{}\n{}", table, self.metrics.to_table())
    }
}

////////////////////
// DiceFitCommand //
////////////////////

#[derive(Clone, Debug)]
pub struct DiceFitCommand {
    ndice: u8,
    samples: usize,
    seed: u64,
    show_outcomes: bool,
}

impl Command for DiceFitCommand {
    const USAGE: &'static str = "\
pickomino dice-fit - check the dice roller against the exact roll distribution

USAGE:
    pickomino dice-fit [option ...]

EXAMPLES:
    pickomino dice-fit -d 3 -n 100000 --outcomes

OPTIONS:
    · --dice / -d n (default: 8)
      How many dice to roll at once, from 1 to 8.

    · --samples / -n n (default: 100000)
      The number of rolls to draw.

    · --outcomes
      Also list every outcome with its expected and observed frequency.

    · --seed seed (default: from the clock)
      Seed for the dice.
";

    type Output = DiceFitCommandOutput;

    fn try_from_cli_args(mut args: Args) -> Result<Self, String> {
        args.maybe_help(Self::USAGE);

        let ndice = args.opt_value(["-d", "--dice"])?;
        let samples = args.opt_value(["-n", "--samples"])?;
        let show_outcomes = args.flag("--outcomes");
        let seed = args.seed()?;
        args.expect_finished()?;

        // reuse the rules' dice validation
        let ndice = parse_opt("dice", ndice.as_deref())?.unwrap_or(DEFAULT_TOTAL_DICE);
        let rules = Rules::new(ndice, DEFAULT_MIN_STOP_SCORE, DEFAULT_MAX_SCORE)
            .map_err(|err| err.to_string())?;

        let samples = parse_opt("samples", samples.as_deref())?.unwrap_or(100_000);
        if samples == 0 {
            return Err("need at least one sample".to_string());
        }

        Ok(Self {
            ndice: rules.total_dice(),
            samples,
            seed,
            show_outcomes,
        })
    }

    fn run(self) -> Result<Self::Output, String> {
        let mut rng = Xoroshiro64Star::seed_from_u64(self.seed);
        let ndice = self.ndice;

        let start_time = Instant::now();
        let report = fit_roll_sampler(ndice, self.samples, || DiceCounts::roll(&mut rng, ndice))
            .map_err(|err| err.to_string())?;

        let mut metrics = Metrics::new();
        metrics.push("sample duration", format!("{:.2?}", start_time.elapsed()));
        metrics.push("seed", self.seed.to_string());
        metrics.push("samples", report.samples.to_string());
        metrics.push("outcomes", report.outcomes.len().to_string());
        metrics.push("roll p-value", format!("{:.4}", report.roll_p_value));
        metrics.push("face p-value", format!("{:.4}", report.face_p_value));
        metrics.push("max |p - p_hat|", format!("{:.5}", report.max_abs_diff));

        let mut faces = Table::new("{:>}  {:>}  {:<}").with_row(row!("face", "count", "p_hat"));
        let total = (report.samples * ndice as usize) as f64;
        for &face in Face::all() {
            let count = report.face_counts[face.idx() as usize];
            faces.add_row(row!(face, count, format!("{:.5}", (count as f64) / total)));
        }

        let outcomes = if self.show_outcomes {
            let mut table =
                Table::new("{:>}  {:<}  {:<}").with_row(row!("dice", "p", "p_hat"));
            for (outcome, p_hat) in report.outcomes.iter().zip(report.p_hat.iter()) {
                table.add_row(row!(
                    outcome.counts(),
                    format!("{:.5}", outcome.prob()),
                    format!("{:.5}", p_hat)
                ));
            }
            Some(table)
        } else {
            None
        };

        Ok(DiceFitCommandOutput {
            faces,
            outcomes,
            metrics,
        })
    }
}

pub struct DiceFitCommandOutput {
    pub faces: Table,
    pub outcomes: Option<Table>,
    pub metrics: Metrics,
}

impl fmt::Display for DiceFitCommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(outcomes) = &self.outcomes {
            write!(f, "\n{}", outcomes)?;
        }
        write!(f, "\n{}\n{}", self.faces, self.metrics.to_table())
    }
}

/////////////////
// BaseCommand //
/////////////////

#[derive(Debug)]
pub enum BaseCommand {
    Solve(SolveCommand),
    BestAction(BestActionCommand),
    Simulate(SimulateCommand),
    PlayMatch(PlayMatchCommand),
    DiceFit(DiceFitCommand),
}

impl Command for BaseCommand {
    const USAGE: &'static str = "\
pickomino - A utility for optimally playing the dice rolling part of Pickomino!

USAGE:
    pickomino [option ...] <subcommand>

SUBCOMMANDS:
    · pickomino solve - solve every state of the roll sub-game
    · pickomino best-action - rank the faces to lock on a roll
    · pickomino simulate - play roll episodes against random dice
    · pickomino play-match - play a whole game for the tiles
    · pickomino dice-fit - check the dice roller against the exact roll distribution

Set RUST_LOG=debug (or trace) for more detail.
";

    type Output = String;

    fn try_from_cli_args(mut args: Args) -> Result<Self, String> {
        let maybe_subcommand = args.subcommand()?;

        match maybe_subcommand.as_deref() {
            Some("solve") => Ok(Self::Solve(SolveCommand::try_from_cli_args(args)?)),
            Some("best-action") => Ok(Self::BestAction(BestActionCommand::try_from_cli_args(
                args,
            )?)),
            Some("simulate") => Ok(Self::Simulate(SimulateCommand::try_from_cli_args(args)?)),
            Some("play-match") => Ok(Self::PlayMatch(PlayMatchCommand::try_from_cli_args(
                args,
            )?)),
            Some("dice-fit") => Ok(Self::DiceFit(DiceFitCommand::try_from_cli_args(args)?)),
            Some(command) => Err(format!("'{}' is not a recognized command", command)),
            None => {
                args.maybe_help(Self::USAGE);
                Err("no subcommand specified".to_string())
            }
        }
    }

    fn run(self) -> Result<String, String> {
        match self {
            Self::Solve(cmd) => cmd.run().map(|out| out.to_string()),
            Self::BestAction(cmd) => cmd.run().map(|out| out.to_string()),
            Self::Simulate(cmd) => cmd.run().map(|out| out.to_string()),
            Self::PlayMatch(cmd) => cmd.run().map(|out| out.to_string()),
            Self::DiceFit(cmd) => cmd.run().map(|out| out.to_string()),
        }
    }
}

///////////
// Tests //
///////////
