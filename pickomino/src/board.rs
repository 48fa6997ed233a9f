//! The multiplayer tile layer: players trade their roll results for tiles
//! worth 1-4 worms, steal each other's top tiles, and lose them on a bust.

use crate::{
    policy::{run_episode, Agent, RollResult},
    rules::Rules,
};
use log::{debug, info};
use rand::Rng;
use std::{cmp, fmt};
use thiserror::Error;

pub const NUM_TILES: usize = 16;
pub const MIN_TILE_SCORE: u16 = 21;
pub const MAX_TILE_SCORE: u16 = MIN_TILE_SCORE + NUM_TILES as u16 - 1;
pub const MAX_PLAYERS: usize = 4;

/// Worms on each tile, indexed by `score - MIN_TILE_SCORE`.
pub const TILE_WORMS: [u8; NUM_TILES] = [1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TileState {
    Available,
    Owned,
    Removed,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("number of players must be in the range [1, 4]: {0}")]
    PlayerCount(usize),
}

/// What a player's roll result did to the board.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Stole { tile: u16, from: usize },
    Picked { tile: u16 },
    Busted {
        returned: Option<u16>,
        removed: Option<u16>,
    },
}

impl fmt::Display for TurnOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stole { tile, from } => write!(f, "stole tile {} from player {}", tile, from),
            Self::Picked { tile } => write!(f, "picked tile {}", tile),
            Self::Busted { returned, removed } => {
                f.write_str("busted")?;
                if let Some(tile) = returned {
                    write!(f, ", returned tile {}", tile)?;
                }
                if let Some(tile) = removed {
                    write!(f, ", tile {} removed", tile)?;
                }
                Ok(())
            }
        }
    }
}

#[inline]
fn tile_score(idx: usize) -> u16 {
    MIN_TILE_SCORE + idx as u16
}

#[derive(Clone, Debug)]
pub struct Board {
    tiles: [TileState; NUM_TILES],
    /// each player's tiles (as indices), top of the stack last.
    stacks: Vec<Vec<usize>>,
    worms: Vec<u16>,
    current: usize,
}

impl Board {
    pub fn new(num_players: usize) -> Result<Self, BoardError> {
        if !(1..=MAX_PLAYERS).contains(&num_players) {
            return Err(BoardError::PlayerCount(num_players));
        }

        Ok(Self {
            tiles: [TileState::Available; NUM_TILES],
            stacks: vec![Vec::new(); num_players],
            worms: vec![0; num_players],
            current: 0,
        })
    }

    #[inline]
    pub fn num_players(&self) -> usize {
        self.stacks.len()
    }

    #[inline]
    pub fn current_player(&self) -> usize {
        self.current
    }

    /// Returns `None` if there's no tile for `score`.
    pub fn tile_state(&self, score: u16) -> Option<TileState> {
        let idx = score.checked_sub(MIN_TILE_SCORE)? as usize;
        self.tiles.get(idx).copied()
    }

    pub fn worms(&self, player: usize) -> u16 {
        self.worms[player]
    }

    pub fn top_tile(&self, player: usize) -> Option<u16> {
        self.stacks[player].last().map(|&idx| tile_score(idx))
    }

    pub fn tiles(&self, player: usize) -> impl Iterator<Item = u16> + '_ {
        self.stacks[player].iter().map(|&idx| tile_score(idx))
    }

    fn push_tile(&mut self, player: usize, idx: usize) {
        self.tiles[idx] = TileState::Owned;
        self.stacks[player].push(idx);
        self.worms[player] += TILE_WORMS[idx] as u16;
    }

    fn pop_tile(&mut self, player: usize) -> Option<usize> {
        let idx = self.stacks[player].pop()?;
        self.tiles[idx] = TileState::Available;
        self.worms[player] -= TILE_WORMS[idx] as u16;
        Some(idx)
    }

    fn try_steal_tile(&mut self, idx: usize) -> Option<usize> {
        let current = self.current;
        let from = (0..self.num_players())
            .filter(|&player| player != current)
            .find(|&player| self.stacks[player].last() == Some(&idx))?;

        self.pop_tile(from);
        self.push_tile(current, idx);
        Some(from)
    }

    fn pick_closest_tile(&mut self, idx: usize) -> Option<usize> {
        let closest = (0..=idx)
            .rev()
            .find(|&idx| self.tiles[idx] == TileState::Available)?;
        self.push_tile(self.current, closest);
        Some(closest)
    }

    /// Return the current player's top tile to the table and turn over the
    /// highest available tile, unless that's the one just returned.
    fn process_bust(&mut self) -> TurnOutcome {
        let returned = match self.pop_tile(self.current) {
            Some(idx) => idx,
            None => {
                return TurnOutcome::Busted {
                    returned: None,
                    removed: None,
                }
            }
        };

        let removed = (0..NUM_TILES)
            .rev()
            .find(|&idx| self.tiles[idx] == TileState::Available)
            .filter(|&idx| idx != returned);
        if let Some(idx) = removed {
            self.tiles[idx] = TileState::Removed;
        }

        TurnOutcome::Busted {
            returned: Some(tile_score(returned)),
            removed: removed.map(tile_score),
        }
    }

    /// Apply the current player's roll result, then pass the turn on.
    pub fn process_roll(&mut self, result: RollResult) -> TurnOutcome {
        let outcome = match result {
            RollResult::Scored(score) if score >= MIN_TILE_SCORE => {
                let idx = (cmp::min(score, MAX_TILE_SCORE) - MIN_TILE_SCORE) as usize;

                if let Some(from) = self.try_steal_tile(idx) {
                    TurnOutcome::Stole {
                        tile: tile_score(idx),
                        from,
                    }
                } else if let Some(picked) = self.pick_closest_tile(idx) {
                    TurnOutcome::Picked {
                        tile: tile_score(picked),
                    }
                } else {
                    self.process_bust()
                }
            }
            _ => self.process_bust(),
        };

        debug!("player {}: {} => {}", self.current, result, outcome);

        self.current = (self.current + 1) % self.num_players();
        outcome
    }

    /// The game ends once no tile is left on the table.
    pub fn is_done(&self) -> bool {
        !self.tiles.contains(&TileState::Available)
    }

    /// The player with the most worms, with ties going to the player holding
    /// the highest tile. `None` until the game is done.
    pub fn winner(&self) -> Option<usize> {
        if !self.is_done() {
            return None;
        }
        self.leader()
    }

    /// The current leader by the same ordering as `winner`, earliest player
    /// first on a full tie.
    pub fn leader(&self) -> Option<usize> {
        (0..self.num_players())
            .rev()
            .max_by_key(|&player| {
                let highest = self.stacks[player].iter().copied().max();
                (self.worms[player], highest)
            })
    }
}

/// Formats the table row, e.g., `21 22 .. 24 xx ...`, where `..` is an owned
/// tile and `xx` a removed one.
impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, state) in self.tiles.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            match state {
                TileState::Available => write!(f, "{}", tile_score(idx))?,
                TileState::Owned => f.write_str("..")?,
                TileState::Removed => f.write_str("xx")?,
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct MatchOutcome {
    pub board: Board,
    pub turns: usize,
    pub winner: Option<usize>,
}

/// Play a whole match, each player rolling with their own agent, until the
/// table is empty or `max_turns` turns have been played.
pub fn play_match<R>(
    rules: Rules,
    agents: &mut [&mut dyn Agent],
    rng: &mut R,
    max_turns: usize,
) -> Result<MatchOutcome, BoardError>
where
    R: Rng + ?Sized,
{
    let mut board = Board::new(agents.len())?;
    let mut turns = 0;

    while !board.is_done() && turns < max_turns {
        let player = board.current_player();
        let episode = run_episode(rules, &mut *agents[player], rng);
        board.process_roll(episode.result);
        turns += 1;
    }

    let winner = if board.is_done() {
        board.winner()
    } else {
        board.leader()
    };
    info!(
        "match finished after {} turns, winner: {:?}, table: [{}]",
        turns, winner, board
    );

    Ok(MatchOutcome {
        board,
        turns,
        winner,
    })
}

///////////
// Tests //
///////////
