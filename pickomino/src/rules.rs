//! The scoring rules of the roll sub-game. The solved value table is a pure
//! function of these rules.

use crate::{
    dice::{Face, NUM_FACES},
    state::UsedFaces,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The game is never played with more than 8 dice.
pub const MAX_TOTAL_DICE: u8 = 8;

pub const DEFAULT_TOTAL_DICE: u8 = 8;
pub const DEFAULT_MIN_STOP_SCORE: u16 = 21;
pub const DEFAULT_MAX_SCORE: u16 = 40;
pub const DEFAULT_REQUIRED_FACE: Face = Face::Worm;
pub const DEFAULT_FACE_SCORES: [u8; NUM_FACES] = [1, 2, 3, 4, 5, 5];

/// Upper bound on `max_score`, so the per-used-face tables stay small.
pub const MAX_SCORE_LIMIT: u16 = 1000;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RulesError {
    #[error("total dice must be in the range [1, 8]: {0}")]
    TotalDice(u8),
    #[error("face '{0}' must score at least 1 point")]
    ZeroFaceScore(Face),
    #[error("max score ({max_score}) must be at least the sum of all face scores ({all_faces_score})")]
    MaxScoreTooLow { max_score: u16, all_faces_score: u16 },
    #[error("max score must be at most 1000: {0}")]
    MaxScoreTooHigh(u16),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRules")]
pub struct Rules {
    /// The number of dice a turn starts with.
    total_dice: u8,
    /// Stopping requires at least this score (and the required face).
    min_stop_score: u16,
    /// Scores above this are never tracked; transitions past it are dropped.
    max_score: u16,
    /// The face that must be set aside at least once before stopping.
    required_face: Face,
    /// Points per die for each face, indexed by `Face::idx`.
    face_scores: [u8; NUM_FACES],
}

/// Unchecked rules as they appear on the wire. Deserializing `Rules` goes
/// through `Rules::custom`, so a deserialized table is always buildable.
#[derive(Deserialize)]
struct RawRules {
    total_dice: u8,
    min_stop_score: u16,
    max_score: u16,
    required_face: Face,
    face_scores: [u8; NUM_FACES],
}

impl TryFrom<RawRules> for Rules {
    type Error = RulesError;

    fn try_from(raw: RawRules) -> Result<Self, Self::Error> {
        Self::custom(
            raw.total_dice,
            raw.min_stop_score,
            raw.max_score,
            raw.required_face,
            raw.face_scores,
        )
    }
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            total_dice: DEFAULT_TOTAL_DICE,
            min_stop_score: DEFAULT_MIN_STOP_SCORE,
            max_score: DEFAULT_MAX_SCORE,
            required_face: DEFAULT_REQUIRED_FACE,
            face_scores: DEFAULT_FACE_SCORES,
        }
    }
}

impl Rules {
    /// The standard faces and required face, with a custom pool size and
    /// score limits.
    pub fn new(total_dice: u8, min_stop_score: u16, max_score: u16) -> Result<Self, RulesError> {
        Self::custom(
            total_dice,
            min_stop_score,
            max_score,
            DEFAULT_REQUIRED_FACE,
            DEFAULT_FACE_SCORES,
        )
    }

    pub fn custom(
        total_dice: u8,
        min_stop_score: u16,
        max_score: u16,
        required_face: Face,
        face_scores: [u8; NUM_FACES],
    ) -> Result<Self, RulesError> {
        let rules = Self {
            total_dice,
            min_stop_score,
            max_score,
            required_face,
            face_scores,
        };
        rules.validate()?;
        Ok(rules)
    }

    /// Check the rules describe a table we can build.
    pub fn validate(&self) -> Result<(), RulesError> {
        if !(1..=MAX_TOTAL_DICE).contains(&self.total_dice) {
            return Err(RulesError::TotalDice(self.total_dice));
        }

        if let Some(&face) = Face::all()
            .iter()
            .find(|face| self.face_scores[face.idx() as usize] == 0)
        {
            return Err(RulesError::ZeroFaceScore(face));
        }

        if self.max_score > MAX_SCORE_LIMIT {
            return Err(RulesError::MaxScoreTooHigh(self.max_score));
        }

        let all_faces_score = self.locked_score(UsedFaces::full());
        if self.max_score < all_faces_score {
            return Err(RulesError::MaxScoreTooLow {
                max_score: self.max_score,
                all_faces_score,
            });
        }

        Ok(())
    }

    #[inline]
    pub fn total_dice(&self) -> u8 {
        self.total_dice
    }

    #[inline]
    pub fn min_stop_score(&self) -> u16 {
        self.min_stop_score
    }

    #[inline]
    pub fn max_score(&self) -> u16 {
        self.max_score
    }

    #[inline]
    pub fn required_face(&self) -> Face {
        self.required_face
    }

    #[inline]
    pub fn face_score(&self, face: Face) -> u16 {
        self.face_scores[face.idx() as usize] as u16
    }

    pub fn max_face_score(&self) -> u16 {
        Face::all()
            .iter()
            .map(|&face| self.face_score(face))
            .max()
            .unwrap_or(0)
    }

    /// The smallest score a turn can have once every face in `used` has been
    /// set aside: each face contributes at least one die.
    pub fn locked_score(&self, used: UsedFaces) -> u16 {
        used.iter().map(|face| self.face_score(face)).sum()
    }
}
