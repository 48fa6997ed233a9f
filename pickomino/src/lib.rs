//! # pickomino
//!
//! A utility for optimally playing the dice-rolling part of Pickomino
//! (a.k.a. Heckmeck) : )
//!
//! ## Rules
//!
//! A turn starts with 8 dice. Each roll, the player must set aside _all_ dice
//! showing one face that hasn't been set aside yet this turn, adding the face
//! values to their turn score (faces `1..=5` score their pips, the worm `W`
//! scores 5). After each roll the player either stops and banks their score,
//! or rolls the remaining dice again. Stopping is only allowed once at least
//! one worm has been set aside and the score reached 21. A roll where no new
//! face can be set aside is a bust and the turn scores nothing.
//!
//! ## Explanation
//!
//! We solve the whole turn state space exactly with backward induction. For
//! every `(score, dice left, used faces)` state, the solved table holds the
//! expected banked score assuming optimal play afterwards, and the probability
//! that optimal play still ends in a bust.
//!
//! The expected value in this case is the expectation of the banked turn score
//! assuming the player plays to maximize their expected value.

#[macro_use]
mod macros;

pub mod board;
pub mod cache;
pub mod cli;
pub mod dice;
pub mod index;
pub mod policy;
pub mod rules;
pub mod solver;
pub mod state;
pub mod stats;

use ndarray::Array1;

///////////////////
// Combinatorics //
///////////////////

/// The number of factorials to precompute in our static lookup table. Note this
/// number is chosen so as not to overflow a u64.
pub(crate) const NUM_FACTORIALS: usize = 21;

/// A precomputed lookup table of factorials from `0 <= n < NUM_FACTORIALS`.
/// `FACTORIAL_LT[n] = n!`.
const FACTORIAL_LT: [u64; NUM_FACTORIALS] = precompute_factorials();

const fn precompute_factorials() -> [u64; NUM_FACTORIALS] {
    let mut factorials: [u64; NUM_FACTORIALS] = [1; NUM_FACTORIALS];

    // need ghetto for-loop in const fn...
    let mut idx = 1;
    loop {
        if idx >= NUM_FACTORIALS {
            break;
        }
        factorials[idx] = (idx as u64) * factorials[idx - 1];
        idx += 1;
    }

    factorials
}

pub(crate) const fn factorial(n: u32) -> u64 {
    FACTORIAL_LT[n as usize]
}

/// count `n choose k` without replacement.
pub(crate) const fn num_combinations(n: u32, k: u32) -> u64 {
    factorial(n) / (factorial(k) * factorial(n - k))
}

/// count `n choose k` with replacement. also known as `n multichoose k`.
///
/// The number of distinct outcomes when rolling `k` indistinguishable dice
/// with `n` faces is `n multichoose k = C(n + k - 1, n - 1)`.
#[inline]
pub(crate) const fn num_multisets(n: u32, k: u32) -> u64 {
    num_combinations(n + k - 1, k)
}

///////////////
// Bit Hacks //
///////////////

/// Sum all nibbles in `x`.
#[inline]
pub(crate) fn u32_sum_all_nibs(x: u32) -> u32 {
    // a mask that selects the lo nibble in each byte.
    const NIBS_0246: u32 = 0x0f0f_0f0f;

    // horizontal sum hi and lo nibbles in each byte, placing in the lo nibble.
    let y = (x & NIBS_0246) + ((x >> 4) & NIBS_0246);

    // if y = [y0, y1, y2, y3] bytes and each byte b is in the range 0 <= b < 64,
    // then multiplying by 0x0101_0101 will yield
    // z = [y0, y0 + y1, y0 + y1 + y2, y0 + y1 + y2 + y3] without any overflows.
    //
    // since each byte in y is the sum of two nibbles nb where 0 <= nb < 16, it
    // follows that 0 <= b = nb_lo + nb_hi < 32 < 64, so we won't have any
    // overflows.
    let z = y.wrapping_mul(0x0101_0101);

    // select the last byte in z, which contains our desired sum:
    // z3 = y0 + y1 + y2 + y3
    z >> 24
}

/////////////////////
// TotalSize trait //
/////////////////////

/// A trait for computing the total size of a data structure in memory. That means
/// not just the size on the stack, but also the total size of any owned resources.
pub trait TotalSize {
    /// Types whose total size is known statically, like a `u32`, can return a
    /// constant here. Unsized types or types that contain variable-size resources
    /// must return `None` here.
    fn static_size() -> Option<usize> {
        None
    }
    fn total_size(&self) -> usize {
        Self::static_size().unwrap_or_else(|| std::mem::size_of_val(self))
    }
}

impl_total_size_static!(u8, u16, u32, f64);

impl<T> TotalSize for Vec<T>
where
    T: TotalSize,
{
    fn total_size(&self) -> usize {
        let inner_size = if let Some(elt_size) = T::static_size() {
            self.len() * elt_size
        } else {
            self.iter().map(|x| x.total_size()).sum()
        };
        std::mem::size_of::<Self>() + inner_size
    }
}

impl<T> TotalSize for Array1<T>
where
    T: TotalSize,
{
    fn total_size(&self) -> usize {
        let inner_size = if let Some(elt_size) = T::static_size() {
            self.len() * elt_size
        } else {
            self.iter().map(|x| x.total_size()).sum()
        };
        std::mem::size_of::<Self>() + inner_size
    }
}

///////////
// Tests //
///////////
